use serde_json::json;

use crate::cli::utils::{configured_service, output_success};
use crate::cli::OutputFormat;
use crate::context::RequestContext;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let service = configured_service()?;
    let (partners, cells) = service.cells(&RequestContext::system()).await?;

    match output_format {
        OutputFormat::Json => {
            let rows: Vec<_> = cells
                .iter()
                .map(|c| {
                    json!({
                        "prefix": c.prefix(),
                        "remit_type": c.remit_type,
                        "bound_type": c.bound_type,
                        "partner": c.partner,
                    })
                })
                .collect();
            output_success(
                &output_format,
                &format!("{} cells for {} partners", cells.len(), partners.len()),
                Some(json!({ "partners": partners, "cells": rows })),
            )
        }
        OutputFormat::Text => {
            println!("{:<16} {:<12} {:<10} PARTNER", "PREFIX", "REMIT", "BOUND");
            for cell in &cells {
                println!(
                    "{:<16} {:<12} {:<10} {}",
                    cell.prefix(),
                    cell.remit_type.as_str(),
                    cell.bound_type.as_str(),
                    cell.partner
                );
            }
            Ok(())
        }
    }
}
