use anyhow::Context;
use serde_json::json;
use std::path::Path;

use crate::cli::utils::{configured_service, output_error, output_success};
use crate::cli::OutputFormat;
use crate::commission::{build_matrix, validate_matrix, CellKey, CommissionForm, MatrixError, ValidationOptions};
use crate::context::RequestContext;
use crate::services::ReconcileError;
use crate::types::{BoundType, Partner, PartnerStatus, RemitType, ServiceName};

pub async fn handle(form_file: &Path, partners: &[String], output_format: OutputFormat) -> anyhow::Result<()> {
    let body = tokio::fs::read_to_string(form_file)
        .await
        .with_context(|| format!("failed to read {}", form_file.display()))?;

    let form = CommissionForm::parse(url::form_urlencoded::parse(body.trim().as_bytes()))?;

    let result = if partners.is_empty() {
        // Check against the partner directory, as a submit would
        configured_service()?.check(&RequestContext::system(), &form).await
    } else {
        let config = crate::config::config();
        let options = ValidationOptions {
            strict_parsing: config.commission.strict_parsing,
            today: chrono::Utc::now().date_naive(),
        };
        let cells = cells_for(partners)?;
        validate_matrix(&cells, &form, &options).map_err(ReconcileError::from)
    };

    match result {
        Ok(plans) => {
            let data = json!({
                "plans": plans
                    .iter()
                    .map(|(cell, plan)| json!({ "cell": cell, "plan": plan }))
                    .collect::<Vec<_>>()
            });
            output_success(&output_format, &format!("{} channel plans valid", plans.len()), Some(data))
        }
        Err(ReconcileError::Validation(errors)) => {
            let details: Vec<String> = errors.0.iter().map(ToString::to_string).collect();
            output_error(&output_format, "Commission form is invalid", &details)?;
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

/// Cells of the named partners, in the same order a submit processes them
fn cells_for(codes: &[String]) -> Result<Vec<CellKey>, MatrixError> {
    let partners: Vec<Partner> = codes
        .iter()
        .map(|code| Partner {
            stype: code.trim().to_string(),
            name: code.trim().to_string(),
            status: PartnerStatus::Enabled,
            service_name: ServiceName::Remittance,
        })
        .collect();
    build_matrix(&RemitType::ALL, &BoundType::ALL, &partners)
}
