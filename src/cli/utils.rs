use serde_json::{json, Value};
use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let Some(data_value) = data {
                response["data"] = data_value;
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(
    output_format: &OutputFormat,
    message: &str,
    details: &[String],
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({
                "success": false,
                "error": message,
                "details": details,
            }))?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
            for detail in details {
                eprintln!("  - {}", detail);
            }
        }
    }
    Ok(())
}

/// Backends selected by the process configuration (BACKEND_MODE etc.)
pub fn configured_service() -> anyhow::Result<crate::services::CommissionService> {
    let config = crate::config::config();
    let backends = crate::services::Backends::from_config(&config.backend)?;
    Ok(crate::services::CommissionService::new(backends, config.commission.clone()))
}
