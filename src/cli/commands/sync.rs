use crate::cli::utils::{configured_service, output_success};
use crate::cli::OutputFormat;
use crate::context::RequestContext;

/// Runs the sync in the foreground; the CLI has no request to detach from
pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let service = configured_service()?;
    service
        .backends()
        .sync
        .sync_remco_commission_config_for_remittance(&RequestContext::system())
        .await?;
    output_success(&output_format, "Remittance commission config synced", None)
}
