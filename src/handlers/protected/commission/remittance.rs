use axum::{
    extract::{Extension, Query, State},
    response::Redirect,
    Form,
};
use serde::Deserialize;

use super::redirect_to_page;
use crate::app::AppState;
use crate::commission::{CommissionForm, ReconcileReport};
use crate::context::RequestContext;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::CommissionPage;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub errmsg: Option<String>,
}

/// GET /commission/remittance - page model with any echoed error message
pub async fn get(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<PageQuery>,
) -> ApiResult<CommissionPage> {
    let page = state.service.page(&ctx, query.errmsg).await?;
    Ok(ApiResponse::success(page))
}

/// POST /commission/remittance - save the whole matrix, then redirect back
pub async fn post(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Redirect {
    match submit(&state, &ctx, pairs).await {
        Ok(report) if report.is_complete() => redirect_to_page(None),
        Ok(report) => {
            let msg = format!(
                "Failed to save commission for partner(s): {}",
                report.failed_partners().join(", ")
            );
            redirect_to_page(Some(&msg))
        }
        Err(e) => redirect_to_page(Some(e.message())),
    }
}

/// POST /api/commission/remittance - same submission, per-cell report as JSON
pub async fn api_post(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> ApiResult<ReconcileReport> {
    let report = submit(&state, &ctx, pairs).await?;
    Ok(ApiResponse::success(report))
}

async fn submit(
    state: &AppState,
    ctx: &RequestContext,
    pairs: Vec<(String, String)>,
) -> Result<ReconcileReport, ApiError> {
    let form = CommissionForm::parse(pairs)?;
    tracing::debug!("Commission form with {} cells from {}", form.len(), ctx.actor());
    Ok(state.service.submit(ctx, &form).await?)
}
