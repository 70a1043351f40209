use axum::{
    extract::{Extension, Path, State},
    response::Redirect,
};
use serde_json::{json, Value};

use super::redirect_to_page;
use crate::app::AppState;
use crate::context::RequestContext;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

/// POST /commission/remittance/tier/:id/delete
pub async fn delete_form(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> Redirect {
    match state.service.delete_tier(&ctx, &id).await {
        Ok(()) => redirect_to_page(None),
        Err(e) => redirect_to_page(Some(ApiError::from(e).message())),
    }
}

/// DELETE /api/commission/tier/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    state.service.delete_tier(&ctx, &id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}
