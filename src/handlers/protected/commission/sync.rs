use axum::extract::{Extension, State};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::context::RequestContext;
use crate::middleware::ApiResponse;

/// POST /api/commission/remittance/sync - schedule a sync and return at once
pub async fn post(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResponse<Value> {
    // Handle dropped; the task runs to completion on its own
    let _ = state.service.trigger_sync(&ctx);
    ApiResponse::accepted(json!({ "sync": "scheduled", "request_id": ctx.request_id }))
}
