// Public handlers: service info and liveness

use axum::response::{IntoResponse, Json};
use serde_json::{json, Value};

pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Remco CMS",
            "version": version,
            "description": "Remittance partner commission portal",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "commission": "/commission/remittance (form page, redirects)",
                "commission_tier": "/commission/remittance/tier/:id/delete (form, redirects)",
                "api": "/api/commission/remittance, /api/commission/tier/:id, /api/commission/remittance/sync",
            }
        }
    }))
}

/// Liveness only; backends are not probed
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "data": {
            "status": "ok",
            "timestamp": chrono::Utc::now(),
        }
    }))
}
