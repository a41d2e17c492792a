pub mod auth;
pub mod inventory;

use axum::{http::StatusCode, Json};
use chrono::Utc;
use serde_json::{json, Value};

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "success",
        "message": "EasyKeep Inventory Management System API is running",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "status": "error",
            "message": "Route not found",
        })),
    )
}
