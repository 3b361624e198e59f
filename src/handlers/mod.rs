pub mod access_requests;
pub mod inquiries;
pub mod listings;
pub mod transactions;

use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use utoipa::ToSchema;

/// Uniform response body: `{ success, data?, message? }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: None,
        })
    }

    pub fn created(data: T) -> (StatusCode, Json<Self>) {
        (StatusCode::CREATED, Self::ok(data))
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            data: None,
            message: Some(message.into()),
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub db: String,
    pub db_pool: DbPoolStats,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DbPoolStats {
    pub active_connections: u32,
    pub idle_connections: u32,
    pub max_connections: u32,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthStatus),
        (status = 503, description = "Service is unhealthy", body = HealthStatus)
    ),
    tag = "Health"
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    // Check database connectivity with SELECT 1 query
    let connected = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();

    let pool = &state.db;
    let health = HealthStatus {
        status: if connected { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        db: if connected { "connected" } else { "disconnected" }.to_string(),
        db_pool: DbPoolStats {
            active_connections: pool.size(),
            idle_connections: pool.num_idle() as u32,
            max_connections: pool.options().get_max_connections(),
        },
    };

    let status_code = if connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(ApiResponse {
            success: connected,
            data: Some(health),
            message: None,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_omits_absent_parts() {
        let Json(body) = ApiResponse::ok(vec![1, 2]);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "data": [1, 2] }));

        let Json(body) = ApiResponse::message("Listing deleted");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "message": "Listing deleted" }));
    }
}
