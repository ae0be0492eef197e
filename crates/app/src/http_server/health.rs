use std::time::Duration;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use http::StatusCode;
use tokio::time::timeout;

use crate::ServiceState;

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

pub fn router() -> Router<ServiceState> {
    Router::new()
        .route("/livez", get(livez))
        .route("/readyz", get(readyz))
        .route("/version", get(version))
}

#[tracing::instrument]
pub async fn livez() -> Response {
    let msg = serde_json::json!({"status": "ok"});
    (StatusCode::OK, Json(msg)).into_response()
}

/// Ready once the store answers for the root folder
#[tracing::instrument(skip(state))]
pub async fn readyz(State(state): State<ServiceState>) -> Response {
    match timeout(HEALTH_CHECK_TIMEOUT, state.tree().fetch_folder("/")).await {
        Ok(Ok(Some(_))) => {
            let msg = serde_json::json!({"status": "ok"});
            (StatusCode::OK, Json(msg)).into_response()
        }
        Ok(Ok(None)) => {
            let msg = serde_json::json!({"status": "failure", "message": "root folder is missing"});
            (StatusCode::SERVICE_UNAVAILABLE, Json(msg)).into_response()
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "readiness check failed");
            let msg = serde_json::json!({"status": "failure", "message": "store is not available"});
            (StatusCode::SERVICE_UNAVAILABLE, Json(msg)).into_response()
        }
        Err(_) => {
            let msg = serde_json::json!({
                "status": "failure",
                "message": "health check timed out"
            });
            (StatusCode::SERVICE_UNAVAILABLE, Json(msg)).into_response()
        }
    }
}

#[tracing::instrument]
pub async fn version() -> Response {
    let msg = serde_json::json!({"version": env!("CARGO_PKG_VERSION")});
    (StatusCode::OK, Json(msg)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_livez_direct() {
        let response = livez().await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
