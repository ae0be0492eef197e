use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Path, Request, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Extension, Json, Router};
use axum_extra::headers::{Cookie, HeaderMapExt};
use http::StatusCode;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tower_http::trace::{DefaultOnFailure, DefaultOnResponse};
use tower_http::LatencyUnit;

pub mod error;
mod health;
pub mod registry;
pub mod request;
pub mod services;

pub use error::ApiError;
pub use registry::{Registry, Reply, Service, ServiceCall};
pub use request::ServiceArgs;

use crate::ServiceState;

const STATUS_PREFIX: &str = "/_status";

/// Cookie carrying the session token
pub const SESSION_COOKIE: &str = "session";

/// Upper bound on a request body, uploads included
const MAX_BODY_BYTES: usize = 500 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    /// log level for http tracing
    pub log_level: tracing::Level,
}

/// Build the full router: one `POST /{service}` route over the service
///  table, plus the health checks.
pub fn router(state: ServiceState, log_level: tracing::Level) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .on_response(
            DefaultOnResponse::new()
                .include_headers(false)
                .level(log_level)
                .latency_unit(LatencyUnit::Micros),
        )
        .on_failure(DefaultOnFailure::new().latency_unit(LatencyUnit::Micros));

    let registry = Arc::new(services::registry());

    Router::new()
        .nest(STATUS_PREFIX, health::router())
        .route("/:service", post(dispatch))
        .fallback(not_found_handler)
        .layer(Extension(registry))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
        .layer(trace_layer)
}

pub async fn run(
    config: Config,
    state: ServiceState,
    mut shutdown_rx: watch::Receiver<()>,
) -> Result<(), HttpServerError> {
    let app = router(state, config.log_level);

    tracing::info!(addr = ?config.listen_addr, "HTTP server listening");
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await?;

    Ok(())
}

/// Look the service up, check its arguments, resolve the caller, run it
async fn dispatch(
    State(state): State<ServiceState>,
    Extension(registry): Extension<Arc<Registry>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    request: Request,
) -> Result<Response, ApiError> {
    let service = registry
        .get(&name)
        .ok_or_else(|| ApiError::UnknownService(name.clone()))?;

    let args = ServiceArgs::from_request(request, &state).await?;
    service.validate(&args)?;

    let token = session_token(&headers);
    let actor = if service.login_required {
        let token = token.as_deref().ok_or(ApiError::NotLoggedIn)?;
        Some(state.sessions().resolve(token).await?)
    } else {
        None
    };

    tracing::debug!(service = %name, actor = ?actor.as_ref().map(|u| &u.email), "dispatching");
    let call = ServiceCall { args, actor, token };
    let reply = (service.handler)(state, call).await?;
    Ok(reply.into_response())
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<Cookie>()
        .and_then(|cookie| cookie.get(SESSION_COOKIE).map(str::to_string))
        .filter(|token| !token.is_empty())
}

async fn not_found_handler() -> Response {
    let msg = serde_json::json!({"error": "not found"});
    (StatusCode::NOT_FOUND, Json(msg)).into_response()
}

#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    #[error("an error occurred running the HTTP server: {0}")]
    ServingFailed(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use http::header::COOKIE;
    use http::HeaderValue;

    use super::*;

    #[test]
    fn test_session_token_from_cookie() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);

        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; session=abc123"));
        assert_eq!(session_token(&headers), Some("abc123".to_string()));

        headers.insert(COOKIE, HeaderValue::from_static("session="));
        assert_eq!(session_token(&headers), None);
    }
}
