use axum::response::{IntoResponse, Response};
use axum::Json;
use common::ErrorKind;
use http::StatusCode;

/// Everything a service call can fail with, rendered as `{"error": "..."}`
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] common::Error),

    #[error("unknown service: {0}")]
    UnknownService(String),

    #[error("wrong arguments")]
    WrongArguments,

    #[error("not logged in")]
    NotLoggedIn,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(err) => match err.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::AlreadyExists => StatusCode::CONFLICT,
                ErrorKind::AccessDenied => StatusCode::FORBIDDEN,
                ErrorKind::BadPath => StatusCode::BAD_REQUEST,
                ErrorKind::StoreFailure => StatusCode::INTERNAL_SERVER_ERROR,
                ErrorKind::InvalidCredentials | ErrorKind::SessionExpired => {
                    StatusCode::UNAUTHORIZED
                }
            },
            ApiError::UnknownService(_) => StatusCode::NOT_FOUND,
            ApiError::WrongArguments | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotLoggedIn => StatusCode::UNAUTHORIZED,
            ApiError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "service call failed");
            "server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use common::store::StoreError;

    use super::*;

    #[test]
    fn test_status_per_kind() {
        let cases = [
            (common::Error::NotFound("/a".into()), StatusCode::NOT_FOUND),
            (common::Error::AlreadyExists("/a".into()), StatusCode::CONFLICT),
            (common::Error::AccessDenied("/a".into()), StatusCode::FORBIDDEN),
            (common::Error::BadPath("/a".into()), StatusCode::BAD_REQUEST),
            (common::Error::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (common::Error::SessionExpired, StatusCode::UNAUTHORIZED),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_store_failures_are_not_leaked() {
        let err = ApiError::from(common::Error::Store(StoreError::Backend(anyhow::anyhow!(
            "disk on fire"
        ))));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
