//! The explicit service table: every callable service by name, with the
//! fields it needs and whether it needs a logged-in caller.

use std::collections::HashMap;

use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use common::prelude::User;
use futures::future::BoxFuture;
use http::header::{CONTENT_TYPE, SET_COOKIE};
use http::StatusCode;

use super::error::ApiError;
use super::request::ServiceArgs;
use super::SESSION_COOKIE;
use crate::ServiceState;

/// What a handler is given
#[derive(Debug)]
pub struct ServiceCall {
    pub args: ServiceArgs,
    /// Resolved caller, always set for services that require login
    pub actor: Option<User>,
    /// Raw session token from the cookie, if any
    pub token: Option<String>,
}

impl ServiceCall {
    pub fn actor(&self) -> Result<&User, ApiError> {
        self.actor.as_ref().ok_or(ApiError::NotLoggedIn)
    }
}

/// What a handler answers with
#[derive(Debug)]
pub enum Reply {
    /// `{"success": "true"}`
    Success,
    Json(serde_json::Value),
    /// Raw file bytes
    Content(Bytes),
    /// Success, handing the client a new session token
    StartSession(String),
    /// Success, clearing the client's session cookie
    EndSession,
}

impl Reply {
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self, ApiError> {
        Ok(Reply::Json(serde_json::to_value(value)?))
    }
}

fn success() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "success": "true" }))
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self {
            Reply::Success => (StatusCode::OK, success()).into_response(),
            Reply::Json(value) => (StatusCode::OK, Json(value)).into_response(),
            Reply::Content(bytes) => (
                StatusCode::OK,
                [(CONTENT_TYPE, "application/octet-stream")],
                bytes,
            )
                .into_response(),
            Reply::StartSession(token) => {
                let cookie = format!(
                    "{}={}; HttpOnly; Path=/; SameSite=Strict",
                    SESSION_COOKIE, token
                );
                (StatusCode::OK, [(SET_COOKIE, cookie)], success()).into_response()
            }
            Reply::EndSession => {
                let cookie = format!("{}=; HttpOnly; Path=/; Max-Age=0", SESSION_COOKIE);
                (StatusCode::OK, [(SET_COOKIE, cookie)], success()).into_response()
            }
        }
    }
}

pub type Handler = fn(ServiceState, ServiceCall) -> BoxFuture<'static, Result<Reply, ApiError>>;

#[derive(Clone)]
pub struct Service {
    pub name: &'static str,
    pub handler: Handler,
    pub login_required: bool,
    /// Every one of these must be sent
    pub mandatory_fields: &'static [&'static str],
    /// At least one of these must be sent
    pub at_least_one_field: &'static [&'static str],
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("login_required", &self.login_required)
            .field("mandatory_fields", &self.mandatory_fields)
            .field("at_least_one_field", &self.at_least_one_field)
            .finish()
    }
}

impl Service {
    /// A service that requires login and no fields
    pub fn new(name: &'static str, handler: Handler) -> Self {
        Self {
            name,
            handler,
            login_required: true,
            mandatory_fields: &[],
            at_least_one_field: &[],
        }
    }

    pub fn without_login(mut self) -> Self {
        self.login_required = false;
        self
    }

    pub fn mandatory(mut self, fields: &'static [&'static str]) -> Self {
        self.mandatory_fields = fields;
        self
    }

    pub fn at_least_one(mut self, fields: &'static [&'static str]) -> Self {
        self.at_least_one_field = fields;
        self
    }

    pub fn validate(&self, args: &ServiceArgs) -> Result<(), ApiError> {
        if !self.mandatory_fields.iter().all(|f| args.has(f)) {
            return Err(ApiError::WrongArguments);
        }
        if !self.at_least_one_field.is_empty()
            && !self.at_least_one_field.iter().any(|f| args.has(f))
        {
            return Err(ApiError::WrongArguments);
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct Registry {
    services: HashMap<&'static str, Service>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service, replacing any earlier one of the same name
    pub fn register(&mut self, service: Service) -> &mut Self {
        if self.services.insert(service.name, service).is_some() {
            tracing::warn!("service registered twice");
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.services.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use futures::FutureExt;

    use super::*;

    async fn noop(_: ServiceState, _: ServiceCall) -> Result<Reply, ApiError> {
        Ok(Reply::Success)
    }

    fn service() -> Service {
        Service::new("Noop", |s, c| noop(s, c).boxed())
    }

    #[test]
    fn test_mandatory_fields() {
        let service = service().mandatory(&["path", "dest"]);
        assert!(service
            .validate(&[("path", "/a"), ("dest", "")].into_iter().collect())
            .is_ok());
        assert!(matches!(
            service.validate(&[("path", "/a")].into_iter().collect()),
            Err(ApiError::WrongArguments)
        ));
    }

    #[test]
    fn test_at_least_one_field() {
        let service = service().at_least_one(&["user", "group"]);
        assert!(service
            .validate(&[("group", "staff")].into_iter().collect())
            .is_ok());
        assert!(matches!(
            service.validate(&ServiceArgs::default()),
            Err(ApiError::WrongArguments)
        ));
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = Registry::new();
        registry.register(service()).register(service().without_login());
        assert_eq!(registry.names(), vec!["Noop"]);
        assert!(!registry.get("Noop").unwrap().login_required);
        assert!(registry.get("noop").is_none());
    }
}
