use tracing::info;

use crate::http_server::error::ApiError;
use crate::http_server::registry::{Reply, ServiceCall};
use crate::ServiceState;

/// Check credentials and hand back a session cookie
pub async fn login(state: ServiceState, call: ServiceCall) -> Result<Reply, ApiError> {
    let email = call.args.value("email");
    let token = state
        .sessions()
        .login(email, call.args.value("password"))
        .await?;
    info!(email = %email, "logged in");
    Ok(Reply::StartSession(token))
}

pub async fn logout(state: ServiceState, call: ServiceCall) -> Result<Reply, ApiError> {
    let actor = call.actor()?;
    let token = call.token.as_deref().ok_or(ApiError::NotLoggedIn)?;
    state.sessions().logout(token, actor).await?;
    info!(email = %actor.email, "logged out");
    Ok(Reply::EndSession)
}

pub async fn new_user(state: ServiceState, call: ServiceCall) -> Result<Reply, ApiError> {
    let user = state
        .accounts()
        .new_user(
            call.actor()?,
            call.args.value("email"),
            call.args.value("password"),
        )
        .await?;
    Reply::json(&user)
}

pub async fn remove_user(state: ServiceState, call: ServiceCall) -> Result<Reply, ApiError> {
    state
        .accounts()
        .remove_user(call.actor()?, call.args.value("email"))
        .await?;
    Ok(Reply::Success)
}
