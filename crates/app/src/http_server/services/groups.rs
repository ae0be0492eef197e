use crate::http_server::error::ApiError;
use crate::http_server::registry::{Reply, ServiceCall};
use crate::ServiceState;

pub async fn new_group(state: ServiceState, call: ServiceCall) -> Result<Reply, ApiError> {
    let group = state
        .accounts()
        .new_group(call.actor()?, call.args.value("name"))
        .await?;
    Reply::json(&group)
}

/// Remove a group and drop it from every member
pub async fn remove_group(state: ServiceState, call: ServiceCall) -> Result<Reply, ApiError> {
    state
        .accounts()
        .remove_group(call.actor()?, call.args.value("name"))
        .await?;
    Ok(Reply::Success)
}

pub async fn add_user_to_group(state: ServiceState, call: ServiceCall) -> Result<Reply, ApiError> {
    state
        .accounts()
        .add_user_to_group(
            call.actor()?,
            call.args.value("user"),
            call.args.value("group"),
        )
        .await?;
    Ok(Reply::Success)
}

pub async fn remove_user_from_group(
    state: ServiceState,
    call: ServiceCall,
) -> Result<Reply, ApiError> {
    state
        .accounts()
        .remove_user_from_group(
            call.actor()?,
            call.args.value("user"),
            call.args.value("group"),
        )
        .await?;
    Ok(Reply::Success)
}

/// Make `user` an administrator of `group`
pub async fn set_group_admin(state: ServiceState, call: ServiceCall) -> Result<Reply, ApiError> {
    state
        .accounts()
        .set_group_admin(
            call.actor()?,
            call.args.value("group"),
            call.args.value("user"),
        )
        .await?;
    Ok(Reply::Success)
}
