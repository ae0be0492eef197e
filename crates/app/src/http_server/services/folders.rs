use common::path;
use tracing::info;

use crate::http_server::error::ApiError;
use crate::http_server::registry::{Reply, ServiceCall};
use crate::ServiceState;

/// List a folder: its files, its direct child folders and its rights
pub async fn get_folder(state: ServiceState, call: ServiceCall) -> Result<Reply, ApiError> {
    let path = path::format_dir(call.args.value("path"));
    let folder = state.tree().open_folder(&path, call.actor()?).await?;
    Reply::json(&folder)
}

pub async fn new_folder(state: ServiceState, call: ServiceCall) -> Result<Reply, ApiError> {
    let path = path::format_dir(call.args.value("path"));
    let actor = call.actor()?;
    state.tree().new_folder(&path, actor).await?;
    info!(path = %path, by = %actor.email, "folder created");
    Ok(Reply::Success)
}

pub async fn remove_folder(state: ServiceState, call: ServiceCall) -> Result<Reply, ApiError> {
    let path = path::format_dir(call.args.value("path"));
    let actor = call.actor()?;
    state.tree().remove_folder(&path, actor).await?;
    info!(path = %path, by = %actor.email, "folder removed");
    Ok(Reply::Success)
}

/// Copy `path` under `dest`, named `name` or keeping its own name
pub async fn copy_folder(state: ServiceState, call: ServiceCall) -> Result<Reply, ApiError> {
    let path = path::format_dir(call.args.value("path"));
    let dest = path::format_dir(call.args.value("dest"));
    let name = call.args.value("name");
    let actor = call.actor()?;

    let copy = state.tree().copy_folder(&path, &dest, name, actor).await?;
    info!(from = %path, to = %copy.path, by = %actor.email, "folder copied");
    Reply::json(&copy)
}
