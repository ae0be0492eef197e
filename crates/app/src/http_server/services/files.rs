use common::path;
use tracing::info;

use crate::http_server::error::ApiError;
use crate::http_server::registry::{Reply, ServiceCall};
use crate::ServiceState;

/// Raw content of a file
pub async fn get_file(state: ServiceState, call: ServiceCall) -> Result<Reply, ApiError> {
    let path = path::format_dir(call.args.value("path"));
    let (_, content) = state.tree().read_file(&path, call.actor()?).await?;
    Ok(Reply::Content(content))
}

pub async fn remove_file(state: ServiceState, call: ServiceCall) -> Result<Reply, ApiError> {
    let path = path::format_dir(call.args.value("path"));
    let actor = call.actor()?;
    state.tree().remove_file(&path, actor).await?;
    info!(path = %path, by = %actor.email, "file removed");
    Ok(Reply::Success)
}

/// Copy the file at `path` into folder `dest`, named `name` or keeping its
///  own name. Collisions get a copy suffix.
pub async fn copy_file(state: ServiceState, call: ServiceCall) -> Result<Reply, ApiError> {
    let path = path::format_dir(call.args.value("path"));
    let dest = path::format_dir(call.args.value("dest"));
    let name = call.args.value("name");
    let actor = call.actor()?;

    let copy = state.tree().copy_file(&path, &dest, name, actor).await?;
    info!(from = %path, to = %path::join(&dest, &copy.name), by = %actor.email, "file copied");
    Reply::json(&copy)
}

/// Store every `file` part of a multipart body into folder `path`, all or
///  nothing. Answers with the stored files under their final names.
pub async fn upload(state: ServiceState, mut call: ServiceCall) -> Result<Reply, ApiError> {
    let dir = path::format_dir(call.args.value("path"));
    let files = call.args.take_files();
    let actor = call.actor()?;

    let count = files.len();
    let stored = state.tree().upload_bulk(&dir, files, actor).await?;
    info!(dir = %dir, count, by = %actor.email, "files uploaded");
    Reply::json(&stored)
}
