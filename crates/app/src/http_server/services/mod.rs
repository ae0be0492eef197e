//! Every registered service. Field names follow the form keys clients send.

use futures::FutureExt;

use super::registry::{Registry, Service};

pub mod files;
pub mod folders;
pub mod groups;
pub mod rights;
pub mod users;

/// Build the service table
pub fn registry() -> Registry {
    let mut registry = Registry::new();
    registry
        // folders
        .register(
            Service::new("GetFolder", |s, c| folders::get_folder(s, c).boxed()).mandatory(&["path"]),
        )
        .register(
            Service::new("NewFolder", |s, c| folders::new_folder(s, c).boxed()).mandatory(&["path"]),
        )
        .register(
            Service::new("RemoveFolder", |s, c| folders::remove_folder(s, c).boxed())
                .mandatory(&["path"]),
        )
        .register(
            Service::new("CopyFolder", |s, c| folders::copy_folder(s, c).boxed())
                .mandatory(&["path", "dest"]),
        )
        // files
        .register(Service::new("GetFile", |s, c| files::get_file(s, c).boxed()).mandatory(&["path"]))
        .register(
            Service::new("RemoveFile", |s, c| files::remove_file(s, c).boxed()).mandatory(&["path"]),
        )
        .register(
            Service::new("CopyFile", |s, c| files::copy_file(s, c).boxed())
                .mandatory(&["path", "dest"]),
        )
        .register(
            Service::new("Upload", |s, c| files::upload(s, c).boxed()).mandatory(&["path", "file"]),
        )
        // rights
        .register(
            Service::new("SetResourceRights", |s, c| {
                rights::set_resource_rights(s, c).boxed()
            })
            .mandatory(&["resource", "rights"]),
        )
        // users
        .register(
            Service::new("Login", |s, c| users::login(s, c).boxed())
                .without_login()
                .mandatory(&["email", "password"]),
        )
        .register(Service::new("Logout", |s, c| users::logout(s, c).boxed()))
        .register(
            Service::new("NewUser", |s, c| users::new_user(s, c).boxed())
                .mandatory(&["email", "password"]),
        )
        .register(
            Service::new("RemoveUser", |s, c| users::remove_user(s, c).boxed())
                .mandatory(&["email"]),
        )
        // groups
        .register(
            Service::new("NewGroup", |s, c| groups::new_group(s, c).boxed()).mandatory(&["name"]),
        )
        .register(
            Service::new("RemoveGroup", |s, c| groups::remove_group(s, c).boxed())
                .mandatory(&["name"]),
        )
        .register(
            Service::new("AddUserToGroup", |s, c| groups::add_user_to_group(s, c).boxed())
                .mandatory(&["user", "group"]),
        )
        .register(
            Service::new("RemoveUserFromGroup", |s, c| {
                groups::remove_user_from_group(s, c).boxed()
            })
            .mandatory(&["user", "group"]),
        )
        .register(
            Service::new("SetGroupAdmin", |s, c| groups::set_group_admin(s, c).boxed())
                .mandatory(&["user", "group"]),
        );
    registry
}
