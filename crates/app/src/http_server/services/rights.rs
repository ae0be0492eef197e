use common::path;
use common::prelude::{Permission, RightsEntity};
use tracing::info;

use crate::http_server::error::ApiError;
use crate::http_server::registry::{Reply, ServiceCall};
use crate::ServiceState;

/// Set one entry of a resource's policy. The entry is `user` if sent, else
///  `group`, else the `all` baseline. Folders pass the change down to
///  everything beneath them.
pub async fn set_resource_rights(
    state: ServiceState,
    call: ServiceCall,
) -> Result<Reply, ApiError> {
    let resource = path::format_dir(call.args.value("resource"));
    let level: Permission = call
        .args
        .value("rights")
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("{}", e)))?;
    let entity = entity(&call);
    let actor = call.actor()?;

    state
        .tree()
        .set_rights(&resource, &entity, level, actor)
        .await?;
    info!(resource = %resource, ?entity, %level, by = %actor.email, "rights set");
    Ok(Reply::Success)
}

fn entity(call: &ServiceCall) -> RightsEntity {
    RightsEntity::from_fields(call.args.get("user"), call.args.get("group"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_server::request::ServiceArgs;

    fn call(args: ServiceArgs) -> ServiceCall {
        ServiceCall {
            args,
            actor: None,
            token: None,
        }
    }

    #[test]
    fn test_entity_precedence() {
        let both = call(
            [("user", "a@strata.test"), ("group", "staff")]
                .into_iter()
                .collect(),
        );
        assert_eq!(
            entity(&both),
            RightsEntity::User("a@strata.test".to_string())
        );

        let blank_user = call([("user", " "), ("group", "staff")].into_iter().collect());
        assert_eq!(entity(&blank_user), RightsEntity::Group("staff".to_string()));

        assert_eq!(entity(&call(ServiceArgs::default())), RightsEntity::All);
    }
}
