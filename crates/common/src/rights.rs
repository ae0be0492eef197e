use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::accounts::User;

/// Permission level, totally ordered from `None` to `ChangeRights`.
///
/// On the wire a level is written with the short names `""`, `"r"`, `"rw"`
/// and `"rwa"`. Parsing also accepts `"w"` and the long names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Permission {
    #[default]
    None,
    Read,
    Write,
    ChangeRights,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::None => "",
            Permission::Read => "r",
            Permission::Write => "rw",
            Permission::ChangeRights => "rwa",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown permission level: {0:?}")]
pub struct ParsePermissionError(String);

impl FromStr for Permission {
    type Err = ParsePermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "none" => Ok(Permission::None),
            "r" | "read" => Ok(Permission::Read),
            "rw" | "w" | "write" => Ok(Permission::Write),
            "rwa" | "change_rights" => Ok(Permission::ChangeRights),
            other => Err(ParsePermissionError(other.to_string())),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::None => write!(f, "none"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A grant to a single named group or user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRight {
    pub name: String,
    pub rights: Permission,
}

/// Who a rights change applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RightsEntity {
    /// The default level for everyone
    All,
    Group(String),
    User(String),
}

impl RightsEntity {
    /// Pick the entity a rights change targets: a non-blank `user` wins,
    ///  then a non-blank `group`, else the `all` baseline.
    pub fn from_fields(user: Option<&str>, group: Option<&str>) -> Self {
        fn named(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|n| !n.is_empty())
        }
        match (named(user), named(group)) {
            (Some(user), _) => RightsEntity::User(user.to_string()),
            (None, Some(group)) => RightsEntity::Group(group.to_string()),
            (None, None) => RightsEntity::All,
        }
    }
}

/// Access-control policy attached to a folder or file.
///
/// A resource without a policy is fully open, see [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rights {
    pub all: Permission,
    #[serde(default)]
    pub groups: Vec<EntityRight>,
    #[serde(default)]
    pub users: Vec<EntityRight>,
}

impl Rights {
    pub fn new(all: Permission) -> Self {
        Self {
            all,
            ..Default::default()
        }
    }

    /// Apply a single change in place. Setting an entity that already has an
    ///  entry replaces its level; setting it to `None` drops the entry.
    pub fn apply(&mut self, entity: &RightsEntity, level: Permission) {
        let (entries, name) = match entity {
            RightsEntity::All => {
                self.all = level;
                return;
            }
            RightsEntity::Group(name) => (&mut self.groups, name),
            RightsEntity::User(name) => (&mut self.users, name),
        };

        if level == Permission::None {
            entries.retain(|e| &e.name != name);
            return;
        }
        match entries.iter_mut().find(|e| &e.name == name) {
            Some(entry) => entry.rights = level,
            None => entries.push(EntityRight {
                name: name.clone(),
                rights: level,
            }),
        }
    }

    /// The policy that results from applying a change to an optional policy.
    ///
    /// An absent policy resolves to `Write` for everyone, so granting a single
    ///  group or user starts from `all = Write` rather than closing the
    ///  resource to everybody else.
    pub fn applied(
        policy: Option<&Rights>,
        entity: &RightsEntity,
        level: Permission,
    ) -> Rights {
        let mut rights = policy
            .cloned()
            .unwrap_or_else(|| Rights::new(Permission::Write));
        rights.apply(entity, level);
        rights
    }
}

/// Resolve the permission level `actor` holds on a resource.
pub fn resolve(actor: &User, policy: Option<&Rights>) -> Permission {
    if actor.admin {
        return Permission::ChangeRights;
    }
    let Some(policy) = policy else {
        return Permission::Write;
    };

    let mut level = policy.all;
    if level == Permission::ChangeRights {
        return level;
    }

    for entry in policy.users.iter().filter(|e| e.name == actor.email) {
        if entry.rights == Permission::ChangeRights {
            return Permission::ChangeRights;
        }
        level = level.max(entry.rights);
    }

    for entry in &policy.groups {
        if actor.groups.iter().any(|g| g == &entry.name) {
            level = level.max(entry.rights);
        }
    }

    level
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: &str, groups: &[&str]) -> User {
        User {
            email: email.to_string(),
            password: String::new(),
            groups: groups.iter().map(|g| g.to_string()).collect(),
            admin: false,
            session: None,
        }
    }

    fn grant(name: &str, rights: Permission) -> EntityRight {
        EntityRight {
            name: name.to_string(),
            rights,
        }
    }

    #[test]
    fn test_resolve_mixed_policies() {
        let usr1 = user("user1", &["g1", "g2"]);
        let usr2 = user("user2", &[]);

        let r1 = Rights {
            all: Permission::Read,
            groups: vec![grant("g1", Permission::Write)],
            users: vec![grant("user2", Permission::Write)],
        };
        let r2 = Rights::new(Permission::ChangeRights);
        let r3 = Rights {
            all: Permission::Read,
            groups: vec![grant("g4", Permission::Write)],
            users: vec![grant("user3", Permission::ChangeRights)],
        };

        assert_eq!(resolve(&usr1, Some(&r1)), Permission::Write);
        assert_eq!(resolve(&usr1, Some(&r2)), Permission::ChangeRights);
        assert_eq!(resolve(&usr1, Some(&r3)), Permission::Read);
        assert_eq!(resolve(&usr2, Some(&r1)), Permission::Write);
    }

    #[test]
    fn test_resolve_precedence() {
        let actor = user("someone@example.com", &["staff"]);

        let group_grant = Rights {
            all: Permission::Read,
            groups: vec![grant("staff", Permission::Write)],
            users: vec![],
        };
        assert_eq!(resolve(&actor, Some(&group_grant)), Permission::Write);

        let open = Rights {
            all: Permission::ChangeRights,
            groups: vec![grant("staff", Permission::None)],
            users: vec![grant("someone@example.com", Permission::Read)],
        };
        assert_eq!(resolve(&actor, Some(&open)), Permission::ChangeRights);

        let closed = Rights::new(Permission::None);
        assert_eq!(resolve(&actor, Some(&closed)), Permission::None);

        assert_eq!(resolve(&actor, None), Permission::Write);
    }

    #[test]
    fn test_resolve_admin_and_user_short_circuit() {
        let mut admin = user("root@example.com", &[]);
        admin.admin = true;
        assert_eq!(
            resolve(&admin, Some(&Rights::new(Permission::None))),
            Permission::ChangeRights
        );

        let actor = user("owner@example.com", &[]);
        let owned = Rights {
            all: Permission::None,
            groups: vec![],
            users: vec![grant("owner@example.com", Permission::ChangeRights)],
        };
        assert_eq!(resolve(&actor, Some(&owned)), Permission::ChangeRights);
    }

    #[test]
    fn test_apply_replaces_in_place() {
        let mut rights = Rights::new(Permission::Read);
        let staff = RightsEntity::Group("staff".to_string());

        rights.apply(&staff, Permission::Write);
        rights.apply(&RightsEntity::Group("ops".to_string()), Permission::Read);
        rights.apply(&staff, Permission::ChangeRights);
        assert_eq!(
            rights.groups,
            vec![
                grant("staff", Permission::ChangeRights),
                grant("ops", Permission::Read)
            ]
        );

        rights.apply(&staff, Permission::None);
        assert_eq!(rights.groups, vec![grant("ops", Permission::Read)]);

        rights.apply(&RightsEntity::All, Permission::None);
        assert_eq!(rights.all, Permission::None);
    }

    #[test]
    fn test_applied_materializes_open_policy() {
        let entity = RightsEntity::User("a@example.com".to_string());
        let rights = Rights::applied(None, &entity, Permission::Read);
        assert_eq!(rights.all, Permission::Write);
        assert_eq!(rights.users, vec![grant("a@example.com", Permission::Read)]);

        let rights = Rights::applied(None, &RightsEntity::All, Permission::Read);
        assert_eq!(rights, Rights::new(Permission::Read));
    }

    #[test]
    fn test_permission_wire_names() {
        assert_eq!("rw".parse::<Permission>().unwrap(), Permission::Write);
        assert_eq!("w".parse::<Permission>().unwrap(), Permission::Write);
        assert_eq!("".parse::<Permission>().unwrap(), Permission::None);
        assert_eq!(
            "change_rights".parse::<Permission>().unwrap(),
            Permission::ChangeRights
        );
        assert!("x".parse::<Permission>().is_err());

        let json = serde_json::to_string(&Rights {
            all: Permission::Read,
            groups: vec![grant("miogo", Permission::Write)],
            users: vec![],
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"all":"r","groups":[{"name":"miogo","rights":"rw"}],"users":[]}"#
        );
        let back: Rights = serde_json::from_str(&json).unwrap();
        assert_eq!(back.groups[0].rights, Permission::Write);
    }

    #[test]
    fn test_entity_from_fields() {
        assert_eq!(RightsEntity::from_fields(None, None), RightsEntity::All);
        assert_eq!(
            RightsEntity::from_fields(Some("a@example.com"), Some("staff")),
            RightsEntity::User("a@example.com".to_string())
        );
        assert_eq!(
            RightsEntity::from_fields(Some("  "), Some(" staff ")),
            RightsEntity::Group("staff".to_string())
        );
        assert_eq!(RightsEntity::from_fields(Some(""), Some("")), RightsEntity::All);
    }
}
