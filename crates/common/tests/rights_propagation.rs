//! Integration tests for rights changes and their propagation

mod common;

use ::common::prelude::*;
use ::common::rights::resolve;

#[tokio::test]
async fn test_set_all_none_propagates() {
    let env = common::setup_test_env().await;
    env.mkdir("/docs").await;
    env.mkdir("/docs/sub").await;
    env.upload("/docs", "a.txt", "a").await;
    env.upload("/docs/sub", "b.txt", "b").await;
    env.upload("/docs/sub", "c.txt", "c").await;

    // Warm the caches so propagation has something to invalidate
    env.tree.fetch_folder("/docs/sub").await.unwrap();
    env.tree.fetch_file("/docs/sub/b.txt").await.unwrap();

    env.tree
        .set_rights("/docs", &RightsEntity::All, Permission::None, &env.admin)
        .await
        .unwrap();

    let actor = common::user("someone@strata.test", &[]);
    let folder = env.tree.fetch_folder("/docs").await.unwrap().unwrap();
    assert_eq!(resolve(&actor, folder.rights.as_ref()), Permission::None);

    for path in ["/docs/a.txt", "/docs/sub/b.txt", "/docs/sub/c.txt"] {
        let file = env.tree.fetch_file(path).await.unwrap().unwrap();
        assert_eq!(
            resolve(&actor, file.rights.as_ref()),
            Permission::None,
            "{path}"
        );
    }
    let sub = env.tree.fetch_folder("/docs/sub").await.unwrap().unwrap();
    assert_eq!(resolve(&actor, sub.rights.as_ref()), Permission::None);
}

#[tokio::test]
async fn test_set_rights_requires_change_rights() {
    let env = common::setup_test_env().await;
    env.mkdir("/docs").await;

    // An open folder resolves to Write, which is not enough
    let actor = common::user("someone@strata.test", &[]);
    let result = env
        .tree
        .set_rights("/docs", &RightsEntity::All, Permission::Read, &actor)
        .await;
    assert!(matches!(result, Err(Error::AccessDenied(_))));

    // A user-level ChangeRights grant is
    env.tree
        .set_rights(
            "/docs",
            &RightsEntity::User(actor.email.clone()),
            Permission::ChangeRights,
            &env.admin,
        )
        .await
        .unwrap();
    env.tree
        .set_rights("/docs", &RightsEntity::All, Permission::Read, &actor)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_group_grant_keeps_resource_open() {
    let env = common::setup_test_env().await;
    env.upload("/", "shared.txt", "x").await;

    env.tree
        .set_rights(
            "/shared.txt",
            &RightsEntity::Group("staff".to_string()),
            Permission::ChangeRights,
            &env.admin,
        )
        .await
        .unwrap();

    let outsider = common::user("outsider@strata.test", &[]);
    let staff = common::user("staff@strata.test", &["staff"]);
    let file = env.tree.fetch_file("/shared.txt").await.unwrap().unwrap();
    assert_eq!(resolve(&outsider, file.rights.as_ref()), Permission::Write);
    assert_eq!(resolve(&staff, file.rights.as_ref()), Permission::ChangeRights);
}

#[tokio::test]
async fn test_file_rights_invalidate_folder_view() {
    let env = common::setup_test_env().await;
    env.mkdir("/docs").await;
    env.upload("/docs", "a.txt", "a").await;

    let before = env.tree.fetch_folder("/docs").await.unwrap().unwrap();
    assert_eq!(before.files[0].rights, None);

    env.tree
        .set_rights("/docs/a.txt", &RightsEntity::All, Permission::Read, &env.admin)
        .await
        .unwrap();

    assert!(!env.tree.is_folder_cached("/docs"));
    let after = env.tree.fetch_folder("/docs").await.unwrap().unwrap();
    assert_eq!(after.files[0].rights, Some(Rights::new(Permission::Read)));
    // The folder itself is untouched
    assert_eq!(after.rights, None);
}

#[tokio::test]
async fn test_set_rights_on_missing_resource() {
    let env = common::setup_test_env().await;
    let result = env
        .tree
        .set_rights("/ghost", &RightsEntity::All, Permission::Read, &env.admin)
        .await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_access_checks_follow_rights() {
    let env = common::setup_test_env().await;
    env.mkdir("/team").await;
    env.upload("/team", "plan.txt", "plan").await;
    env.tree
        .set_rights("/team", &RightsEntity::All, Permission::None, &env.admin)
        .await
        .unwrap();
    env.tree
        .set_rights(
            "/team",
            &RightsEntity::Group("team".to_string()),
            Permission::Read,
            &env.admin,
        )
        .await
        .unwrap();

    let member = common::user("member@strata.test", &["team"]);
    let outsider = common::user("outsider@strata.test", &[]);

    env.tree.open_folder("/team", &member).await.unwrap();
    let (_, content) = env.tree.read_file("/team/plan.txt", &member).await.unwrap();
    assert_eq!(content, common::bytes("plan"));

    assert!(matches!(
        env.tree.open_folder("/team", &outsider).await,
        Err(Error::AccessDenied(_))
    ));
    assert!(matches!(
        env.tree.read_file("/team/plan.txt", &outsider).await,
        Err(Error::AccessDenied(_))
    ));
    // Read is not enough to write
    assert!(matches!(
        env.tree
            .upload("/team", "new.txt", common::bytes("x"), &member)
            .await,
        Err(Error::AccessDenied(_))
    ));
}
