//! Integration tests for file and folder copies

mod common;

use ::common::prelude::*;

#[tokio::test]
async fn test_copy_preserves_content_not_identity() {
    let env = common::setup_test_env().await;
    env.mkdir("/backup").await;
    let original = env.upload("/", "report.txt", "quarterly numbers").await;

    let copy = env
        .tree
        .copy_file("/report.txt", "/backup", "", &env.admin)
        .await
        .unwrap();
    assert_eq!(copy.name, "report.txt");
    assert_eq!(copy.blob_id, original.blob_id);

    env.tree.remove_file("/report.txt", &env.admin).await.unwrap();

    let content = env
        .tree
        .file_content("/backup/report.txt")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(content, common::bytes("quarterly numbers"));
}

#[tokio::test]
async fn test_copy_file_name_collision() {
    let env = common::setup_test_env().await;
    env.upload("/", "a.txt", "one").await;

    let first = env
        .tree
        .copy_file("/a.txt", "/", "a.txt", &env.admin)
        .await
        .unwrap();
    let second = env
        .tree
        .copy_file("/a.txt", "/", "a.txt", &env.admin)
        .await
        .unwrap();

    assert_eq!(first.name, "a-copy.txt");
    assert_eq!(second.name, "a-copy-copy.txt");
    assert_eq!(
        env.names("/").await,
        vec!["a.txt", "a-copy.txt", "a-copy-copy.txt"]
    );
    // Nothing was overwritten
    assert_eq!(
        env.tree.file_content("/a.txt").await.unwrap().unwrap(),
        common::bytes("one")
    );
}

#[tokio::test]
async fn test_copy_file_errors() {
    let env = common::setup_test_env().await;
    env.upload("/", "a.txt", "one").await;

    let missing = env.tree.copy_file("/nope", "/", "x", &env.admin).await;
    assert!(matches!(missing, Err(Error::NotFound(_))));

    let bad_dest = env.tree.copy_file("/a.txt", "/nowhere", "", &env.admin).await;
    assert!(matches!(bad_dest, Err(Error::BadPath(_))));
}

#[tokio::test]
async fn test_copy_file_needs_read_on_source() {
    let env = common::setup_test_env().await;
    env.upload("/", "secret.txt", "shh").await;
    env.tree
        .set_rights("/secret.txt", &RightsEntity::All, Permission::None, &env.admin)
        .await
        .unwrap();

    let guest = common::user("guest@strata.test", &[]);
    let result = env.tree.copy_file("/secret.txt", "/", "mine.txt", &guest).await;
    assert!(matches!(result, Err(Error::AccessDenied(_))));
}

#[tokio::test]
async fn test_copy_folder_recursive() {
    let env = common::setup_test_env().await;
    env.mkdir("/src").await;
    env.mkdir("/src/nested").await;
    env.mkdir("/dest").await;
    env.upload("/src", "a.txt", "a").await;
    env.upload("/src/nested", "b.txt", "b").await;
    env.tree
        .set_rights("/src", &RightsEntity::All, Permission::Read, &env.admin)
        .await
        .unwrap();

    let copied = env
        .tree
        .copy_folder("/src", "/dest", "copy", &env.admin)
        .await
        .unwrap();
    assert_eq!(copied.path, "/dest/copy");
    assert_eq!(copied.folders, vec![ChildFolder { path: "/dest/copy/nested".to_string() }]);
    // Copies carry the source policy
    assert_eq!(copied.rights, Some(Rights::new(Permission::Read)));

    assert_eq!(env.child_paths("/dest").await, vec!["/dest/copy"]);
    assert_eq!(
        env.tree
            .file_content("/dest/copy/nested/b.txt")
            .await
            .unwrap()
            .unwrap(),
        common::bytes("b")
    );

    // Source and copy share blobs
    let source = env.tree.fetch_file("/src/a.txt").await.unwrap().unwrap();
    assert_eq!(env.store.links(source.blob_id), Some(2));
}

#[tokio::test]
async fn test_copy_folder_merges_into_existing() {
    let env = common::setup_test_env().await;
    env.mkdir("/src").await;
    env.mkdir("/dest").await;
    env.mkdir("/dest/src").await;
    env.upload("/src", "a.txt", "new").await;
    env.upload("/dest/src", "a.txt", "old").await;

    env.tree
        .copy_folder("/src", "/dest", "", &env.admin)
        .await
        .unwrap();

    assert_eq!(env.names("/dest/src").await, vec!["a.txt", "a-copy.txt"]);
    assert_eq!(
        env.tree
            .file_content("/dest/src/a-copy.txt")
            .await
            .unwrap()
            .unwrap(),
        common::bytes("new")
    );
}

#[tokio::test]
async fn test_copy_folder_into_itself() {
    let env = common::setup_test_env().await;
    env.mkdir("/a").await;
    env.mkdir("/a/b").await;

    let result = env.tree.copy_folder("/a", "/a/b", "", &env.admin).await;
    assert!(matches!(result, Err(Error::BadPath(_))));

    let result = env.tree.copy_folder("/a", "/", "a", &env.admin).await;
    assert!(matches!(result, Err(Error::BadPath(_))));

    // A sibling sharing a prefix is fine
    env.tree.copy_folder("/a", "/", "ab", &env.admin).await.unwrap();
    assert_eq!(env.child_paths("/ab").await, vec!["/ab/b"]);
}

#[tokio::test]
async fn test_copy_folder_needs_write_on_destination() {
    let env = common::setup_test_env().await;
    env.mkdir("/src").await;
    env.mkdir("/readonly").await;
    env.tree
        .set_rights("/readonly", &RightsEntity::All, Permission::Read, &env.admin)
        .await
        .unwrap();

    let guest = common::user("guest@strata.test", &[]);
    let result = env.tree.copy_folder("/src", "/readonly", "", &guest).await;
    assert!(matches!(result, Err(Error::AccessDenied(_))));
    assert!(env.child_paths("/readonly").await.is_empty());
}
