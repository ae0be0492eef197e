//! Runs the resource tree, accounts and sessions on top of the SQL store

use std::sync::Arc;

use bytes::Bytes;
use common::prelude::*;
use common::store::DynAccountStore;
use strata_object_store::SqlStore;

async fn setup() -> (SqlStore, ResourceTree, SessionDirectory, User) {
    let store = SqlStore::new_ephemeral().await.unwrap();
    let tree_store: DynTreeStore = Arc::new(store.clone());
    let blob_store: DynBlobStore = Arc::new(store.clone());
    let account_store: DynAccountStore = Arc::new(store.clone());

    let tree = ResourceTree::new(tree_store, blob_store, TreeConfig::default());
    tree.ensure_root().await.unwrap();

    let hasher: Arc<dyn PasswordHasher> = Arc::new(Argon2Hasher::with_cost(8, 1).unwrap());
    let accounts = Accounts::new(account_store, hasher, CacheConfig::default());
    accounts
        .ensure_admin("admin@strata.test", "admin")
        .await
        .unwrap();
    let admin = accounts
        .fetch_user("admin@strata.test")
        .await
        .unwrap()
        .unwrap();

    let sessions = SessionDirectory::new(accounts, SessionConfig::default());
    (store, tree, sessions, admin)
}

#[tokio::test]
async fn test_copy_shares_blob_until_last_removal() {
    let (store, tree, _, admin) = setup().await;
    tree.new_folder("/docs", &admin).await.unwrap();
    let file = tree
        .upload("/docs", "a.txt", Bytes::from_static(b"hello"), &admin)
        .await
        .unwrap();

    tree.copy_file("/docs/a.txt", "/docs", "", &admin)
        .await
        .unwrap();
    let names: Vec<String> = tree
        .fetch_folder("/docs")
        .await
        .unwrap()
        .unwrap()
        .files
        .into_iter()
        .map(|f| f.name)
        .collect();
    assert_eq!(names, vec!["a.txt", "a-copy.txt"]);

    tree.remove_file("/docs/a.txt", &admin).await.unwrap();
    assert_eq!(
        tree.file_content("/docs/a-copy.txt").await.unwrap().unwrap(),
        Bytes::from_static(b"hello")
    );

    tree.remove_folder("/docs", &admin).await.unwrap();
    assert!(store.read(file.blob_id).await.unwrap().is_none());
    assert!(tree.fetch_folder("/docs").await.unwrap().is_none());
}

#[tokio::test]
async fn test_rights_propagate_through_sql_rows() {
    let (_, tree, _, admin) = setup().await;
    tree.new_folder("/team", &admin).await.unwrap();
    tree.new_folder("/team/sub", &admin).await.unwrap();
    tree.upload("/team/sub", "plan.txt", Bytes::from_static(b"x"), &admin)
        .await
        .unwrap();

    tree.set_rights("/team", &RightsEntity::All, Permission::None, &admin)
        .await
        .unwrap();

    let guest = User::new("guest@strata.test", "");
    assert!(matches!(
        tree.read_file("/team/sub/plan.txt", &guest).await,
        Err(Error::AccessDenied(_))
    ));
}

#[tokio::test]
async fn test_session_round_trip() {
    let (_, _, sessions, admin) = setup().await;
    let token = sessions.login("admin@strata.test", "admin").await.unwrap();
    let user = sessions.resolve(&token).await.unwrap();
    assert_eq!(user.email, admin.email);

    sessions.logout(&token, &user).await.unwrap();
    assert!(matches!(
        sessions.resolve(&token).await,
        Err(Error::SessionExpired)
    ));
}
