//! SQLite database for tree, account and blob metadata.

use std::path::Path;

use common::accounts::{Group, Session, User};
use common::path;
use common::rights::Rights;
use common::store::{BlobId, FolderRecord};
use common::tree::File;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow},
    Row,
};

use crate::error::{Result, SqlStoreError};

/// SQLite database connection pool.
#[derive(Debug, Clone)]
pub(crate) struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection from a file path.
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Create an in-memory database.
    ///
    /// Every connection would get its own empty database, so the pool is
    ///  held to a single one.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // Folders and files

    pub async fn get_folder(&self, path: &str) -> Result<Option<FolderRecord>> {
        let row = sqlx::query(
            r#"
            SELECT path, rights FROM folders WHERE path = ?
            "#,
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let rights = decode_rights(row.get("rights"))?;
        let files = self.list_files(path).await?;
        Ok(Some(FolderRecord {
            path: row.get("path"),
            files,
            rights,
        }))
    }

    pub async fn list_files(&self, folder: &str) -> Result<Vec<File>> {
        let rows = sqlx::query(
            r#"
            SELECT name, blob_id, rights FROM files
            WHERE folder = ?
            ORDER BY id
            "#,
        )
        .bind(folder)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(file_from_row).collect()
    }

    pub async fn child_folders(&self, path: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT path FROM folders WHERE parent = ?
            ORDER BY path
            "#,
        )
        .bind(path)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|r| r.get("path")).collect())
    }

    pub async fn insert_folder(&self, path: &str, rights: Option<&Rights>) -> Result<()> {
        // The root has no parent
        let parent = (path != path::ROOT).then(|| path::parent_dir(path));
        sqlx::query(
            r#"
            INSERT INTO folders (path, parent, rights) VALUES (?, ?, ?)
            "#,
        )
        .bind(path)
        .bind(parent)
        .bind(encode_rights(rights)?)
        .execute(&self.pool)
        .await
        .map_err(|e| SqlStoreError::on_unique(e, || format!("folder {}", path)))?;
        Ok(())
    }

    /// Delete a folder and the file rows it holds in one transaction.
    pub async fn delete_folder(&self, path: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM files WHERE folder = ?")
            .bind(path)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM folders WHERE path = ?")
            .bind(path)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_file(&self, folder: &str, name: &str) -> Result<Option<File>> {
        let row = sqlx::query(
            r#"
            SELECT name, blob_id, rights FROM files
            WHERE folder = ? AND name = ?
            "#,
        )
        .bind(folder)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(file_from_row).transpose()
    }

    /// Insert a batch of files. Nothing is written unless every row goes in.
    pub async fn insert_files(&self, folder: &str, files: &[File]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query("SELECT 1 FROM folders WHERE path = ?")
            .bind(folder)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(SqlStoreError::Conflict(format!(
                "folder {} does not exist",
                folder
            )));
        }

        for file in files {
            sqlx::query(
                r#"
                INSERT INTO files (folder, name, blob_id, rights) VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(folder)
            .bind(&file.name)
            .bind(file.blob_id.to_string())
            .bind(encode_rights(file.rights.as_ref())?)
            .execute(&mut *tx)
            .await
            .map_err(|e| SqlStoreError::on_unique(e, || path::join(folder, &file.name)))?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn delete_file(&self, folder: &str, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM files WHERE folder = ? AND name = ?")
            .bind(folder)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_folder_rights(&self, path: &str, rights: Option<&Rights>) -> Result<()> {
        sqlx::query("UPDATE folders SET rights = ? WHERE path = ?")
            .bind(encode_rights(rights)?)
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_file_rights(
        &self,
        folder: &str,
        name: &str,
        rights: Option<&Rights>,
    ) -> Result<()> {
        sqlx::query("UPDATE files SET rights = ? WHERE folder = ? AND name = ?")
            .bind(encode_rights(rights)?)
            .bind(folder)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // Users and groups

    pub async fn get_user(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT email, password, admin, session_hash, session_expiration
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.user_from_row(&row).await?)),
            None => Ok(None),
        }
    }

    pub async fn get_user_by_session(&self, hash: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT email, password, admin, session_hash, session_expiration
            FROM users
            WHERE session_hash = ?
            "#,
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.user_from_row(&row).await?)),
            None => Ok(None),
        }
    }

    async fn user_from_row(&self, row: &SqliteRow) -> Result<User> {
        let email: String = row.get("email");
        let hash: Option<String> = row.get("session_hash");
        let expiration: Option<i64> = row.get("session_expiration");
        let groups = self.user_groups(&email).await?;

        Ok(User {
            password: row.get("password"),
            groups,
            admin: row.get::<i32, _>("admin") != 0,
            session: hash
                .zip(expiration)
                .map(|(hash, expiration)| Session { hash, expiration }),
            email,
        })
    }

    async fn user_groups(&self, email: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT group_id FROM access_group_members
            WHERE email = ?
            ORDER BY rowid
            "#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|r| r.get("group_id")).collect())
    }

    pub async fn insert_user(&self, user: &User) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO users (email, password, admin, session_hash, session_expiration)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.email)
        .bind(&user.password)
        .bind(user.admin as i32)
        .bind(user.session.as_ref().map(|s| s.hash.as_str()))
        .bind(user.session.as_ref().map(|s| s.expiration))
        .execute(&mut *tx)
        .await
        .map_err(|e| SqlStoreError::on_unique(e, || format!("user {}", user.email)))?;

        for group in &user.groups {
            sqlx::query("INSERT OR IGNORE INTO access_group_members (email, group_id) VALUES (?, ?)")
                .bind(&user.email)
                .bind(group)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Delete a user with its memberships and admin grants.
    pub async fn delete_user(&self, email: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM access_group_members WHERE email = ?")
            .bind(email)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM access_group_admins WHERE email = ?")
            .bind(email)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM users WHERE email = ?")
            .bind(email)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn set_session(&self, email: &str, session: Option<&Session>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users SET session_hash = ?, session_expiration = ?
            WHERE email = ?
            "#,
        )
        .bind(session.map(|s| s.hash.as_str()))
        .bind(session.map(|s| s.expiration))
        .bind(email)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Add a membership. A missing user is a no-op.
    pub async fn add_membership(&self, email: &str, group: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO access_group_members (email, group_id)
            SELECT email, ? FROM users WHERE email = ?
            "#,
        )
        .bind(group)
        .bind(email)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove_membership(&self, email: &str, group: &str) -> Result<()> {
        sqlx::query("DELETE FROM access_group_members WHERE email = ? AND group_id = ?")
            .bind(email)
            .bind(group)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn group_members(&self, group: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT email FROM access_group_members
            WHERE group_id = ?
            ORDER BY email
            "#,
        )
        .bind(group)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|r| r.get("email")).collect())
    }

    pub async fn get_group(&self, id: &str) -> Result<Option<Group>> {
        let row = sqlx::query("SELECT id FROM access_groups WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        if row.is_none() {
            return Ok(None);
        }

        let rows = sqlx::query(
            r#"
            SELECT email FROM access_group_admins
            WHERE group_id = ?
            ORDER BY rowid
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(Group {
            id: id.to_string(),
            admins: rows.iter().map(|r| r.get("email")).collect(),
        }))
    }

    pub async fn insert_group(&self, group: &Group) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO access_groups (id) VALUES (?)")
            .bind(&group.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| SqlStoreError::on_unique(e, || format!("group {}", group.id)))?;

        for admin in &group.admins {
            sqlx::query("INSERT OR IGNORE INTO access_group_admins (group_id, email) VALUES (?, ?)")
                .bind(&group.id)
                .bind(admin)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Delete a group with its memberships and admin grants.
    pub async fn delete_group(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM access_group_members WHERE group_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM access_group_admins WHERE group_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM access_groups WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Grant group admin. A missing group is a no-op.
    pub async fn add_group_admin(&self, id: &str, email: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO access_group_admins (group_id, email)
            SELECT id, ? FROM access_groups WHERE id = ?
            "#,
        )
        .bind(email)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn has_admin(&self) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM users WHERE admin = 1 LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    // Blobs

    pub async fn insert_blob(&self, id: BlobId, name: &str, size: i64) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO blobs (id, name, size, links, created_at)
            VALUES (?, ?, ?, 1, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(name)
        .bind(size)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn has_blob(&self, id: BlobId) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM blobs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn delete_blob(&self, id: BlobId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM blobs WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Add one to the link count and return the new count, `None` if the
    ///  blob has no row.
    pub async fn link_blob(&self, id: BlobId) -> Result<Option<i64>> {
        let row = sqlx::query(
            r#"
            UPDATE blobs SET links = links + 1
            WHERE id = ?
            RETURNING links
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.get("links")))
    }

    /// Take one from the link count, never going below zero.
    pub async fn unlink_blob(&self, id: BlobId) -> Result<Option<i64>> {
        let row = sqlx::query(
            r#"
            UPDATE blobs SET links = MAX(links - 1, 0)
            WHERE id = ?
            RETURNING links
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.get("links")))
    }
}

#[cfg(test)]
impl Database {
    pub async fn count_blobs(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM blobs")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("count"))
    }
}

fn file_from_row(row: &SqliteRow) -> Result<File> {
    let blob_id: String = row.get("blob_id");
    Ok(File {
        name: row.get("name"),
        blob_id: blob_id
            .parse()
            .map_err(|_| SqlStoreError::InvalidBlobId(blob_id.clone()))?,
        rights: decode_rights(row.get("rights"))?,
    })
}

fn encode_rights(rights: Option<&Rights>) -> Result<Option<String>> {
    Ok(rights.map(serde_json::to_string).transpose()?)
}

fn decode_rights(column: Option<String>) -> Result<Option<Rights>> {
    Ok(column.as_deref().map(serde_json::from_str).transpose()?)
}
