//! User Storage
//! Mission: Durable identity records behind a swappable store interface

use crate::auth::{
    error::StoreError,
    models::{Role, User},
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, types::Type, Connection, ErrorCode, OptionalExtension, Row};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Credential store consumed by the auth service.
///
/// Implementations must be safe to call concurrently. Transient backend
/// failures are reported as [`StoreError::Unavailable`]; rows that can never
/// be decoded as [`StoreError::Corrupt`].
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn create(&self, user: &User) -> Result<(), StoreError>;
    async fn update_password(&self, id: Uuid, digest: &str) -> Result<(), StoreError>;
    async fn update_role(&self, id: Uuid, role: Role) -> Result<(), StoreError>;
    async fn update_email(&self, id: Uuid, email: &str) -> Result<(), StoreError>;
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
    async fn list_all(&self) -> Result<Vec<User>, StoreError>;
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT UNIQUE NOT NULL,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

const SELECT_USER: &str = "SELECT id, email, password_hash, role, created_at FROM users";

/// User storage with SQLite backend
#[derive(Clone)]
pub struct SqliteUserStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserStore {
    /// Open (or create) the database file and initialize the schema
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).context("open auth db")?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        Self::with_connection(conn)
    }

    /// Private in-memory database, used by tests and ephemeral deployments
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory().context("open in-memory auth db")?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize users schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a statement on a blocking thread so SQLite I/O never stalls the runtime
    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task failed: {e}")))?
        .map_err(map_sqlite_error)
    }
}

fn map_sqlite_error(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            StoreError::Conflict
        }
        rusqlite::Error::FromSqlConversionFailure(..) | rusqlite::Error::InvalidColumnType(..) => {
            StoreError::Corrupt(err.to_string())
        }
        _ => StoreError::Unavailable(err.to_string()),
    }
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    let role: String = row.get(3)?;

    let id = Uuid::parse_str(&id)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
    // A stored role we do not recognize is corrupt data, not a privilege level.
    let role = Role::parse(&role).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Text,
            format!("unknown role '{role}'").into(),
        )
    })?;

    Ok(User {
        id,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        role,
        created_at: row.get(4)?,
    })
}

fn require_one(rows_affected: usize) -> rusqlite::Result<Result<(), StoreError>> {
    Ok(if rows_affected == 0 {
        Err(StoreError::NotFound)
    } else {
        Ok(())
    })
}

#[async_trait]
impl CredentialStore for SqliteUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = email.to_string();
        self.run(move |conn| {
            conn.query_row(
                &format!("{SELECT_USER} WHERE email = ?1"),
                params![email],
                row_to_user,
            )
            .optional()
        })
        .await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.run(move |conn| {
            conn.query_row(
                &format!("{SELECT_USER} WHERE id = ?1"),
                params![id.to_string()],
                row_to_user,
            )
            .optional()
        })
        .await
    }

    async fn create(&self, user: &User) -> Result<(), StoreError> {
        let user = user.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO users (id, email, password_hash, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user.id.to_string(),
                    user.email,
                    user.password_hash,
                    user.role.as_str(),
                    user.created_at,
                ],
            )?;
            info!(user_id = %user.id, role = %user.role, "Created user");
            Ok(())
        })
        .await
    }

    async fn update_password(&self, id: Uuid, digest: &str) -> Result<(), StoreError> {
        let digest = digest.to_string();
        self.run(move |conn| {
            require_one(conn.execute(
                "UPDATE users SET password_hash = ?1 WHERE id = ?2",
                params![digest, id.to_string()],
            )?)
        })
        .await?
    }

    async fn update_role(&self, id: Uuid, role: Role) -> Result<(), StoreError> {
        self.run(move |conn| {
            require_one(conn.execute(
                "UPDATE users SET role = ?1 WHERE id = ?2",
                params![role.as_str(), id.to_string()],
            )?)
        })
        .await?
    }

    async fn update_email(&self, id: Uuid, email: &str) -> Result<(), StoreError> {
        let email = email.to_string();
        self.run(move |conn| {
            require_one(conn.execute(
                "UPDATE users SET email = ?1 WHERE id = ?2",
                params![email, id.to_string()],
            )?)
        })
        .await?
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.run(move |conn| {
            require_one(conn.execute(
                "DELETE FROM users WHERE id = ?1",
                params![id.to_string()],
            )?)
        })
        .await?
    }

    async fn list_all(&self) -> Result<Vec<User>, StoreError> {
        self.run(|conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_USER} ORDER BY created_at, email"))?;
            let users = stmt
                .query_map([], row_to_user)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(users)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (SqliteUserStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let store = SqliteUserStore::new(db_path).unwrap();
        (store, temp_file)
    }

    fn user(email: &str, role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: "$2b$04$placeholder".to_string(),
            role,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn test_create_and_retrieve_user() {
        let (store, _temp) = create_test_store();
        let teacher = user("teacher1@example.com", Role::Teacher);
        store.create(&teacher).await.unwrap();

        let by_email = store
            .find_by_email("teacher1@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, teacher.id);
        assert_eq!(by_email.role, Role::Teacher);

        let by_id = store.find_by_id(teacher.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "teacher1@example.com");
    }

    #[tokio::test]
    async fn test_email_lookup_is_case_sensitive() {
        let store = SqliteUserStore::in_memory().unwrap();
        store.create(&user("Alice@example.com", Role::Student)).await.unwrap();

        assert!(store.find_by_email("alice@example.com").await.unwrap().is_none());
        assert!(store.find_by_email("Alice@example.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = SqliteUserStore::in_memory().unwrap();
        store.create(&user("dup@example.com", Role::Student)).await.unwrap();

        let err = store
            .create(&user("dup@example.com", Role::Teacher))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
    }

    #[tokio::test]
    async fn test_updates_and_missing_ids() {
        let store = SqliteUserStore::in_memory().unwrap();
        let student = user("student@example.com", Role::Student);
        store.create(&student).await.unwrap();

        store.update_password(student.id, "$2b$04$new").await.unwrap();
        store.update_role(student.id, Role::Teacher).await.unwrap();
        store.update_email(student.id, "renamed@example.com").await.unwrap();

        let updated = store.find_by_id(student.id).await.unwrap().unwrap();
        assert_eq!(updated.password_hash, "$2b$04$new");
        assert_eq!(updated.role, Role::Teacher);
        assert_eq!(updated.email, "renamed@example.com");

        let missing = Uuid::new_v4();
        assert!(matches!(
            store.update_password(missing, "x").await.unwrap_err(),
            StoreError::NotFound
        ));
        assert!(matches!(
            store.update_role(missing, Role::Admin).await.unwrap_err(),
            StoreError::NotFound
        ));
        assert!(matches!(
            store.delete(missing).await.unwrap_err(),
            StoreError::NotFound
        ));
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let store = SqliteUserStore::in_memory().unwrap();
        let a = user("a@example.com", Role::Admin);
        let b = user("b@example.com", Role::Student);
        store.create(&a).await.unwrap();
        store.create(&b).await.unwrap();

        assert_eq!(store.list_all().await.unwrap().len(), 2);

        store.delete(b.id).await.unwrap();
        let remaining = store.list_all().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].email, "a@example.com");
    }

    #[tokio::test]
    async fn test_unknown_stored_role_fails_closed() {
        let store = SqliteUserStore::in_memory().unwrap();
        {
            let conn = store.conn.lock();
            conn.execute(
                "INSERT INTO users (id, email, password_hash, role, created_at)
                 VALUES (?1, 'odd@example.com', 'x', 'superuser', '2025-01-01T00:00:00Z')",
                params![Uuid::new_v4().to_string()],
            )
            .unwrap();
        }

        let err = store.find_by_email("odd@example.com").await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
        assert!(matches!(
            store.list_all().await.unwrap_err(),
            StoreError::Corrupt(_)
        ));
    }
}
