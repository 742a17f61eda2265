//! A `DocumentStore` persisted in a local SQLite file.
//!
//! Documents live in one `documents` table keyed by `(collection, id)` with the JSON body in a
//! text column. The pool holds a single connection, so commits are serialized by the pool itself.
//! Queries load a collection and filter it with `Query::matches`, the same predicate the memory
//! store uses.

use crate::error::Res;
use crate::store::listeners::Listeners;
use crate::store::{
    apply_write, check_precondition, migrations, Commit, DocPath, Document, DocumentStore,
    Fields, Listener, ListenerId, Operation, Query, StoreError, StoreEvent, StoreResult, Write,
};
use anyhow::{bail, Context};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, trace};

pub struct SqliteStore {
    pool: SqlitePool,
    listeners: Listeners,
    // Held while computing and pushing post-commit snapshots so the last snapshot a listener
    // receives is always the newest one.
    fanout: tokio::sync::Mutex<()>,
}

impl SqliteStore {
    /// Creates a new database file at `path` with the current schema. Fails if a file exists.
    pub async fn init(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        if path.exists() {
            bail!("A database already exists at '{}'", path.display());
        }
        let pool = connect(path, true).await?;
        let version = migrations::bootstrap(&pool).await?;
        migrations::run(&pool, version, migrations::CURRENT_VERSION).await?;
        debug!("Initialized document store at {}", path.display());
        Ok(Self::from_pool(pool))
    }

    /// Opens an existing database file at `path`, migrating its schema if it is out-of-date.
    pub async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            bail!("The database file is missing '{}'", path.display());
        }
        let pool = connect(path, false).await?;
        let version = migrations::bootstrap(&pool).await?;
        if version > migrations::CURRENT_VERSION {
            bail!(
                "The database schema version {version} is newer than this program supports ({})",
                migrations::CURRENT_VERSION
            );
        }
        migrations::run(&pool, version, migrations::CURRENT_VERSION).await?;
        Ok(Self::from_pool(pool))
    }

    fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            listeners: Listeners::new(),
            fanout: tokio::sync::Mutex::new(()),
        }
    }

    async fn notify(&self, collections: &BTreeSet<String>) {
        let _guard = self.fanout.lock().await;
        for (id, query) in self.listeners.interested(collections) {
            let event = match self.query(&query).await {
                Ok(docs) => StoreEvent::Snapshot(docs),
                Err(e) => StoreEvent::Error(e),
            };
            trace!("Pushing snapshot to listener {id:?}");
            self.listeners.send(id, event);
        }
    }
}

async fn connect(path: &Path, create: bool) -> Res<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
        .context("Failed to parse SQLite connection string")?
        .create_if_missing(create);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open SQLite database at {}", path.display()))
}

fn map_err(e: sqlx::Error, path: &str, operation: Operation) -> StoreError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable {
                path: path.to_string(),
                operation,
                message: e.to_string(),
            }
        }
        other => StoreError::Backend(other.to_string()),
    }
}

fn decode(path: DocPath, version: i64, data: &str) -> StoreResult<Document> {
    let fields: Fields = serde_json::from_str(data)
        .map_err(|e| StoreError::Backend(format!("Corrupt document '{path}': {e}")))?;
    Ok(Document::new(path, u64::try_from(version).unwrap_or_default(), fields))
}

fn encode(doc: &Document) -> StoreResult<String> {
    serde_json::to_string(doc.data())
        .map_err(|e| StoreError::Backend(format!("Unable to encode '{}': {e}", doc.path())))
}

async fn read_version(conn: &mut SqliteConnection, path: &DocPath) -> StoreResult<Option<u64>> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT version FROM documents WHERE collection = ? AND id = ?")
            .bind(path.collection())
            .bind(path.id())
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| map_err(e, &path.to_string(), Operation::Write))?;
    Ok(row.map(|(v,)| u64::try_from(v).unwrap_or_default()))
}

async fn read_doc(conn: &mut SqliteConnection, path: &DocPath) -> StoreResult<Option<Document>> {
    let row: Option<(i64, String)> =
        sqlx::query_as("SELECT version, data FROM documents WHERE collection = ? AND id = ?")
            .bind(path.collection())
            .bind(path.id())
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| map_err(e, &path.to_string(), Operation::Get))?;
    row.map(|(version, data)| decode(path.clone(), version, &data))
        .transpose()
}

#[async_trait::async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, path: &DocPath) -> StoreResult<Option<Document>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_err(e, &path.to_string(), Operation::Get))?;
        read_doc(&mut conn, path).await
    }

    async fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        let collection = query.collection_name();
        let rows: Vec<(String, i64, String)> = sqlx::query_as(
            "SELECT id, version, data FROM documents WHERE collection = ? ORDER BY id",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_err(e, collection, Operation::List))?;

        let mut docs = Vec::with_capacity(rows.len());
        for (id, version, data) in rows {
            let doc = decode(DocPath::new(collection, id), version, &data)?;
            if query.matches(&doc) {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    async fn commit(&self, commit: Commit) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_err(e, "documents", Operation::Write))?;

        for precondition in commit.preconditions() {
            let current = read_version(&mut tx, &precondition.path).await?;
            check_precondition(precondition, current)?;
        }

        for write in commit.writes() {
            let path = write.path();
            let existing = read_doc(&mut tx, path).await?;
            let p = path.to_string();
            match apply_write(existing.as_ref(), write)? {
                Some(doc) => {
                    let data = encode(&doc)?;
                    sqlx::query(
                        "INSERT INTO documents (collection, id, version, data) VALUES (?, ?, ?, ?) \
                         ON CONFLICT (collection, id) \
                         DO UPDATE SET version = excluded.version, data = excluded.data",
                    )
                    .bind(path.collection())
                    .bind(path.id())
                    .bind(i64::try_from(doc.version()).unwrap_or(i64::MAX))
                    .bind(data)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_err(e, &p, write.operation(existing.is_some())))?;
                }
                None => {
                    debug_assert!(matches!(write, Write::Delete { .. }));
                    sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
                        .bind(path.collection())
                        .bind(path.id())
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| map_err(e, &p, Operation::Delete))?;
                }
            }
        }

        // Dropping `tx` on any early return above rolls the whole commit back.
        tx.commit()
            .await
            .map_err(|e| map_err(e, "documents", Operation::Write))?;
        trace!("Committed {} writes", commit.writes().len());

        self.notify(&commit.touched_collections()).await;
        Ok(())
    }

    async fn subscribe(&self, query: Query) -> StoreResult<Listener> {
        let _guard = self.fanout.lock().await;
        let (id, events) = self.listeners.register(query.clone());
        let event = match self.query(&query).await {
            Ok(docs) => StoreEvent::Snapshot(docs),
            Err(e) => StoreEvent::Error(e),
        };
        self.listeners.send(id, event);
        Ok(Listener { id, events })
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.listeners.remove(id);
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn fields(v: serde_json::Value) -> Fields {
        v.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_init_refuses_existing_and_load_requires_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.sqlite");
        assert!(SqliteStore::load(&path).await.is_err());
        let store = SqliteStore::init(&path).await.unwrap();
        store.close().await;
        assert!(SqliteStore::init(&path).await.is_err());
        let _ = SqliteStore::load(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_documents_survive_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.sqlite");
        let store = SqliteStore::init(&path).await.unwrap();
        let doc_path = DocPath::new("goals", "g1");
        store
            .create(doc_path.clone(), fields(json!({"ownerId": "u1", "name": "Trip"})))
            .await
            .unwrap();
        store
            .update(doc_path.clone(), fields(json!({"name": "Bigger trip"})))
            .await
            .unwrap();
        store.close().await;

        let store = SqliteStore::load(&path).await.unwrap();
        let doc = store.get(&doc_path).await.unwrap().unwrap();
        assert_eq!(doc.version(), 2);
        assert_eq!(doc.field("name"), Some(&json!("Bigger trip")));
        assert_eq!(doc.field("ownerId"), Some(&json!("u1")));
    }

    #[tokio::test]
    async fn test_conflicting_commit_rolls_back() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::init(dir.path().join("s.sqlite")).await.unwrap();
        let goal = DocPath::new("goals", "g1");
        store.create(goal.clone(), fields(json!({"n": 1}))).await.unwrap();

        let mut commit = Commit::new();
        commit.create(DocPath::new("ledger", "e1"), Fields::new());
        commit.expect_version(goal.clone(), Some(7));
        commit.update(goal.clone(), fields(json!({"n": 2})));
        assert!(matches!(
            store.commit(commit).await,
            Err(StoreError::Conflict { .. })
        ));
        assert!(store
            .get(&DocPath::new("ledger", "e1"))
            .await
            .unwrap()
            .is_none());
        let doc = store.get(&goal).await.unwrap().unwrap();
        assert_eq!(doc.field("n"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_query_and_subscription() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::init(dir.path().join("s.sqlite")).await.unwrap();
        let mut listener = store
            .subscribe(Query::collection("tasks").owned_by("u1"))
            .await
            .unwrap();
        assert_eq!(
            listener.events.recv().await,
            Some(StoreEvent::Snapshot(vec![]))
        );

        store
            .create(DocPath::new("tasks", "b"), fields(json!({"ownerId": "u1"})))
            .await
            .unwrap();
        store
            .create(DocPath::new("tasks", "a"), fields(json!({"ownerId": "u2"})))
            .await
            .unwrap();

        let mut last = None;
        while let Ok(event) = listener.events.try_recv() {
            last = Some(event);
        }
        match last {
            Some(StoreEvent::Snapshot(docs)) => {
                assert_eq!(docs.len(), 1);
                assert_eq!(docs[0].id(), "b");
            }
            other => panic!("unexpected event {other:?}"),
        }

        store.batch_delete(vec![DocPath::new("tasks", "a"), DocPath::new("tasks", "b")])
            .await
            .unwrap();
        let remaining = store.query(&Query::collection("tasks")).await.unwrap();
        assert!(remaining.is_empty());
    }
}
