use crate::errors::ClientResult;
use crate::queries::{Keys, Queries};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use taskdeck_core::{CachedPage, PendingOperation};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Durable mirror of the last observed page and the pending operation queue.
///
/// Reads and writes are best-effort: storage trouble is logged and the caller
/// sees an empty cache or a dropped write, never an error.
#[derive(Clone, Debug)]
pub struct LocalCache {
    pool: SqlitePool,
    // Serializes read-modify-write of the pending queue across clones.
    queue_lock: Arc<Mutex<()>>,
}

impl LocalCache {
    pub async fn open(database_url: &str) -> ClientResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // Every connection to an in-memory database is its own database, so
        // the pool must hold exactly one connection and never recycle it.
        let pool = if is_in_memory(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!("CACHE: Opened {}", database_url);
        Ok(Self {
            pool,
            queue_lock: Arc::new(Mutex::new(())),
        })
    }

    pub async fn in_memory() -> ClientResult<Self> {
        Self::open("sqlite::memory:").await
    }

    pub async fn load_page(&self) -> CachedPage {
        match self.read_json(Keys::TASK_CACHE).await {
            Some(value) => CachedPage::from_value(value),
            None => CachedPage::default(),
        }
    }

    pub async fn save_page(&self, page: &CachedPage) {
        self.write_json(Keys::TASK_CACHE, page).await;
    }

    pub async fn load_pending_ops(&self) -> Vec<PendingOperation> {
        let entries = match self.read_json(Keys::PENDING_OPERATIONS).await {
            Some(Value::Array(entries)) => entries,
            Some(other) => {
                warn!("CACHE: Pending queue is not a list, treating as empty: {}", other);
                return Vec::new();
            }
            None => return Vec::new(),
        };

        entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value(entry) {
                Ok(op) => Some(op),
                Err(e) => {
                    warn!("CACHE: Skipping malformed pending operation: {}", e);
                    None
                }
            })
            .collect()
    }

    pub async fn save_pending_ops(&self, ops: &[PendingOperation]) {
        self.write_json(Keys::PENDING_OPERATIONS, ops).await;
    }

    /// Appends to the queue and returns its new length.
    pub async fn enqueue(&self, op: PendingOperation) -> usize {
        let _guard = self.queue_lock.lock().await;
        let mut ops = self.load_pending_ops().await;
        debug!("CACHE: Queueing {} for {:?}", op.action(), op.task_id());
        ops.push(op);
        self.save_pending_ops(&ops).await;
        ops.len()
    }

    /// Drops the head of the queue and returns the remaining length.
    pub async fn pop_front(&self) -> usize {
        let _guard = self.queue_lock.lock().await;
        let mut ops = self.load_pending_ops().await;
        if !ops.is_empty() {
            ops.remove(0);
            self.save_pending_ops(&ops).await;
        }
        ops.len()
    }

    pub async fn clear(&self) {
        for key in [Keys::TASK_CACHE, Keys::PENDING_OPERATIONS] {
            if let Err(e) = sqlx::query(Queries::DELETE_VALUE)
                .bind(key)
                .execute(&self.pool)
                .await
            {
                warn!("CACHE: Failed to clear {}: {}", key, e);
            }
        }
    }

    async fn read_json(&self, key: &str) -> Option<Value> {
        let raw = match self.get_raw(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("CACHE: Failed to read {}: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("CACHE: Discarding undecodable {}: {}", key, e);
                None
            }
        }
    }

    async fn write_json<T: serde::Serialize + ?Sized>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("CACHE: Failed to encode {}: {}", key, e);
                return;
            }
        };

        if let Err(e) = self.put_raw(key, &raw).await {
            warn!("CACHE: Failed to write {}: {}", key, e);
        }
    }

    async fn get_raw(&self, key: &str) -> ClientResult<Option<String>> {
        let row = sqlx::query(Queries::GET_VALUE)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("value")?)),
            None => Ok(None),
        }
    }

    async fn put_raw(&self, key: &str, value: &str) -> ClientResult<()> {
        sqlx::query(Queries::PUT_VALUE)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}
