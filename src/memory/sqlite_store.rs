//! SQLite 记忆存储（rusqlite，同步连接放进 spawn_blocking）
//!
//! 表 episodes(agent_id, seq, id, payload, created_at)，payload 为 Episode 的 JSON；
//! save 在单个事务内整体替换该 agent 的所有行。

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection};

use crate::core::StorageError;
use crate::memory::MemoryStore;
use crate::pipeline::Episode;

#[derive(Clone)]
pub struct SqliteMemoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMemoryStore {
    /// 打开（或创建）数据库文件并建表
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS episodes (
                agent_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                id TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (agent_id, seq)
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 在阻塞线程池中持锁执行 f
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StorageError::Unavailable("sqlite connection poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StorageError::Unavailable(e.to_string()))?
    }
}

#[async_trait]
impl MemoryStore for SqliteMemoryStore {
    async fn load(&self, agent_id: &str) -> Result<Vec<Episode>, StorageError> {
        let agent_id = agent_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt =
                conn.prepare("SELECT payload FROM episodes WHERE agent_id = ?1 ORDER BY seq ASC")?;
            let payloads = stmt
                .query_map(params![agent_id], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<String>, _>>()?;
            payloads
                .iter()
                .map(|p| serde_json::from_str::<Episode>(p).map_err(StorageError::from))
                .collect()
        })
        .await
    }

    async fn save(&self, agent_id: &str, episodes: &[Episode]) -> Result<(), StorageError> {
        let agent_id = agent_id.to_string();
        let rows = episodes
            .iter()
            .map(|e| -> Result<_, StorageError> {
                Ok((e.id.to_string(), serde_json::to_string(e)?, e.timestamp))
            })
            .collect::<Result<Vec<_>, StorageError>>()?;
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM episodes WHERE agent_id = ?1", params![agent_id])?;
            {
                let mut insert = tx.prepare(
                    "INSERT INTO episodes (agent_id, seq, id, payload, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for (seq, (id, payload, created_at)) in rows.iter().enumerate() {
                    insert.execute(params![agent_id, seq as i64, id, payload, created_at])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn clear(&self, agent_id: &str) -> Result<(), StorageError> {
        let agent_id = agent_id.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM episodes WHERE agent_id = ?1", params![agent_id])?;
            Ok(())
        })
        .await
    }
}
