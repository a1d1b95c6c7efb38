//! JSON 文件记忆存储
//!
//! 每个 agent_id 一个文件 `<root>/<agent_id>.json`；写入先落临时文件再 rename，避免半写文件。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::core::StorageError;
use crate::memory::MemoryStore;
use crate::pipeline::Episode;

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// agent_id 中非 [A-Za-z0-9_-] 的字符替换为 '_'，防止路径逃逸
    pub fn path_for(&self, agent_id: &str) -> PathBuf {
        let safe: String = agent_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let name = if safe.is_empty() { "default".to_string() } else { safe };
        self.root.join(format!("{}.json", name))
    }
}

#[async_trait]
impl MemoryStore for JsonFileStore {
    async fn load(&self, agent_id: &str) -> Result<Vec<Episode>, StorageError> {
        let path = self.path_for(agent_id);
        let data = match fs::read_to_string(&path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&data)?)
    }

    async fn save(&self, agent_id: &str, episodes: &[Episode]) -> Result<(), StorageError> {
        let path = self.path_for(agent_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_string_pretty(episodes)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn clear(&self, agent_id: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(agent_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{ExecutionPlan, ExecutionResult, Intent, Understanding};
    use tempfile::TempDir;

    fn episode() -> Episode {
        Episode::record(
            Understanding::new(Intent::SqlQuery),
            ExecutionPlan::default(),
            ExecutionResult::success(Some(serde_json::json!({"rows": [], "columns": []})))
                .with_query("SELECT * FROM users"),
        )
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("memory"));
        assert!(store.load("agent").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("memory"));
        let saved = vec![episode(), episode()];
        store.save("agent", &saved).await.unwrap();

        let loaded = store.load("agent").await.unwrap();
        assert_eq!(loaded, saved);
        assert!(!store.path_for("agent").with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        std::fs::write(store.path_for("agent"), "{not json").unwrap();
        assert!(matches!(
            store.load("agent").await,
            Err(StorageError::Corrupt(_))
        ));
    }

    #[test]
    fn test_path_for_sanitizes_agent_id() {
        let store = JsonFileStore::new("/tmp/mem");
        assert_eq!(
            store.path_for("../etc/passwd"),
            PathBuf::from("/tmp/mem/___etc_passwd.json")
        );
    }

    #[tokio::test]
    async fn test_clear_removes_file() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        store.save("agent", &[episode()]).await.unwrap();
        store.clear("agent").await.unwrap();
        assert!(store.load("agent").await.unwrap().is_empty());
        // 重复清空不报错
        store.clear("agent").await.unwrap();
    }
}
