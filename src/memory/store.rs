//! 情景记忆存储抽象
//!
//! 按 agent_id 整体读写 Episode 序列；Agent 启动时 load，每次学习后 save 全量列表。
//! clear 是唯一的删除途径，由调用方（而非 Agent 流水线）触发。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::StorageError;
use crate::pipeline::Episode;

#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// 读取 agent_id 的全部情景；不存在时返回空 Vec
    async fn load(&self, agent_id: &str) -> Result<Vec<Episode>, StorageError>;

    /// 用 episodes 整体替换 agent_id 的已存内容
    async fn save(&self, agent_id: &str, episodes: &[Episode]) -> Result<(), StorageError>;

    /// 批量清空
    async fn clear(&self, agent_id: &str) -> Result<(), StorageError>;
}

/// 进程内存储：生命周期与进程相同，适合测试与单次会话
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<HashMap<String, Vec<Episode>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn load(&self, agent_id: &str) -> Result<Vec<Episode>, StorageError> {
        Ok(self
            .inner
            .read()
            .await
            .get(agent_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, agent_id: &str, episodes: &[Episode]) -> Result<(), StorageError> {
        self.inner
            .write()
            .await
            .insert(agent_id.to_string(), episodes.to_vec());
        Ok(())
    }

    async fn clear(&self, agent_id: &str) -> Result<(), StorageError> {
        self.inner.write().await.remove(agent_id);
        Ok(())
    }
}
