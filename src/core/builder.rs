//! Agent 构建器：按配置组装记忆存储、SQL 行为与 Agent
//!
//! 二进制入口与测试共用同一套初始化逻辑。

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, MemoryBackend};
use crate::core::{Agent, AgentError};
use crate::memory::{InMemoryStore, JsonFileStore, MemoryStore, SqliteMemoryStore};
use crate::pipeline::GenericBehavior;
use crate::sql::{
    DetachedExecutor, SchemaCache, SqlAgent, SqlBehavior, SqlExecutor, SqlGenerator,
    SqlSettings, TemplateSqlGenerator,
};

pub struct AgentBuilder {
    config: AppConfig,
    store: Option<Arc<dyn MemoryStore>>,
    generator: Option<Arc<dyn SqlGenerator>>,
    executor: Option<Arc<dyn SqlExecutor>>,
}

impl AgentBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            store: None,
            generator: None,
            executor: None,
        }
    }

    /// 注入记忆存储，覆盖 [memory] 配置
    pub fn with_store(mut self, store: Arc<dyn MemoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn SqlGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn SqlExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 按 [memory] 段创建存储；打开失败时退回进程内存储
    pub fn build_memory_store(&self) -> Arc<dyn MemoryStore> {
        if let Some(store) = &self.store {
            return store.clone();
        }
        let section = &self.config.memory;
        match section.backend {
            MemoryBackend::Memory => Arc::new(InMemoryStore::new()),
            MemoryBackend::File => Arc::new(JsonFileStore::new(&section.path)),
            MemoryBackend::Sqlite => {
                let db_path = section.path.join("episodes.db");
                match SqliteMemoryStore::open(&db_path) {
                    Ok(store) => Arc::new(store),
                    Err(e) => {
                        tracing::warn!(
                            "SQLite memory store unavailable ({}), using in-memory store",
                            e
                        );
                        Arc::new(InMemoryStore::new())
                    }
                }
            }
        }
    }

    pub fn build_sql_behavior(&self) -> SqlBehavior {
        let settings = SqlSettings::from(&self.config.sql);
        let generator = self
            .generator
            .clone()
            .unwrap_or_else(|| Arc::new(TemplateSqlGenerator::new(settings.top_k)));
        let executor = self
            .executor
            .clone()
            .unwrap_or_else(|| Arc::new(DetachedExecutor));
        SqlBehavior::new(generator, executor, settings)
    }

    fn timeout(&self) -> Option<Duration> {
        match self.config.agent.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn build_sql_agent(&self) -> SqlAgent {
        let agent = Agent::new(
            self.config.app.agent_id.clone(),
            self.build_sql_behavior(),
            self.build_memory_store(),
        );
        match self.timeout() {
            Some(limit) => agent.with_timeout(limit),
            None => agent,
        }
    }

    pub fn build_generic_agent(&self) -> Agent<GenericBehavior> {
        let agent = Agent::new(
            self.config.app.agent_id.clone(),
            GenericBehavior,
            self.build_memory_store(),
        );
        match self.timeout() {
            Some(limit) => agent.with_timeout(limit),
            None => agent,
        }
    }

    /// 读取 [database].schema_path；未配置时返回空 schema
    pub fn load_schema(&self) -> Result<SchemaCache, AgentError> {
        match &self.config.database.schema_path {
            Some(path) => load_schema_file(path),
            None => Ok(SchemaCache::default()),
        }
    }
}

/// 从 JSON 文件读取 schema：{ "table": ["col", ...] } 或带 data_type 的列对象
pub fn load_schema_file(path: &Path) -> Result<SchemaCache, AgentError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        AgentError::Initialization(format!("cannot read schema file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&text).map_err(|e| {
        AgentError::Initialization(format!("invalid schema file {}: {}", path.display(), e))
    })
}
