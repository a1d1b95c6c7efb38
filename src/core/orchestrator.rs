//! Agent 编排器：理解 → 规划 → 执行 → 学习 → 解释
//!
//! process_query 是唯一的对外边界：各阶段错误在这里被捕获一次并转为 QueryOutcome::Failure，
//! 从不向调用方抛出。学习阶段在记忆锁内完成 "追加 Episode + 持久化全量列表"，
//! 持久化失败（含保存超时）只记录 LearningWarning。超时与取消在理解 / 规划 / 执行阶段
//! 使调用失败，因此失败的调用不会留下半条 Episode。

use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, Serializer};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::core::{AgentError, Capabilities, ErrorKind, LearningWarning, StorageError};
use crate::memory::MemoryStore;
use crate::pipeline::{
    AgentBehavior, Episode, ExecutionPlan, ExecutionResult, GenericBehavior, Understanding,
};

/// 调用方在 initialize 时传入的任意配置
pub type AgentContext = serde_json::Map<String, serde_json::Value>;

/// 一次 process_query 的结果：Success 与 Failure 二选一
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    Success {
        result: ExecutionResult,
        explanation: String,
        plan: ExecutionPlan,
        /// 结果已返回但记忆持久化失败
        warning: Option<LearningWarning>,
    },
    Failure {
        error: AgentError,
    },
}

impl QueryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, QueryOutcome::Success { .. })
    }

    pub fn error(&self) -> Option<&AgentError> {
        match self {
            QueryOutcome::Failure { error } => Some(error),
            QueryOutcome::Success { .. } => None,
        }
    }

    pub fn result(&self) -> Option<&ExecutionResult> {
        match self {
            QueryOutcome::Success { result, .. } => Some(result),
            QueryOutcome::Failure { .. } => None,
        }
    }
}

#[derive(Serialize)]
struct OutcomeView<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a ExecutionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    explanation: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    plan: Option<&'a ExecutionPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<ErrorKind>,
}

impl Serialize for QueryOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let view = match self {
            QueryOutcome::Success {
                result,
                explanation,
                plan,
                warning,
            } => OutcomeView {
                success: true,
                result: Some(result),
                explanation: Some(explanation),
                plan: Some(plan),
                warning: warning.as_ref().map(|w| w.to_string()),
                error: None,
                error_kind: None,
            },
            QueryOutcome::Failure { error } => OutcomeView {
                success: false,
                result: None,
                explanation: None,
                plan: None,
                warning: None,
                error: Some(error.to_string()),
                error_kind: Some(error.kind()),
            },
        };
        view.serialize(serializer)
    }
}

/// initialize 的结果：从不返回 Err，加载失败时 error 为 Some 且记忆为空
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializeReport {
    pub restored: usize,
    pub error: Option<AgentError>,
}

impl InitializeReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// 流水线 Agent；行为变体在构造时选定
pub struct Agent<B: AgentBehavior = GenericBehavior> {
    agent_id: String,
    behavior: B,
    capabilities: Capabilities,
    store: Arc<dyn MemoryStore>,
    memory: Mutex<Vec<Episode>>,
    context: RwLock<AgentContext>,
    warnings: Mutex<Vec<LearningWarning>>,
    timeout: Option<Duration>,
}

impl<B: AgentBehavior> Agent<B> {
    pub fn new(agent_id: impl Into<String>, behavior: B, store: Arc<dyn MemoryStore>) -> Self {
        let capabilities = Capabilities::base().merged_with(&behavior.capability_overrides());
        Self {
            agent_id: agent_id.into(),
            behavior,
            capabilities,
            store,
            memory: Mutex::new(Vec::new()),
            context: RwLock::new(AgentContext::new()),
            warnings: Mutex::new(Vec::new()),
            timeout: None,
        }
    }

    /// 单次调用超时：理解 / 规划 / 执行超时则失败，学习阶段的保存超时只告警
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub async fn context(&self) -> AgentContext {
        self.context.read().await.clone()
    }

    /// 设置 context 并从存储加载历史情景；加载失败时以空记忆继续
    pub async fn initialize(&self, context: AgentContext) -> InitializeReport {
        *self.context.write().await = context;

        let mut memory = self.memory.lock().await;
        match self.store.load(&self.agent_id).await {
            Ok(episodes) => {
                *memory = episodes;
                tracing::info!(
                    agent_id = %self.agent_id,
                    behavior = self.behavior.name(),
                    restored = memory.len(),
                    "Agent initialized"
                );
                InitializeReport {
                    restored: memory.len(),
                    error: None,
                }
            }
            Err(e) => {
                memory.clear();
                tracing::warn!(
                    agent_id = %self.agent_id,
                    "Memory load failed ({}), starting with empty memory",
                    e
                );
                InitializeReport {
                    restored: 0,
                    error: Some(AgentError::Initialization(e.to_string())),
                }
            }
        }
    }

    pub async fn process_query(&self, query: &str) -> QueryOutcome {
        self.process_query_with_cancel(query, &CancellationToken::new())
            .await
    }

    /// cancel 触发或超时都按失败处理，且不追加 Episode
    pub async fn process_query_with_cancel(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> QueryOutcome {
        let staged = async {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, self.run_stages(query))
                    .await
                    .unwrap_or(Err(AgentError::Timeout)),
                None => self.run_stages(query).await,
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            r = staged => r,
        };

        match outcome {
            Ok((understanding, plan, result)) => {
                let warning = self.learn(&understanding, &plan, &result).await.err();
                let explanation = self.generate_explanation(&understanding, &plan, &result);
                QueryOutcome::Success {
                    result,
                    explanation,
                    plan,
                    warning,
                }
            }
            Err(error) => {
                tracing::warn!(
                    agent_id = %self.agent_id,
                    kind = ?error.kind(),
                    "Query failed: {}",
                    error
                );
                QueryOutcome::Failure { error }
            }
        }
    }

    async fn run_stages(
        &self,
        query: &str,
    ) -> Result<(Understanding, ExecutionPlan, ExecutionResult), AgentError> {
        tracing::debug!(stage = "understand", "Pipeline stage");
        let understanding = self.behavior.understand_query(query).await?;
        tracing::debug!(stage = "plan", "Pipeline stage");
        let mut plan = self.behavior.create_execution_plan(&understanding).await?;
        tracing::debug!(stage = "execute", steps = plan.steps.len(), "Pipeline stage");
        let result = self.behavior.execute_plan(&mut plan).await?;
        Ok((understanding, plan, result))
    }

    /// 追加 Episode 并持久化全量记忆；两步在同一把锁内完成。
    /// 保存同样受单次超时约束，超时只产生告警，已追加的 Episode 保留在内存中
    pub async fn learn(
        &self,
        understanding: &Understanding,
        plan: &ExecutionPlan,
        result: &ExecutionResult,
    ) -> Result<(), LearningWarning> {
        let mut memory = self.memory.lock().await;
        memory.push(Episode::record(
            understanding.clone(),
            plan.clone(),
            result.clone(),
        ));
        let saved = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.store.save(&self.agent_id, &memory))
                .await
                .unwrap_or_else(|_| Err(StorageError::Unavailable("save timed out".to_string()))),
            None => self.store.save(&self.agent_id, &memory).await,
        };
        if let Err(e) = saved {
            let warning = LearningWarning {
                agent_id: self.agent_id.clone(),
                message: e.to_string(),
            };
            tracing::warn!(agent_id = %self.agent_id, "{}", warning);
            self.warnings.lock().await.push(warning.clone());
            return Err(warning);
        }
        tracing::debug!(agent_id = %self.agent_id, episodes = memory.len(), "Memory saved");
        Ok(())
    }

    pub fn generate_explanation(
        &self,
        understanding: &Understanding,
        plan: &ExecutionPlan,
        result: &ExecutionResult,
    ) -> String {
        self.behavior
            .generate_explanation(understanding, plan, result)
    }

    pub async fn memory_len(&self) -> usize {
        self.memory.lock().await.len()
    }

    pub async fn memory_snapshot(&self) -> Vec<Episode> {
        self.memory.lock().await.clone()
    }

    /// 累计的学习告警
    pub async fn warnings(&self) -> Vec<LearningWarning> {
        self.warnings.lock().await.clone()
    }

    /// 清空内存中的情景并删除已持久化的内容
    pub async fn clear_memory(&self) -> Result<(), StorageError> {
        let mut memory = self.memory.lock().await;
        self.store.clear(&self.agent_id).await?;
        memory.clear();
        tracing::info!(agent_id = %self.agent_id, "Memory cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::capabilities::{LEARNING, SQL_GENERATION};
    use crate::memory::InMemoryStore;
    use crate::pipeline::{Intent, ResultStatus};

    fn generic_agent(store: InMemoryStore) -> Agent {
        Agent::new("tester", GenericBehavior, Arc::new(store))
    }

    #[tokio::test]
    async fn test_generic_query_records_one_episode() {
        let agent = generic_agent(InMemoryStore::new());
        let outcome = agent.process_query("how many users?").await;
        assert!(outcome.is_success());
        assert_eq!(agent.memory_len().await, 1);

        let episodes = agent.memory_snapshot().await;
        assert_eq!(episodes[0].understanding.intent, Intent::Query);
        assert_eq!(episodes[0].result.status, ResultStatus::Success);
    }

    /// 理解阶段总是失败
    struct RefusingBehavior;

    #[async_trait::async_trait]
    impl AgentBehavior for RefusingBehavior {
        fn name(&self) -> &str {
            "refusing"
        }

        async fn understand_query(&self, _query: &str) -> Result<Understanding, AgentError> {
            Err(AgentError::Understanding("unsupported question".to_string()))
        }

        async fn create_execution_plan(
            &self,
            _understanding: &Understanding,
        ) -> Result<ExecutionPlan, AgentError> {
            Ok(ExecutionPlan::default())
        }

        async fn execute_plan(
            &self,
            _plan: &mut ExecutionPlan,
        ) -> Result<ExecutionResult, AgentError> {
            Ok(ExecutionResult::success(None))
        }

        fn generate_explanation(
            &self,
            _understanding: &Understanding,
            _plan: &ExecutionPlan,
            _result: &ExecutionResult,
        ) -> String {
            String::new()
        }
    }

    /// save 永不返回
    struct HangingSaveStore;

    #[async_trait::async_trait]
    impl MemoryStore for HangingSaveStore {
        async fn load(&self, _agent_id: &str) -> Result<Vec<Episode>, StorageError> {
            Ok(Vec::new())
        }

        async fn save(&self, _agent_id: &str, _episodes: &[Episode]) -> Result<(), StorageError> {
            std::future::pending::<()>().await;
            Ok(())
        }

        async fn clear(&self, _agent_id: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_blank_query_is_accepted_by_generic_agent() {
        let agent = generic_agent(InMemoryStore::new());
        assert!(agent.process_query("   ").await.is_success());
        assert_eq!(agent.memory_len().await, 1);
    }

    #[tokio::test]
    async fn test_hanging_save_becomes_warning() {
        let agent = Agent::new("tester", GenericBehavior, Arc::new(HangingSaveStore))
            .with_timeout(Duration::from_millis(50));
        let outcome = agent.process_query("q").await;
        match outcome {
            QueryOutcome::Success { warning, .. } => {
                let warning = warning.expect("save timeout warning");
                assert!(warning.message.contains("save timed out"));
            }
            QueryOutcome::Failure { error } => panic!("unexpected failure: {}", error),
        }
        assert_eq!(agent.memory_len().await, 1);
        assert_eq!(agent.warnings().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_understanding_leaves_memory_untouched() {
        let agent = Agent::new("tester", RefusingBehavior, Arc::new(InMemoryStore::new()));
        let outcome = agent.process_query("how many users?").await;
        assert!(!outcome.is_success());
        assert!(matches!(
            outcome.error(),
            Some(AgentError::Understanding(_))
        ));
        assert_eq!(agent.memory_len().await, 0);
    }

    #[tokio::test]
    async fn test_initialize_restores_saved_episodes() {
        let store = InMemoryStore::new();
        let first = generic_agent(store.clone());
        first.process_query("q1").await;
        first.process_query("q2").await;

        let second = generic_agent(store);
        let mut context = AgentContext::new();
        context.insert("locale".into(), serde_json::json!("en"));
        let report = second.initialize(context).await;
        assert!(report.is_ok());
        assert_eq!(report.restored, 2);
        assert_eq!(second.memory_len().await, 2);
        assert_eq!(second.context().await["locale"], "en");
    }

    #[tokio::test]
    async fn test_clear_memory() {
        let store = InMemoryStore::new();
        let agent = generic_agent(store.clone());
        agent.process_query("q").await;
        agent.clear_memory().await.unwrap();
        assert_eq!(agent.memory_len().await, 0);
        assert!(store.load("tester").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let agent = generic_agent(InMemoryStore::new());
        let token = CancellationToken::new();
        token.cancel();
        let outcome = agent.process_query_with_cancel("q", &token).await;
        assert_eq!(outcome.error(), Some(&AgentError::Cancelled));
        assert_eq!(agent.memory_len().await, 0);
    }

    #[test]
    fn test_generic_capabilities_are_base() {
        let agent = generic_agent(InMemoryStore::new());
        assert!(agent.capabilities().supports(LEARNING));
        assert!(!agent.capabilities().supports(SQL_GENERATION));
        assert_eq!(agent.capabilities(), &Capabilities::base());
    }

    #[test]
    fn test_outcome_serialization_shape() {
        let failure = QueryOutcome::Failure {
            error: AgentError::Timeout,
        };
        let v = serde_json::to_value(&failure).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"success": false, "error": "timeout", "error_kind": "timeout"})
        );

        let success = QueryOutcome::Success {
            result: ExecutionResult::success(None).with_query("SELECT 1"),
            explanation: "done".into(),
            plan: ExecutionPlan::default(),
            warning: None,
        };
        let v = serde_json::to_value(&success).unwrap();
        assert_eq!(v["success"], true);
        assert_eq!(v["result"]["query"], "SELECT 1");
        assert!(v.get("error").is_none());
        assert!(v.get("warning").is_none());
    }
}
