//! SQL Agent：理解 / 规划 / 执行 / 解释 的 SQL 实现
//!
//! 计划固定两步：sql_generation（input = Understanding，output = SQL 文本）→
//! query_execution（input = SQL，output = rows/columns），并声明 (0, 1) 依赖。
//! 每一步输出 JSON 审计日志；日志只含步骤名与截断后的 SQL，不含连接信息或 schema 内容。

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::capabilities::{QUERY_OPTIMIZATION, SCHEMA_UNDERSTANDING, SQL_GENERATION};
use crate::core::{Agent, AgentContext, AgentError, Capabilities, InitializeReport};
use crate::pipeline::{
    AgentBehavior, ExecutionPlan, ExecutionResult, Intent, Step, StepKind, Understanding,
};
use crate::sql::{
    analysis, optimize_query, validate_query, DetachedExecutor, QueryRows, SchemaCache,
    SqlExecutor, SqlGenerator, TemplateSqlGenerator, ValidationReport,
};

const GENERATION_STEP: usize = 0;
const EXECUTION_STEP: usize = 1;

/// SQL 行为参数（对应配置 [sql] 段）
#[derive(Debug, Clone)]
pub struct SqlSettings {
    pub top_k: usize,
    pub read_only: bool,
    pub validate_before_execute: bool,
}

impl Default for SqlSettings {
    fn default() -> Self {
        Self {
            top_k: 20,
            read_only: true,
            validate_before_execute: true,
        }
    }
}

pub struct SqlBehavior {
    schema: RwLock<SchemaCache>,
    generator: Arc<dyn SqlGenerator>,
    executor: Arc<dyn SqlExecutor>,
    settings: SqlSettings,
}

/// 以 SQL 行为驱动的 Agent
pub type SqlAgent = Agent<SqlBehavior>;

impl SqlBehavior {
    pub fn new(
        generator: Arc<dyn SqlGenerator>,
        executor: Arc<dyn SqlExecutor>,
        settings: SqlSettings,
    ) -> Self {
        Self {
            schema: RwLock::new(SchemaCache::default()),
            generator,
            executor,
            settings,
        }
    }

    /// 模板生成器 + 占位执行器
    pub fn with_settings(settings: SqlSettings) -> Self {
        Self::new(
            Arc::new(TemplateSqlGenerator::new(settings.top_k)),
            Arc::new(DetachedExecutor),
            settings,
        )
    }

    pub fn settings(&self) -> &SqlSettings {
        &self.settings
    }

    /// 整体替换 schema 缓存
    pub async fn replace_schema(&self, schema: SchemaCache) {
        *self.schema.write().await = schema;
    }

    pub async fn schema(&self) -> SchemaCache {
        self.schema.read().await.clone()
    }

    pub fn optimize_query(&self, sql: &str) -> String {
        optimize_query(sql, self.settings.top_k)
    }

    pub async fn validate_query(&self, sql: &str) -> ValidationReport {
        let schema = self.schema.read().await;
        validate_query(sql, &schema, self.settings.read_only)
    }

    async fn generate_sql(&self, plan: &ExecutionPlan) -> Result<String, AgentError> {
        let step = StepKind::SqlGeneration;
        let input = plan.steps[GENERATION_STEP].input.clone();
        let understanding: Understanding = serde_json::from_value(input)
            .map_err(|e| AgentError::execution(step.name(), format!("malformed input: {}", e)))?;

        let schema = self.schema.read().await.clone();
        let raw = self
            .generator
            .generate(&understanding, &schema)
            .await
            .map_err(|e| AgentError::execution(step.name(), e))?;
        let sql = self.optimize_query(&raw);

        if self.settings.validate_before_execute {
            let report = validate_query(&sql, &schema, self.settings.read_only);
            if !report.is_valid {
                return Err(AgentError::execution(step.name(), report.summary()));
            }
        }
        Ok(sql)
    }
}

impl Default for SqlBehavior {
    fn default() -> Self {
        Self::with_settings(SqlSettings::default())
    }
}

fn sql_preview(sql: &str) -> String {
    if sql.chars().count() > 200 {
        format!("{}...", sql.chars().take(200).collect::<String>())
    } else {
        sql.to_string()
    }
}

/// 每个 SQL 步骤的结构化审计日志
fn audit_step(step: &StepKind, ok: bool, start: Instant, sql: Option<&str>) {
    let audit = serde_json::json!({
        "event": "sql_step_audit",
        "step": step.name(),
        "ok": ok,
        "duration_ms": start.elapsed().as_millis() as u64,
        "sql_preview": sql.map(sql_preview),
    });
    if ok {
        tracing::info!(audit = %audit.to_string(), "sql step");
    } else {
        tracing::error!(audit = %audit.to_string(), "sql step failed");
    }
}

#[async_trait]
impl AgentBehavior for SqlBehavior {
    fn name(&self) -> &str {
        "sql"
    }

    fn capability_overrides(&self) -> Capabilities {
        Capabilities::from_pairs(&[
            (SQL_GENERATION, true),
            (SCHEMA_UNDERSTANDING, true),
            (QUERY_OPTIMIZATION, true),
        ])
    }

    async fn understand_query(&self, query: &str) -> Result<Understanding, AgentError> {
        if query.trim().is_empty() {
            return Err(AgentError::Understanding("query is empty".to_string()));
        }
        let schema = self.schema.read().await;
        if schema.is_empty() {
            tracing::debug!("Schema cache is empty; understanding without table hints");
        }
        Ok(Understanding {
            intent: Intent::SqlQuery,
            entities: analysis::extract_entities(query, &schema),
            constraints: analysis::extract_constraints(query, &schema),
            tables: analysis::identify_tables(query, &schema),
        })
    }

    async fn create_execution_plan(
        &self,
        understanding: &Understanding,
    ) -> Result<ExecutionPlan, AgentError> {
        let input = serde_json::to_value(understanding)
            .map_err(|e| AgentError::Planning(e.to_string()))?;
        Ok(ExecutionPlan::new(vec![
            Step::new(StepKind::SqlGeneration, input),
            Step::new(StepKind::QueryExecution, serde_json::Value::Null),
        ])
        .with_dependency(GENERATION_STEP, EXECUTION_STEP))
    }

    async fn execute_plan(&self, plan: &mut ExecutionPlan) -> Result<ExecutionResult, AgentError> {
        plan.validate()?;
        if plan.steps.len() != 2 {
            return Err(AgentError::Planning(format!(
                "SQL plan must have 2 steps, got {}",
                plan.steps.len()
            )));
        }

        plan.ensure_ready(GENERATION_STEP)?;
        let start = Instant::now();
        let sql = match self.generate_sql(plan).await {
            Ok(sql) => sql,
            Err(e) => {
                audit_step(&StepKind::SqlGeneration, false, start, None);
                return Err(e);
            }
        };
        audit_step(&StepKind::SqlGeneration, true, start, Some(&sql));
        plan.record_output(GENERATION_STEP, serde_json::Value::String(sql.clone()));
        plan.steps[EXECUTION_STEP].input = serde_json::Value::String(sql.clone());

        plan.ensure_ready(EXECUTION_STEP)?;
        let step = StepKind::QueryExecution;
        let start = Instant::now();
        let rows: QueryRows = match self.executor.execute(&sql).await {
            Ok(rows) => rows,
            Err(e) => {
                audit_step(&step, false, start, Some(&sql));
                return Err(AgentError::execution(step.name(), e));
            }
        };
        audit_step(&step, true, start, Some(&sql));
        tracing::debug!(rows = rows.row_count(), "Query returned");

        let data = serde_json::to_value(&rows)
            .map_err(|e| AgentError::execution(step.name(), e.to_string()))?;
        plan.record_output(EXECUTION_STEP, data.clone());
        Ok(ExecutionResult::success(Some(data)).with_query(sql))
    }

    fn generate_explanation(
        &self,
        _understanding: &Understanding,
        _plan: &ExecutionPlan,
        result: &ExecutionResult,
    ) -> String {
        let query = result.query.as_deref().unwrap_or("(none)");
        let rows = result
            .data
            .as_ref()
            .and_then(|d| d.get("rows"))
            .and_then(|r| r.as_array())
            .map(|r| r.len());
        match rows {
            Some(n) => format!(
                "I generated and executed the following SQL query: {} ({} row(s) returned)",
                query, n
            ),
            None => format!("I generated and executed the following SQL query: {}", query),
        }
    }
}

impl Agent<SqlBehavior> {
    /// 先走基础 initialize（context 重置为空，重新加载记忆），再整体替换 schema 缓存
    pub async fn initialize_with_schema(&self, schema: SchemaCache) -> InitializeReport {
        let report = self.initialize(AgentContext::new()).await;
        tracing::info!(
            agent_id = %self.agent_id(),
            tables = schema.len(),
            "Schema cache replaced"
        );
        self.behavior().replace_schema(schema).await;
        report
    }

    pub fn optimize_query(&self, sql: &str) -> String {
        self.behavior().optimize_query(sql)
    }

    pub async fn validate_query(&self, sql: &str) -> ValidationReport {
        self.behavior().validate_query(sql).await
    }

    pub async fn schema(&self) -> SchemaCache {
        self.behavior().schema().await
    }
}
