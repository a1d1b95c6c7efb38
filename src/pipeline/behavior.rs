//! Agent 行为 trait：理解 / 规划 / 执行 / 解释 四个可替换阶段
//!
//! 变体在构造时选定（GenericBehavior / SqlBehavior），学习阶段由 Agent 统一负责。

use async_trait::async_trait;

use crate::core::{AgentError, Capabilities};
use crate::pipeline::{ExecutionPlan, ExecutionResult, Intent, Understanding};

#[async_trait]
pub trait AgentBehavior: Send + Sync {
    /// 变体名称（日志用）
    fn name(&self) -> &str;

    /// 在基础能力集之上的覆盖项；默认不覆盖
    fn capability_overrides(&self) -> Capabilities {
        Capabilities::from_pairs(&[])
    }

    async fn understand_query(&self, query: &str) -> Result<Understanding, AgentError>;

    async fn create_execution_plan(
        &self,
        understanding: &Understanding,
    ) -> Result<ExecutionPlan, AgentError>;

    /// 执行计划并填充各步骤 output；失败直接返回 Err，由 process_query 统一转换
    async fn execute_plan(&self, plan: &mut ExecutionPlan) -> Result<ExecutionResult, AgentError>;

    /// 纯函数：相同输入必须得到相同输出
    fn generate_explanation(
        &self,
        understanding: &Understanding,
        plan: &ExecutionPlan,
        result: &ExecutionResult,
    ) -> String;
}

/// 通用 Agent：各阶段均为占位实现，不做真实的语义理解或规划。
///
/// 理解结果只带 Query 意图，计划为空，执行时把每步 input 原样作为 output。
#[derive(Debug, Default, Clone)]
pub struct GenericBehavior;

#[async_trait]
impl AgentBehavior for GenericBehavior {
    fn name(&self) -> &str {
        "generic"
    }

    /// 任何输入（包括空串）都得到只带 Query 意图的理解结果
    async fn understand_query(&self, _query: &str) -> Result<Understanding, AgentError> {
        Ok(Understanding::new(Intent::Query))
    }

    async fn create_execution_plan(
        &self,
        _understanding: &Understanding,
    ) -> Result<ExecutionPlan, AgentError> {
        Ok(ExecutionPlan::default())
    }

    async fn execute_plan(&self, plan: &mut ExecutionPlan) -> Result<ExecutionResult, AgentError> {
        plan.validate()?;
        for index in 0..plan.steps.len() {
            plan.ensure_ready(index)?;
            let input = plan.steps[index].input.clone();
            plan.record_output(index, input);
        }
        Ok(ExecutionResult::success(None))
    }

    fn generate_explanation(
        &self,
        understanding: &Understanding,
        plan: &ExecutionPlan,
        result: &ExecutionResult,
    ) -> String {
        format!(
            "Handled a {:?} request in {} step(s); status: {:?}.",
            understanding.intent,
            plan.steps.len(),
            result.status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{ResultStatus, Step, StepKind};
    use serde_json::json;

    #[tokio::test]
    async fn test_generic_pipeline_placeholders() {
        let behavior = GenericBehavior;
        let understanding = behavior.understand_query("how many orders?").await.unwrap();
        assert_eq!(understanding.intent, Intent::Query);
        assert!(understanding.entities.is_empty());

        let mut plan = behavior.create_execution_plan(&understanding).await.unwrap();
        assert!(plan.is_empty());

        let result = behavior.execute_plan(&mut plan).await.unwrap();
        assert_eq!(result.status, ResultStatus::Success);
        assert!(result.data.is_none());
    }

    #[tokio::test]
    async fn test_generic_accepts_blank_query() {
        let understanding = GenericBehavior.understand_query("   ").await.unwrap();
        assert_eq!(understanding, Understanding::new(Intent::Query));
    }

    #[tokio::test]
    async fn test_generic_execute_respects_dependencies() {
        let mut plan = ExecutionPlan::new(vec![
            Step::new(StepKind::Custom("a".into()), json!(1)),
            Step::new(StepKind::Custom("b".into()), json!(2)),
        ])
        .with_dependency(0, 1);
        GenericBehavior.execute_plan(&mut plan).await.unwrap();
        assert_eq!(plan.output_of(1), Some(&json!(2)));
    }

    #[test]
    fn test_generic_explanation_is_pure() {
        let u = Understanding::new(Intent::Query);
        let p = ExecutionPlan::default();
        let r = ExecutionResult::success(None);
        let a = GenericBehavior.generate_explanation(&u, &p, &r);
        let b = GenericBehavior.generate_explanation(&u, &p, &r);
        assert_eq!(a, b);
    }
}
