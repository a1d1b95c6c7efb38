//! 执行计划：有序步骤 + 依赖边
//!
//! dependencies 中每条 (before, after) 表示 after 必须在 before 产出 output 之后才能执行；
//! 执行前由 ensure_ready 在运行时校验。

use serde::{Deserialize, Serialize};

use crate::core::AgentError;

/// 步骤类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    SqlGeneration,
    QueryExecution,
    /// 其它变体自定义的步骤
    Custom(String),
}

impl StepKind {
    pub fn name(&self) -> &str {
        match self {
            StepKind::SqlGeneration => "sql_generation",
            StepKind::QueryExecution => "query_execution",
            StepKind::Custom(name) => name.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub kind: StepKind,
    pub input: serde_json::Value,
    /// 未执行前为 None
    pub output: Option<serde_json::Value>,
}

impl Step {
    pub fn new(kind: StepKind, input: serde_json::Value) -> Self {
        Self {
            kind,
            input,
            output: None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(&self.output, Some(v) if !v.is_null())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub steps: Vec<Step>,
    pub dependencies: Vec<(usize, usize)>,
}

impl ExecutionPlan {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            dependencies: Vec::new(),
        }
    }

    /// 声明 after 依赖 before
    pub fn with_dependency(mut self, before: usize, after: usize) -> Self {
        self.dependencies.push((before, after));
        self
    }

    /// 校验依赖边都指向存在的步骤且不自环
    pub fn validate(&self) -> Result<(), AgentError> {
        for &(before, after) in &self.dependencies {
            if before >= self.steps.len() || after >= self.steps.len() {
                return Err(AgentError::Planning(format!(
                    "dependency ({before}, {after}) references a missing step"
                )));
            }
            if before == after {
                return Err(AgentError::Planning(format!(
                    "step {before} depends on itself"
                )));
            }
        }
        Ok(())
    }

    /// 步骤 index 的全部前置步骤是否都已有非空 output
    pub fn ensure_ready(&self, index: usize) -> Result<(), AgentError> {
        let step = self.steps.get(index).ok_or_else(|| {
            AgentError::execution(format!("step {index}"), "step does not exist")
        })?;
        for &(before, after) in &self.dependencies {
            if after != index {
                continue;
            }
            let done = self.steps.get(before).map(Step::is_done).unwrap_or(false);
            if !done {
                return Err(AgentError::execution(
                    step.kind.name(),
                    format!("dependency on step {before} has no output yet"),
                ));
            }
        }
        Ok(())
    }

    /// 写入步骤输出
    pub fn record_output(&mut self, index: usize, output: serde_json::Value) {
        if let Some(step) = self.steps.get_mut(index) {
            step.output = Some(output);
        }
    }

    pub fn output_of(&self, index: usize) -> Option<&serde_json::Value> {
        self.steps.get(index).and_then(|s| s.output.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
