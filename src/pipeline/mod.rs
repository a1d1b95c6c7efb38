//! 查询流水线：数据模型、执行计划、阶段行为 trait

pub mod behavior;
pub mod plan;
pub mod types;

pub use behavior::{AgentBehavior, GenericBehavior};
pub use plan::{ExecutionPlan, Step, StepKind};
pub use types::{
    Constraint, ConstraintOp, Episode, ExecutionResult, Intent, ResultStatus, Understanding,
};
