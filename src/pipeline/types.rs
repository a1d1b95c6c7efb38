//! 流水线数据模型：Understanding / ExecutionResult / Episode
//!
//! 各阶段产物创建后不再修改；Episode 为记忆的最小单元。

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::ExecutionPlan;

/// 查询意图
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// 通用查询（基础 Agent）
    Query,
    /// SQL 查询（SQL Agent）
    SqlQuery,
}

/// 约束比较符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Like,
}

impl ConstraintOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ConstraintOp::Eq => "=",
            ConstraintOp::Ne => "<>",
            ConstraintOp::Gt => ">",
            ConstraintOp::Ge => ">=",
            ConstraintOp::Lt => "<",
            ConstraintOp::Le => "<=",
            ConstraintOp::Like => "LIKE",
        }
    }
}

/// 过滤条件描述：column op value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    pub column: String,
    pub op: ConstraintOp,
    pub value: String,
}

/// 对一条自然语言查询的结构化理解
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Understanding {
    pub intent: Intent,
    pub entities: Vec<String>,
    pub constraints: Vec<Constraint>,
    /// 仅 SQL Agent 填充
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tables: BTreeSet<String>,
}

impl Understanding {
    pub fn new(intent: Intent) -> Self {
        Self {
            intent,
            entities: Vec::new(),
            constraints: Vec::new(),
            tables: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Success,
    Failure,
}

/// 执行结果；SQL Agent 额外带上生成的 query 文本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ResultStatus,
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl ExecutionResult {
    pub fn success(data: Option<serde_json::Value>) -> Self {
        Self {
            status: ResultStatus::Success,
            data,
            query: None,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }
}

/// 一次 理解 → 规划 → 执行 的完整记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: Uuid,
    pub understanding: Understanding,
    pub plan: ExecutionPlan,
    pub result: ExecutionResult,
    pub timestamp: DateTime<Utc>,
}

impl Episode {
    /// 时间戳取调用时刻
    pub fn record(understanding: Understanding, plan: ExecutionPlan, result: ExecutionResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            understanding,
            plan,
            result,
            timestamp: Utc::now(),
        }
    }
}
