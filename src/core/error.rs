//! Agent 错误类型
//!
//! 阶段错误（Initialization / Understanding / Planning / Execution / Timeout / Cancelled）在
//! process_query 边界被统一捕获并转为 QueryOutcome::Failure；存储层错误为 StorageError；
//! 学习阶段的持久化失败只产生 LearningWarning，校验失败以 ValidationError 数据返回。

use serde::Serialize;
use thiserror::Error;

/// 流水线运行过程中可能出现的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Understanding failed: {0}")]
    Understanding(String),

    #[error("Planning failed: {0}")]
    Planning(String),

    /// step 为失败步骤名（如 sql_generation / query_execution）
    #[error("Execution failed at {step}: {message}")]
    Execution { step: String, message: String },

    #[error("timeout")]
    Timeout,

    #[error("Cancelled")]
    Cancelled,

    #[error("Config error: {0}")]
    Config(String),
}

impl AgentError {
    pub fn execution(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            step: step.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::Initialization(_) => ErrorKind::Initialization,
            AgentError::Understanding(_) => ErrorKind::Understanding,
            AgentError::Planning(_) => ErrorKind::Planning,
            AgentError::Execution { .. } => ErrorKind::Execution,
            AgentError::Timeout => ErrorKind::Timeout,
            AgentError::Cancelled => ErrorKind::Cancelled,
            AgentError::Config(_) => ErrorKind::Config,
        }
    }
}

/// 错误类别（序列化给上层服务，便于前端按类别渲染）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Initialization,
    Understanding,
    Planning,
    Execution,
    Timeout,
    Cancelled,
    Config,
}

/// 记忆存储层错误
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt memory data: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// 学习阶段的非致命告警：情景已写入内存，但持久化失败
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("Failed to persist memory for agent '{agent_id}': {message}")]
pub struct LearningWarning {
    pub agent_id: String,
    pub message: String,
}

/// 查询校验错误：作为数据返回（ValidationReport.errors），从不作为 Err 抛出
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("Query is empty")]
    EmptyQuery,

    #[error("Statement '{keyword}' would modify data")]
    MutatingStatement { keyword: String },

    #[error("Only a single statement is allowed")]
    MultipleStatements,

    #[error("Query does not reference any table")]
    MissingTable,

    #[error("Unknown table '{table}'")]
    UnknownTable { table: String },
}
