//! QueryBee - 自然语言查询 Agent
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、能力描述、编排器（理解 → 规划 → 执行 → 学习 → 解释）、构建器
//! - **memory**: 情景记忆存储（进程内 / JSON 文件 / SQLite）
//! - **observability**: 日志初始化
//! - **pipeline**: 流水线数据模型、执行计划、阶段行为 trait 与通用实现
//! - **sql**: SQL 特化（schema、分析、生成、执行、校验）

pub mod config;
pub mod core;
pub mod memory;
pub mod observability;
pub mod pipeline;
pub mod sql;

pub use crate::core::{Agent, AgentBuilder, AgentError, QueryOutcome};
pub use crate::sql::SqlAgent;
