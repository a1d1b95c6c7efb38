//! SQL 执行策略
//!
//! SqlExecutor 抽象对数据源的调用（可能是远程调用）；本 crate 不连接真实数据库，
//! DetachedExecutor 为未接入数据源时的占位实现，总是返回空结果集。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 查询结果：列名 + 行
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl QueryRows {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<QueryRows, String>;
}

/// 占位执行器：返回空的 rows / columns
#[derive(Debug, Default, Clone)]
pub struct DetachedExecutor;

#[async_trait]
impl SqlExecutor for DetachedExecutor {
    async fn execute(&self, _sql: &str) -> Result<QueryRows, String> {
        Ok(QueryRows::default())
    }
}
