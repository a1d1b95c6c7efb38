//! 能力描述：Agent 向调用方声明的特性开关
//!
//! 构造时由基础能力集与变体覆盖项合并一次，之后只读；调用方用 supports 判断可安全调用的操作。

use std::collections::BTreeMap;

use serde::Serialize;

pub const QUERY_GENERATION: &str = "queryGeneration";
pub const QUERY_EXECUTION: &str = "queryExecution";
pub const LEARNING: &str = "learning";
pub const EXPLANATION: &str = "explanation";
pub const SQL_GENERATION: &str = "sqlGeneration";
pub const SCHEMA_UNDERSTANDING: &str = "schemaUnderstanding";
pub const QUERY_OPTIMIZATION: &str = "queryOptimization";

/// 不可变能力集（名称 → 是否支持）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Capabilities {
    flags: BTreeMap<String, bool>,
}

impl Capabilities {
    /// 通用 Agent 的基础能力集
    pub fn base() -> Self {
        Self::from_pairs(&[
            (QUERY_GENERATION, true),
            (QUERY_EXECUTION, true),
            (LEARNING, true),
            (EXPLANATION, true),
        ])
    }

    pub fn from_pairs(pairs: &[(&str, bool)]) -> Self {
        Self {
            flags: pairs
                .iter()
                .map(|(name, on)| (name.to_string(), *on))
                .collect(),
        }
    }

    /// 在 self 之上叠加 overrides：新增键加入，同名键取 overrides 的值；返回新值，不修改 self
    pub fn merged_with(&self, overrides: &Capabilities) -> Self {
        let mut flags = self.flags.clone();
        for (name, on) in &overrides.flags {
            flags.insert(name.clone(), *on);
        }
        Self { flags }
    }

    pub fn supports(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        self.flags.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.flags.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}
