//! Schema 缓存：目标数据源的表 / 列快照
//!
//! 值对象，只支持整体替换。JSON 形如 `{"users": ["id", "name"]}`，
//! 列也可写成 `{"name": "age", "data_type": "INT"}`。表名查找不区分大小写。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ColumnRepr")]
pub struct Column {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: None,
        }
    }

    pub fn typed(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: Some(data_type.into()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColumnRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        data_type: Option<String>,
    },
}

impl From<ColumnRepr> for Column {
    fn from(repr: ColumnRepr) -> Self {
        match repr {
            ColumnRepr::Name(name) => Column::new(name),
            ColumnRepr::Full { name, data_type } => Column { name, data_type },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaCache {
    tables: BTreeMap<String, Vec<Column>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 链式添加一张表（仅列名）
    pub fn with_table(mut self, table: impl Into<String>, columns: &[&str]) -> Self {
        self.insert_table(table, columns.iter().map(|c| Column::new(*c)).collect());
        self
    }

    pub fn insert_table(&mut self, table: impl Into<String>, columns: Vec<Column>) {
        self.tables.insert(table.into(), columns);
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// 按字典序返回所有表名
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    /// 不区分大小写地查找表，返回 schema 中的规范名
    pub fn resolve_table(&self, name: &str) -> Option<&str> {
        self.tables
            .keys()
            .find(|t| t.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    pub fn columns(&self, table: &str) -> Option<&[Column]> {
        let key = self.resolve_table(table)?;
        self.tables.get(key).map(Vec::as_slice)
    }

    /// table 中是否存在列 column（均不区分大小写），返回列的规范名
    pub fn resolve_column(&self, table: &str, column: &str) -> Option<&str> {
        self.columns(table)?
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(column))
            .map(|c| c.name.as_str())
    }

    /// 在任意表中查找列，返回第一个匹配的规范列名
    pub fn resolve_any_column(&self, column: &str) -> Option<&str> {
        self.tables
            .values()
            .flat_map(|cols| cols.iter())
            .find(|c| c.name.eq_ignore_ascii_case(column))
            .map(|c| c.name.as_str())
    }

    /// 描述逗号分隔的表列表，如 "users, orders"；不存在的表单独注明
    pub fn describe(&self, tables: &str) -> String {
        let mut blocks = Vec::new();
        for requested in tables.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            match self.resolve_table(requested) {
                Some(name) => {
                    let cols = self
                        .columns(name)
                        .unwrap_or_default()
                        .iter()
                        .map(|c| match &c.data_type {
                            Some(ty) => format!("{} {}", c.name, ty),
                            None => c.name.clone(),
                        })
                        .collect::<Vec<_>>()
                        .join(", ");
                    blocks.push(format!("Table: {}\nColumns: {}", name, cols));
                }
                None => blocks.push(format!("Table '{}' not found", requested)),
            }
        }
        blocks.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_mixed_columns() {
        let schema: SchemaCache = serde_json::from_str(
            r#"{"users": ["id", {"name": "age", "data_type": "INT"}], "orders": []}"#,
        )
        .unwrap();
        assert_eq!(schema.table_names(), vec!["orders", "users"]);
        let cols = schema.columns("USERS").unwrap();
        assert_eq!(cols[0], Column::new("id"));
        assert_eq!(cols[1], Column::typed("age", "INT"));
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let schema = SchemaCache::new().with_table("Users", &["Id", "Name"]);
        assert_eq!(schema.resolve_table("users"), Some("Users"));
        assert_eq!(schema.resolve_column("USERS", "name"), Some("Name"));
        assert_eq!(schema.resolve_any_column("id"), Some("Id"));
        assert!(schema.resolve_table("orders").is_none());
    }

    #[test]
    fn test_describe_lists_columns_and_missing_tables() {
        let schema = SchemaCache::new().with_table("users", &["id", "name", "age"]);
        let text = schema.describe("users, orders");
        assert!(text.contains("Table: users\nColumns: id, name, age"));
        assert!(text.contains("Table 'orders' not found"));
    }
}
