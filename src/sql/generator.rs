//! SQL 生成策略
//!
//! SqlGenerator 是可替换的外部能力（真实实现可接 LLM 或方言生成器）；
//! TemplateSqlGenerator 只是最小的模板实现：单表 SELECT + WHERE + LIMIT。

use async_trait::async_trait;

use crate::pipeline::{Constraint, ConstraintOp, Understanding};
use crate::sql::SchemaCache;

#[async_trait]
pub trait SqlGenerator: Send + Sync {
    /// 由理解结果与 schema 生成 SQL 文本
    async fn generate(
        &self,
        understanding: &Understanding,
        schema: &SchemaCache,
    ) -> Result<String, String>;
}

/// 模板生成器：取理解结果中的第一张表，选出提到的列（否则 *），约束拼成 WHERE
#[derive(Debug, Clone)]
pub struct TemplateSqlGenerator {
    top_k: usize,
}

impl TemplateSqlGenerator {
    /// top_k 为 0 时不加 LIMIT
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }
}

impl Default for TemplateSqlGenerator {
    fn default() -> Self {
        Self::new(20)
    }
}

/// 只有有限的十进制数字面量不加引号；nan / inf 之类按字符串处理
fn is_numeric_literal(value: &str) -> bool {
    let plain = value
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | 'e' | 'E'));
    plain
        && value.chars().any(|c| c.is_ascii_digit())
        && value.parse::<f64>().map(f64::is_finite).unwrap_or(false)
}

fn sql_literal(value: &str) -> String {
    if is_numeric_literal(value) {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "''"))
    }
}

fn render_condition(c: &Constraint) -> String {
    match c.op {
        ConstraintOp::Like => format!("{} LIKE '{}'", c.column, c.value.replace('\'', "''")),
        op => format!("{} {} {}", c.column, op.as_sql(), sql_literal(&c.value)),
    }
}

#[async_trait]
impl SqlGenerator for TemplateSqlGenerator {
    async fn generate(
        &self,
        understanding: &Understanding,
        schema: &SchemaCache,
    ) -> Result<String, String> {
        let table = understanding
            .tables
            .iter()
            .find_map(|t| schema.resolve_table(t))
            .ok_or_else(|| "no known table matches the question".to_string())?;

        let mut columns: Vec<&str> = Vec::new();
        for entity in &understanding.entities {
            if let Some(col) = schema.resolve_column(table, entity) {
                if !columns.contains(&col) {
                    columns.push(col);
                }
            }
        }
        let projection = if columns.is_empty() {
            "*".to_string()
        } else {
            columns.join(", ")
        };

        let conditions: Vec<String> = understanding
            .constraints
            .iter()
            .filter(|c| schema.resolve_column(table, &c.column).is_some())
            .map(render_condition)
            .collect();

        let mut sql = format!("SELECT {} FROM {}", projection, table);
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        if self.top_k > 0 {
            sql.push_str(&format!(" LIMIT {}", self.top_k));
        }
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Intent;

    fn schema() -> SchemaCache {
        SchemaCache::new().with_table("users", &["id", "name", "age"])
    }

    #[tokio::test]
    async fn test_select_all_when_no_columns_mentioned() {
        let mut u = Understanding::new(Intent::SqlQuery);
        u.tables.insert("users".into());
        let sql = TemplateSqlGenerator::new(20).generate(&u, &schema()).await.unwrap();
        assert_eq!(sql, "SELECT * FROM users LIMIT 20");
    }

    #[tokio::test]
    async fn test_projection_and_where_clause() {
        let mut u = Understanding::new(Intent::SqlQuery);
        u.tables.insert("users".into());
        u.entities = vec!["name".into(), "Ada".into()];
        u.constraints = vec![
            Constraint {
                column: "age".into(),
                op: ConstraintOp::Gt,
                value: "30".into(),
            },
            Constraint {
                column: "name".into(),
                op: ConstraintOp::Eq,
                value: "O'Hara".into(),
            },
        ];
        let sql = TemplateSqlGenerator::new(0).generate(&u, &schema()).await.unwrap();
        assert_eq!(
            sql,
            "SELECT name FROM users WHERE age > 30 AND name = 'O''Hara'"
        );
    }

    #[tokio::test]
    async fn test_float_words_are_quoted() {
        let mut u = Understanding::new(Intent::SqlQuery);
        u.tables.insert("users".into());
        for word in ["nan", "inf", "Infinity"] {
            u.constraints = vec![Constraint {
                column: "name".into(),
                op: ConstraintOp::Eq,
                value: word.into(),
            }];
            let sql = TemplateSqlGenerator::new(0).generate(&u, &schema()).await.unwrap();
            assert_eq!(sql, format!("SELECT * FROM users WHERE name = '{}'", word));
        }
        assert!(is_numeric_literal("-1.5e3"));
        assert!(!is_numeric_literal("1e999"));
        assert!(!is_numeric_literal("-"));
    }

    #[tokio::test]
    async fn test_no_table_is_an_error() {
        let u = Understanding::new(Intent::SqlQuery);
        let err = TemplateSqlGenerator::default()
            .generate(&u, &SchemaCache::new())
            .await
            .unwrap_err();
        assert!(err.contains("no known table"));
    }
}
