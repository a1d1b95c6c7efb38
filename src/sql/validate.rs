//! 查询校验与优化
//!
//! validate_query 把问题作为数据（ValidationReport.errors）返回，不抛错；
//! 只读模式下拒绝修改数据的语句。optimize_query 只做规整：合并空白、去掉结尾分号、
//! 给缺少 LIMIT 的 SELECT 补上 LIMIT top_k。

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::core::ValidationError;
use crate::sql::SchemaCache;

/// 只读模式下禁止的语句关键字
pub const MUTATING_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "TRUNCATE", "CREATE", "MERGE", "GRANT",
    "REVOKE",
];

static WORD_RE: OnceLock<Regex> = OnceLock::new();
static TABLE_REF_RE: OnceLock<Regex> = OnceLock::new();

fn word_re() -> &'static Regex {
    WORD_RE.get_or_init(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("word regex"))
}

fn table_ref_re() -> &'static Regex {
    TABLE_REF_RE.get_or_init(|| {
        Regex::new(
            r#"(?i)\b(?:from|join|into|update)\s+((?:"[^"]+"|`[^`]+`|[A-Za-z_][A-Za-z0-9_]*)(?:\.(?:"[^"]+"|`[^`]+`|[A-Za-z_][A-Za-z0-9_]*))*)"#,
        )
        .expect("table reference regex")
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// 错误信息用 "; " 拼接
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// 单引号字符串字面量内的字符替换为空格（保留引号）；双引号 / 反引号是标识符，原样保留
fn mask_literals(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut in_literal = false;
    for c in sql.chars() {
        if c == '\'' {
            in_literal = !in_literal;
            out.push(c);
        } else if in_literal {
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    out
}

fn unquote_identifier(name: &str) -> &str {
    name.trim_matches(|c| c == '"' || c == '`')
}

/// SQL 中 FROM / JOIN / INTO / UPDATE 后引用的表（去掉 schema 前缀）
pub fn referenced_tables(sql: &str) -> Vec<String> {
    let masked = mask_literals(sql);
    let mut tables: Vec<String> = Vec::new();
    for caps in table_ref_re().captures_iter(&masked) {
        if let Some(m) = caps.get(1) {
            let last = m.as_str().rsplit('.').next().unwrap_or(m.as_str());
            let name = unquote_identifier(last).to_string();
            if !name.is_empty() && !tables.contains(&name) {
                tables.push(name);
            }
        }
    }
    tables
}

/// 校验 SQL；schema 为空（未连接）时跳过表存在性检查
pub fn validate_query(sql: &str, schema: &SchemaCache, read_only: bool) -> ValidationReport {
    let trimmed = sql.trim().trim_end_matches(';').trim();
    if trimmed.is_empty() {
        return ValidationReport::from_errors(vec![ValidationError::EmptyQuery]);
    }

    let masked = mask_literals(trimmed);
    let mut errors = Vec::new();

    if masked.contains(';') {
        errors.push(ValidationError::MultipleStatements);
    }

    if read_only {
        let mutating = word_re()
            .find_iter(&masked)
            .map(|m| m.as_str().to_ascii_uppercase())
            .find(|w| MUTATING_KEYWORDS.contains(&w.as_str()));
        if let Some(keyword) = mutating {
            errors.push(ValidationError::MutatingStatement { keyword });
        }
    }

    if !schema.is_empty() {
        let tables = referenced_tables(trimmed);
        if tables.is_empty() {
            errors.push(ValidationError::MissingTable);
        }
        for table in tables {
            if schema.resolve_table(&table).is_none() {
                errors.push(ValidationError::UnknownTable { table });
            }
        }
    }

    ValidationReport::from_errors(errors)
}

/// 合并引号外的连续空白
fn collapse_whitespace(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut quote: Option<char> = None;
    let mut pending_space = false;
    for c in sql.trim().chars() {
        if quote.is_none() && c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        match quote {
            Some(q) if c == q => quote = None,
            None if c == '\'' || c == '"' => quote = Some(c),
            _ => {}
        }
        out.push(c);
    }
    out
}

pub fn optimize_query(sql: &str, top_k: usize) -> String {
    let mut out = collapse_whitespace(sql);
    while out.ends_with(';') {
        out.pop();
        out.truncate(out.trim_end().len());
    }

    let masked = mask_literals(&out);
    let is_select = masked
        .split_whitespace()
        .next()
        .map(|w| w.eq_ignore_ascii_case("select"))
        .unwrap_or(false);
    let has_limit = word_re()
        .find_iter(&masked)
        .any(|m| m.as_str().eq_ignore_ascii_case("limit"));
    if top_k > 0 && is_select && !has_limit {
        out.push_str(&format!(" LIMIT {}", top_k));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> SchemaCache {
        SchemaCache::new().with_table("users", &["id", "name", "age"])
    }

    #[test]
    fn test_valid_select() {
        let report = validate_query("SELECT * FROM users LIMIT 20;", &schema(), true);
        assert!(report.is_valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_mutating_statement_rejected_in_read_only() {
        let report = validate_query("DELETE FROM users", &schema(), true);
        assert!(!report.is_valid);
        assert_eq!(
            report.errors,
            vec![ValidationError::MutatingStatement {
                keyword: "DELETE".into()
            }]
        );
        assert!(validate_query("DELETE FROM users", &schema(), false).is_valid);
    }

    #[test]
    fn test_keywords_inside_literals_are_ignored() {
        let report = validate_query(
            "SELECT * FROM users WHERE name = 'drop; table'",
            &schema(),
            true,
        );
        assert!(report.is_valid, "{:?}", report.errors);
    }

    #[test]
    fn test_unknown_table_and_multiple_statements() {
        let report = validate_query("SELECT * FROM orders; SELECT 1", &schema(), true);
        assert!(report.errors.contains(&ValidationError::MultipleStatements));
        assert!(report.errors.contains(&ValidationError::UnknownTable {
            table: "orders".into()
        }));
        assert!(report.summary().contains("Unknown table 'orders'"));
    }

    #[test]
    fn test_quoted_identifiers_resolve_to_tables() {
        let report = validate_query(r#"SELECT * FROM "users""#, &schema(), true);
        assert!(report.is_valid, "{:?}", report.errors);
        assert!(validate_query("SELECT `name` FROM `users`", &schema(), true).is_valid);
        assert_eq!(
            referenced_tables(r#"SELECT * FROM "public"."users" JOIN "orders" o ON 1 = 1"#),
            vec!["users".to_string(), "orders".to_string()]
        );
    }

    #[test]
    fn test_empty_query() {
        let report = validate_query("  ; ", &schema(), true);
        assert_eq!(report.errors, vec![ValidationError::EmptyQuery]);
    }

    #[test]
    fn test_table_checks_skipped_without_schema() {
        assert!(validate_query("SELECT * FROM anything", &SchemaCache::new(), true).is_valid);
    }

    #[test]
    fn test_optimize_normalizes_and_limits() {
        assert_eq!(
            optimize_query("  select *\n   from users ;;", 20),
            "select * from users LIMIT 20"
        );
        assert_eq!(
            optimize_query("SELECT * FROM users LIMIT 5", 20),
            "SELECT * FROM users LIMIT 5"
        );
        assert_eq!(
            optimize_query("SELECT * FROM users WHERE name = 'a   b'", 0),
            "SELECT * FROM users WHERE name = 'a   b'"
        );
    }

    #[test]
    fn test_referenced_tables_strip_schema_prefix() {
        assert_eq!(
            referenced_tables("SELECT * FROM public.users u JOIN orders o ON o.user_id = u.id"),
            vec!["users".to_string(), "orders".to_string()]
        );
    }
}
