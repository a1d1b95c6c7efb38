//! 查询分析：实体 / 约束 / 表识别
//!
//! 三个函数都是 (query, schema) 的纯函数，无副作用，可独立测试。
//! 只做基于词法和 schema 匹配的轻量分析，不是真正的自然语言理解。

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::pipeline::{Constraint, ConstraintOp};
use crate::sql::SchemaCache;

static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
static CONSTRAINT_RE: OnceLock<Regex> = OnceLock::new();

/// 引号字面量或标识符词
fn token_re() -> &'static Regex {
    TOKEN_RE.get_or_init(|| {
        Regex::new(r#"'([^']*)'|"([^"]*)"|([A-Za-z_][A-Za-z0-9_]*)"#).expect("token regex")
    })
}

/// column <op> value，op 支持符号与英文短语
fn constraint_re() -> &'static Regex {
    CONSTRAINT_RE.get_or_init(|| {
        Regex::new(
            r#"(?i)\b([a-z_][a-z0-9_]*)(?:\s*(>=|<=|!=|<>|=|>|<)\s*|\s+((?:is\s+)?(?:greater\s+than\s+or\s+equal\s+to|less\s+than\s+or\s+equal\s+to|greater\s+than|more\s+than|less\s+than|at\s+least|at\s+most|not\s+equal\s+to|equal\s+to|equals|over|above|under|below|like|contains)|is\s+not|is)\s+)('[^']*'|"[^"]*"|[a-z0-9_.@%-]+)"#,
        )
        .expect("constraint regex")
    })
}

enum Token<'a> {
    Literal(&'a str),
    Word(&'a str),
}

fn tokens(query: &str) -> impl Iterator<Item = Token<'_>> {
    token_re().captures_iter(query).filter_map(|caps| {
        if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
            Some(Token::Literal(m.as_str()))
        } else {
            caps.get(3).map(|m| Token::Word(m.as_str()))
        }
    })
}

/// 词与表名匹配：完全相同或单复数（user / users、box / boxes）
fn names_match(word: &str, name: &str) -> bool {
    let w = word.to_ascii_lowercase();
    let n = name.to_ascii_lowercase();
    w == n || format!("{w}s") == n || format!("{n}s") == w || format!("{w}es") == n
}

/// 找出查询中提到的表（schema 规范名），引号内的文本不参与匹配
pub fn identify_tables(query: &str, schema: &SchemaCache) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    if schema.is_empty() {
        return found;
    }
    for token in tokens(query) {
        let Token::Word(word) = token else {
            continue;
        };
        for table in schema.table_names() {
            if names_match(word, table) {
                found.insert(table.to_string());
            }
        }
    }
    found
}

/// 按出现顺序抽取实体：schema 中存在的列名，以及引号内的字面量；去重
pub fn extract_entities(query: &str, schema: &SchemaCache) -> Vec<String> {
    let mut entities: Vec<String> = Vec::new();
    for token in tokens(query) {
        let entity = match token {
            Token::Literal(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Token::Literal(_) => None,
            Token::Word(word) => schema.resolve_any_column(word).map(str::to_string),
        };
        if let Some(e) = entity {
            if !entities.contains(&e) {
                entities.push(e);
            }
        }
    }
    entities
}

/// 解析比较短语，返回 (op, 是否为 contains)
fn parse_op(raw: &str) -> Option<(ConstraintOp, bool)> {
    let phrase = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase();
    if phrase == "is not" {
        return Some((ConstraintOp::Ne, false));
    }
    let phrase = phrase.strip_prefix("is ").unwrap_or(&phrase);
    let op = match phrase {
        ">=" | "greater than or equal to" | "at least" => ConstraintOp::Ge,
        "<=" | "less than or equal to" | "at most" => ConstraintOp::Le,
        ">" | "greater than" | "more than" | "over" | "above" => ConstraintOp::Gt,
        "<" | "less than" | "under" | "below" => ConstraintOp::Lt,
        "!=" | "<>" | "not equal to" => ConstraintOp::Ne,
        "=" | "is" | "equals" | "equal to" => ConstraintOp::Eq,
        "like" => ConstraintOp::Like,
        "contains" => return Some((ConstraintOp::Like, true)),
        _ => return None,
    };
    Some((op, false))
}

fn clean_value(raw: &str) -> String {
    let quoted = (raw.starts_with('\'') && raw.ends_with('\'') && raw.len() >= 2)
        || (raw.starts_with('"') && raw.ends_with('"') && raw.len() >= 2);
    if quoted {
        raw[1..raw.len() - 1].to_string()
    } else {
        raw.trim_end_matches('.').to_string()
    }
}

/// 抽取 "列 比较符 值" 形式的约束；列必须存在于 schema 中
pub fn extract_constraints(query: &str, schema: &SchemaCache) -> Vec<Constraint> {
    let mut constraints = Vec::new();
    if schema.is_empty() {
        return constraints;
    }
    for caps in constraint_re().captures_iter(query) {
        let Some(column) = caps.get(1).and_then(|m| schema.resolve_any_column(m.as_str())) else {
            continue;
        };
        let Some(raw_op) = caps.get(2).or_else(|| caps.get(3)) else {
            continue;
        };
        let Some((op, contains)) = parse_op(raw_op.as_str()) else {
            continue;
        };
        let Some(raw_value) = caps.get(4) else {
            continue;
        };
        let value = clean_value(raw_value.as_str());
        if value.is_empty() {
            continue;
        }
        constraints.push(Constraint {
            column: column.to_string(),
            op,
            value: if contains { format!("%{}%", value) } else { value },
        });
    }
    constraints
}
