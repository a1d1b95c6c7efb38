//! SQL 特化：schema 缓存、查询分析、生成 / 执行策略、校验与 SQL 行为

pub mod agent;
pub mod analysis;
pub mod executor;
pub mod generator;
pub mod schema;
pub mod validate;

pub use agent::{SqlAgent, SqlBehavior, SqlSettings};
pub use executor::{DetachedExecutor, QueryRows, SqlExecutor};
pub use generator::{SqlGenerator, TemplateSqlGenerator};
pub use schema::{Column, SchemaCache};
pub use validate::{optimize_query, referenced_tables, validate_query, ValidationReport};
