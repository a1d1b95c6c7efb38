//! 核心层：错误类型、能力描述、编排器与构建器

pub mod builder;
pub mod capabilities;
pub mod error;
pub mod orchestrator;

pub use builder::{load_schema_file, AgentBuilder};
pub use capabilities::Capabilities;
pub use error::{AgentError, ErrorKind, LearningWarning, StorageError, ValidationError};
pub use orchestrator::{Agent, AgentContext, InitializeReport, QueryOutcome};
