//! 情景记忆持久化：存储 trait 与进程内 / JSON 文件 / SQLite 三种实现

pub mod file_store;
pub mod sqlite_store;
pub mod store;

pub use file_store::JsonFileStore;
pub use sqlite_store::SqliteMemoryStore;
pub use store::{InMemoryStore, MemoryStore};
