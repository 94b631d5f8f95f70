//! 记忆层：按 query_id 隔离的跨步会话存储

pub mod manager;

pub use manager::{InformationMemory, MemoryManager};
