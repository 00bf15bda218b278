//! Durable agent memory: conversation context, user preferences, session
//! activity and performance metrics in one SQLite file.

mod schema;
pub mod store;

pub use store::{
    CleanupReport, ContextEntry, Conversation, MemoryStore, Metric, StoredContext,
    DEFAULT_AGENT_TYPE, DEFAULT_CONTEXT_LIMIT, DEFAULT_METRIC_WINDOW_DAYS,
    DEFAULT_RETENTION_DAYS,
};
