//! Polyagent agent core.
//!
//! - **intent** / **toolsets**: keyword classification and intent → tool-server mapping
//! - **mcp**: MCP client over streamable HTTP
//! - **resolver**: cached, breaker-guarded tool resolution
//! - **handler**: the request pipeline, parameterized by a **domains** profile

pub mod context;
pub mod domains;
pub mod handler;
pub mod intent;
pub mod mcp;
pub mod resolver;
pub mod session_cache;
pub mod tools;
pub mod toolsets;

pub use context::ContextBuilder;
pub use domains::{find_profile, DomainProfile, PROFILES};
pub use handler::{HandlerError, MemoryStatus, Reply, RequestHandler};
pub use intent::{KeywordTable, GENERAL_INTENT};
pub use resolver::{Resolution, ResolveFailure, ResolverState, ToolResolver};
pub use session_cache::{AgentSession, SessionCache};
pub use tools::{Tool, ToolRegistry};
pub use toolsets::{ServerCatalogue, ToolServerDescriptor, ToolSetRegistry};
