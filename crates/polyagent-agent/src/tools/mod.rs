//! Agent tools: the `Tool` trait, the per-session registry, and the adapter
//! that exposes remote MCP tools through the trait.

pub mod base;
pub mod registry;
pub mod remote;

pub use base::{Tool, ToolSet};
pub use registry::ToolRegistry;
pub use remote::RemoteTool;
