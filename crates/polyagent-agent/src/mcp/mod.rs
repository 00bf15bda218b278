//! MCP (Model Context Protocol) client over streamable HTTP.
//!
//! JSON-RPC 2.0 requests are POSTed to the server URL; replies arrive either
//! as plain JSON or as a `text/event-stream` whose `data:` lines carry the
//! JSON-RPC response.

pub mod client;
pub mod types;

pub use client::McpClient;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("HTTP error talking to {server}: {source}")]
    Http {
        server: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{server} answered HTTP {status}: {body}")]
    Status {
        server: String,
        status: u16,
        body: String,
    },

    #[error("{server} rejected {method}: {message} (code={code})")]
    Rpc {
        server: String,
        method: String,
        code: i64,
        message: String,
    },

    #[error("protocol error from {server}: {detail}")]
    Protocol { server: String, detail: String },

    /// The tool ran and reported failure.
    #[error("{0}")]
    ToolFailed(String),
}
