//! Seams between the resolver and the network.
//!
//! The resolver only sees [`ToolConnector`] and [`ToolSession`]; the MCP
//! implementations live here, and tests plug in their own.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::debug;

use crate::mcp::{McpClient, McpError};
use crate::tools::{RemoteTool, Tool, ToolSet};
use crate::toolsets::ToolServerDescriptor;

/// Budget for closing clients nobody is waiting on.
const ABANDONED_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Live connections to one ordered group of tool servers.
#[async_trait]
pub trait ToolSession: Send + Sync {
    /// Fetch the current tools of every server in the group.
    async fn list_tools(&self) -> Result<ToolSet, McpError>;

    /// Release server-side state. Best effort.
    async fn close(&self) {}
}

/// Opens a [`ToolSession`] for a group of servers.
#[async_trait]
pub trait ToolConnector: Send + Sync {
    async fn connect(&self, servers: &[ToolServerDescriptor]) -> Result<Arc<dyn ToolSession>, McpError>;
}

/// Close `session` on a background task, giving up after `limit`.
///
/// Outside a Tokio runtime the session is simply dropped.
pub(crate) fn close_detached(session: Arc<dyn ToolSession>, limit: Duration) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        return;
    };
    runtime.spawn(async move {
        if timeout(limit, session.close()).await.is_err() {
            debug!(after = ?limit, "Abandoned session close timed out");
        }
    });
}

/// Holds a freshly opened session until it is handed over.
///
/// If the holder is dropped first (an error, or a timeout cancelling the
/// surrounding future) the session is closed in the background.
pub(crate) struct CloseOnDrop {
    session: Arc<dyn ToolSession>,
    limit: Duration,
    armed: bool,
}

impl CloseOnDrop {
    pub(crate) fn new(session: Arc<dyn ToolSession>, limit: Duration) -> Self {
        Self {
            session,
            limit,
            armed: true,
        }
    }

    pub(crate) fn session(&self) -> &Arc<dyn ToolSession> {
        &self.session
    }

    pub(crate) fn disarm(mut self) -> Arc<dyn ToolSession> {
        self.armed = false;
        Arc::clone(&self.session)
    }
}

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        if self.armed {
            close_detached(Arc::clone(&self.session), self.limit);
        }
    }
}

// ─────────────────────────────────────────────
// MCP implementation
// ─────────────────────────────────────────────

/// Connects over MCP streamable HTTP, all servers of a group in parallel.
#[derive(Clone, Debug, Default)]
pub struct McpConnector {
    http: reqwest::Client,
}

impl McpConnector {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ToolConnector for McpConnector {
    async fn connect(&self, servers: &[ToolServerDescriptor]) -> Result<Arc<dyn ToolSession>, McpError> {
        let mut pending = JoinSet::new();
        for (index, descriptor) in servers.iter().cloned().enumerate() {
            let http = self.http.clone();
            pending.spawn(async move { (index, McpClient::connect(http, descriptor).await) });
        }

        let mut opened = OpenedClients(vec![None; servers.len()]);
        let mut failure: Option<McpError> = None;
        while let Some(joined) = pending.join_next().await {
            match joined {
                Ok((index, Ok(client))) => opened.0[index] = Some(Arc::new(client)),
                Ok((_, Err(e))) => {
                    failure.get_or_insert(e);
                }
                Err(e) => {
                    failure.get_or_insert(McpError::Protocol {
                        server: "connector".into(),
                        detail: e.to_string(),
                    });
                }
            }
        }

        // Half-open groups are never cached; dropping `opened` closes them.
        if let Some(e) = failure {
            return Err(e);
        }

        let clients = std::mem::take(&mut opened.0).into_iter().flatten().collect();
        Ok(Arc::new(McpSession { clients }))
    }
}

/// Clients of a group still being opened, in registry order.
///
/// Whatever is left here when dropped is closed in the background, so a
/// group cut short by an error or a cancelled connect does not leak
/// server-side sessions.
struct OpenedClients(Vec<Option<Arc<McpClient>>>);

impl Drop for OpenedClients {
    fn drop(&mut self) {
        let clients: Vec<Arc<McpClient>> = std::mem::take(&mut self.0).into_iter().flatten().collect();
        if !clients.is_empty() {
            debug!(clients = clients.len(), "Closing clients of an unfinished group");
            close_detached(Arc::new(McpSession { clients }), ABANDONED_CLOSE_TIMEOUT);
        }
    }
}

/// One MCP client per server, in registry order.
pub struct McpSession {
    clients: Vec<Arc<McpClient>>,
}

#[async_trait]
impl ToolSession for McpSession {
    async fn list_tools(&self) -> Result<ToolSet, McpError> {
        let mut tools: ToolSet = Vec::new();
        for client in &self.clients {
            for def in client.list_tools().await? {
                tools.push(Arc::new(RemoteTool::new(Arc::clone(client), def)) as Arc<dyn Tool>);
            }
        }
        debug!(servers = self.clients.len(), tools = tools.len(), "Tool list fetched");
        Ok(tools)
    }

    async fn close(&self) {
        for client in &self.clients {
            client.close().await;
        }
    }
}
