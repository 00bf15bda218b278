//! Connection to a single MCP server over streamable HTTP.
//!
//! Handles the initialize handshake, paginated `tools/list` and `tools/call`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::types::*;
use super::McpError;
use crate::toolsets::ToolServerDescriptor;

const SESSION_HEADER: &str = "mcp-session-id";
const ACCEPT_BOTH: &str = "application/json, text/event-stream";
/// Upper bound on `tools/list` pages followed for one server.
const MAX_LIST_PAGES: usize = 20;
/// Tools can be slow; this is per call.
const TOOL_CALL_TIMEOUT: Duration = Duration::from_secs(120);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct McpClient {
    http: reqwest::Client,
    descriptor: ToolServerDescriptor,
    next_id: AtomicU64,
    session_id: Mutex<Option<String>>,
    server_info: Option<ServerInfo>,
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("server", &self.descriptor.name)
            .field("url", &self.descriptor.redacted_url())
            .finish()
    }
}

impl McpClient {
    /// Open a session: `initialize`, then `notifications/initialized`.
    pub async fn connect(http: reqwest::Client, descriptor: ToolServerDescriptor) -> Result<Self, McpError> {
        info!(server = %descriptor.name, url = %descriptor.redacted_url(), "Connecting to tool server");

        let mut client = McpClient {
            http,
            descriptor,
            next_id: AtomicU64::new(1),
            session_id: Mutex::new(None),
            server_info: None,
        };

        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.into(),
            capabilities: serde_json::json!({}),
            client_info: ClientInfo {
                name: "polyagent".into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
        };
        let result = client.request("initialize", Some(to_value(&client, &params)?), None).await?;
        let init: InitializeResult = serde_json::from_value(result)
            .map_err(|e| client.protocol(format!("bad initialize result: {e}")))?;
        debug!(
            server = %client.descriptor.name,
            protocol = init.protocol_version.as_deref().unwrap_or("?"),
            "Tool server initialized"
        );
        client.server_info = init.server_info;

        client.notify("notifications/initialized").await?;
        Ok(client)
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Every tool the server exposes, following `nextCursor` pages.
    pub async fn list_tools(&self) -> Result<Vec<McpToolDef>, McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = cursor.as_ref().map(|c| serde_json::json!({ "cursor": c }));
            let result = self.request("tools/list", params, None).await?;
            let page: ToolsListResult = serde_json::from_value(result)
                .map_err(|e| self.protocol(format!("bad tools/list result: {e}")))?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => {
                    debug!(server = %self.descriptor.name, tools = tools.len(), "Tools listed");
                    return Ok(tools);
                }
            }
        }

        warn!(server = %self.descriptor.name, "tools/list pagination cut off");
        Ok(tools)
    }

    /// Run a tool and return its text output.
    pub async fn call_tool(&self, name: &str, arguments: serde_json::Value) -> Result<String, McpError> {
        let params = ToolCallParams {
            name: name.into(),
            arguments,
        };
        let result = self
            .request("tools/call", Some(to_value(self, &params)?), Some(TOOL_CALL_TIMEOUT))
            .await?;
        let outcome: ToolCallResult = serde_json::from_value(result)
            .map_err(|e| self.protocol(format!("bad tools/call result: {e}")))?;

        let text = extract_text_content(&outcome.content);
        if outcome.is_error {
            return Err(McpError::ToolFailed(text));
        }
        Ok(text)
    }

    /// End the server-side session. Failures are only logged.
    pub async fn close(&self) {
        let Some(session) = self.current_session() else {
            return;
        };
        let result = self
            .http
            .delete(&self.descriptor.url)
            .header(SESSION_HEADER, session)
            .timeout(CLOSE_TIMEOUT)
            .send()
            .await;
        if let Err(e) = result {
            debug!(server = %self.descriptor.name, error = %e, "Session close failed");
        }
    }

    // ── transport ──────────────────────────────────────────────

    async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
        timeout: Option<Duration>,
    ) -> Result<serde_json::Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = JsonRpcRequest::new(id, method, params);

        let mut builder = self.post().json(&body);
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let response = builder.send().await.map_err(|e| self.http_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::Status {
                server: self.descriptor.name.clone(),
                status: status.as_u16(),
                body,
            });
        }

        if let Some(session) = response.headers().get(SESSION_HEADER).and_then(|v| v.to_str().ok()) {
            self.remember_session(session);
        }

        let is_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));
        let text = response.text().await.map_err(|e| self.http_error(e))?;

        let reply = if is_stream {
            parse_event_stream(&text, id)
                .ok_or_else(|| self.protocol(format!("no response to {method} in event stream")))?
        } else {
            serde_json::from_str::<JsonRpcResponse>(&text)
                .map_err(|e| self.protocol(format!("bad JSON-RPC reply to {method}: {e}")))?
        };

        if let Some(err) = reply.error {
            return Err(McpError::Rpc {
                server: self.descriptor.name.clone(),
                method: method.to_string(),
                code: err.code,
                message: err.message,
            });
        }
        Ok(reply.result.unwrap_or(serde_json::Value::Null))
    }

    async fn notify(&self, method: &str) -> Result<(), McpError> {
        let response = self
            .post()
            .json(&JsonRpcNotification::new(method))
            .send()
            .await
            .map_err(|e| self.http_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(McpError::Status {
                server: self.descriptor.name.clone(),
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }

    fn post(&self) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .post(&self.descriptor.url)
            .header(ACCEPT, HeaderValue::from_static(ACCEPT_BOTH));
        if let Some(session) = self.current_session() {
            builder = builder.header(SESSION_HEADER, session);
        }
        builder
    }

    fn current_session(&self) -> Option<String> {
        self.session_id.lock().ok().and_then(|guard| guard.clone())
    }

    fn remember_session(&self, session: &str) {
        if let Ok(mut guard) = self.session_id.lock() {
            if guard.as_deref() != Some(session) {
                *guard = Some(session.to_string());
            }
        }
    }

    fn http_error(&self, source: reqwest::Error) -> McpError {
        McpError::Http {
            server: self.descriptor.name.clone(),
            source,
        }
    }

    fn protocol(&self, detail: String) -> McpError {
        McpError::Protocol {
            server: self.descriptor.name.clone(),
            detail,
        }
    }
}

fn to_value<T: Serialize>(client: &McpClient, params: &T) -> Result<serde_json::Value, McpError> {
    serde_json::to_value(params).map_err(|e| client.protocol(format!("cannot encode params: {e}")))
}

/// Find the JSON-RPC response with `id` in an SSE body.
///
/// Events are separated by blank lines; multiple `data:` lines in one event
/// are joined with newlines. Server-initiated messages are skipped.
fn parse_event_stream(body: &str, id: u64) -> Option<JsonRpcResponse> {
    let mut data = String::new();
    let mut candidates: Vec<String> = Vec::new();

    for line in body.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            if !data.is_empty() {
                candidates.push(std::mem::take(&mut data));
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    if !data.is_empty() {
        candidates.push(data);
    }

    candidates
        .iter()
        .filter_map(|event| serde_json::from_str::<JsonRpcResponse>(event).ok())
        .find(|reply| reply.id == Some(id))
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
