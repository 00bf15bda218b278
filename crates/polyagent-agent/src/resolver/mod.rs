//! Tool resolver: intent → live tool set, with a per-key cache and a
//! process-wide fallback breaker.
//!
//! Resolution order for one intent:
//!
//! 1. Breaker open → [`Resolution::Fallback`], no network.
//! 2. Empty server subset → [`Resolution::Unmapped`].
//! 3. Cached session → warm re-list under the warm timeout. Failure evicts.
//! 4. Cold connect + list under the cold timeout. Failure trips the breaker.
//!
//! Remote failures never escape `resolve`; they are reported through the
//! returned [`Resolution`]. Closing an evicted session is bounded by the warm
//! timeout, so a stalled server cannot hold a key's lock.

pub mod connector;

use connector::CloseOnDrop;
pub use connector::{McpConnector, McpSession, ToolConnector, ToolSession};

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use polyagent_core::config::schema::ResolverConfig;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::mcp::McpError;
use crate::tools::ToolSet;
use crate::toolsets::{ServerCatalogue, ToolServerDescriptor, ToolSetRegistry};

// ─────────────────────────────────────────────
// Outcomes
// ─────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ResolveFailure {
    #[error("timed out after {after:?} resolving {key}")]
    Timeout { key: String, after: Duration },

    #[error(transparent)]
    Connect(#[from] McpError),
}

/// Result of one resolution. Only `Resolved` and `Refreshed` carry tools.
pub enum Resolution {
    /// Fresh connection.
    Resolved(ToolSet),
    /// Cached connection that passed the liveness check.
    Refreshed(ToolSet),
    /// Breaker open; nothing was attempted.
    Fallback,
    /// The intent maps to no known server.
    Unmapped,
    /// This call failed and tripped the breaker.
    Failed(ResolveFailure),
}

impl Resolution {
    pub fn tools(&self) -> &[Arc<dyn crate::tools::Tool>] {
        match self {
            Resolution::Resolved(tools) | Resolution::Refreshed(tools) => tools,
            _ => &[],
        }
    }

    pub fn into_tools(self) -> ToolSet {
        match self {
            Resolution::Resolved(tools) | Resolution::Refreshed(tools) => tools,
            _ => Vec::new(),
        }
    }

    /// True when the caller is running without tools because of a failure.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Resolution::Fallback | Resolution::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Resolution::Resolved(_) => "resolved",
            Resolution::Refreshed(_) => "refreshed",
            Resolution::Fallback => "fallback",
            Resolution::Unmapped => "unmapped",
            Resolution::Failed(_) => "failed",
        }
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Failed(e) => f.debug_tuple("Failed").field(e).finish(),
            other => write!(f, "{}({} tools)", other.label(), other.tools().len()),
        }
    }
}

// ─────────────────────────────────────────────
// Shared state
// ─────────────────────────────────────────────

/// Cache identity: the intent plus the exact server group it maps to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    intent: String,
    servers: Vec<String>,
}

impl CacheKey {
    pub fn new(intent: &str, servers: &[ToolServerDescriptor]) -> Self {
        Self {
            intent: intent.to_string(),
            servers: servers.iter().map(|d| d.name.clone()).collect(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.intent, self.servers.join(","))
    }
}

struct CacheEntry {
    session: Arc<dyn ToolSession>,
    tools: ToolSet,
}

type Slot = Arc<AsyncMutex<Option<CacheEntry>>>;

/// Breaker flag, cached sessions and per-key locks.
///
/// One instance per process in production; tests build their own.
#[derive(Default)]
pub struct ResolverState {
    fallback: AtomicBool,
    slots: std::sync::Mutex<HashMap<CacheKey, Slot>>,
}

impl ResolverState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fallback_active(&self) -> bool {
        self.fallback.load(Ordering::SeqCst)
    }

    fn trip(&self) {
        self.fallback.store(true, Ordering::SeqCst);
    }

    fn slot(&self, key: &CacheKey) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    fn snapshot(&self) -> Vec<(CacheKey, Slot)> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.iter().map(|(k, s)| (k.clone(), Arc::clone(s))).collect()
    }

    fn drain(&self) -> Vec<(CacheKey, Slot)> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.drain().collect()
    }
}

// ─────────────────────────────────────────────
// Resolver
// ─────────────────────────────────────────────

pub struct ToolResolver {
    state: Arc<ResolverState>,
    connector: Arc<dyn ToolConnector>,
    catalogue: Arc<ServerCatalogue>,
    warm_timeout: Duration,
    cold_timeout: Duration,
}

impl ToolResolver {
    pub fn new(
        state: Arc<ResolverState>,
        connector: Arc<dyn ToolConnector>,
        catalogue: Arc<ServerCatalogue>,
        config: &ResolverConfig,
    ) -> Self {
        Self {
            state,
            connector,
            catalogue,
            warm_timeout: Duration::from_secs(config.warm_check_timeout_secs),
            cold_timeout: Duration::from_secs(config.cold_fetch_timeout_secs),
        }
    }

    /// Resolver over MCP with a fresh state.
    pub fn with_mcp(catalogue: ServerCatalogue, config: &ResolverConfig) -> Self {
        Self::new(
            Arc::new(ResolverState::new()),
            Arc::new(McpConnector::new()),
            Arc::new(catalogue),
            config,
        )
    }

    /// Override both timeouts.
    pub fn with_timeouts(mut self, warm: Duration, cold: Duration) -> Self {
        self.warm_timeout = warm;
        self.cold_timeout = cold;
        self
    }

    pub fn state(&self) -> &Arc<ResolverState> {
        &self.state
    }

    pub fn catalogue(&self) -> &ServerCatalogue {
        &self.catalogue
    }

    pub fn fallback_active(&self) -> bool {
        self.state.fallback_active()
    }

    pub async fn resolve(&self, intent: &str, registry: &ToolSetRegistry) -> Resolution {
        if self.state.fallback_active() {
            debug!(intent, "Fallback active, skipping tool servers");
            return Resolution::Fallback;
        }

        let servers = registry.subset(intent, &self.catalogue);
        if servers.is_empty() {
            debug!(intent, "No tool servers mapped");
            return Resolution::Unmapped;
        }

        let key = CacheKey::new(intent, &servers);
        let slot = self.state.slot(&key);
        let mut entry = slot.lock().await;

        // Another task may have tripped the breaker while we waited.
        if self.state.fallback_active() {
            return Resolution::Fallback;
        }

        if let Some(session) = entry.as_ref().map(|cached| Arc::clone(&cached.session)) {
            let warm = timeout(self.warm_timeout, session.list_tools()).await;
            match warm {
                Ok(Ok(tools)) => {
                    debug!(key = %key, tools = tools.len(), "Cached tool session alive");
                    if let Some(cached) = entry.as_mut() {
                        cached.tools = tools.clone();
                    }
                    return Resolution::Refreshed(tools);
                }
                Ok(Err(e)) => warn!(key = %key, error = %e, "Cached tool session failed, reconnecting"),
                Err(_) => warn!(key = %key, "Cached tool session timed out, reconnecting"),
            }
            if let Some(stale) = entry.take() {
                self.close_bounded(&key, stale.session).await;
            }
        }

        // A session opened here but not handed back is closed on drop,
        // including when the cold timeout cancels this future.
        let cold = async {
            let opened = CloseOnDrop::new(self.connector.connect(&servers).await?, self.warm_timeout);
            let tools = opened.session().list_tools().await?;
            Ok::<_, McpError>((opened, tools))
        };

        match timeout(self.cold_timeout, cold).await {
            Ok(Ok((opened, tools))) => {
                info!(key = %key, tools = tools.len(), "Tool servers connected");
                *entry = Some(CacheEntry {
                    session: opened.disarm(),
                    tools: tools.clone(),
                });
                Resolution::Resolved(tools)
            }
            Ok(Err(e)) => {
                self.state.trip();
                error!(key = %key, error = %e, "Tool servers unavailable, fallback mode on");
                Resolution::Failed(ResolveFailure::Connect(e))
            }
            Err(_) => {
                self.state.trip();
                error!(key = %key, after = ?self.cold_timeout, "Tool servers timed out, fallback mode on");
                Resolution::Failed(ResolveFailure::Timeout {
                    key: key.to_string(),
                    after: self.cold_timeout,
                })
            }
        }
    }

    /// Clear the breaker and drop every cached session.
    pub async fn reset_fallback(&self) {
        let mut closed = 0usize;
        for (key, slot) in self.state.drain() {
            let stale = slot.lock().await.take();
            if let Some(entry) = stale {
                self.close_bounded(&key, entry.session).await;
                closed += 1;
            }
        }
        self.state.fallback.store(false, Ordering::SeqCst);
        info!(closed, "Fallback reset, tool cache cleared");
    }

    /// Liveness of every cached session, keyed by `intent[servers]`.
    ///
    /// Each key gets its own warm timeout for the lock and again for the
    /// check. A key whose lock is held that long (a connect in flight) is
    /// reported as `ERROR: busy`.
    pub async fn check_cached_connections(&self) -> BTreeMap<String, String> {
        let mut report = BTreeMap::new();
        for (key, slot) in self.state.snapshot() {
            let Ok(entry) = timeout(self.warm_timeout, slot.lock()).await else {
                report.insert(key.to_string(), "ERROR: busy".to_string());
                continue;
            };
            let Some(cached) = entry.as_ref() else {
                continue;
            };
            let status = match timeout(self.warm_timeout, cached.session.list_tools()).await {
                Ok(Ok(_)) => "OK".to_string(),
                Ok(Err(e)) => format!("ERROR: {e}"),
                Err(_) => format!("ERROR: timed out after {:?}", self.warm_timeout),
            };
            report.insert(key.to_string(), status);
        }
        report
    }

    async fn close_bounded(&self, key: &CacheKey, session: Arc<dyn ToolSession>) {
        if timeout(self.warm_timeout, session.close()).await.is_err() {
            warn!(key = %key, after = ?self.warm_timeout, "Closing tool session timed out");
        }
    }

    /// Number of cached sessions.
    pub async fn cached_len(&self) -> usize {
        let mut count = 0;
        for (_, slot) in self.state.snapshot() {
            if slot.lock().await.is_some() {
                count += 1;
            }
        }
        count
    }
}
