//! Per-thread agent sessions, kept in a bounded LRU with an optional idle TTL.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use polyagent_core::config::schema::SessionsConfig;
use polyagent_core::types::Message;
use tokio::sync::Mutex;
use tracing::debug;

/// History messages replayed to the LLM per turn.
pub const MAX_HISTORY: usize = 50;

/// Conversation state of one thread.
#[derive(Debug)]
pub struct AgentSession {
    pub thread_id: String,
    pub user_id: String,
    pub agent_type: String,
    /// Row id in `agent_sessions`.
    pub session_id: String,
    history: Mutex<Vec<Message>>,
}

impl AgentSession {
    pub fn new(
        thread_id: impl Into<String>,
        user_id: impl Into<String>,
        agent_type: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            user_id: user_id.into(),
            agent_type: agent_type.into(),
            session_id: session_id.into(),
            history: Mutex::new(Vec::new()),
        }
    }

    /// The last [`MAX_HISTORY`] messages.
    pub async fn history(&self) -> Vec<Message> {
        let history = self.history.lock().await;
        let start = history.len().saturating_sub(MAX_HISTORY);
        history[start..].to_vec()
    }

    /// Record one finished exchange.
    pub async fn push_turn(&self, user: Message, assistant: Message) {
        let mut history = self.history.lock().await;
        history.push(user);
        history.push(assistant);
        let excess = history.len().saturating_sub(MAX_HISTORY);
        if excess > 0 {
            history.drain(..excess);
        }
    }

    pub async fn turns(&self) -> usize {
        self.history.lock().await.len() / 2
    }
}

struct Cached {
    session: Arc<AgentSession>,
    last_used: Instant,
}

pub struct SessionCache {
    entries: Mutex<LruCache<String, Cached>>,
    idle_ttl: Option<Duration>,
}

impl SessionCache {
    /// `max_entries` of zero is treated as one.
    pub fn new(max_entries: usize, idle_ttl: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            idle_ttl,
        }
    }

    pub fn from_config(config: &SessionsConfig) -> Self {
        let ttl = (config.idle_ttl_secs > 0).then(|| Duration::from_secs(config.idle_ttl_secs));
        Self::new(config.max_entries, ttl)
    }

    fn expired(&self, cached: &Cached) -> bool {
        self.idle_ttl.is_some_and(|ttl| cached.last_used.elapsed() > ttl)
    }

    /// Live session for `thread_id`, if any. Refreshes its recency.
    pub async fn get(&self, thread_id: &str) -> Option<Arc<AgentSession>> {
        let mut entries = self.entries.lock().await;
        let cached = entries.get_mut(thread_id)?;
        if !self.expired(cached) {
            cached.last_used = Instant::now();
            return Some(Arc::clone(&cached.session));
        }
        debug!(thread_id, "Session idle past TTL, dropped");
        entries.pop(thread_id);
        None
    }

    /// Cached session, or one built by `build` and stored.
    ///
    /// `build` runs without the lock held. If another task stored a session
    /// for the same thread meanwhile, that one wins and the new one is dropped.
    pub async fn get_or_create<F, Fut, E>(&self, thread_id: &str, build: F) -> Result<Arc<AgentSession>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AgentSession, E>>,
    {
        if let Some(session) = self.get(thread_id).await {
            return Ok(session);
        }

        let built = Arc::new(build().await?);

        let mut entries = self.entries.lock().await;
        if let Some(existing) = entries.get_mut(thread_id) {
            if !self.expired(existing) {
                existing.last_used = Instant::now();
                return Ok(Arc::clone(&existing.session));
            }
        }
        if let Some((evicted, _)) = entries.push(
            thread_id.to_string(),
            Cached {
                session: Arc::clone(&built),
                last_used: Instant::now(),
            },
        ) {
            if evicted != thread_id {
                debug!(evicted = %evicted, "Session cache full, evicted least recent");
            }
        }
        debug!(thread_id, sessions = entries.len(), "Session created");
        Ok(built)
    }

    /// Drop the session of `thread_id`. Returns whether one was cached.
    pub async fn remove(&self, thread_id: &str) -> bool {
        self.entries.lock().await.pop(thread_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
