//! Request handler: one user message in, one reply out.
//!
//! Classifies the message, loads memory, resolves tools, runs the
//! LLM ↔ tool loop on the thread's session and records the exchange.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use polyagent_core::config::Config;
use polyagent_core::memory::{ContextEntry, MemoryStore};
use polyagent_core::types::{Message, ToolCall};
use polyagent_core::utils::{take_chars, thread_id, truncate_string};
use polyagent_core::MemoryError;
use polyagent_providers::traits::{LlmProvider, LlmRequestConfig};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::context::ContextBuilder;
use crate::domains::DomainProfile;
use crate::resolver::ToolResolver;
use crate::session_cache::{AgentSession, SessionCache};
use crate::tools::ToolRegistry;

/// Sent when the model produced no text.
pub const EMPTY_ANSWER: &str = "Sorry, I could not produce an answer. Try rephrasing the question.";

const TITLE_CHARS: usize = 80;
const STORED_RESPONSE_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("message is empty")]
    EmptyMessage,

    #[error(transparent)]
    Memory(#[from] MemoryError),
}

#[derive(Clone, Debug, Serialize)]
pub struct Reply {
    pub thread_id: String,
    pub intent: String,
    pub content: String,
    pub tools_available: usize,
    /// The answer was produced without external tools because of a failure.
    pub fallback: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct MemoryStatus {
    pub thread_id: String,
    pub context_items: usize,
    pub last_activity: Option<DateTime<Utc>>,
    pub session_cached: bool,
}

pub struct RequestHandler {
    profile: &'static DomainProfile,
    provider: Arc<dyn LlmProvider>,
    resolver: Arc<ToolResolver>,
    memory: Arc<MemoryStore>,
    sessions: SessionCache,
    context: ContextBuilder,
    model: String,
    request_config: LlmRequestConfig,
    max_iterations: usize,
    context_limit: usize,
}

impl RequestHandler {
    pub fn new(
        profile: &'static DomainProfile,
        provider: Arc<dyn LlmProvider>,
        resolver: Arc<ToolResolver>,
        memory: Arc<MemoryStore>,
        config: &Config,
    ) -> Self {
        let model = if config.llm.model.is_empty() {
            provider.default_model().to_string()
        } else {
            config.llm.model.clone()
        };

        info!(
            domain = profile.name,
            model = %model,
            max_iterations = config.llm.max_tool_iterations,
            "Request handler ready"
        );

        Self {
            profile,
            provider,
            resolver,
            memory,
            sessions: SessionCache::from_config(&config.sessions),
            context: ContextBuilder::new(profile.display_name, profile.system_prompt),
            model,
            request_config: LlmRequestConfig {
                max_tokens: config.llm.max_tokens,
                temperature: config.llm.temperature,
            },
            max_iterations: config.llm.max_tool_iterations.max(1) as usize,
            context_limit: config.memory.context_limit,
        }
    }

    pub fn profile(&self) -> &'static DomainProfile {
        self.profile
    }

    pub fn resolver(&self) -> &ToolResolver {
        &self.resolver
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn thread_id(&self, user_id: &str) -> String {
        thread_id(self.profile.agent_type, user_id)
    }

    pub async fn handle(&self, user_id: &str, text: &str) -> Result<Reply, HandlerError> {
        let started = Instant::now();
        let text = text.trim();
        if text.is_empty() {
            return Err(HandlerError::EmptyMessage);
        }

        let agent_type = self.profile.agent_type;
        let thread_id = self.thread_id(user_id);
        let intent = self.profile.intents.classify(text);
        info!(thread_id = %thread_id, intent, "Handling message");

        let contexts = self.memory.get_context(&thread_id, agent_type, self.context_limit)?;
        let preferences = self.memory.get_preferences(user_id, agent_type)?;

        let resolution = self.resolver.resolve(intent, &self.profile.toolsets).await;
        let fallback = resolution.is_fallback() || self.resolver.fallback_active();
        let tools = ToolRegistry::from_tools(resolution.tools());
        debug!(intent, resolution = resolution.label(), tools = tools.len(), "Tools resolved");

        let session = self
            .sessions
            .get_or_create(&thread_id, || async {
                let session_id = self.memory.register_session(&thread_id, user_id, agent_type)?;
                self.memory
                    .ensure_conversation(&thread_id, user_id, agent_type, &truncate_string(text, TITLE_CHARS))?;
                info!(thread_id = %thread_id, session_id = %session_id, "New agent session");
                Ok::<_, MemoryError>(AgentSession::new(&thread_id, user_id, agent_type, session_id))
            })
            .await?;

        let prompt = ContextBuilder::enrich_prompt(&contexts, &preferences, text, fallback);
        let history = session.history().await;
        let answer = self.run_agent_loop(&history, &prompt, &tools).await;
        let content = if answer.trim().is_empty() {
            EMPTY_ANSWER.to_string()
        } else {
            answer
        };
        session
            .push_turn(Message::user(text), Message::assistant(&content))
            .await;

        let importance = if content.chars().count() > 100 { 2 } else { 1 };
        let entry = ContextEntry::new(
            intent,
            serde_json::json!({
                "prompt": text,
                "response": take_chars(&content, STORED_RESPONSE_CHARS),
                "timestamp": Utc::now().to_rfc3339(),
            }),
            importance,
        );
        self.memory.save_context(&thread_id, &entry, agent_type)?;
        self.memory.update_session_activity(&thread_id)?;

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.memory
            .save_metric(agent_type, user_id, "response_time_ms", elapsed_ms)?;
        self.memory
            .save_metric(agent_type, user_id, "tools_loaded", tools.len() as f64)?;

        info!(
            thread_id = %thread_id,
            chars = content.chars().count(),
            elapsed_ms = elapsed_ms as u64,
            "Reply ready"
        );

        Ok(Reply {
            thread_id,
            intent: intent.to_string(),
            content,
            tools_available: tools.len(),
            fallback,
        })
    }

    /// LLM ↔ tool loop. Returns the final text, empty if there was none.
    async fn run_agent_loop(&self, history: &[Message], prompt: &str, tools: &ToolRegistry) -> String {
        let mut messages = self.context.build_messages(history, prompt);
        let tool_defs = tools.get_definitions();

        for iteration in 0..self.max_iterations {
            debug!(iteration, "LLM call");

            let response = self
                .provider
                .chat(&messages, Some(&tool_defs), &self.model, &self.request_config)
                .await;

            if !response.has_tool_calls() {
                return response.content.unwrap_or_default();
            }

            let tool_calls: Vec<ToolCall> = response.tool_calls.clone();
            ContextBuilder::add_assistant_message(&mut messages, response.content.clone(), tool_calls.clone());

            for tc in &tool_calls {
                let params: HashMap<String, serde_json::Value> =
                    serde_json::from_str(&tc.function.arguments).unwrap_or_default();

                info!(tool = %tc.function.name, iteration, "Executing tool call");
                let result = tools.execute(&tc.function.name, params).await;
                debug!(tool = %tc.function.name, result_len = result.len(), "Tool result");

                ContextBuilder::add_tool_result(&mut messages, &tc.id, &result);
            }
        }

        info!(max_iterations = self.max_iterations, "Tool loop exhausted without a final answer");
        String::new()
    }

    /// Forget the cached session of the user's thread. Stored memory stays.
    pub async fn reset_thread(&self, user_id: &str) -> bool {
        let thread_id = self.thread_id(user_id);
        let removed = self.sessions.remove(&thread_id).await;
        info!(thread_id = %thread_id, removed, "Thread reset");
        removed
    }

    pub async fn memory_status(&self, user_id: &str) -> Result<MemoryStatus, HandlerError> {
        let thread_id = self.thread_id(user_id);
        let context_items = self.memory.count_context(&thread_id, self.profile.agent_type)?;
        let last_activity = self.memory.get_session_activity(&thread_id)?;
        let session_cached = self.sessions.get(&thread_id).await.is_some();
        Ok(MemoryStatus {
            thread_id,
            context_items,
            last_activity,
            session_cached,
        })
    }
}
