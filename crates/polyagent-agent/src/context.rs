//! Context builder: enriched user prompt and the message list for an LLM call.

use std::collections::BTreeMap;

use chrono::Utc;
use polyagent_core::memory::StoredContext;
use polyagent_core::types::{Message, ToolCall};
use polyagent_core::utils::truncate_string;

/// Characters of each stored context item shown to the model.
const CONTEXT_PREVIEW_CHARS: usize = 200;

pub const FALLBACK_NOTICE: &str = "[FALLBACK MODE ACTIVE: running without external tools]";

/// Builds prompts for one domain.
#[derive(Clone, Debug)]
pub struct ContextBuilder {
    display_name: String,
    system_prompt: String,
}

impl ContextBuilder {
    pub fn new(display_name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            system_prompt: system_prompt.into(),
        }
    }

    /// Domain prompt plus identity and time.
    pub fn build_system_prompt(&self) -> String {
        let now = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        format!(
            "# {name}\n\n{prompt}\n\n- **Date/time**: {now}\n\n\
             Use tools when they help answer the question. Be concise.",
            name = self.display_name,
            prompt = self.system_prompt,
        )
    }

    /// User turn with remembered context, preferences and the fallback notice.
    pub fn enrich_prompt(
        contexts: &[StoredContext],
        preferences: &BTreeMap<String, String>,
        question: &str,
        fallback: bool,
    ) -> String {
        let mut prompt = String::new();

        if !contexts.is_empty() {
            prompt.push_str("[PREVIOUS CONTEXT]:\n");
            for ctx in contexts {
                let content = match &ctx.content {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                prompt.push_str(&format!(
                    "- {}: {}\n",
                    ctx.context_type,
                    truncate_string(&content, CONTEXT_PREVIEW_CHARS)
                ));
            }
            prompt.push('\n');
        }

        if !preferences.is_empty() {
            prompt.push_str("[USER PREFERENCES]:\n");
            for (key, value) in preferences {
                prompt.push_str(&format!("- {key}: {value}\n"));
            }
            prompt.push('\n');
        }

        prompt.push_str("[CURRENT QUESTION]: ");
        prompt.push_str(question);

        if fallback {
            prompt.push_str("\n\n");
            prompt.push_str(FALLBACK_NOTICE);
        }
        prompt
    }

    /// System prompt, history, then the current user turn.
    pub fn build_messages(&self, history: &[Message], user_text: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(self.build_system_prompt()));
        messages.extend_from_slice(history);
        messages.push(Message::user(user_text));
        messages
    }

    pub fn add_tool_result(messages: &mut Vec<Message>, tool_call_id: &str, result: &str) {
        messages.push(Message::tool_result(tool_call_id, result));
    }

    pub fn add_assistant_message(messages: &mut Vec<Message>, content: Option<String>, tool_calls: Vec<ToolCall>) {
        if tool_calls.is_empty() {
            if let Some(text) = content {
                messages.push(Message::assistant(text));
            }
        } else {
            messages.push(Message::assistant_tool_calls(content, tool_calls));
        }
    }
}
