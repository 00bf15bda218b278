//! Configuration schema.
//!
//! Hierarchy: `Config` → `LlmConfig`, `ToolServersConfig`, `ResolverConfig`,
//! `MemoryConfig`, `SessionsConfig`, `AgentConfig`.
//!
//! JSON on disk uses camelCase keys; every struct is `serde(default)` so a
//! partial file only overrides what it names.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Env var consulted for the tool-server credential when the config leaves it empty.
pub const TOOL_SERVER_KEY_ENV: &str = "SMITHERY_API_KEY";

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub llm: LlmConfig,
    pub tool_servers: ToolServersConfig,
    pub resolver: ResolverConfig,
    pub memory: MemoryConfig,
    pub sessions: SessionsConfig,
    pub agent: AgentConfig,
}

impl Config {
    /// Startup checks that must pass before a runtime is built.
    ///
    /// The tool-server credential is mandatory: every hosted server URL
    /// embeds it, so running without one can only ever reach fallback mode.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tool_servers.api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential {
                field: "toolServers.apiKey",
                env: TOOL_SERVER_KEY_ENV,
            });
        }
        if self.resolver.warm_check_timeout_secs == 0 || self.resolver.cold_fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "resolver timeouts must be at least one second".into(),
            ));
        }
        if self.memory.retention_days < 0 {
            return Err(ConfigError::Invalid(
                "memory.retentionDays must not be negative".into(),
            ));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────
// LLM
// ─────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmConfig {
    /// Model identifier, optionally provider-prefixed (`gemini/gemini-2.5-flash`).
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Cap on LLM ↔ tool round trips per user message.
    pub max_tool_iterations: u32,
    pub providers: ProvidersConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gemini/gemini-2.5-flash".to_string(),
            temperature: 0.1,
            max_tokens: 4096,
            max_tool_iterations: 10,
            providers: ProvidersConfig::default(),
        }
    }
}

/// Credentials and endpoint for one LLM backend.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl ProviderConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvidersConfig {
    pub gemini: ProviderConfig,
    pub openai: ProviderConfig,
    pub openrouter: ProviderConfig,
    pub deepseek: ProviderConfig,
}

impl ProvidersConfig {
    pub fn get_by_name(&self, name: &str) -> Option<&ProviderConfig> {
        match name {
            "gemini" => Some(&self.gemini),
            "openai" => Some(&self.openai),
            "openrouter" => Some(&self.openrouter),
            "deepseek" => Some(&self.deepseek),
            _ => None,
        }
    }

    pub(crate) fn get_by_name_mut(&mut self, name: &str) -> Option<&mut ProviderConfig> {
        match name {
            "gemini" => Some(&mut self.gemini),
            "openai" => Some(&mut self.openai),
            "openrouter" => Some(&mut self.openrouter),
            "deepseek" => Some(&mut self.deepseek),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────
// Tool servers
// ─────────────────────────────────────────────

/// Wire transport spoken by a remote tool server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    #[default]
    StreamableHttp,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::StreamableHttp => f.write_str("streamable_http"),
        }
    }
}

/// Hosted tool-server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolServersConfig {
    /// Provider API key, embedded in every hosted server URL.
    pub api_key: String,
    /// Base URL of the hosting provider.
    pub base_url: String,
    /// Provider profile appended to server URLs (empty = none).
    pub profile: String,
    /// Extra servers or overrides of built-in ones, by name.
    ///
    /// URLs may contain `{api_key}` and `{profile}` placeholders.
    pub servers: BTreeMap<String, ToolServerEntry>,
}

impl Default for ToolServersConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://server.smithery.ai".to_string(),
            profile: String::new(),
            servers: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolServerEntry {
    pub url: String,
    pub transport: TransportKind,
}

// ─────────────────────────────────────────────
// Resolver / memory / sessions / agent
// ─────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolverConfig {
    /// Budget for re-validating a cached tool set.
    pub warm_check_timeout_secs: u64,
    /// Budget for connecting and listing tools from scratch.
    pub cold_fetch_timeout_secs: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            warm_check_timeout_secs: 5,
            cold_fetch_timeout_secs: 8,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryConfig {
    pub db_path: String,
    /// Context entries injected into each prompt.
    pub context_limit: usize,
    /// Age after which low-importance context and metrics are purged.
    pub retention_days: i64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: "~/.polyagent/agent_memory.db".to_string(),
            context_limit: 5,
            retention_days: 90,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionsConfig {
    /// Most agent sessions kept in memory; least recently used go first.
    pub max_entries: usize,
    /// Idle seconds before a session is rebuilt (0 disables).
    pub idle_ttl_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_entries: 256,
            idle_ttl_secs: 0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    /// Domain profile used when the CLI is not told otherwise.
    pub domain: String,
    /// User id for local terminal sessions.
    pub default_user: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            domain: "dev".to_string(),
            default_user: "local".to_string(),
        }
    }
}
