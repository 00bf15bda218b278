//! Config loader: reads `~/.polyagent/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.polyagent/config.json`
//! 3. Environment variables `POLYAGENT_<SECTION>__<FIELD>` (override JSON)
//! 4. `SMITHERY_API_KEY`, only when no tool-server key was set above

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info, warn};

use super::schema::{Config, TOOL_SERVER_KEY_ENV};

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
/// Credentials are not checked here; call [`Config::validate`] before use.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);
    let config = load_config_from_path(&config_path);
    apply_env_overrides(config, |key| std::env::var(key).ok())
}

/// Load config from a specific file path, without env overrides.
fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return Config::default();
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return Config::default();
        }
    };

    let mut raw: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            return Config::default();
        }
    };

    migrate_config(&mut raw);

    match serde_json::from_value(raw) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to deserialize config: {}", e);
            Config::default()
        }
    }
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;

    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Apply legacy config migrations.
///
/// Moves a top-level `smitheryApiKey` → `toolServers.apiKey`.
fn migrate_config(raw: &mut serde_json::Value) {
    let Some(obj) = raw.as_object_mut() else {
        return;
    };
    let Some(legacy) = obj.remove("smitheryApiKey") else {
        return;
    };

    let tool_servers = obj
        .entry("toolServers")
        .or_insert_with(|| serde_json::json!({}));
    if let Some(ts) = tool_servers.as_object_mut() {
        if !ts.contains_key("apiKey") {
            ts.insert("apiKey".to_string(), legacy);
            debug!("Migrated smitheryApiKey → toolServers.apiKey");
        }
    }
}

/// Apply environment variable overrides on top of a loaded config.
///
/// `lookup` resolves a variable name; production passes `std::env::var`.
///
/// Supported overrides:
/// - `POLYAGENT_LLM__MODEL`, `__TEMPERATURE`, `__MAX_TOKENS`, `__MAX_TOOL_ITERATIONS`
/// - `POLYAGENT_PROVIDERS__<NAME>__API_KEY` / `__API_BASE`
/// - `POLYAGENT_TOOL_SERVERS__API_KEY`, `__BASE_URL`, `__PROFILE`
/// - `POLYAGENT_RESOLVER__WARM_CHECK_TIMEOUT_SECS`, `__COLD_FETCH_TIMEOUT_SECS`
/// - `POLYAGENT_MEMORY__DB_PATH`, `__CONTEXT_LIMIT`, `__RETENTION_DAYS`
/// - `POLYAGENT_SESSIONS__MAX_ENTRIES`, `__IDLE_TTL_SECS`
/// - `POLYAGENT_AGENT__DOMAIN`, `__DEFAULT_USER`
fn apply_env_overrides<F>(mut config: Config, lookup: F) -> Config
where
    F: Fn(&str) -> Option<String>,
{
    // LLM
    set_string(&lookup, "POLYAGENT_LLM__MODEL", &mut config.llm.model);
    set_parsed(&lookup, "POLYAGENT_LLM__TEMPERATURE", &mut config.llm.temperature);
    set_parsed(&lookup, "POLYAGENT_LLM__MAX_TOKENS", &mut config.llm.max_tokens);
    set_parsed(
        &lookup,
        "POLYAGENT_LLM__MAX_TOOL_ITERATIONS",
        &mut config.llm.max_tool_iterations,
    );

    for name in ["gemini", "openai", "openrouter", "deepseek"] {
        let upper = name.to_uppercase();
        if let Some(provider) = config.llm.providers.get_by_name_mut(name) {
            if let Some(val) = lookup(&format!("POLYAGENT_PROVIDERS__{upper}__API_KEY")) {
                provider.api_key = val;
            }
            if let Some(val) = lookup(&format!("POLYAGENT_PROVIDERS__{upper}__API_BASE")) {
                provider.api_base = Some(val);
            }
        }
    }

    // Tool servers
    set_string(&lookup, "POLYAGENT_TOOL_SERVERS__API_KEY", &mut config.tool_servers.api_key);
    set_string(&lookup, "POLYAGENT_TOOL_SERVERS__BASE_URL", &mut config.tool_servers.base_url);
    set_string(&lookup, "POLYAGENT_TOOL_SERVERS__PROFILE", &mut config.tool_servers.profile);
    if config.tool_servers.api_key.is_empty() {
        if let Some(val) = lookup(TOOL_SERVER_KEY_ENV) {
            config.tool_servers.api_key = val;
        }
    }

    // Resolver
    set_parsed(
        &lookup,
        "POLYAGENT_RESOLVER__WARM_CHECK_TIMEOUT_SECS",
        &mut config.resolver.warm_check_timeout_secs,
    );
    set_parsed(
        &lookup,
        "POLYAGENT_RESOLVER__COLD_FETCH_TIMEOUT_SECS",
        &mut config.resolver.cold_fetch_timeout_secs,
    );

    // Memory
    set_string(&lookup, "POLYAGENT_MEMORY__DB_PATH", &mut config.memory.db_path);
    set_parsed(&lookup, "POLYAGENT_MEMORY__CONTEXT_LIMIT", &mut config.memory.context_limit);
    set_parsed(&lookup, "POLYAGENT_MEMORY__RETENTION_DAYS", &mut config.memory.retention_days);

    // Sessions
    set_parsed(&lookup, "POLYAGENT_SESSIONS__MAX_ENTRIES", &mut config.sessions.max_entries);
    set_parsed(&lookup, "POLYAGENT_SESSIONS__IDLE_TTL_SECS", &mut config.sessions.idle_ttl_secs);

    // Agent
    set_string(&lookup, "POLYAGENT_AGENT__DOMAIN", &mut config.agent.domain);
    set_string(&lookup, "POLYAGENT_AGENT__DEFAULT_USER", &mut config.agent.default_user);

    config
}

fn set_string<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, target: &mut String) {
    if let Some(val) = lookup(key) {
        *target = val;
    }
}

fn set_parsed<T: FromStr, F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, target: &mut T) {
    if let Some(val) = lookup(key) {
        match val.parse::<T>() {
            Ok(v) => *target = v,
            Err(_) => warn!("Ignoring {key}={val}: not a valid value"),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp_json(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_load_missing_file() {
        let config = load_config_from_path(Path::new("/nonexistent/path/config.json"));
        assert_eq!(config.llm.max_tokens, 4096);
        assert_eq!(config.memory.context_limit, 5);
    }

    #[test]
    fn test_load_valid_json() {
        let file = write_temp_json(
            r#"{
            "llm": { "model": "openrouter/openai/gpt-4o-mini", "maxTokens": 2048 },
            "toolServers": {
                "apiKey": "sm-123",
                "profile": "team",
                "servers": {
                    "custom": { "url": "https://tools.test/mcp?api_key={api_key}", "transport": "streamable_http" }
                }
            },
            "memory": { "contextLimit": 3 }
        }"#,
        );

        let config = load_config_from_path(file.path());
        assert_eq!(config.llm.model, "openrouter/openai/gpt-4o-mini");
        assert_eq!(config.llm.max_tokens, 2048);
        assert_eq!(config.llm.temperature, 0.1);
        assert_eq!(config.tool_servers.api_key, "sm-123");
        assert_eq!(config.tool_servers.profile, "team");
        assert!(config.tool_servers.servers.contains_key("custom"));
        assert_eq!(config.memory.context_limit, 3);
        assert_eq!(config.memory.retention_days, 90);
    }

    #[test]
    fn test_load_invalid_json_returns_defaults() {
        let file = write_temp_json("not valid json {{{");
        let config = load_config_from_path(file.path());
        assert_eq!(config.llm.max_tokens, 4096);
    }

    #[test]
    fn test_load_unknown_transport_returns_defaults() {
        let file = write_temp_json(
            r#"{"toolServers": {"servers": {"x": {"url": "u", "transport": "stdio"}}}}"#,
        );
        let config = load_config_from_path(file.path());
        assert!(config.tool_servers.servers.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.llm.model = "deepseek/deepseek-chat".to_string();
        config.tool_servers.api_key = "sm-saved".to_string();

        save_config(&config, Some(&path)).unwrap();

        let reloaded = load_config_from_path(&path);
        assert_eq!(reloaded.llm.model, "deepseek/deepseek-chat");
        assert_eq!(reloaded.tool_servers.api_key, "sm-saved");
    }

    #[test]
    fn test_saved_json_uses_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        save_config(&Config::default(), Some(&path)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let raw: serde_json::Value = serde_json::from_str(&content).unwrap();

        assert!(raw["resolver"].get("coldFetchTimeoutSecs").is_some());
        assert!(raw["resolver"].get("cold_fetch_timeout_secs").is_none());
        assert!(raw.get("toolServers").is_some());
    }

    #[test]
    fn test_migrate_legacy_key() {
        let file = write_temp_json(r#"{"smitheryApiKey": "legacy"}"#);
        let config = load_config_from_path(file.path());
        assert_eq!(config.tool_servers.api_key, "legacy");
    }

    #[test]
    fn test_migrate_no_overwrite() {
        let file = write_temp_json(
            r#"{"smitheryApiKey": "legacy", "toolServers": {"apiKey": "current"}}"#,
        );
        let config = load_config_from_path(file.path());
        assert_eq!(config.tool_servers.api_key, "current");
    }

    #[test]
    fn test_env_override_model_and_numbers() {
        let config = apply_env_overrides(
            Config::default(),
            env(&[
                ("POLYAGENT_LLM__MODEL", "openai/gpt-4o"),
                ("POLYAGENT_MEMORY__CONTEXT_LIMIT", "8"),
                ("POLYAGENT_RESOLVER__COLD_FETCH_TIMEOUT_SECS", "12"),
                ("POLYAGENT_SESSIONS__IDLE_TTL_SECS", "not-a-number"),
            ]),
        );
        assert_eq!(config.llm.model, "openai/gpt-4o");
        assert_eq!(config.memory.context_limit, 8);
        assert_eq!(config.resolver.cold_fetch_timeout_secs, 12);
        assert_eq!(config.sessions.idle_ttl_secs, 0);
    }

    #[test]
    fn test_env_override_provider_key() {
        let config = apply_env_overrides(
            Config::default(),
            env(&[
                ("POLYAGENT_PROVIDERS__GEMINI__API_KEY", "g-env"),
                ("POLYAGENT_PROVIDERS__OPENROUTER__API_BASE", "https://proxy.test/v1"),
            ]),
        );
        assert_eq!(config.llm.providers.gemini.api_key, "g-env");
        assert_eq!(
            config.llm.providers.openrouter.api_base.as_deref(),
            Some("https://proxy.test/v1")
        );
    }

    #[test]
    fn test_smithery_key_fallback() {
        let config = apply_env_overrides(Config::default(), env(&[("SMITHERY_API_KEY", "sm-env")]));
        assert_eq!(config.tool_servers.api_key, "sm-env");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_prefixed_key_beats_smithery_key() {
        let config = apply_env_overrides(
            Config::default(),
            env(&[
                ("SMITHERY_API_KEY", "sm-env"),
                ("POLYAGENT_TOOL_SERVERS__API_KEY", "sm-prefixed"),
            ]),
        );
        assert_eq!(config.tool_servers.api_key, "sm-prefixed");
    }

    #[test]
    fn test_missing_key_fails_validation() {
        let config = apply_env_overrides(Config::default(), env(&[]));
        assert!(config.validate().is_err());
    }
}
