//! Wiring: configuration → provider, resolver, memory store, handler.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::debug;

use polyagent_agent::domains::{find_profile, profile_names, DomainProfile};
use polyagent_agent::{RequestHandler, ServerCatalogue, ToolResolver};
use polyagent_core::config::Config;
use polyagent_core::memory::MemoryStore;
use polyagent_core::utils::expand_home;
use polyagent_providers::http_provider::create_provider;

/// Profile named on the command line, else the configured default.
pub fn profile_for(config: &Config, domain: Option<&str>) -> Result<&'static DomainProfile> {
    let name = domain.unwrap_or(&config.agent.domain);
    find_profile(name).ok_or_else(|| {
        anyhow!(
            "unknown domain '{name}' (available: {})",
            profile_names().join(", ")
        )
    })
}

pub fn open_memory(config: &Config) -> Result<MemoryStore> {
    let path = expand_home(&config.memory.db_path);
    debug!(path = %path.display(), "Opening memory store");
    MemoryStore::open(&path).with_context(|| format!("failed to open memory store at {}", path.display()))
}

pub fn build_resolver(config: &Config) -> ToolResolver {
    let catalogue = ServerCatalogue::from_config(&config.tool_servers);
    debug!(servers = catalogue.len(), "Tool server catalogue built");
    ToolResolver::with_mcp(catalogue, &config.resolver)
}

/// Build the handler for one domain. Refuses to start without the tool-server key.
pub fn build_handler(config: &Config, domain: Option<&str>) -> Result<RequestHandler> {
    config.validate()?;
    let profile = profile_for(config, domain)?;

    let provider = create_provider(&config.llm.model, &config.llm.providers).map_err(|e| anyhow!(e))?;
    let resolver = build_resolver(config);
    let memory = open_memory(config)?;

    Ok(RequestHandler::new(
        profile,
        Arc::new(provider),
        Arc::new(resolver),
        Arc::new(memory),
        config,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyagent_core::ConfigError;

    #[test]
    fn profile_for_prefers_argument() {
        let config = Config::default();
        assert_eq!(profile_for(&config, Some("betting")).unwrap().agent_type, "bet365");
        assert_eq!(profile_for(&config, None).unwrap().name, "dev");
        let err = profile_for(&config, Some("legal")).unwrap_err().to_string();
        assert!(err.contains("unknown domain 'legal'"));
        assert!(err.contains("integration"));
    }

    #[test]
    fn build_handler_requires_tool_server_key() {
        let config = Config::default();
        let err = build_handler(&config, None).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingCredential { .. })
        ));
    }

    #[test]
    fn build_handler_with_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.tool_servers.api_key = "sm-key".into();
        config.llm.providers.gemini.api_key = "g-key".into();
        config.memory.db_path = dir.path().join("mem.db").to_string_lossy().into_owned();

        let handler = build_handler(&config, Some("trading")).unwrap();
        assert_eq!(handler.profile().agent_type, "binance");
        assert_eq!(handler.model(), "gemini/gemini-2.5-flash");
        assert!(dir.path().join("mem.db").exists());
    }
}
