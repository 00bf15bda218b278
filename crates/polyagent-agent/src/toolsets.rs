//! Tool-server catalogue and intent → server mapping.
//!
//! The [`ServerCatalogue`] knows every remote tool server by name; a
//! [`ToolSetRegistry`] maps each intent of a domain to an ordered list of
//! catalogue names. Both are read-only once built.

use std::collections::BTreeMap;
use std::fmt;

use polyagent_core::config::schema::{ToolServersConfig, TransportKind};
use tracing::{debug, warn};

use crate::intent::GENERAL_INTENT;

/// One remote tool server.
#[derive(Clone, PartialEq, Eq)]
pub struct ToolServerDescriptor {
    pub name: String,
    pub url: String,
    pub transport: TransportKind,
}

impl ToolServerDescriptor {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            transport: TransportKind::StreamableHttp,
        }
    }

    /// URL with the query string dropped, safe to log.
    pub fn redacted_url(&self) -> &str {
        self.url.split('?').next().unwrap_or(&self.url)
    }
}

// Keeps API keys embedded in URLs out of debug output.
impl fmt::Debug for ToolServerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolServerDescriptor")
            .field("name", &self.name)
            .field("url", &self.redacted_url())
            .field("transport", &self.transport)
            .finish()
    }
}

// ─────────────────────────────────────────────
// Catalogue
// ─────────────────────────────────────────────

/// Hosted packages known out of the box, by catalogue name.
pub const BUILTIN_SERVERS: &[(&str, &str)] = &[
    ("sequential_steps", "@xinzhongyouhai/mcp-sequentialthinking-tools"),
    ("web_search", "@nickclyde/duckduckgo-mcp-server"),
    ("api_docs", "@upstash/context7-mcp"),
    ("automation", "@smithery/toolbox"),
    ("sports_analysis", "@nickclyde/duckduckgo-mcp-server"),
    ("django_boilerplate", "@smithery/toolbox"),
    ("react_native_scaffold", "@seu-usuario/react-native-scaffold"),
    ("snippet_generator", "@Yaxin9Luo/openai_agent_library_mcp"),
    ("code_review", "@upstash/context7-mcp"),
];

#[derive(Clone, Debug, Default)]
pub struct ServerCatalogue {
    servers: BTreeMap<String, ToolServerDescriptor>,
}

impl ServerCatalogue {
    /// Built-in servers on the configured host, then config entries on top.
    pub fn from_config(config: &ToolServersConfig) -> Self {
        let base = config.base_url.trim_end_matches('/');
        let mut catalogue = Self::default();

        for (name, package) in BUILTIN_SERVERS {
            let mut url = format!("{base}/{package}/mcp?api_key={}", config.api_key);
            if !config.profile.is_empty() {
                url.push_str("&profile=");
                url.push_str(&config.profile);
            }
            catalogue.insert(ToolServerDescriptor::new(*name, url));
        }

        for (name, entry) in &config.servers {
            let url = entry
                .url
                .replace("{api_key}", &config.api_key)
                .replace("{profile}", &config.profile);
            debug!(server = %name, "Tool server from config");
            catalogue.insert(ToolServerDescriptor {
                name: name.clone(),
                url,
                transport: entry.transport,
            });
        }

        catalogue
    }

    pub fn insert(&mut self, descriptor: ToolServerDescriptor) {
        self.servers.insert(descriptor.name.clone(), descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&ToolServerDescriptor> {
        self.servers.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.servers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

// ─────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────

/// Static intent → server-name mapping for one domain.
#[derive(Clone, Copy, Debug)]
pub struct ToolSetRegistry {
    entries: &'static [(&'static str, &'static [&'static str])],
}

impl ToolSetRegistry {
    pub const fn new(entries: &'static [(&'static str, &'static [&'static str])]) -> Self {
        Self { entries }
    }

    /// Server names for `intent`, falling back to the `geral` entry.
    pub fn server_names(&self, intent: &str) -> &'static [&'static str] {
        self.lookup(intent)
            .or_else(|| self.lookup(GENERAL_INTENT))
            .unwrap_or(&[])
    }

    fn lookup(&self, intent: &str) -> Option<&'static [&'static str]> {
        self.entries
            .iter()
            .find(|(label, _)| *label == intent)
            .map(|(_, names)| *names)
    }

    /// Descriptors for `intent` in registry order, duplicates removed.
    ///
    /// Names the catalogue does not know are skipped with a warning.
    pub fn subset(&self, intent: &str, catalogue: &ServerCatalogue) -> Vec<ToolServerDescriptor> {
        let mut picked: Vec<ToolServerDescriptor> = Vec::new();
        for name in self.server_names(intent) {
            if picked.iter().any(|d| d.name == *name) {
                continue;
            }
            match catalogue.get(name) {
                Some(descriptor) => picked.push(descriptor.clone()),
                None => warn!(intent, server = name, "Unknown tool server skipped"),
            }
        }
        picked
    }

    pub fn intents(&self) -> impl Iterator<Item = &'static str> {
        self.entries.iter().map(|(label, _)| *label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyagent_core::config::schema::ToolServerEntry;

    static REGISTRY: ToolSetRegistry = ToolSetRegistry::new(&[
        ("backend", &["api_docs", "ghost", "api_docs"]),
        ("debug", &["web_search"]),
        ("vazio", &[]),
        ("geral", &["sequential_steps", "web_search"]),
    ]);

    fn config() -> ToolServersConfig {
        ToolServersConfig {
            api_key: "sm-key".into(),
            profile: "team-a".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_catalogue_builds_hosted_urls() {
        let catalogue = ServerCatalogue::from_config(&config());
        assert_eq!(catalogue.len(), BUILTIN_SERVERS.len());
        let docs = catalogue.get("api_docs").unwrap();
        assert_eq!(
            docs.url,
            "https://server.smithery.ai/@upstash/context7-mcp/mcp?api_key=sm-key&profile=team-a"
        );
        assert_eq!(docs.transport, TransportKind::StreamableHttp);
    }

    #[test]
    fn test_catalogue_without_profile() {
        let mut cfg = config();
        cfg.profile.clear();
        let catalogue = ServerCatalogue::from_config(&cfg);
        assert!(catalogue.get("web_search").unwrap().url.ends_with("/mcp?api_key=sm-key"));
    }

    #[test]
    fn test_config_entries_override_and_extend() {
        let mut cfg = config();
        cfg.servers.insert(
            "web_search".into(),
            ToolServerEntry {
                url: "http://localhost:9000/mcp?key={api_key}&p={profile}".into(),
                transport: TransportKind::StreamableHttp,
            },
        );
        cfg.servers.insert(
            "custom".into(),
            ToolServerEntry {
                url: "http://localhost:9100/mcp".into(),
                transport: TransportKind::StreamableHttp,
            },
        );
        let catalogue = ServerCatalogue::from_config(&cfg);
        assert_eq!(
            catalogue.get("web_search").unwrap().url,
            "http://localhost:9000/mcp?key=sm-key&p=team-a"
        );
        assert!(catalogue.get("custom").is_some());
    }

    #[test]
    fn test_debug_redacts_key() {
        let catalogue = ServerCatalogue::from_config(&config());
        let rendered = format!("{:?}", catalogue.get("api_docs").unwrap());
        assert!(!rendered.contains("sm-key"));
        assert!(rendered.contains("context7-mcp"));
    }

    #[test]
    fn test_subset_skips_unknown_and_duplicates() {
        let catalogue = ServerCatalogue::from_config(&config());
        let names: Vec<String> = REGISTRY
            .subset("backend", &catalogue)
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["api_docs"]);
    }

    #[test]
    fn test_unmapped_intent_uses_general() {
        let catalogue = ServerCatalogue::from_config(&config());
        let names: Vec<String> = REGISTRY
            .subset("frontend", &catalogue)
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["sequential_steps", "web_search"]);
    }

    #[test]
    fn test_explicit_empty_entry_stays_empty() {
        let catalogue = ServerCatalogue::from_config(&config());
        assert!(REGISTRY.subset("vazio", &catalogue).is_empty());
    }
}
