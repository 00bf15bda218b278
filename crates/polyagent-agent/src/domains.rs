//! Built-in domain profiles.
//!
//! A profile bundles everything that differs between assistants: the
//! keyword table, the intent → server mapping, the system prompt and the
//! REPL help. The request handler itself is domain-agnostic.

use crate::intent::{KeywordTable, BETTING_TABLE, DEV_TABLE, INTEGRATION_TABLE, TRADING_TABLE};
use crate::toolsets::ToolSetRegistry;

#[derive(Debug)]
pub struct DomainProfile {
    /// CLI / config name (`dev`, `trading`, ...).
    pub name: &'static str,
    /// Prefix of thread ids and `agent_type` column in the memory store.
    pub agent_type: &'static str,
    pub display_name: &'static str,
    pub intents: KeywordTable,
    pub toolsets: ToolSetRegistry,
    pub system_prompt: &'static str,
    pub help: &'static str,
}

const DEV_TOOLSETS: ToolSetRegistry = ToolSetRegistry::new(&[
    ("backend", &["django_boilerplate", "api_docs"]),
    ("frontend", &["react_native_scaffold", "snippet_generator"]),
    ("refatoracao", &["api_docs", "code_review"]),
    ("explicacao", &["api_docs"]),
    ("debug", &["web_search"]),
    ("snippet", &["web_search"]),
    ("geral", &["sequential_steps", "api_docs"]),
]);

const TRADING_TOOLSETS: ToolSetRegistry = ToolSetRegistry::new(&[
    ("analise_mercado", &["sequential_steps", "web_search"]),
    ("trading_automatico", &["sequential_steps", "automation"]),
    ("gestao_risco", &["sequential_steps", "automation"]),
    ("monitoramento", &["web_search", "automation"]),
    ("configuracao", &["sequential_steps", "web_search"]),
    ("geral", &["sequential_steps", "web_search", "automation"]),
]);

const BETTING_TOOLSETS: ToolSetRegistry = ToolSetRegistry::new(&[
    ("analise_esportiva", &["sequential_steps", "web_search", "sports_analysis"]),
    ("gestao_apostas", &["sequential_steps", "sports_analysis"]),
    ("analise_odds", &["web_search", "sports_analysis"]),
    ("futebol", &["sequential_steps", "web_search"]),
    ("basquete", &["sequential_steps", "web_search"]),
    ("tenis", &["sequential_steps", "web_search"]),
    ("esports", &["sequential_steps", "web_search"]),
    ("relatorios", &["sports_analysis", "sequential_steps"]),
    ("configuracao", &["sequential_steps", "web_search"]),
    ("geral", &["sequential_steps", "web_search", "sports_analysis"]),
]);

const INTEGRATION_TOOLSETS: ToolSetRegistry =
    ToolSetRegistry::new(&[("geral", &["sequential_steps", "web_search", "api_docs"])]);

pub static PROFILES: &[DomainProfile] = &[
    DomainProfile {
        name: "dev",
        agent_type: "dev",
        display_name: "Dev Assistant",
        intents: DEV_TABLE,
        toolsets: DEV_TOOLSETS,
        system_prompt: "You are a senior full-stack engineer focused on Django REST Framework \
                        backends and React Native apps. Give working code, point out bugs and \
                        explain trade-offs briefly. Use the available tools to check \
                        documentation before guessing at an API.",
        help: "Ask about Django models, serializers and views, React Native components \
               and hooks, refactoring, debugging or short code snippets.",
    },
    DomainProfile {
        name: "trading",
        agent_type: "binance",
        display_name: "Trading Assistant",
        intents: TRADING_TABLE,
        toolsets: TRADING_TOOLSETS,
        system_prompt: "You are a crypto trading analyst. Read markets with technical \
                        indicators, size positions conservatively and always state the \
                        risk of a suggestion. Never present a trade as certain.",
        help: "Ask for market analysis (RSI, MACD, trends), order strategies, risk \
               management (stops, position size), performance reports or API setup.",
    },
    DomainProfile {
        name: "betting",
        agent_type: "bet365",
        display_name: "Sports Betting Assistant",
        intents: BETTING_TABLE,
        toolsets: BETTING_TOOLSETS,
        system_prompt: "You are a sports analyst. Base opinions on statistics, form and odds, \
                        look for value rather than favourites, and remind the user to bet \
                        responsibly within a fixed bankroll.",
        help: "Ask about team and player statistics, odds and value bets, bankroll \
               management, football, basketball, tennis, esports or your results.",
    },
    DomainProfile {
        name: "integration",
        agent_type: "integration",
        display_name: "Integration Assistant",
        intents: INTEGRATION_TABLE,
        toolsets: INTEGRATION_TOOLSETS,
        system_prompt: "You are an integration engineer. Design and explain connections \
                        between third-party APIs, webhooks and internal services, with \
                        concrete request examples.",
        help: "Describe the systems you want to connect and what data should flow \
               between them.",
    },
];

/// Profile by name or agent type.
pub fn find_profile(name: &str) -> Option<&'static DomainProfile> {
    let name = name.trim().to_lowercase();
    PROFILES.iter().find(|p| p.name == name || p.agent_type == name)
}

pub fn profile_names() -> Vec<&'static str> {
    PROFILES.iter().map(|p| p.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::GENERAL_INTENT;
    use crate::toolsets::{ServerCatalogue, BUILTIN_SERVERS};
    use polyagent_core::config::schema::ToolServersConfig;

    #[test]
    fn test_find_profile_by_name_or_agent_type() {
        assert_eq!(find_profile("trading").unwrap().agent_type, "binance");
        assert_eq!(find_profile("bet365").unwrap().name, "betting");
        assert_eq!(find_profile(" DEV ").unwrap().name, "dev");
        assert!(find_profile("legal").is_none());
        assert_eq!(profile_names(), vec!["dev", "trading", "betting", "integration"]);
    }

    #[test]
    fn test_every_intent_has_servers() {
        let catalogue = ServerCatalogue::from_config(&ToolServersConfig {
            api_key: "k".into(),
            ..Default::default()
        });
        for profile in PROFILES {
            for intent in profile.intents.intents() {
                let servers = profile.toolsets.subset(intent, &catalogue);
                assert!(!servers.is_empty(), "{}:{intent} maps to nothing", profile.name);
            }
        }
    }

    #[test]
    fn test_mapped_names_are_builtin() {
        for profile in PROFILES {
            for intent in profile.toolsets.intents() {
                for name in profile.toolsets.server_names(intent) {
                    assert!(
                        BUILTIN_SERVERS.iter().any(|(builtin, _)| builtin == name),
                        "{} references unknown server {name}",
                        profile.name
                    );
                }
            }
        }
    }

    #[test]
    fn test_dev_classification_drives_mapping() {
        let dev = find_profile("dev").unwrap();
        let intent = dev.intents.classify("crie um serializer DRF");
        assert_eq!(intent, "backend");
        assert_eq!(dev.toolsets.server_names(intent), ["django_boilerplate", "api_docs"]);
        assert_eq!(dev.toolsets.server_names(GENERAL_INTENT), ["sequential_steps", "api_docs"]);
    }
}
