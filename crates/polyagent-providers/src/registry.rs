//! Provider registry: static specs for the supported LLM backends.
//!
//! Models may be written provider-prefixed (`gemini/gemini-2.5-flash`,
//! `openrouter/openai/gpt-4o-mini`) or bare (`gpt-4o`). The prefix selects
//! the backend and is stripped before the request goes out.

use polyagent_core::config::schema::{ProviderConfig, ProvidersConfig};

// ─────────────────────────────────────────────
// ProviderSpec
// ─────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct ProviderSpec {
    /// Internal name, also the config key (e.g. `"gemini"`).
    pub name: &'static str,
    /// Lowercase substrings that identify this provider's models.
    pub keywords: &'static [&'static str],
    /// Human-readable name for logs.
    pub display_name: &'static str,
    /// Gateways route any model and act as fallback.
    pub is_gateway: bool,
    /// OpenAI-compatible endpoint when the config gives none.
    pub default_api_base: &'static str,
    /// If the API key starts with this prefix, the key belongs to this provider.
    pub detect_by_key_prefix: Option<&'static str>,
}

/// Supported providers, in matching priority order.
pub static PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        name: "openrouter",
        keywords: &["openrouter"],
        display_name: "OpenRouter",
        is_gateway: true,
        default_api_base: "https://openrouter.ai/api/v1",
        detect_by_key_prefix: Some("sk-or-"),
    },
    ProviderSpec {
        name: "gemini",
        keywords: &["gemini"],
        display_name: "Gemini",
        is_gateway: false,
        default_api_base: "https://generativelanguage.googleapis.com/v1beta/openai",
        detect_by_key_prefix: None,
    },
    ProviderSpec {
        name: "openai",
        keywords: &["openai", "gpt", "o1", "o3"],
        display_name: "OpenAI",
        is_gateway: false,
        default_api_base: "https://api.openai.com/v1",
        detect_by_key_prefix: None,
    },
    ProviderSpec {
        name: "deepseek",
        keywords: &["deepseek"],
        display_name: "DeepSeek",
        is_gateway: false,
        default_api_base: "https://api.deepseek.com/v1",
        detect_by_key_prefix: None,
    },
];

// ─────────────────────────────────────────────
// Matching functions
// ─────────────────────────────────────────────

pub fn find_by_name(name: &str) -> Option<&'static ProviderSpec> {
    PROVIDERS.iter().find(|spec| spec.name == name)
}

/// Find a direct (non-gateway) provider by keyword.
///
/// An explicit `name/` prefix wins over keyword matching.
pub fn find_by_model(model: &str) -> Option<&'static ProviderSpec> {
    let model_lower = model.to_lowercase();
    if let Some((prefix, _)) = model_lower.split_once('/') {
        if let Some(spec) = find_by_name(prefix) {
            return Some(spec);
        }
    }
    PROVIDERS.iter().find(|spec| {
        !spec.is_gateway && spec.keywords.iter().any(|kw| model_lower.contains(kw))
    })
}

/// Model name as the provider's API expects it.
///
/// Strips the provider's own `name/` prefix. Gateways keep the remaining
/// vendor path (`openrouter/openai/gpt-4o` → `openai/gpt-4o`).
pub fn resolve_model_name(model: &str, spec: &ProviderSpec) -> String {
    model
        .strip_prefix(spec.name)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(model)
        .to_string()
}

/// Match a model name to a configured provider.
///
/// 1. Prefix or keyword match, only if that provider has an API key.
/// 2. A key whose prefix identifies a gateway.
/// 3. The first configured gateway.
pub fn match_provider<'a>(
    model: &str,
    providers: &'a ProvidersConfig,
) -> Option<(&'a ProviderConfig, &'static ProviderSpec)> {
    if let Some(spec) = find_by_model(model) {
        if let Some(config) = providers.get_by_name(spec.name) {
            if config.is_configured() {
                return Some((config, spec));
            }
        }
    }

    PROVIDERS
        .iter()
        .filter(|s| s.is_gateway)
        .find_map(|spec| {
            providers
                .get_by_name(spec.name)
                .filter(|c| c.is_configured())
                .map(|c| (c, spec))
        })
        .or_else(|| detect_by_key(providers))
}

/// Gateway keys are sometimes pasted into a direct provider's slot.
fn detect_by_key(providers: &ProvidersConfig) -> Option<(&ProviderConfig, &'static ProviderSpec)> {
    PROVIDERS.iter().find_map(|slot| {
        let config = providers.get_by_name(slot.name)?;
        let spec = PROVIDERS.iter().find(|s| {
            s.detect_by_key_prefix
                .is_some_and(|pfx| config.api_key.starts_with(pfx))
        })?;
        Some((config, spec))
    })
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn configured(key: &str) -> ProviderConfig {
        ProviderConfig {
            api_key: key.to_string(),
            api_base: None,
        }
    }

    #[test]
    fn test_find_by_model_prefix() {
        assert_eq!(find_by_model("gemini/gemini-2.5-flash").unwrap().name, "gemini");
        assert_eq!(find_by_model("openrouter/openai/gpt-4o").unwrap().name, "openrouter");
    }

    #[test]
    fn test_find_by_model_keyword() {
        assert_eq!(find_by_model("gpt-4o-mini").unwrap().name, "openai");
        assert_eq!(find_by_model("deepseek-chat").unwrap().name, "deepseek");
        assert!(find_by_model("llama-3").is_none());
    }

    #[test]
    fn test_resolve_model_name() {
        let gemini = find_by_name("gemini").unwrap();
        assert_eq!(resolve_model_name("gemini/gemini-2.5-flash", gemini), "gemini-2.5-flash");
        assert_eq!(resolve_model_name("gemini-2.5-flash", gemini), "gemini-2.5-flash");

        let router = find_by_name("openrouter").unwrap();
        assert_eq!(resolve_model_name("openrouter/openai/gpt-4o", router), "openai/gpt-4o");
        assert_eq!(resolve_model_name("openai/gpt-4o", router), "openai/gpt-4o");
    }

    #[test]
    fn test_match_direct_provider() {
        let mut providers = ProvidersConfig::default();
        providers.gemini = configured("g-key");
        let (config, spec) = match_provider("gemini/gemini-2.5-flash", &providers).unwrap();
        assert_eq!(spec.name, "gemini");
        assert_eq!(config.api_key, "g-key");
    }

    #[test]
    fn test_match_falls_back_to_gateway() {
        let mut providers = ProvidersConfig::default();
        providers.openrouter = configured("sk-or-abc");
        let (_, spec) = match_provider("gpt-4o", &providers).unwrap();
        assert_eq!(spec.name, "openrouter");
    }

    #[test]
    fn test_match_detects_gateway_key() {
        let mut providers = ProvidersConfig::default();
        providers.openai = configured("sk-or-misplaced");
        let (config, spec) = match_provider("llama-3", &providers).unwrap();
        assert_eq!(spec.name, "openrouter");
        assert_eq!(config.api_key, "sk-or-misplaced");
    }

    #[test]
    fn test_match_none_configured() {
        assert!(match_provider("gpt-4o", &ProvidersConfig::default()).is_none());
    }
}
