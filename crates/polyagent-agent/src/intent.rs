//! Keyword intent classifier.
//!
//! One algorithm, many tables: a [`KeywordTable`] is an ordered list of
//! `(intent, keywords)` rules. The first rule with a keyword occurring in the
//! lowercased text wins; anything else is [`GENERAL_INTENT`].

/// Label for text that matches no rule.
pub const GENERAL_INTENT: &str = "geral";

/// One classification rule.
#[derive(Clone, Copy, Debug)]
pub struct IntentRule {
    pub intent: &'static str,
    pub keywords: &'static [&'static str],
}

/// Ordered rules for one domain.
#[derive(Clone, Copy, Debug)]
pub struct KeywordTable {
    rules: &'static [IntentRule],
}

impl KeywordTable {
    pub const fn new(rules: &'static [IntentRule]) -> Self {
        Self { rules }
    }

    /// Intent for `text`. Pure and deterministic.
    pub fn classify(&self, text: &str) -> &'static str {
        let lowered = text.to_lowercase();
        if lowered.trim().is_empty() {
            return GENERAL_INTENT;
        }
        self.rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|kw| lowered.contains(kw)))
            .map_or(GENERAL_INTENT, |rule| rule.intent)
    }

    /// Every label this table can produce, in declaration order, then `geral`.
    pub fn intents(&self) -> Vec<&'static str> {
        let mut labels: Vec<&'static str> = self.rules.iter().map(|r| r.intent).collect();
        labels.push(GENERAL_INTENT);
        labels
    }

    pub fn rules(&self) -> &'static [IntentRule] {
        self.rules
    }
}

// ─────────────────────────────────────────────
// Built-in tables
// ─────────────────────────────────────────────

pub const DEV_TABLE: KeywordTable = KeywordTable::new(&[
    IntentRule {
        intent: "backend",
        keywords: &["serializer", "model", "view", "drf", "django"],
    },
    IntentRule {
        intent: "frontend",
        keywords: &["react native", "component", "hook", "context"],
    },
    IntentRule {
        intent: "refatoracao",
        keywords: &["refatore", "melhore", "otimize"],
    },
    IntentRule {
        intent: "explicacao",
        keywords: &["explique", "o que faz", "entenda esse código"],
    },
    IntentRule {
        intent: "debug",
        keywords: &["erro", "stacktrace", "exception"],
    },
    IntentRule {
        intent: "snippet",
        keywords: &["snippet", "exemplo", "como faço"],
    },
]);

pub const TRADING_TABLE: KeywordTable = KeywordTable::new(&[
    IntentRule {
        intent: "analise_mercado",
        keywords: &[
            "análise", "analise", "preço", "precos", "gráfico", "grafico", "tendência",
            "tendencia", "indicador", "rsi", "macd", "bollinger",
        ],
    },
    IntentRule {
        intent: "trading_automatico",
        keywords: &[
            "comprar", "vender", "ordem", "trade", "trading", "bot", "automatico",
            "automático", "estratégia", "estrategia",
        ],
    },
    IntentRule {
        intent: "gestao_risco",
        keywords: &[
            "risco", "stop", "loss", "profit", "posição", "posicao", "portfolio",
            "diversificação", "diversificacao",
        ],
    },
    IntentRule {
        intent: "monitoramento",
        keywords: &[
            "relatório", "relatorio", "performance", "lucro", "prejuízo", "prejuizo",
            "histórico", "historico", "monitorar",
        ],
    },
    IntentRule {
        intent: "configuracao",
        keywords: &[
            "configurar", "setup", "api", "chave", "conectar", "autenticação", "autenticacao",
        ],
    },
]);

/// `histórico` appears under both sports analysis and reports; the earlier
/// rule wins.
pub const BETTING_TABLE: KeywordTable = KeywordTable::new(&[
    IntentRule {
        intent: "analise_esportiva",
        keywords: &[
            "análise", "analise", "estatística", "estatistica", "time", "jogador", "equipe",
            "histórico", "historico", "forma", "desempenho",
        ],
    },
    IntentRule {
        intent: "gestao_apostas",
        keywords: &[
            "aposta", "apostar", "bet", "stake", "bankroll", "gestão", "gestao", "estratégia",
            "estrategia",
        ],
    },
    IntentRule {
        intent: "analise_odds",
        keywords: &[
            "odds", "cotação", "cotacao", "probabilidade", "value", "arbitragem", "comparar",
        ],
    },
    IntentRule {
        intent: "futebol",
        keywords: &["futebol", "football", "soccer", "copa", "campeonato", "liga"],
    },
    IntentRule {
        intent: "basquete",
        keywords: &["basquete", "basketball", "nba", "euroliga"],
    },
    IntentRule {
        intent: "tenis",
        keywords: &["tênis", "tennis", "atp", "wta", "grand slam"],
    },
    IntentRule {
        intent: "esports",
        keywords: &["e-sports", "esports", "cs:go", "lol", "dota"],
    },
    IntentRule {
        intent: "relatorios",
        keywords: &[
            "relatório", "relatorio", "roi", "lucro", "prejuízo", "prejuizo", "performance",
            "histórico", "historico",
        ],
    },
    IntentRule {
        intent: "configuracao",
        keywords: &["configurar", "setup", "conta", "login", "api", "conectar"],
    },
]);

/// Integration assistant: no rules, every message is `geral`.
pub const INTEGRATION_TABLE: KeywordTable = KeywordTable::new(&[]);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_is_general() {
        assert_eq!(DEV_TABLE.classify(""), GENERAL_INTENT);
        assert_eq!(DEV_TABLE.classify("   "), GENERAL_INTENT);
    }

    #[test]
    fn test_unmatched_text_is_general() {
        assert_eq!(DEV_TABLE.classify("bom dia"), GENERAL_INTENT);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(DEV_TABLE.classify("Crie um SERIALIZER para User"), "backend");
        assert_eq!(TRADING_TABLE.classify("Qual o RSI do BTC?"), "analise_mercado");
    }

    #[test]
    fn test_first_matching_rule_wins() {
        // "model" (backend) and "erro" (debug) both occur; backend is declared first.
        assert_eq!(DEV_TABLE.classify("erro ao salvar o model"), "backend");
        assert_eq!(DEV_TABLE.classify("erro no deploy"), "debug");
    }

    #[test]
    fn test_dev_rules() {
        assert_eq!(DEV_TABLE.classify("crie um componente react native"), "frontend");
        assert_eq!(DEV_TABLE.classify("refatore essa função"), "refatoracao");
        assert_eq!(DEV_TABLE.classify("explique essa função"), "explicacao");
        assert_eq!(DEV_TABLE.classify("como faço um loop"), "snippet");
    }

    #[test]
    fn test_betting_history_goes_to_sports_analysis() {
        assert_eq!(BETTING_TABLE.classify("histórico do flamengo"), "analise_esportiva");
        assert_eq!(BETTING_TABLE.classify("meu roi do mês"), "relatorios");
        assert_eq!(BETTING_TABLE.classify("odds da final"), "analise_odds");
    }

    #[test]
    fn test_trading_rules() {
        assert_eq!(TRADING_TABLE.classify("comprar ETH agora"), "trading_automatico");
        assert_eq!(TRADING_TABLE.classify("ajuste meu stop"), "gestao_risco");
        assert_eq!(TRADING_TABLE.classify("quero um relatório"), "monitoramento");
        assert_eq!(TRADING_TABLE.classify("configurar a chave"), "configuracao");
    }

    #[test]
    fn test_integration_table_always_general() {
        assert_eq!(INTEGRATION_TABLE.classify("integrar api de pagamentos"), GENERAL_INTENT);
        assert_eq!(INTEGRATION_TABLE.intents(), vec![GENERAL_INTENT]);
    }

    #[test]
    fn test_intents_lists_general_last() {
        let intents = DEV_TABLE.intents();
        assert_eq!(intents.first(), Some(&"backend"));
        assert_eq!(intents.last(), Some(&GENERAL_INTENT));
        assert_eq!(intents.len(), 7);
    }
}
