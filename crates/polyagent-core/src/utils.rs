//! Small helpers shared across crates: data paths, thread ids, string trimming.

use std::path::PathBuf;

/// Root data directory (`~/.polyagent/`).
pub fn get_data_path() -> PathBuf {
    home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".polyagent")
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => home_dir().unwrap_or_else(|| PathBuf::from(".")).join(rest),
        None if path == "~" => home_dir().unwrap_or_else(|| PathBuf::from(".")),
        None => PathBuf::from(path),
    }
}

/// Conversation thread id for a user within one agent domain.
///
/// One user talking to two domains gets two independent threads.
pub fn thread_id(agent_type: &str, user_id: &str) -> String {
    format!("{agent_type}_{user_id}")
}

/// Cut `s` to at most `max_len` characters, marking the cut with `...`.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Keep the first `max_len` characters without a marker (stored excerpts).
pub fn take_chars(s: &str, max_len: usize) -> String {
    s.chars().take(max_len).collect()
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| std::env::var("USERPROFILE").ok().map(PathBuf::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string() {
        assert_eq!(truncate_string("oi", 10), "oi");
    }

    #[test]
    fn test_truncate_long_string() {
        let result = truncate_string("analise o BTC/USDT no grafico de 4h", 15);
        assert_eq!(result, "analise o BT...");
        assert_eq!(result.chars().count(), 15);
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate_string("estatísticas", 6), "est...");
    }

    #[test]
    fn test_take_chars_has_no_marker() {
        assert_eq!(take_chars("ação rápida", 4), "ação");
        assert_eq!(take_chars("abc", 10), "abc");
    }

    #[test]
    fn test_thread_id_format() {
        assert_eq!(thread_id("dev", "a1b2c3d4"), "dev_a1b2c3d4");
    }

    #[test]
    fn test_expand_home() {
        let expanded = expand_home("~/x/y.db");
        assert!(!expanded.starts_with("~"));
        assert!(expanded.ends_with("x/y.db"));
        assert_eq!(expand_home("/abs/p.db"), PathBuf::from("/abs/p.db"));
    }

    #[test]
    fn test_data_paths() {
        assert!(get_data_path().ends_with(".polyagent"));
    }
}
