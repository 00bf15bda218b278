//! Shared CLI output helpers.

use colored::Colorize;

use polyagent_agent::{DomainProfile, Reply};

/// Print a handler reply to stdout.
pub fn print_reply(profile: &DomainProfile, reply: &Reply) {
    println!();
    println!("{}", format!("🤖 {}", profile.display_name).cyan().bold());
    println!("{}", reply_meta(reply).dimmed());
    println!("{}", reply.content);
    println!();
}

/// `intent · tools` line shown above each reply.
pub fn reply_meta(reply: &Reply) -> String {
    let mut meta = format!("intent: {} · tools: {}", reply.intent, reply.tools_available);
    if reply.fallback {
        meta.push_str(" · fallback mode");
    }
    meta
}

/// Print the banner shown at REPL start.
pub fn print_banner(profile: &DomainProfile, user_id: &str, thread_id: &str) {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!(
        "{}  v{}",
        format!("🤖 Polyagent · {}", profile.display_name).cyan().bold(),
        version.dimmed()
    );
    println!("{}", format!("user: {user_id} · thread: {thread_id}").dimmed());
    println!("{}", "Type \"help\" for commands, \"exit\" to quit.".dimmed());
    println!();
}

pub fn print_thinking() {
    eprint!("{}", "⠿ thinking...".dimmed());
}

pub fn clear_thinking() {
    eprint!("\r{}\r", " ".repeat(40));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(fallback: bool) -> Reply {
        Reply {
            thread_id: "dev_u1".into(),
            intent: "backend".into(),
            content: "ok".into(),
            tools_available: 3,
            fallback,
        }
    }

    #[test]
    fn meta_line() {
        assert_eq!(reply_meta(&reply(false)), "intent: backend · tools: 3");
    }

    #[test]
    fn meta_line_fallback() {
        assert!(reply_meta(&reply(true)).ends_with("· fallback mode"));
    }
}
