//! Interactive REPL on top of a [`RequestHandler`].
//!
//! Uses `rustyline` for readline-style editing with persistent history.

use anyhow::Result;
use colored::Colorize;
use rustyline::config::Configurer;
use rustyline::history::DefaultHistory;
use rustyline::{DefaultEditor, Editor};
use tracing::debug;

use polyagent_agent::{HandlerError, RequestHandler};

use crate::helpers;

/// Exit commands (case-insensitive match).
const EXIT_COMMANDS: &[&str] = &["exit", "quit", "sair", "/exit", "/quit", "/sair", ":q"];

#[derive(Debug, PartialEq, Eq)]
enum ReplCommand<'a> {
    Exit,
    Help,
    Clear,
    Status,
    ResetTools,
    Message(&'a str),
}

fn parse_command(input: &str) -> ReplCommand<'_> {
    let lower = input.to_lowercase();
    if EXIT_COMMANDS.contains(&lower.as_str()) {
        return ReplCommand::Exit;
    }
    match lower.as_str() {
        "help" | "/help" | "ajuda" => ReplCommand::Help,
        "/clear" => ReplCommand::Clear,
        "/status" => ReplCommand::Status,
        "/reset-tools" => ReplCommand::ResetTools,
        _ => ReplCommand::Message(input),
    }
}

pub async fn run(handler: RequestHandler, user_id: &str) -> Result<()> {
    let thread_id = handler.thread_id(user_id);
    helpers::print_banner(handler.profile(), user_id, &thread_id);

    let mut editor = create_editor()?;

    loop {
        let input = match editor.readline("You: ") {
            Ok(line) => line,
            Err(rustyline::error::ReadlineError::Interrupted) | Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {e}");
                break;
            }
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(&input);

        match parse_command(trimmed) {
            ReplCommand::Exit => {
                println!("\nGoodbye! 👋");
                break;
            }
            ReplCommand::Help => print_help(&handler),
            ReplCommand::Clear => {
                handler.reset_thread(user_id).await;
                println!("{}\n", "Session cleared. Stored memory is kept.".green());
            }
            ReplCommand::Status => print_status(&handler, user_id).await,
            ReplCommand::ResetTools => {
                handler.resolver().reset_fallback().await;
                println!("{}\n", "Tool cache cleared, fallback mode off.".green());
            }
            ReplCommand::Message(text) => {
                debug!(thread_id = %thread_id, "processing input");
                helpers::print_thinking();
                let result = handler.handle(user_id, text).await;
                helpers::clear_thinking();
                match result {
                    Ok(reply) => helpers::print_reply(handler.profile(), &reply),
                    Err(HandlerError::EmptyMessage) => {}
                    Err(e) => eprintln!("\n❌ Error: {e}\n"),
                }
            }
        }
    }

    save_history(&mut editor);
    Ok(())
}

fn print_help(handler: &RequestHandler) {
    let profile = handler.profile();
    println!();
    println!("{}", profile.display_name.cyan().bold());
    println!("{}", profile.help);
    println!();
    println!("  {:<14} {}", "/clear", "forget this session's history");
    println!("  {:<14} {}", "/status", "memory and tool status");
    println!("  {:<14} {}", "/reset-tools", "leave fallback mode and reconnect tools");
    println!("  {:<14} {}", "exit", "quit");
    println!();
}

async fn print_status(handler: &RequestHandler, user_id: &str) {
    match handler.memory_status(user_id).await {
        Ok(status) => {
            let last = status
                .last_activity
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "never".into());
            println!();
            println!("  {:<16} {}", "Thread:".bold(), status.thread_id);
            println!("  {:<16} {}", "Context items:".bold(), status.context_items);
            println!("  {:<16} {}", "Last activity:".bold(), last);
            println!("  {:<16} {}", "Session cached:".bold(), status.session_cached);
        }
        Err(e) => eprintln!("\n❌ Error: {e}"),
    }
    let fallback = if handler.resolver().fallback_active() {
        "active".yellow().to_string()
    } else {
        "off".green().to_string()
    };
    println!("  {:<16} {}", "Fallback:".bold(), fallback);
    for (key, health) in handler.resolver().check_cached_connections().await {
        println!("    {key:<48} {health}");
    }
    println!();
}

fn create_editor() -> Result<Editor<(), DefaultHistory>> {
    let mut editor = DefaultEditor::new()?;
    editor.set_max_history_size(1000)?;

    let history_path = history_path();
    if history_path.exists() {
        let _ = editor.load_history(&history_path);
        debug!("loaded REPL history from {}", history_path.display());
    }

    Ok(editor)
}

fn save_history(editor: &mut Editor<(), DefaultHistory>) {
    let path = history_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = editor.save_history(&path) {
        debug!("failed to save history: {e}");
    }
}

fn history_path() -> std::path::PathBuf {
    polyagent_core::utils::get_data_path().join("history").join("cli_history")
}
