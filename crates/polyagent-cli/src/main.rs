//! Polyagent CLI entry point.
//!
//! # Commands
//!
//! - `polyagent chat [--domain D] [--user U]`: interactive REPL
//! - `polyagent ask -m TEXT`: single message
//! - `polyagent status`: configuration and credential status
//! - `polyagent memory ...`: inspect and maintain the memory store
//! - `polyagent tools [--domain D]`: connect every intent and report liveness
//! - `polyagent domains`: list built-in profiles

mod helpers;
mod memory_cmd;
mod repl;
mod runtime;
mod status;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use polyagent_agent::{DomainProfile, PROFILES};
use polyagent_core::config::load_config;

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// Polyagent: domain assistants with on-demand remote tools
#[derive(Parser)]
#[command(name = "polyagent", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat with a domain assistant
    Chat {
        /// Domain profile (dev, trading, betting, integration)
        #[arg(short, long)]
        domain: Option<String>,

        /// User identifier
        #[arg(short, long)]
        user: Option<String>,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Send a single message and print the reply
    Ask {
        #[arg(short, long)]
        message: String,

        #[arg(short, long)]
        domain: Option<String>,

        #[arg(short, long)]
        user: Option<String>,

        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Show configuration and credential status
    Status,

    /// Inspect and maintain the memory store
    Memory {
        #[command(subcommand)]
        action: memory_cmd::MemoryCommands,
    },

    /// Resolve every intent of a domain and report tool-server health
    Tools {
        #[arg(short, long)]
        domain: Option<String>,

        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// List domain profiles and their intents
    Domains,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Chat { domain, user, logs } => {
            init_logging(logs);
            let config = load_config(None);
            let handler = runtime::build_handler(&config, domain.as_deref())?;
            let user = user.unwrap_or_else(|| config.agent.default_user.clone());
            repl::run(handler, &user).await
        }
        Commands::Ask {
            message,
            domain,
            user,
            logs,
        } => {
            init_logging(logs);
            let config = load_config(None);
            let handler = runtime::build_handler(&config, domain.as_deref())?;
            let user = user.unwrap_or_else(|| config.agent.default_user.clone());
            info!(user = %user, domain = handler.profile().name, "Single message");
            let reply = handler
                .handle(&user, &message)
                .await
                .context("request failed")?;
            helpers::print_reply(handler.profile(), &reply);
            Ok(())
        }
        Commands::Status => status::run(),
        Commands::Memory { action } => {
            init_logging(false);
            memory_cmd::dispatch(action)
        }
        Commands::Tools { domain, logs } => {
            init_logging(logs);
            run_tools(domain.as_deref()).await
        }
        Commands::Domains => {
            print_domains();
            Ok(())
        }
    }
}

// ─────────────────────────────────────────────
// Tools / domains
// ─────────────────────────────────────────────

async fn run_tools(domain: Option<&str>) -> Result<()> {
    let config = load_config(None);
    config.validate()?;
    let profile = runtime::profile_for(&config, domain)?;
    let resolver = runtime::build_resolver(&config);

    println!();
    println!("{}", format!("🔧 {} tool servers", profile.display_name).cyan().bold());
    println!();

    for intent in profile.intents.intents() {
        let resolution = resolver.resolve(intent, &profile.toolsets).await;
        println!(
            "  {:<22} {:<10} {} tools",
            intent,
            resolution.label(),
            resolution.tools().len()
        );
    }

    println!();
    println!("  {}", "Cached connections:".bold());
    let report = resolver.check_cached_connections().await;
    if report.is_empty() {
        println!("    {}", "(none)".dimmed());
    }
    for (key, status) in &report {
        let status = if status == "OK" {
            status.green().to_string()
        } else {
            status.red().to_string()
        };
        println!("    {key:<50} {status}");
    }
    if resolver.fallback_active() {
        println!();
        println!("  {}", "Fallback mode is active.".yellow());
    }
    println!();
    Ok(())
}

fn print_domains() {
    println!();
    for profile in PROFILES {
        print_domain(profile);
    }
}

fn print_domain(profile: &DomainProfile) {
    println!(
        "{}  {}",
        profile.name.cyan().bold(),
        format!("{} (agent type: {})", profile.display_name, profile.agent_type).dimmed()
    );
    println!("  intents: {}", profile.intents.intents().join(", "));
    println!();
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("polyagent=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_chat_defaults() {
        let cli = Cli::try_parse_from(["polyagent", "chat"]).unwrap();
        match cli.command {
            Commands::Chat { domain, user, logs } => {
                assert!(domain.is_none());
                assert!(user.is_none());
                assert!(!logs);
            }
            _ => panic!("expected chat"),
        }
    }

    #[test]
    fn parse_ask() {
        let cli = Cli::try_parse_from(["polyagent", "ask", "-m", "oi", "--domain", "trading"]).unwrap();
        match cli.command {
            Commands::Ask { message, domain, .. } => {
                assert_eq!(message, "oi");
                assert_eq!(domain.as_deref(), Some("trading"));
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn ask_requires_message() {
        assert!(Cli::try_parse_from(["polyagent", "ask"]).is_err());
    }

    #[test]
    fn parse_memory_set_pref() {
        let cli = Cli::try_parse_from(["polyagent", "memory", "set-pref", "lang", "pt", "--user", "u1"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Memory {
                action: memory_cmd::MemoryCommands::SetPref { .. }
            }
        ));
    }
}
