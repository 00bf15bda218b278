//! `polyagent memory`: direct access to the memory store.

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use polyagent_core::config::{load_config, Config};
use polyagent_core::memory::{MemoryStore, DEFAULT_METRIC_WINDOW_DAYS};
use polyagent_core::utils::thread_id;

use crate::runtime::{open_memory, profile_for};

#[derive(Subcommand)]
pub enum MemoryCommands {
    /// Show stored context of a user's thread
    Context {
        #[arg(short, long)]
        user: Option<String>,
        #[arg(short, long)]
        domain: Option<String>,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Show a user's preferences
    Prefs {
        #[arg(short, long)]
        user: Option<String>,
        #[arg(short, long)]
        domain: Option<String>,
    },

    /// Set a user preference
    SetPref {
        key: String,
        value: String,
        #[arg(short, long)]
        user: Option<String>,
        #[arg(short, long)]
        domain: Option<String>,
    },

    /// Show recent metrics
    Metrics {
        #[arg(short, long)]
        user: Option<String>,
        #[arg(short, long)]
        domain: Option<String>,
        #[arg(long, default_value_t = DEFAULT_METRIC_WINDOW_DAYS)]
        days: i64,
    },

    /// Delete old low-importance context and old metrics
    Cleanup {
        /// Retention window; defaults to memory.retentionDays
        #[arg(long)]
        days: Option<i64>,
    },
}

struct Target {
    user: String,
    agent_type: &'static str,
}

fn target(config: &Config, user: Option<String>, domain: Option<&str>) -> Result<Target> {
    Ok(Target {
        user: user.unwrap_or_else(|| config.agent.default_user.clone()),
        agent_type: profile_for(config, domain)?.agent_type,
    })
}

pub fn dispatch(action: MemoryCommands) -> Result<()> {
    let config = load_config(None);
    let store = open_memory(&config)?;
    run(&config, &store, action)
}

fn run(config: &Config, store: &MemoryStore, action: MemoryCommands) -> Result<()> {
    match action {
        MemoryCommands::Context { user, domain, limit } => {
            let t = target(config, user, domain.as_deref())?;
            let thread = thread_id(t.agent_type, &t.user);
            let items = store.get_context(&thread, t.agent_type, limit)?;
            println!("\n{} {}\n", "Context for".bold(), thread.cyan());
            if items.is_empty() {
                println!("  {}", "(empty)".dimmed());
            }
            for item in items {
                println!(
                    "  [{}] {} {}",
                    item.importance,
                    item.context_type.bold(),
                    item.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed()
                );
                println!("      {}", item.content);
            }
            println!();
        }
        MemoryCommands::Prefs { user, domain } => {
            let t = target(config, user, domain.as_deref())?;
            let prefs = store.get_preferences(&t.user, t.agent_type)?;
            println!();
            if prefs.is_empty() {
                println!("  {}", "(no preferences)".dimmed());
            }
            for (key, value) in prefs {
                println!("  {:<20} {}", key.bold(), value);
            }
            println!();
        }
        MemoryCommands::SetPref {
            key,
            value,
            user,
            domain,
        } => {
            let t = target(config, user, domain.as_deref())?;
            store.save_preference(&t.user, &key, &value, t.agent_type)?;
            println!("{} {key} = {value}", "✓".green());
        }
        MemoryCommands::Metrics { user, domain, days } => {
            let t = target(config, user, domain.as_deref())?;
            let metrics = store.get_metrics(t.agent_type, &t.user, days)?;
            println!();
            if metrics.is_empty() {
                println!("  {}", "(no metrics)".dimmed());
            }
            for m in metrics {
                println!(
                    "  {}  {:<18} {:.1}",
                    m.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
                    m.metric_type,
                    m.value
                );
            }
            println!();
        }
        MemoryCommands::Cleanup { days } => {
            let days = days.unwrap_or(config.memory.retention_days);
            let report = store.cleanup(days)?;
            println!(
                "{} removed {} context rows and {} metric rows older than {days} days",
                "✓".green(),
                report.contexts_deleted,
                report.metrics_deleted
            );
        }
    }
    Ok(())
}
