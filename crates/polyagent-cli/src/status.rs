//! `polyagent status`: configuration and credential status.

use anyhow::Result;
use colored::Colorize;

use polyagent_core::config::{get_config_path, load_config};
use polyagent_core::utils::expand_home;
use polyagent_providers::registry::PROVIDERS;

fn mark(ok: bool, missing: &str) -> String {
    if ok {
        "✓".green().to_string()
    } else {
        missing.red().to_string()
    }
}

pub fn run() -> Result<()> {
    let config = load_config(None);
    let config_path = get_config_path();

    println!();
    println!("{}", "🤖 Polyagent Status".cyan().bold());
    println!();

    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        config_path.display(),
        mark(config_path.exists(), "(not found, using defaults)")
    );
    println!("  {:<18} {}", "Domain:".bold(), config.agent.domain);
    println!("  {:<18} {}", "Model:".bold(), config.llm.model);
    println!(
        "  {:<18} {} | max_tokens: {} | tool iterations: {}",
        "Parameters:".bold(),
        format!("temp: {}", config.llm.temperature).dimmed(),
        format!("{}", config.llm.max_tokens).dimmed(),
        format!("{}", config.llm.max_tool_iterations).dimmed(),
    );

    println!();
    println!("  {}", "Providers:".bold());
    for spec in PROVIDERS {
        let status = match config.llm.providers.get_by_name(spec.name) {
            Some(p) if p.is_configured() => format!("{} (key set)", "✓".green()),
            _ => format!("{}", "· not configured".dimmed()),
        };
        println!("    {:<20} {}", spec.display_name, status);
    }

    println!();
    let key_status = match config.validate() {
        Ok(()) => format!("{} (key set)", "✓".green()),
        Err(e) => e.to_string().red().to_string(),
    };
    println!("  {:<18} {}", "Tool servers:".bold(), key_status);
    println!("  {:<18} {}", "Server host:".bold(), config.tool_servers.base_url);
    if !config.tool_servers.servers.is_empty() {
        let names: Vec<&str> = config.tool_servers.servers.keys().map(String::as_str).collect();
        println!("  {:<18} {}", "Custom servers:".bold(), names.join(", "));
    }

    let db_path = expand_home(&config.memory.db_path);
    println!(
        "  {:<18} {} {}",
        "Memory DB:".bold(),
        db_path.display(),
        mark(db_path.exists(), "(not created yet)")
    );
    println!();

    Ok(())
}
