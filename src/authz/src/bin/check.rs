//! Warrant Check - evaluate one request against a rule file
//!
//! Loads static privileges from a TOML rule file, evaluates a single
//! (resource, action, roles, attributes) request and exits with status 0
//! on grant and 1 on deny.

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use warrant_authz::{AccessRequest, AuthorizationEngine, EngineConfig, RuleSet};

/// Warrant authorization check CLI
#[derive(Parser)]
#[command(name = "warrant-check")]
#[command(about = "Evaluate an access request against a Warrant rule file")]
#[command(version)]
struct Cli {
    /// Path to the rule file
    #[arg(short, long, env = "WARRANT_RULES")]
    rules: PathBuf,

    /// Path to an engine configuration file
    #[arg(short, long, env = "WARRANT_CONFIG")]
    config: Option<PathBuf>,

    /// Resource being accessed
    #[arg(long)]
    resource: String,

    /// Action being performed
    #[arg(long)]
    action: String,

    /// Requester role (repeatable)
    #[arg(long = "role")]
    roles: Vec<String>,

    /// Request attribute as key=value (repeatable); values are parsed as JSON
    #[arg(long = "attr", value_parser = parse_attribute)]
    attributes: Vec<(String, Value)>,

    /// Print the full decision event as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Split `key=value`, reading the value as JSON and falling back to a string
fn parse_attribute(raw: &str) -> std::result::Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;

    if key.is_empty() {
        return Err(format!("attribute key is empty in '{}'", raw));
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn run(cli: Cli) -> Result<bool> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load engine config from {:?}", path))?,
        None => EngineConfig::default(),
    };

    let rules = RuleSet::load(&cli.rules)
        .with_context(|| format!("failed to load rules from {:?}", cli.rules))?;

    let engine = AuthorizationEngine::new(config).context("failed to create engine")?;
    let report = engine
        .registry()
        .load_rules(&rules)
        .context("failed to register rules")?;
    info!(
        "Loaded {} privileges from {:?} ({} duplicates skipped)",
        report.inserted, cli.rules, report.duplicates
    );

    let request = AccessRequest::new(cli.resource, cli.action)
        .with_roles(cli.roles)
        .with_attributes(cli.attributes.into_iter().collect());

    let event = engine.decide(&request, None)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&event)?);
    } else {
        println!("{}", event.summary());
    }

    Ok(event.granted)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},warrant_authz={}", log_level, log_level).into()),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(2)
        }
    }
}
