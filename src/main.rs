mod analysis;
mod api;
mod cli;
mod config;
mod error;
mod metrics;
mod notify;
mod period;
mod pipeline;
mod scheduler;
mod store;
mod trends;

use crate::analysis::client::HttpModelClient;
use crate::cli::{Cli, Commands, ConfigCommands, ModelCommands};
use crate::config::Config;
use crate::error::DigestError;
use crate::metrics::client::HttpMetricsProvider;
use crate::period::ReportPeriod;
use crate::pipeline::CollectionOutcome;
use crate::store::Database;
use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            let config = load_config()?;
            run_service(config).await
        }
        Commands::Collect { start } => handle_collect(start).await,
        Commands::Status => handle_status(),
        Commands::Doctor => handle_doctor(),
        Commands::Config { command } => handle_config_command(command),
        Commands::Model { command } => handle_model_command(command).await,
    }
}

async fn run_service(config: Config) -> Result<()> {
    config.ensure_bootstrap_files()?;
    let _ = Database::open(&config.db_path)?;

    let shared_config = Arc::new(config);
    let api_config = Arc::clone(&shared_config);
    let scheduler_config = Arc::clone(&shared_config);
    let schedule_fallback = Arc::clone(&shared_config);

    info!("sitepulse service started");

    tokio::select! {
        scheduler_result = scheduler::run_weekly_scheduler(move || {
            let config = Config::load().unwrap_or_else(|_| (*schedule_fallback).clone());
            Ok((config.parse_report_day()?, config.parse_report_time()?))
        }, move |period| {
            let config = Arc::clone(&scheduler_config);
            async move {
                let runtime_config = Config::load().unwrap_or_else(|_| (*config).clone());
                run_scheduled_collection(&runtime_config, period).await
            }
        }) => {
            scheduler_result?;
        }
        api_result = api::run_server(api_config) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

async fn run_scheduled_collection(config: &Config, period: ReportPeriod) -> Result<()> {
    match run_collection_with(config, period).await {
        Ok(outcome) => {
            info!(
                report_id = outcome.report_id,
                hypotheses = outcome.hypothesis_ids.len(),
                "scheduled digest complete"
            );
            Ok(())
        }
        // Normal after a manual trigger earlier in the week.
        Err(DigestError::DuplicatePeriod { start }) => {
            info!(start = %start, "week already collected; skipping scheduled run");
            Ok(())
        }
        Err(error) => Err(error.into()),
    }
}

async fn run_collection_with(
    config: &Config,
    period: ReportPeriod,
) -> error::Result<CollectionOutcome> {
    let provider = HttpMetricsProvider::from_config(config)?;
    let model = HttpModelClient::from_config(config)?;
    let channel = notify::channel_from_config(config);

    let mut database = Database::open(&config.db_path)?;

    pipeline::run_collection(
        &mut database,
        &provider,
        &model,
        channel.as_deref(),
        &config.business_context,
        period,
    )
    .await
}

async fn handle_collect(start: Option<String>) -> Result<()> {
    let config = load_config()?;
    let period = match start {
        Some(raw) => ReportPeriod::parse(&raw)?,
        None => ReportPeriod::last_completed(Local::now().date_naive()),
    };

    let outcome = run_collection_with(&config, period).await?;

    println!("Report generated for {}", period.label());
    println!("- report_id: {}", outcome.report_id);
    println!("- hypotheses: {}", outcome.hypothesis_ids.len());

    Ok(())
}

fn handle_status() -> Result<()> {
    let config = load_config()?;
    let database = Database::open(&config.db_path)?;

    println!("sitepulse status");
    println!("- db_path: {}", config.db_path.display());
    println!("- api_port: {}", config.api_port);
    println!("- schedule: {} {}", config.report_day, config.report_time);

    match database.latest_report()? {
        Some(report) => {
            println!(
                "- latest_report: week of {} ({})",
                report.period_start,
                report.status.as_str()
            );
            if let Some(message) = report.error_message {
                println!("- last_error: {message}");
            }
        }
        None => println!("- latest_report: none"),
    }

    Ok(())
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path();
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing");
    }

    let config = load_or_default_config()?;

    match Database::open(&config.db_path) {
        Ok(_) => println!("[OK] SQLite reachable: {}", config.db_path.display()),
        Err(error) => {
            println!("[WARN] SQLite check failed: {error}");
            issues.push("db unreachable");
        }
    }

    if config.provider_property_id.trim().is_empty() {
        println!("[WARN] provider_property_id is not set");
        issues.push("provider property missing");
    } else {
        println!("[OK] provider property configured");
    }

    if config.resolve_provider_key().is_some() {
        println!("[OK] provider API key configured");
    } else {
        println!("[WARN] provider API key is missing");
        issues.push("provider key missing");
    }

    if config.resolve_model_key().is_some() {
        println!("[OK] model API key configured");
    } else {
        println!("[WARN] model API key is missing");
        issues.push("model key missing");
    }

    if config.resolve_trigger_token().is_some() {
        println!("[OK] trigger token configured");
    } else {
        println!("[WARN] trigger token is missing; /api/v1/collect will reject every call");
        issues.push("trigger token missing");
    }

    if config.notify_enabled {
        if config.resolve_bot_token().is_some() && !config.notify_chat_id.trim().is_empty() {
            println!("[OK] notification channel configured");
        } else {
            println!("[WARN] notifications enabled but bot token or chat id is missing");
            issues.push("notification channel incomplete");
        }
    } else {
        println!("[OK] notifications disabled");
    }

    match (config.parse_report_day(), config.parse_report_time()) {
        (Ok(_), Ok(_)) => println!(
            "[OK] weekly schedule valid: {} {}",
            config.report_day, config.report_time
        ),
        _ => {
            println!("[WARN] invalid report_day/report_time setting");
            issues.push("invalid schedule");
        }
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_or_default_config()?;
            config.set_value(&key, &value)?;
            config.ensure_bootstrap_files()?;
            config.save()?;

            let masked = if key.contains("key") || key.contains("token") {
                "***hidden***".to_string()
            } else {
                value
            };
            println!("Config saved: {key} = {masked}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

async fn handle_model_command(command: ModelCommands) -> Result<()> {
    match command {
        ModelCommands::Test {
            key,
            base_url,
            model,
        } => {
            let mut config = load_or_default_config()?;

            if let Some(value) = key {
                config.model_api_key = Some(value);
            }
            if let Some(value) = base_url {
                config.model_base_url = value;
            }
            if let Some(value) = model {
                config.model_name = value;
            }

            let client = HttpModelClient::from_config(&config)?;
            let response = client.test_connection().await?;

            println!("Model API connection successful");
            println!("{response}");

            Ok(())
        }
    }
}

fn load_or_default_config() -> Result<Config> {
    Config::load().or_else(|_| {
        let config = Config::default();
        config.ensure_bootstrap_files()?;
        config.save()?;
        Ok(config)
    })
}

fn load_config() -> Result<Config> {
    Config::load()
        .with_context(|| "Config file not found. Run `sitepulse config set <key> <value>` first.")
}
