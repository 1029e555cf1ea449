mod args;
mod config;
mod dirs;

use std::error::Error;
use std::process::ExitCode;

use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracker_app::{
    AppConfig, AppState, CheckReport, LimitReply, PendingStatus, ResponseOutcome, UsageSnapshot,
};
use tracker_core::Thresholds;

use crate::args::{Cli, Command};
use crate::config::CliConfig;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn Error>> {
    let data_dir = dirs::resolve_data_dir(cli.data_dir.as_deref())?;
    let load = config::load_or_create(&data_dir)?;
    init_tracing(&load.config);
    if load.created {
        info!(path = %load.file.display(), "created cli config");
    }
    debug!(data_dir = %data_dir.display(), "using data dir");

    let sources = dirs::resolve_log_sources(
        &cli.log,
        cli.home.as_deref(),
        load.config.openclaw_home.as_deref(),
    );
    let mut app_config = AppConfig::new(data_dir, sources);
    app_config.record_history = load.config.record_history && !cli.no_history;
    let state = AppState::new(app_config);
    let now = Utc::now();

    match &cli.command {
        Command::Init => {
            let created = state.initialize()?;
            let path = state.config.paths.store.config_path.display().to_string();
            if cli.json {
                print_json(&json!({ "created": created, "config_path": path }))?;
            } else if created {
                println!("Wrote default tracking config to {path}");
            } else {
                println!("Tracking config already present at {path}");
            }
        }
        Command::Report => {
            let snapshot = state.services.usage.snapshot();
            if cli.json {
                print_json(&snapshot)?;
            } else {
                print_snapshot(&snapshot);
            }
        }
        Command::Check => {
            let report = state.services.alerts.check(now)?;
            if cli.json {
                print_json(&report)?;
            } else {
                print_check(&report);
            }
        }
        Command::Respond { .. } => {
            let text = cli.command.text().unwrap_or_default();
            let outcome = state.services.limits.respond(&text, now)?;
            return print_outcome(&outcome, cli.json);
        }
        Command::Limit { .. } => {
            let text = cli.command.text().unwrap_or_default();
            match state.services.limits.adjust(&text) {
                Ok(reply) => print_reply(&reply, cli.json)?,
                Err(tracker_app::AppError::Limit(err)) => {
                    eprintln!("{err}");
                    return Ok(ExitCode::from(2));
                }
                Err(err) => return Err(err.into()),
            }
        }
        Command::Thresholds => {
            let thresholds = state.services.limits.current()?;
            if cli.json {
                print_json(&thresholds)?;
            } else {
                print_thresholds(&thresholds);
            }
        }
        Command::Pending => {
            let status = state.services.pending.status(now)?;
            if cli.json {
                print_json(&status)?;
            } else {
                print_pending(&status);
            }
        }
        Command::MarkSent => {
            state.services.pending.mark_sent(now)?;
            let status = state.services.pending.status(now)?;
            if cli.json {
                print_json(&status)?;
            } else {
                print_pending(&status);
            }
        }
        Command::MarkProcessed => {
            let state_doc = state.services.pending.mark_processed()?;
            if cli.json {
                print_json(&state_doc)?;
            } else {
                println!("Reply window closed.");
            }
        }
        Command::ResetMilestones => {
            let milestones = state.services.alerts.reset_milestones(now)?;
            if cli.json {
                print_json(&milestones)?;
            } else {
                println!("Milestones reset.");
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// `RUST_LOG` wins over the configured level. Logs go to stderr so JSON
/// output on stdout stays parseable.
fn init_tracing(config: &CliConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.log_level;
        EnvFilter::new(format!(
            "token_tracker_cli={level},tracker_app={level},tracker_store={level},ingest={level},warn"
        ))
    });

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    if config.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_snapshot(snapshot: &UsageSnapshot) {
    if snapshot.usage.is_empty() {
        println!("No usage found.");
    }
    for cost in &snapshot.costs.models {
        println!(
            "{:<40} {:>12} tokens  ${:.4}",
            cost.model_id, cost.token_count, cost.total_cost
        );
    }
    for model in &snapshot.costs.unpriced_models {
        println!("{model:<40} (no price)");
    }
    println!(
        "Total: {} tokens, ${:.4} across {} files",
        snapshot.total_tokens(),
        snapshot.total_cost(),
        snapshot.stats.files_scanned
    );
    for issue in &snapshot.stats.issues {
        eprintln!("warning: {}: {}", issue.file_path, issue.message);
    }
}

fn print_check(report: &CheckReport) {
    println!("Total cost: ${:.2}", report.snapshot.total_cost());
    if !report.alerts.config_loaded {
        println!("(tracking config unavailable; default thresholds used)");
    }
    if report.alerts.evaluation.alerts.is_empty() {
        println!("No alerts.");
    }
    for alert in &report.alerts.evaluation.alerts {
        println!();
        println!("{}", alert.message);
    }
    if let Some(prompt) = &report.alerts.reply_prompt {
        println!();
        println!("{prompt}");
    }
    if let Some(progress) = &report.alerts.evaluation.progress {
        println!();
        println!(
            "Milestones: {} reached, next at ${:.2}",
            progress.milestones_completed, progress.next_milestone
        );
    }
}

fn print_outcome(outcome: &ResponseOutcome, as_json: bool) -> Result<ExitCode, Box<dyn Error>> {
    match outcome {
        ResponseOutcome::Ignored => {
            if as_json {
                print_json(&json!({ "status": "ignored" }))?;
            } else {
                println!("No limit alert is awaiting a reply.");
            }
            Ok(ExitCode::SUCCESS)
        }
        ResponseOutcome::Applied(reply) => {
            print_reply(reply, as_json)?;
            Ok(ExitCode::SUCCESS)
        }
        ResponseOutcome::Rejected(err) => {
            if as_json {
                print_json(&json!({ "status": "rejected", "error": err.to_string() }))?;
            } else {
                eprintln!("{err}");
            }
            Ok(ExitCode::from(2))
        }
    }
}

fn print_reply(reply: &LimitReply, as_json: bool) -> Result<(), serde_json::Error> {
    if as_json {
        return print_json(&json!({ "status": "applied", "reply": reply }));
    }
    println!("{}", reply.confirmation);
    Ok(())
}

fn print_thresholds(thresholds: &Thresholds) {
    println!("Daily limit:   ${:.2}", thresholds.daily_cost_limit);
    println!("Weekly limit:  ${:.2}", thresholds.weekly_cost_limit);
    println!("Monthly limit: ${:.2}", thresholds.monthly_cost_limit);
    println!(
        "Warning at {:.0}%: ${:.2}",
        thresholds.warning_fraction * 100.0,
        thresholds.warning_threshold()
    );
    match thresholds.critical_threshold() {
        Some(critical) => println!("Critical at: ${critical:.2}"),
        None => println!("Critical alerts: disabled"),
    }
    println!("Milestone every: ${:.2}", thresholds.alert_every_dollars);
}

fn print_pending(status: &PendingStatus) {
    match (&status.expires_at, &status.alert_sent_at) {
        (Some(expires), _) => println!("Awaiting a reply until {expires}."),
        (None, Some(sent)) if status.awaiting_response => {
            println!("Reply window from {sent} has expired.")
        }
        _ => println!("No limit alert is awaiting a reply."),
    }
}
