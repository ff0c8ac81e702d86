use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use oncall_alerts::config::{AlertConfig, Config};
use oncall_alerts::directory::{ConfigTiers, ShiftRoster};
use oncall_alerts::engine::timers::TokioTimers;
use oncall_alerts::engine::EscalationEngine;
use oncall_alerts::notify::{LogNotifier, Notifier, WebhookNotifier};
use oncall_alerts::{alerts::store::AlertStore, init_tracing};

#[derive(Parser, Debug)]
#[command(author, version, about = "On-call alert escalation engine", long_about = None)]
struct Args {
    /// Service the alert is about
    #[arg(default_value = "database")]
    service: String,

    /// Alert message
    #[arg(default_value = "Connection timeout detected")]
    message: String,

    /// Config file path (defaults to ~/.oncall-alerts/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Shift roster path (defaults to ~/.oncall-alerts/roster.json)
    #[arg(long)]
    roster: Option<PathBuf>,

    /// Deliver notifications to this webhook URL instead of the log
    #[arg(long)]
    webhook: Option<String>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Err(e) = Config::ensure_log_directory() {
        eprintln!("Warning: could not create log directory: {}", e);
    }
    init_tracing(args.verbose, Some(Config::log_file_path()));

    info!("oncall-alerts v{} starting", Config::version());

    let config = match &args.config {
        Some(path) => AlertConfig::load_from(path),
        None => AlertConfig::load(),
    };
    let roster_path = args
        .roster
        .clone()
        .unwrap_or_else(Config::roster_file_path);
    let roster = ShiftRoster::load_or_default(&roster_path);
    let tiers = ConfigTiers::from_config(&config);

    let notifier: Arc<dyn Notifier> = match &args.webhook {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())?),
        None => Arc::new(LogNotifier),
    };

    let engine = EscalationEngine::new(
        config,
        Arc::new(AlertStore::new()),
        Arc::new(roster),
        Arc::new(tiers),
        Arc::new(TokioTimers),
        notifier,
    );

    let id = match engine.create(&args.service, &args.message) {
        Ok(id) => id,
        Err(e) => {
            error!("Engine: could not create alert: {}", e);
            return Err(e.into());
        }
    };
    println!("Alert {} created, escalation armed. Press Ctrl-C to stop.", id);

    tokio::signal::ctrl_c().await?;

    let view = engine.status(&id)?;
    println!(
        "Alert {} final state: {:?} (level {}, holder {})",
        view.id, view.status, view.escalation_level, view.current_target.name
    );
    Ok(())
}
