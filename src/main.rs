use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use duewatch::alerts::{self, Alert, Severity};
use duewatch::collectors::entities::{EntitySource, JsonFileSource};
use duewatch::config::Config;
use duewatch::coordinator::RefreshCoordinator;
use duewatch::dispatcher::NotificationDispatcher;
use duewatch::util::kv_store::{FileKvStore, KeyValueStore, MemoryKvStore};
use duewatch::util::notify::{FanoutChannel, LogChannel, NotificationChannel, NotifySendChannel};
use duewatch::util::threshold_store::{validate_threshold, AlertThresholdConfig, ThresholdStore};
use duewatch::util::{alert_log, webhook::WebhookChannel};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "duewatch", about = "Deadline alert monitor", version = "0.1")]
struct Cli {
    /// JSON file of tracked entities (overrides general.source_path)
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Refresh interval in seconds (overrides general.refresh_interval_sec)
    #[arg(short, long)]
    interval: Option<u64>,

    /// One-shot check: exit 0=no alerts, 1=warnings only, 2=danger (nagios/cron compatible)
    #[arg(long)]
    check: bool,

    /// Print a one-shot JSON snapshot of current alerts and exit
    #[arg(long)]
    json: bool,

    /// Poll on the refresh interval until Ctrl-C, logging new alerts
    #[arg(long)]
    daemon: bool,

    /// Persist a new alert threshold (days) and exit
    #[arg(long, value_name = "DAYS", allow_negative_numbers = true)]
    set_threshold: Option<i64>,

    /// Print recent alert log entries and exit
    #[arg(long)]
    alerts: bool,

    /// Number of alert log entries to show (used with --alerts)
    #[arg(long, default_value_t = 50)]
    last: usize,

    /// Print config file path and current values, then exit
    #[arg(long)]
    config: bool,

    /// Print shell completions and exit
    #[arg(long, value_name = "SHELL")]
    completions: Option<Shell>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        clap_complete::generate(shell, &mut Cli::command(), "duewatch", &mut io::stdout());
        return Ok(());
    }

    let mut cfg = Config::load();
    if let Some(secs) = cli.interval {
        cfg.general.refresh_interval_sec = secs;
    }
    init_logging(&cfg);

    if cli.config {
        return run_print_config(&cfg);
    }
    if cli.alerts {
        return run_alerts(cli.last);
    }
    if let Some(days) = cli.set_threshold {
        return run_set_threshold(&cfg, days);
    }
    if cli.check {
        return run_check(&cfg, cli.source.as_ref()).await;
    }
    if cli.json {
        return run_json_snapshot(&cfg, cli.source.as_ref()).await;
    }
    if cli.daemon {
        return run_daemon(&cfg, cli.source.as_ref()).await;
    }

    Cli::command().print_help()?;
    Ok(())
}

fn init_logging(cfg: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,duewatch=info"));
    let registry = tracing_subscriber::registry().with(filter);

    if cfg.logging.format == "json" {
        registry.with(fmt::layer().json().with_writer(io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_target(false).with_writer(io::stderr)).init();
    }
}

// ── Wiring ────────────────────────────────────────────────────────────

fn threshold_store(cfg: &Config) -> ThresholdStore {
    let kv: Arc<dyn KeyValueStore> = match cfg.state_dir() {
        Some(dir) => Arc::new(FileKvStore::new(dir)),
        None => {
            warn!("no state directory available, threshold changes will not persist");
            Arc::new(MemoryKvStore::new())
        }
    };
    ThresholdStore::new(kv)
}

fn entity_source(cfg: &Config, cli_source: Option<&PathBuf>) -> Result<JsonFileSource> {
    let path = match cli_source {
        Some(p) => p.clone(),
        None if !cfg.general.source_path.is_empty() => PathBuf::from(&cfg.general.source_path),
        None => bail!("no entity source: pass --source or set general.source_path"),
    };
    Ok(JsonFileSource::new(path))
}

fn notification_channel(cfg: &Config) -> Arc<dyn NotificationChannel> {
    let mut channels: Vec<Arc<dyn NotificationChannel>> = vec![Arc::new(LogChannel)];
    if cfg.notifications.notify_send {
        channels.push(Arc::new(NotifySendChannel));
    }
    if let Some(hook) = WebhookChannel::new(&cfg.notifications.webhook_url) {
        channels.push(Arc::new(hook));
    }
    Arc::new(FanoutChannel::new(channels))
}

/// Fetch and evaluate once, outside any coordinator.
async fn evaluate_once(cfg: &Config, cli_source: Option<&PathBuf>) -> Result<(u32, Vec<Alert>)> {
    let source = entity_source(cfg, cli_source)?;
    let threshold = threshold_store(cfg).load().alert_threshold_days;
    let entities = source.fetch_tracked_entities().await
        .context("failed to fetch tracked entities")?;
    Ok((threshold, alerts::evaluate(&entities, threshold)))
}

// ── Modes ─────────────────────────────────────────────────────────────

fn run_print_config(cfg: &Config) -> Result<()> {
    let path = Config::config_path()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "(unknown)".to_string());
    let state = cfg.state_dir()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "(in-memory)".to_string());
    let n = &cfg.notifications;
    println!("Config: {}", path);
    println!("State:  {}", state);
    println!();
    println!("[general]");
    println!("  refresh_interval_sec = {}", cfg.general.refresh_interval_sec);
    println!("  source_path          = {}", if cfg.general.source_path.is_empty() { "(not set)" } else { cfg.general.source_path.as_str() });
    println!("  alert_threshold_days = {}", threshold_store(cfg).load().alert_threshold_days);
    println!();
    println!("[notifications]");
    println!("  max_individual = {}", n.max_individual);
    println!("  stagger_ms     = {}", n.stagger_ms);
    println!("  ttl_ms         = {}", n.ttl_ms);
    println!("  group_tag      = {}", n.group_tag);
    println!("  notify_send    = {}", n.notify_send);
    println!("  webhook_url    = {}", if n.webhook_url.is_empty() { "(not set)" } else { "(configured)" });
    println!();
    println!("[logging]");
    println!("  format = {}", cfg.logging.format);
    Ok(())
}

fn run_alerts(n: usize) -> Result<()> {
    let entries = alert_log::load_recent(n);
    if entries.is_empty() {
        println!("No alerts in log.");
        return Ok(());
    }
    for e in &entries {
        println!("{} [{}] {}", e.timestamp, e.severity.label(), e.message);
    }
    Ok(())
}

fn run_set_threshold(cfg: &Config, days: i64) -> Result<()> {
    let days = validate_threshold(days)?;
    let store = threshold_store(cfg);
    store.set(days);
    store.save(&AlertThresholdConfig { alert_threshold_days: days });
    println!("alert threshold set to {} day(s)", days);
    Ok(())
}

async fn run_check(cfg: &Config, cli_source: Option<&PathBuf>) -> Result<()> {
    let (threshold, active) = evaluate_once(cfg, cli_source).await?;

    if active.is_empty() {
        println!("OK: no tracked entity within {} day(s) of its deadline", threshold);
        std::process::exit(0);
    }

    for a in &active {
        println!("[{}] {}", a.severity.label(), a.message);
    }

    if active.iter().any(|a| a.severity == Severity::Danger) {
        std::process::exit(2);
    }
    std::process::exit(1);
}

async fn run_json_snapshot(cfg: &Config, cli_source: Option<&PathBuf>) -> Result<()> {
    let (threshold, active) = evaluate_once(cfg, cli_source).await?;
    let snapshot = serde_json::json!({
        "timestamp":     chrono::Local::now().to_rfc3339(),
        "thresholdDays": threshold,
        "urgentCount":   active.len(),
        "hasCritical":   active.iter().any(|a| a.entity.is_overdue),
        "alerts":        active,
    });
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

async fn run_daemon(cfg: &Config, cli_source: Option<&PathBuf>) -> Result<()> {
    let source = Arc::new(entity_source(cfg, cli_source)?);
    let coordinator = RefreshCoordinator::new(
        source,
        threshold_store(cfg),
        NotificationDispatcher::new(notification_channel(cfg), cfg.dispatch_policy()),
        cfg.refresh_interval(),
    );

    // Subscribe before the first cycle so every alert is seen as new once.
    let mut rx = coordinator.subscribe_alerts();
    let logger = tokio::spawn(async move {
        let mut prev: Arc<Vec<Alert>> = Arc::new(Vec::new());
        while rx.changed().await.is_ok() {
            let current = rx.borrow_and_update().clone();
            let fresh = alert_log::fresh(&prev, &current);
            if !fresh.is_empty() {
                info!(count = fresh.len(), "new alerts raised");
                alert_log::append(&fresh);
            }
            prev = current;
        }
    });

    coordinator.initialize().await?;
    info!(
        interval_secs = cfg.refresh_interval().as_secs(),
        alerts = coordinator.get_urgent_count(),
        critical = coordinator.has_critical_alerts(),
        "duewatch daemon running"
    );

    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
    coordinator.teardown();

    let grace = cfg.dispatch_policy().burst_len().saturating_add(Duration::from_secs(1));
    if tokio::time::timeout(grace, coordinator.wait_for_notifications()).await.is_err() {
        warn!(grace_ms = grace.as_millis() as u64, "gave up waiting for scheduled notifications");
    }
    logger.abort();
    Ok(())
}
