use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::database::models::{CheckRecord, Incident, Monitor};
use crate::database::{LibsqlStore, Stores, open_store};
use crate::monitoring::history::DEFAULT_RECENT_LIMIT;
use crate::monitoring::{CycleSummary, HistoryRecorder, HttpProber, IncidentManager, Scheduler};
use crate::monitors::{MonitorService, MonitorUpdate, NewMonitor};

/// Uptime monitoring scheduler and incident tracker
#[derive(Debug, Parser)]
#[command(name = "sentinel", version, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the scheduler until interrupted
    Run,
    /// Run a single cycle and print what it did
    CheckOnce,
    /// Manage monitors
    #[command(subcommand)]
    Monitor(MonitorCommand),
    /// Show check history of a monitor, newest first
    History {
        monitor_id: i64,
        #[arg(short, long, default_value_t = DEFAULT_RECENT_LIMIT)]
        limit: usize,
        /// Ignore the limit and show everything
        #[arg(long)]
        all: bool,
    },
    /// Show incidents of a monitor, newest first
    Incidents { monitor_id: i64 },
    /// Print the effective configuration
    Config,
}

#[derive(Debug, Subcommand)]
pub enum MonitorCommand {
    /// Create a monitor
    Add(AddArgs),
    /// List monitors, all of them unless an owner is given
    List {
        #[arg(long)]
        owner: Option<i64>,
    },
    /// Change some fields of a monitor
    Update(UpdateArgs),
    /// Delete a monitor with its history and incidents
    Remove { id: i64 },
}

#[derive(Debug, Args)]
pub struct AddArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub url: String,
    /// Seconds between checks
    #[arg(long)]
    pub interval: Option<u32>,
    #[arg(long, default_value_t = 1)]
    pub owner: i64,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    pub id: i64,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub url: Option<String>,
    #[arg(long)]
    pub interval: Option<u32>,
    #[arg(long)]
    pub active: Option<bool>,
}

pub async fn execute(cli: Cli, config: Config) -> Result<()> {
    let json = cli.json;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match cli.command {
        Command::Config => {
            print!("{config}");
            Ok(())
        }
        Command::Run => run(&stores(&config).await?, clock, &config).await,
        Command::CheckOnce => {
            let summary = scheduler(&stores(&config).await?, clock, &config)?.run_cycle().await?;
            emit(json, &summary, print_summary)
        }
        Command::Monitor(command) => {
            let service =
                MonitorService::new(open(&config).await?, config.monitors.clone(), clock);
            monitor(&service, command, json).await
        }
        Command::History { monitor_id, limit, all } => {
            let history = HistoryRecorder::new(stores(&config).await?.history, clock);
            let records = if all {
                history.all(monitor_id).await?
            } else {
                history.recent(monitor_id, limit).await?
            };
            emit(json, &records, |r| print_records(r))
        }
        Command::Incidents { monitor_id } => {
            let incidents = IncidentManager::new(stores(&config).await?.incidents, clock)
                .incidents_for_monitor(monitor_id)
                .await?;
            emit(json, &incidents, |i| print_incidents(i))
        }
    }
}

async fn open(config: &Config) -> Result<Arc<LibsqlStore>> {
    let store = open_store(&config.database.path, config.database.pool_size)
        .await
        .with_context(|| format!("Failed to open {}", config.database.path.display()))?;
    Ok(Arc::new(store))
}

async fn stores(config: &Config) -> Result<Stores> {
    Ok(Stores::from_libsql(open(config).await?))
}

fn scheduler(stores: &Stores, clock: Arc<dyn Clock>, config: &Config) -> Result<Scheduler> {
    let prober = HttpProber::new(&config.prober).context("Failed to build HTTP client")?;
    Ok(Scheduler::new(stores, Arc::new(prober), clock, &config.scheduler))
}

async fn run(stores: &Stores, clock: Arc<dyn Clock>, config: &Config) -> Result<()> {
    let handle = Arc::new(scheduler(stores, clock, config)?).start();

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
    info!("Shutting down, waiting for the current cycle");

    handle.stop().await.context("Scheduler task panicked")?;
    Ok(())
}

async fn monitor(service: &MonitorService, command: MonitorCommand, json: bool) -> Result<()> {
    match command {
        MonitorCommand::Add(args) => {
            let new = NewMonitor { name: args.name, url: args.url, interval_seconds: args.interval };
            let monitor = service.create(args.owner, new).await?;
            emit(json, &monitor, |m| print_monitors(std::slice::from_ref(m)))
        }
        MonitorCommand::List { owner } => {
            let monitors = match owner {
                Some(owner) => service.list_for_owner(owner).await?,
                None => service.list_all().await?,
            };
            emit(json, &monitors, |m| print_monitors(m))
        }
        MonitorCommand::Update(args) => {
            let changes = MonitorUpdate {
                name: args.name,
                url: args.url,
                interval_seconds: args.interval,
                active: args.active,
            };
            let monitor = service.update(args.id, changes).await?;
            emit(json, &monitor, |m| print_monitors(std::slice::from_ref(m)))
        }
        MonitorCommand::Remove { id } => {
            service.delete(id).await?;
            println!("Removed monitor {id}");
            Ok(())
        }
    }
}

fn emit<T: Serialize + ?Sized>(json: bool, value: &T, human: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}

fn print_summary(summary: &CycleSummary) {
    println!(
        "{} due, {} up, {} down, {} failed, {} incidents opened, {} resolved",
        summary.due,
        summary.up,
        summary.down,
        summary.failed,
        summary.incidents_opened,
        summary.incidents_resolved
    );
    for check in &summary.checks {
        println!(
            "  #{:<5} {} {} ({} ms)",
            check.monitor_id, check.status, check.outcome.status, check.outcome.elapsed_ms
        );
    }
}

fn print_monitors(monitors: &[Monitor]) {
    if monitors.is_empty() {
        println!("No monitors");
    }
    for m in monitors {
        let last = m
            .last_checked_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "#{:<5} {:<24} {:<40} every {}s {} last checked {}",
            m.id.unwrap_or_default(),
            m.name,
            m.url,
            m.interval_seconds,
            if m.active { "active" } else { "paused" },
            last
        );
    }
}

fn print_records(records: &[CheckRecord]) {
    if records.is_empty() {
        println!("No checks recorded");
    }
    for r in records {
        let code = r.status_code.map_or_else(|| "---".to_string(), |c| c.to_string());
        println!(
            "{} {} {} {} ms",
            r.checked_at.to_rfc3339(),
            if r.success { "UP  " } else { "DOWN" },
            code,
            r.latency_ms
        );
    }
}

fn print_incidents(incidents: &[Incident]) {
    if incidents.is_empty() {
        println!("No incidents");
    }
    for i in incidents {
        let resolved = i.resolved_at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".to_string());
        println!(
            "#{:<5} {:<8} {:<8} opened {} resolved {} {}: {}",
            i.id.unwrap_or_default(),
            i.status.as_str(),
            i.severity.as_str(),
            i.opened_at.to_rfc3339(),
            resolved,
            i.title,
            i.description
        );
    }
}
