use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;

mod cache;
mod clock;
mod composer;
mod config;
mod coordinator;
mod cron;
mod db;
mod error;
mod gateway;
mod models;
mod report;
mod scheduler;
#[cfg(test)]
mod testing;
mod window;

use crate::cache::DedupCache;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::gateway::FonnteGateway;
use crate::models::ReminderKind;
use crate::scheduler::Scheduler;

#[derive(Parser)]
#[command(name = "deadline-reminder")]
#[command(about = "WhatsApp deadline reminders for PASTI assignments", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a small class with tasks due tomorrow and overdue
    Seed,
    /// Run one notification pass right now
    RunOnce {
        #[arg(long, default_value = "1_hari")]
        kind: ReminderKind,
    },
    /// Run the reminder scheduler until interrupted
    Serve {
        #[arg(long)]
        skip_startup_run: bool,
    },
    /// Summarize recorded notification outcomes
    Stats {
        #[arg(long, default_value_t = 7)]
        since_days: i64,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deadline_reminder=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::RunOnce { kind } => {
            let coordinator = build_coordinator(&config, pool)?;
            match coordinator.run(kind, &CancellationToken::new()).await {
                Some(run) => println!("{}", report::describe_run(&run)),
                None => println!("A notification run is already in progress."),
            }
        }
        Commands::Serve { skip_startup_run } => {
            let coordinator = Arc::new(build_coordinator(&config, pool)?);
            let mut scheduler =
                Scheduler::new(coordinator, config.schedule.clone(), config.kinds.clone());
            if skip_startup_run {
                scheduler = scheduler.skip_startup_run();
            }

            let cancel = CancellationToken::new();
            let handle = scheduler.spawn(cancel.clone());
            tracing::info!("cron jobs started, press Ctrl-C to stop");

            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for shutdown signal")?;
            tracing::info!("shutdown requested, waiting for in-flight run");
            cancel.cancel();
            handle.await.context("scheduler task panicked")?;
        }
        Commands::Stats { since_days, json } => {
            let since = Utc::now() - Duration::days(since_days.max(1));
            let stats = db::fetch_stats(&pool, since).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print!("{}", report::build_stats_report(since, &stats));
            }
        }
    }

    Ok(())
}

fn build_coordinator(config: &Config, pool: sqlx::PgPool) -> anyhow::Result<Coordinator> {
    let store = Arc::new(db::PgStore::new(pool));
    let gateway = FonnteGateway::new(config.gateway_url.clone(), config.gateway_api_key.clone())
        .context("failed to build gateway HTTP client")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache = Arc::new(DedupCache::new(
        clock.clone(),
        config.cooldown,
        config.cache_horizon,
    ));

    Ok(Coordinator::new(
        store.clone(),
        store,
        Arc::new(gateway),
        cache,
        clock,
        config.dispatch_settings(),
    ))
}
