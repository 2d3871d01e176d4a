// erwait: scheduled emergency-room wait-time scraper
//
// Loads configuration, scrapes every target on a cron schedule, stores the
// records and runs periodic health checks until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use erwait::{
    InMemoryStore, MetricStore, ScheduleConfig, Scheduler, ScraperConfig, ScraperMetrics, SqliteStore,
    build_runner, init_logging, job_handler,
};
use tracing::{info, warn};

const CONFIG_ENV: &str = "ERWAIT_CONFIG";

async fn load_config() -> Result<ScraperConfig> {
    match std::env::var(CONFIG_ENV) {
        Ok(path) => {
            info!("Loading configuration from {path}");
            ScraperConfig::from_json_file(&path)
                .await
                .with_context(|| format!("Failed to load configuration from {path}"))
        }
        Err(_) => {
            info!("{CONFIG_ENV} not set, using default configuration");
            Ok(ScraperConfig::default())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = load_config().await?;
    let store: Arc<dyn MetricStore> = match config.database_url() {
        Some(url) => Arc::new(SqliteStore::new(url)),
        None => {
            warn!("No database URL configured, records are kept in memory only");
            Arc::new(InMemoryStore::new())
        }
    };

    let metrics = ScraperMetrics::new();
    let runner = Arc::new(build_runner(&config, store, metrics.clone()));
    runner
        .initialize()
        .await
        .context("Failed to initialize job runner")?;

    let scheduler = Scheduler::new().with_shutdown_timeout(config.scheduler_shutdown_timeout());

    let scrape_runner = runner.clone();
    scheduler.schedule_job(
        ScheduleConfig::new("scrape", config.schedule()).run_immediately(config.run_on_startup()),
        job_handler(move || {
            let runner = scrape_runner.clone();
            async move {
                let result = runner.execute_scraping_job().await?;
                match result.error {
                    Some(error) if !result.success => Err(anyhow::anyhow!(error)),
                    _ => Ok(()),
                }
            }
        }),
    )?;

    let health_runner = runner.clone();
    scheduler.schedule_job(
        ScheduleConfig::new("health", config.health_schedule()),
        job_handler(move || {
            let runner = health_runner.clone();
            async move {
                let report = runner.perform_health_check().await;
                anyhow::ensure!(report.healthy, "Health check failed: {}", serde_json::to_string(&report)?);
                Ok(())
            }
        }),
    )?;

    info!(
        targets = config.targets().len(),
        schedule = config.schedule(),
        "erwait running, press Ctrl-C to stop"
    );
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!("Shutdown requested");
    scheduler.shutdown().await;
    runner.shutdown().await;

    let snapshot = metrics.snapshot();
    info!(
        scrapes = snapshot.scrape_attempts,
        success_rate = snapshot.scrape_success_rate(),
        records_inserted = snapshot.records_inserted,
        "erwait stopped"
    );
    Ok(())
}
