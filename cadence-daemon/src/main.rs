use anyhow::{anyhow, Context, Result};
use cadence_core::{
    init_observability, paths, shutdown_observability, Config, CsvRecordLog, PrometheusClient,
    Scheduler,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

mod shutdown;

#[derive(Parser)]
#[command(name = "cadenced")]
#[command(about = "Adaptive metrics polling daemon", long_about = None)]
struct Cli {
    /// Config file (default: $CADENCE_CONFIG or the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Metric query to monitor; repeat for several. Replaces the configured list.
    #[arg(short, long)]
    metric: Vec<String>,

    /// Metrics source base URL
    #[arg(long)]
    source_url: Option<String>,

    /// Length of one time unit in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let path = self.config.clone().unwrap_or_else(paths::config_path);
        let mut config = Config::load(&path)
            .with_context(|| format!("loading config from {}", path.display()))?;

        if !self.metric.is_empty() {
            config.metrics = self.metric.clone();
        }
        if let Some(url) = &self.source_url {
            config.source.url = url.clone();
        }
        if let Some(tick_ms) = self.tick_ms {
            config.tick_ms = tick_ms;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    // Initialize observability FIRST
    init_observability(&config.telemetry)
        .map_err(|e| anyhow!("failed to initialize observability: {}", e))?;

    info!("cadence daemon starting");

    let source = Arc::new(PrometheusClient::new(&config.source)?);
    info!(url = %source.query_url(), "Metrics source configured");

    let sink = Arc::new(CsvRecordLog::open(&config.logs)?);
    info!(
        samples = %sink.sample_path().display(),
        alerts = %sink.alert_path().display(),
        "Record logs opened"
    );

    let scheduler = Scheduler::new(&config, source, sink)?;
    let settings = config.controller_settings();
    for metric in scheduler.metrics() {
        info!(
            metric = %metric,
            interval = settings.clamp(settings.default_interval),
            tick_ms = config.tick_ms,
            "Monitoring metric"
        );
    }

    let shutdown = shutdown::shutdown_signal();
    let reports = scheduler.run(shutdown).await;

    for report in &reports {
        info!(
            metric = %report.metric,
            cycles = report.cycles,
            alerts = report.alert_count,
            interval = report.final_interval,
            cumulative_sum = report.cumulative_sum,
            "Final state"
        );
    }

    info!("cadence daemon shutting down");
    shutdown_observability();
    Ok(())
}
