//! `padron` — scrape Spanish company portals into NDJSON.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use padron_core::{load_app_config, Portal, Region};
use padron_scraper::{CancelFlag, MonitorStatus, RunOptions, ScrapeOrchestrator};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "padron", about = "Scrape Spanish company portals into NDJSON", version)]
struct Cli {
    /// Portal to scrape, or "all" for every supported portal.
    #[arg(long, default_value = "all")]
    portal: String,

    /// Province or city to scrape, e.g. BARCELONA.
    #[arg(long, default_value = "BARCELONA")]
    region: String,

    /// Stop after this many emitted records per portal.
    #[arg(long, default_value_t = 50)]
    limit: usize,

    /// Also fetch each company page for detail fields on portals whose
    /// listings already carry the basics (doubles the request count).
    #[arg(long)]
    details: bool,

    /// Output file; stdout when omitted.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Minimum inter-request delay, seconds.
    #[arg(long)]
    delay_min: Option<f64>,

    /// Maximum inter-request delay, seconds.
    #[arg(long)]
    delay_max: Option<f64>,

    /// Ceiling on waiting for a bot challenge to clear, seconds.
    #[arg(long)]
    challenge_timeout: Option<u64>,

    /// Run browser-backed portals without a visible window.
    #[arg(long)]
    headless: bool,

    /// Directory holding per-portal session state.
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Empresite discovery filter: minimum employee count.
    #[arg(long)]
    employee_min: Option<u32>,

    /// Empresite discovery filter: maximum employee count.
    #[arg(long)]
    employee_max: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_app_config().context("failed to load configuration")?;
    if let Some(v) = cli.delay_min {
        config.delay_min_secs = v;
    }
    if let Some(v) = cli.delay_max {
        config.delay_max_secs = v;
    }
    if let Some(v) = cli.challenge_timeout {
        config.challenge_timeout_secs = v;
    }
    if cli.headless {
        config.headless = true;
    }
    if cli.details {
        config.details = true;
    }
    if let Some(dir) = cli.state_dir {
        config.state_dir = dir;
    }
    if let Some(v) = cli.employee_min {
        config.employee_min = v;
    }
    if let Some(v) = cli.employee_max {
        config.employee_max = v;
    }
    let config = config.validated().context("invalid configuration")?;
    let details = config.details;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    let portals: Vec<Portal> = if cli.portal.eq_ignore_ascii_case("all") {
        Portal::ALL.to_vec()
    } else {
        vec![cli.portal.parse().context("unknown portal")?]
    };
    let region = Region::new(&cli.region).context("invalid region")?;

    let orchestrator = ScrapeOrchestrator::new(config)?;

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received; finishing the current item");
                cancel.cancel();
            }
        });
    }

    let mut status_rx = orchestrator.challenge_monitor().subscribe();
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = *status_rx.borrow_and_update();
            match status {
                MonitorStatus::WaitingForResolution(kind) => {
                    tracing::info!(kind = kind.as_str(), "waiting on a bot challenge");
                }
                MonitorStatus::TimedOut => {
                    tracing::warn!("bot challenge was not resolved in time");
                }
                MonitorStatus::Clear
                | MonitorStatus::Detected(_)
                | MonitorStatus::Resolved => {}
            }
        }
    });

    let mut writer: Box<dyn Write> = match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(std::io::stdout().lock()),
    };

    let mut total_emitted = 0_usize;
    for portal in portals {
        if cancel.is_cancelled() {
            break;
        }
        let options = RunOptions {
            portal,
            region: region.clone(),
            limit: cli.limit,
            details,
        };
        match orchestrator.run(&options, &mut writer, &cancel).await {
            Ok(summary) => total_emitted += summary.emitted,
            Err(e) => {
                tracing::error!(portal = %portal, error = %e, "run failed");
            }
        }
    }
    writer.flush().context("failed to flush output")?;

    tracing::info!(total_emitted, "all runs finished");
    Ok(())
}
