use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use gate_cli::{
    run_batch, Console, FileConfig, HttpPrimaryService, HttpZeroShotService, InteractiveSession,
    Overrides, ServiceConfig, TerminalArbiter,
};
use gate_pipeline::{
    Arbiter, DecisionPipeline, DeclineArbiter, FanoutSink, JsonlSink, PipelineServices,
    SharedEventSink, TracingSink,
};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Classify reviews, falling back to a zero-shot model and a human when unsure.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML file with [pipeline] and [services] sections
    #[arg(long)]
    config: Option<PathBuf>,

    /// Confidence below which the fallback path runs (overrides GATE_THRESHOLD)
    #[arg(long)]
    threshold: Option<f64>,

    /// Truncate reviews to this many words before primary classification
    #[arg(long)]
    max_input_units: Option<usize>,

    /// Give up waiting for a clarification after this many seconds
    #[arg(long)]
    arbitration_timeout_secs: Option<u64>,

    /// Primary classifier endpoint (overrides GATE_PRIMARY_URL)
    #[arg(long)]
    primary_url: Option<String>,

    /// Zero-shot classifier endpoint (overrides GATE_SECONDARY_URL)
    #[arg(long)]
    secondary_url: Option<String>,

    /// Print results as JSON lines
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Append stage records to this file as JSON lines
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Classify every line of this file (`-` for stdin) without prompting
    #[arg(long)]
    batch: Option<PathBuf>,

    /// Requests in flight at once in batch mode
    #[arg(long, default_value_t = 4)]
    concurrency: usize,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            threshold: self.threshold,
            max_input_units: self.max_input_units,
            arbitration_timeout_secs: self.arbitration_timeout_secs,
            primary_url: self.primary_url.clone(),
            secondary_url: self.secondary_url.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Reports go to stdout; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = FileConfig::resolve(args.config.as_deref())?.with_overrides(&args.overrides())?;
    info!(
        threshold = config.pipeline.threshold,
        primary = %config.services.primary_url,
        secondary = %config.services.secondary_url,
        "gate-cli starting"
    );

    let sink = build_sink(args.log_file.as_deref())?;
    match &args.batch {
        Some(path) => {
            let lines = read_batch(path).await?;
            let services = services(&config.services, Arc::new(DeclineArbiter))?;
            let pipeline = DecisionPipeline::new(&config.pipeline, services, sink)?;
            for outcome in run_batch(&pipeline, lines, args.concurrency).await {
                println!("{}", outcome.render(args.json));
            }
        }
        None => {
            let console = Console::stdio();
            let arbiter = Arc::new(TerminalArbiter::new(console.clone()));
            let services = services(&config.services, arbiter)?;
            let pipeline = DecisionPipeline::new(&config.pipeline, services, sink)?;

            let shutdown = CancellationToken::new();
            tokio::spawn({
                let shutdown = shutdown.clone();
                async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        info!("Interrupted");
                        shutdown.cancel();
                    }
                }
            });

            InteractiveSession::new(pipeline, console)
                .with_json(args.json)
                .with_shutdown(shutdown)
                .run()
                .await
                .context("terminal I/O failed")?;
        }
    }

    Ok(())
}

fn services(config: &ServiceConfig, arbiter: Arc<dyn Arbiter>) -> Result<PipelineServices> {
    Ok(PipelineServices {
        primary: Arc::new(HttpPrimaryService::new(config)?),
        secondary: Arc::new(HttpZeroShotService::new(config)?),
        arbiter,
    })
}

fn build_sink(log_file: Option<&Path>) -> Result<SharedEventSink> {
    let mut sink = FanoutSink::new().with(TracingSink::shared());
    if let Some(path) = log_file {
        let jsonl = JsonlSink::open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        info!(path = %jsonl.path().display(), "Appending stage records");
        sink = sink.with(Arc::new(jsonl));
    }
    Ok(sink.shared())
}

async fn read_batch(path: &Path) -> Result<Vec<String>> {
    let text = if path == Path::new("-") {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("failed to read batch from stdin")?;
        text
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read batch file {}", path.display()))?
    };
    Ok(text.lines().map(str::to_string).collect())
}
