use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use gatecrash::{report, CdpDriver, Engine, EngineConfig, PageDriver};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Drives the gated challenge flow to its terminal page in one run"
)]
struct Args {
    /// Entry URL of the challenge flow
    #[arg(long, env = "GATECRASH_URL", default_value = "http://localhost:3000")]
    url: String,

    /// DevTools debugging port of the running browser
    #[arg(long, default_value = "9222")]
    port: u16,

    /// Maximum number of poll iterations before giving up
    #[arg(long, default_value = "120")]
    max_iterations: u32,

    /// Per-step progress timeout in milliseconds
    #[arg(long, default_value = "3500")]
    step_timeout_ms: u64,

    /// Designated terminal step advanced via the router bypass
    #[arg(long, default_value = "30")]
    bypass_step: u32,

    /// Where to write the run summary JSON
    #[arg(long, default_value = "run_summary.json")]
    summary_out: PathBuf,

    /// Where to write the final page screenshot
    #[arg(long, default_value = "final_state.png")]
    screenshot_out: PathBuf,
}

fn init_logging() {
    let log_level = std::env::var("LOG_LEVEL")
        .map(|level| match level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, "run aborted");
            eprintln!("{} {e:#}", "FAILED".red().bold());
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<bool> {
    let driver = Arc::new(CdpDriver::new(args.port));
    if !driver.is_available().await {
        bail!(
            "no browser with DevTools listening on port {0}; start one with --remote-debugging-port={0}",
            args.port
        );
    }
    driver
        .connect()
        .await
        .context("attaching to the browser page")?;

    let config = EngineConfig {
        base_url: args.url.clone(),
        max_iterations: args.max_iterations,
        step_timeout: Duration::from_millis(args.step_timeout_ms),
        bypass_step: args.bypass_step,
        ..EngineConfig::default()
    };

    info!(url = %args.url, budget = args.max_iterations, "starting run");
    let engine = Engine::new(driver.clone(), config);
    let outcome = engine.run().await;

    // Artifacts are flushed regardless of how the run ended.
    match driver.screenshot().await {
        Ok(png) => {
            if let Err(e) = report::save_screenshot(&args.screenshot_out, &png) {
                warn!(error = %e, "final page capture write failed");
            }
        }
        Err(e) => warn!(error = %e, "final page capture failed"),
    }
    if let Err(e) = report::write_summary(&args.summary_out, &outcome.summary) {
        warn!(error = %e, "summary write failed");
    }

    let summary = &outcome.summary;
    println!();
    if summary.success {
        println!(
            "{}  {}/{} steps in {:.2}s",
            "CHALLENGE COMPLETE".green().bold(),
            summary.steps_completed,
            summary.total_steps,
            summary.duration_seconds
        );
    } else {
        println!(
            "{}  {}/{} steps in {:.2}s",
            "CHALLENGE NOT COMPLETED".red().bold(),
            summary.steps_completed,
            summary.total_steps,
            summary.duration_seconds
        );
    }

    if let Some(e) = outcome.error {
        return Err(e).context("run aborted before the step loop");
    }
    Ok(summary.success)
}
