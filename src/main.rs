#![forbid(unsafe_code)]

mod blink;
mod cli;
mod color;
mod config;
mod constants;
mod controller;
mod matcher;
mod render;
mod sources;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{info, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use cli::{CliResult, RunOptions};
use controller::{BorderController, EventSender};
use render::x11::X11Overlay;
use render::{HeadlessTarget, RenderTarget};

fn init_logging() -> Result<()> {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")
}

#[cfg(unix)]
fn spawn_signal_listener(events: EventSender) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Failed to register signal handlers")?;
    std::thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                info!(signal = signal, "Received termination signal");
                events.shutdown();
            }
        })
        .context("Failed to spawn signal thread")?;
    Ok(())
}

#[cfg(not(unix))]
fn spawn_signal_listener(_events: EventSender) -> Result<()> {
    Ok(())
}

fn run(options: RunOptions) -> Result<()> {
    info!(
        project = %options.project_dir.display(),
        source = ?options.source,
        headless = options.headless,
        "Starting branch-border"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("Failed to build tokio runtime")?;

    let target: Box<dyn RenderTarget> = if options.headless {
        Box::new(HeadlessTarget::new())
    } else {
        Box::new(X11Overlay::new(options.window))
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let events = EventSender::new(tx);
    spawn_signal_listener(events.clone())?;

    runtime.block_on(async move {
        let mut controller = BorderController::new(target);
        controller.initialize(options.branch_source(), options.config_source(), events);
        controller.run(rx).await;
    });

    info!("branch-border stopped");
    Ok(())
}

fn main() -> Result<()> {
    init_logging()?;

    match cli::process_cli()? {
        CliResult::Run(options) => run(options),
        CliResult::Done => Ok(()),
    }
}
