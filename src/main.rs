//! ADC sampling driver - command line entry point
//!
//! ```text
//! adc [--config PATH] [COMMAND...]
//! ```
//!
//! Commands given on the command line run in order. Afterwards, or when
//! none are given, one command is read per line from stdin until `exit` or
//! end of input; with command-line commands this only happens while the
//! engine is still running, so `adc start` samples until `stop` or `exit`.

use adc_sampler::{config::LoggingConfig, AdcConfig, AdcController};
use anyhow::{bail, Context};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

struct CliArgs {
    config: Option<PathBuf>,
    commands: Vec<String>,
}

fn parse_args() -> anyhow::Result<CliArgs> {
    let mut config = None;
    let mut commands = Vec::new();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => match args.next() {
                Some(path) => config = Some(PathBuf::from(path)),
                None => bail!("--config needs a path"),
            },
            _ => commands.push(arg),
        }
    }

    Ok(CliArgs { config, commands })
}

/// Install the subscriber; the returned guard flushes the log file on drop
fn init_logging(logging: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match &logging.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {:?}", dir))?;
            let appender = tracing_appender::rolling::daily(dir, "adc.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&logging.filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

fn run() -> anyhow::Result<i32> {
    let args = parse_args()?;

    let config = match &args.config {
        Some(path) => AdcConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => AdcConfig::load_or_default(None),
    };

    let _guard = init_logging(&config.logging)?;
    tracing::info!(
        "Starting ADC driver ({} backend, mask {:#010x})",
        config.hal.backend_name(),
        config.driver.channel_mask
    );

    let mut controller = AdcController::new(config);
    let code = controller.run_session(
        &args.commands,
        &mut std::io::stdin().lock(),
        &mut std::io::stdout(),
    )?;

    tracing::info!("Shutting down...");
    Ok(code)
}

fn main() -> anyhow::Result<()> {
    let code = run()?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
