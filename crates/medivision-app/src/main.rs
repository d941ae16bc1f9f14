// MediVision command-line entry point.
//
// Startup sequence:
// 1. Parse arguments
// 2. Initialize tracing (log to file, not terminal)
// 3. Load config
// 4. Open the key-value store (session token, theme)
// 5. Build AppState and run the command

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use medivision_app::app::AppState;
use medivision_app::cli::{self, Cli};
use medivision_core::config;
use medivision_core::storage::Store;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // 1. Parse arguments
    let cli = Cli::parse();

    // 2. Initialize tracing. A broken log directory should not stop the CLI.
    if let Err(e) = init_tracing() {
        eprintln!("warning: logging disabled: {e:#}");
    }

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    // 3. Load config
    let config = config::load_config(cli.config.as_deref())
        .context("failed to load configuration")?;
    info!("Config loaded: api={}", config.api.base_url);

    // 4. Open the store
    let store_path = config.store_path()?;
    let store = Store::open(&store_path).context("failed to open local store")?;
    info!("Store opened at {}", store_path.display());

    // 5. Build AppState and run the command
    let mut app = AppState::new(config, Arc::new(store))?;
    if let Some(language) = cli.lang {
        app.select_language(language);
    }

    let mut stdout = std::io::stdout().lock();
    cli::execute(&mut app, cli.command, cli.json, &mut stdout).await
}

/// Initialize tracing to log to a file under the data directory.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = config::data_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("medivision.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("medivision=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
