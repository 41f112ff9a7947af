use color_eyre::eyre::Result;
use nft_mint_session::config::{
    self,
    Command,
};
use std::sync::OnceLock;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

mod app;
mod ui;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Log to `logs/nft-mint.log.<date>`; stdout belongs to the terminal UI.
fn init_tracing() {
    let appender = rolling::daily("logs", "nft-mint.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();
    match config::parse_cli_args(std::env::args().skip(1))? {
        Command::Help => {
            println!("{}", config::usage());
            Ok(())
        }
        Command::Run(app_config) => {
            tracing::info!(network = app_config.network.url(), "starting nft-mint client");
            app::run_app(app_config).await
        }
    }
}
