use clap::Parser;
use guidance_widget::config::AppConfig;
use guidance_widget::mock::{MockBackend, MockDataset, WidgetBackend};
use guidance_widget::server::{self, AppState};
use guidance_widget::session::SessionRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "guidance-widget", version, about = "Serve the guidance widget")]
struct Cli {
    /// TOML file layered over the environment configuration.
    #[arg(long, env = "WIDGET_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    let backend: Arc<dyn WidgetBackend> = Arc::new(MockBackend::new(
        MockDataset::for_kind(config.dataset),
        config.latency(),
    ));
    let sessions =
        SessionRegistry::new(backend, config.session_ttl).with_max_sessions(config.max_sessions);

    let addr = config.bind_addr;
    tracing::info!(
        %addr,
        public_url = %config.public_url,
        dataset = ?config.dataset,
        "starting guidance widget server"
    );
    server::run(addr, AppState::new(config, sessions)).await?;
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
