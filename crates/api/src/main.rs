//! FundTrack server - main entry point

use clap::Parser;
use fundtrack_api::{router, AppContext, ChainMode};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fundtrack")]
#[command(about = "FundTrack - transparent government fund tracking", long_about = None)]
struct Cli {
    /// Data directory path
    #[arg(short, long, default_value = "./data")]
    data: PathBuf,

    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    /// Ledger client backing the mirror
    #[arg(long, value_enum, default_value = "mock")]
    chain: ChainMode,

    /// Deadline for each on-chain call, in milliseconds
    #[arg(long, default_value = "5000")]
    chain_deadline_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fundtrack=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let chain = AppContext::chain_for_mode(
        cli.chain,
        Duration::from_millis(cli.chain_deadline_ms),
    );
    let ctx = Arc::new(AppContext::new(&cli.data, chain).await?);

    let app = router(ctx.clone());

    tracing::info!(bind = %cli.bind, chain = ?cli.chain, "fundtrack server starting");
    let listener = tokio::net::TcpListener::bind(cli.bind).await?;
    axum::serve(listener, app).await?;

    ctx.close().await;
    Ok(())
}
