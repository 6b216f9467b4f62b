use std::sync::Arc;

use clap::Parser;
use tracing::info;

use gambit::SessionRegistry;
use gambit::telemetry::init_tracing;
use gambit::transport::{ServerConfig, serve};

/// Chess session coordinator and move relay.
#[derive(Debug, Parser)]
#[command(name = "gambit-server", version, about)]
struct Args {
    /// Address to bind
    #[arg(long, env = "GAMBIT_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "GAMBIT_PORT", default_value_t = 8000)]
    port: u16,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing();

    info!("gambit {}", env!("CARGO_PKG_VERSION"));

    let registry = Arc::new(SessionRegistry::default());
    serve(args.into(), registry).await
}
