use clap::Parser;
use tokio::net::TcpListener;

use toll_collector::{config::Cli, ledger::Collector, server::Server};

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let collector = Collector::new(cli.fee_schedule());

    let listener = TcpListener::bind(cli.listen).await?;
    let server = Server::new(listener, collector, cli.server_config());
    tracing::info!("server listening on: {}", server.local_addr()?);

    server.run_until_ctrl_c().await;

    Ok(())
}
