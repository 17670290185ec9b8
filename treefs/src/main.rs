use clap::Parser;

use treefs_engine::config::CliArgs;
use treefs_engine::server::FsServer;
use treefs_engine::transport::NdjsonTransport;

fn main() {
    let args = CliArgs::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .init();

    let transport = NdjsonTransport::stdout();
    let mut server = match args.capacity {
        Some(capacity) => match FsServer::with_capacity(transport, capacity) {
            Ok(server) => server,
            Err(e) => {
                tracing::error!("Failed to create filesystem: {}", e);
                std::process::exit(1);
            }
        },
        None => FsServer::new(transport),
    };

    tracing::info!("treefs-engine ready");

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
