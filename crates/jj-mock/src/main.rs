use clap::Parser;
use jj_mock::config::{LogFormat, ServerConfig};
use jj_mock::server::MockServer;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "jj-mock", version, about = "Remote-controlled HTTP mock server")]
struct Args {
    /// Address to bind
    #[arg(long, env = "JJ_HOST")]
    host: Option<String>,

    /// Port to listen on (0 picks a free port)
    #[arg(short, long, env = "JJ_PORT")]
    port: Option<u16>,

    /// Log level or filter directive, e.g. `debug` or `jj_mock=trace`
    #[arg(long, env = "JJ_LOG_LEVEL")]
    log_level: Option<String>,

    /// YAML configuration file
    #[arg(short, long, env = "JJ_CONFIG")]
    config: Option<String>,
}

fn load_config(args: &Args) -> Result<ServerConfig, anyhow::Error> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(level) = &args.log_level {
        config.log.level = level.clone();
    }
    config.validate()?;
    Ok(config)
}

fn init_tracing(config: &ServerConfig) {
    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_tracing(&config);

    let server = MockServer::bind(&config).await?;
    info!("Control plane at http://{}/__jj__", server.local_addr()?);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let serve = tokio::spawn(server.run(shutdown_rx));

    shutdown_signal().await;
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
    serve.await??;
    Ok(())
}
