#![forbid(unsafe_code)]

use clap::Parser;
use courier_lib::{BusService, ConfigLoader, Service};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod auth;

use auth::TransactionAuthService;

#[derive(Parser)]
#[command(name = "courier-agent")]
#[command(about = "Courier Transaction Authorization Service")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "courier.toml")]
    config: String,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let app = TransactionAuthService;

    // First run writes the default-valued file out, so operators always
    // have an editable configuration on disk.
    let config = ConfigLoader::with_path(app.name(), &cli.config).load()?;

    let service = match Service::connect(app.name(), &config).await {
        Ok(service) => service,
        Err(e) => {
            error!(error = %e, "failed to connect to broker");
            return Err(e.into());
        }
    };

    if let Err(e) = app.setup(&service).await {
        error!(error = %e, "service setup failed");
        service.shutdown().await?;
        return Err(e.into());
    }

    info!(service = app.name(), broker = %service.config().broker.host, "service running");
    println!("{} service started. Type 'exit' to quit.", app.name());

    wait_for_exit().await?;

    info!(service = app.name(), "stopping");
    service.shutdown().await?;
    Ok(())
}

/// Block until the operator types `exit` on the console, stdin closes, or
/// the process receives ctrl-c.
async fn wait_for_exit() -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim() == "exit" => return Ok(()),
                Some(_) => {}
                None => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}
