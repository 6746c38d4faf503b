//! Lamport Bank - Server
//!
//! This is the main entry point for the bank server.
//! It opens the account store, binds the TCP listener and serves clients
//! until Ctrl+C.

use lamport_bank::server::{Server, ServerConfig, ServerError};
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Parse configuration from command-line arguments
fn config_from_args() -> ServerConfig {
    let mut config = ServerConfig::default();
    let args: Vec<String> = std::env::args().collect();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--host" | "-h" => {
                if i + 1 < args.len() {
                    config.host = args[i + 1].clone();
                    i += 2;
                } else {
                    eprintln!("Error: --host requires a value");
                    std::process::exit(1);
                }
            }
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    config.port = args[i + 1].parse().unwrap_or_else(|_| {
                        eprintln!("Error: invalid port number");
                        std::process::exit(1);
                    });
                    i += 2;
                } else {
                    eprintln!("Error: --port requires a value");
                    std::process::exit(1);
                }
            }
            "--data-dir" | "-d" => {
                if i + 1 < args.len() {
                    config.data_dir = PathBuf::from(&args[i + 1]);
                    i += 2;
                } else {
                    eprintln!("Error: --data-dir requires a value");
                    std::process::exit(1);
                }
            }
            "--help" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-v" => {
                println!("lamport-bank-server version {}", lamport_bank::VERSION);
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    config
}

fn print_help() {
    println!(
        r#"
Lamport Bank Server

USAGE:
    lamport-bank-server [OPTIONS]

OPTIONS:
    -h, --host <HOST>        Host to bind to (default: 0.0.0.0)
    -p, --port <PORT>        Port to listen on (default: 5000)
    -d, --data-dir <DIR>     Directory of account records (default: accounts)
    -v, --version            Print version information
        --help               Print this help message

ACCOUNTS:
    One JSON file per account, named <id>.json:
    {{"id": "1001", "name": "Ana", "balance": "100.00"}}

LOGGING:
    Set RUST_LOG (e.g. RUST_LOG=debug) to see every logical clock update.
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = config_from_args();

    // Set up logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    info!(
        "Lamport Bank v{} starting on {} (accounts in {})",
        lamport_bank::VERSION,
        config.bind_address(),
        config.data_dir.display()
    );

    let server = match Server::open(&config).await {
        Ok(server) => server,
        Err(e @ ServerError::PortInUse { .. }) => {
            error!("{}", e);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    // Stop accepting on Ctrl+C; live connections are left to finish
    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping server...");
    };

    server.run_until(shutdown).await;

    info!("Server shutdown complete");
    Ok(())
}
