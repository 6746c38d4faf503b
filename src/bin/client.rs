//! Lamport Bank - Client
//!
//! Interactive client. Logs in as the account given on the command line,
//! then reads one command per line from stdin:
//!
//! ```text
//! 1                  balance
//! 2 <amount>         withdraw
//! 3 <amount>         deposit
//! 4 <to> <amount>    transfer
//! 0                  exit
//! ```

use anyhow::Context;
use lamport_bank::client::{ClientConfig, ClientError, ClientSession};
use lamport_bank::protocol::{Amount, Response};
use std::str::FromStr;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// One parsed stdin command
#[derive(Debug, PartialEq)]
enum Command {
    Balance,
    Withdraw(Amount),
    Deposit(Amount),
    Transfer(String, Amount),
    Exit,
}

impl Command {
    fn parse(line: &str) -> Result<Self, String> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            ["1"] => Ok(Command::Balance),
            ["2", amount] => Ok(Command::Withdraw(parse_amount(amount)?)),
            ["3", amount] => Ok(Command::Deposit(parse_amount(amount)?)),
            ["4", to, amount] => Ok(Command::Transfer(to.to_string(), parse_amount(amount)?)),
            ["0"] => Ok(Command::Exit),
            _ => Err(format!("unknown command: {}", line.trim())),
        }
    }
}

fn parse_amount(raw: &str) -> Result<Amount, String> {
    Amount::from_str(raw).map_err(|_| format!("invalid amount: {}", raw))
}

/// Parse connection settings and the account id from command-line arguments
fn config_from_args() -> (ClientConfig, String) {
    let mut config = ClientConfig::default();
    let mut account_id = None;
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
            "--help" => {
                print_help();
                std::process::exit(0);
            }
            arg if account_id.is_none() && !arg.starts_with('-') => {
                account_id = Some(arg.to_string());
                i += 1;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    match account_id {
        Some(id) => (config, id),
        None => {
            eprintln!("Error: an account id is required");
            print_help();
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!(
        r#"
Lamport Bank Client

USAGE:
    lamport-bank-client [OPTIONS] <ACCOUNT_ID>

OPTIONS:
    -h, --host <HOST>        Server host (default: 127.0.0.1)
    -p, --port <PORT>        Server port (default: 5000)
        --help               Print this help message

COMMANDS (one per line on stdin):
    1                        Show balance
    2 <amount>               Withdraw
    3 <amount>               Deposit
    4 <to> <amount>          Transfer to another account
    0                        Exit
"#
    );
}

fn print_response(response: &Response) {
    if response.is_error() {
        println!("error: {}", response.text());
    } else {
        println!("{}", response.text());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, account_id) = config_from_args();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let addr = config.server_address();
    let mut session = match ClientSession::connect(&addr).await {
        Ok(session) => session,
        Err(e @ ClientError::ConnectionRefused { .. }) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    match session.login(&account_id).await {
        Ok(text) => println!("{}", text),
        Err(ClientError::LoginRejected(text)) => {
            eprintln!("login failed: {}", text);
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("login failed"),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(message) => {
                eprintln!("{}", message);
                continue;
            }
        };

        let result = match command {
            Command::Balance => session.balance().await,
            Command::Withdraw(amount) => session.withdraw(amount).await,
            Command::Deposit(amount) => session.deposit(amount).await,
            Command::Transfer(to, amount) => session.transfer(&to, amount).await,
            Command::Exit => break,
        };

        match result {
            Ok(response) => print_response(&response),
            Err(ClientError::Disconnected) => {
                error!("Server closed the connection");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(clock = session.clock(), "Client exiting");
    Ok(())
}
