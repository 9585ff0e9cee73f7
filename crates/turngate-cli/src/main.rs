use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::SecretString;
use turngate_api::DoorClient;

#[derive(Parser)]
#[command(name = "turngate", about = "Turngate door controller operator CLI")]
struct Cli {
    /// Controller base URL
    #[arg(long, env = "TURNGATE_HOST")]
    host: String,

    /// Turnstile device id
    #[arg(long, env = "TURNGATE_DEVICE_ID")]
    device_id: u32,

    /// API login
    #[arg(long, env = "TURNGATE_LOGIN")]
    login: String,

    /// API password
    #[arg(long, env = "TURNGATE_PASSWORD", hide_env_values = true)]
    password: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Direction {
    Entrance,
    Exit,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the turnstile for a user
    Open {
        /// Enrolled user id
        user_id: u32,
        /// Pass direction
        #[arg(value_enum)]
        direction: Direction,
        /// Event description recorded by the controller
        #[arg(short, long, default_value = "manual open")]
        description: String,
    },
    /// List the controller's staff roster
    Staff,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let client = DoorClient::new(
        &cli.host,
        cli.device_id,
        cli.login,
        SecretString::from(cli.password),
        Duration::from_secs(5),
    )?;
    client
        .authenticate()
        .await
        .context("controller authentication")?;

    match cli.command {
        Commands::Open {
            user_id,
            direction,
            description,
        } => {
            let code = match direction {
                Direction::Entrance => 1,
                Direction::Exit => 2,
            };
            client
                .open_pass(user_id, code, &description)
                .await
                .context("opening pass")?;
            println!("opened for user {user_id}");
        }
        Commands::Staff => {
            let staff = client.staff_list().await.context("fetching staff list")?;
            if staff.is_empty() {
                println!("no staff enrolled");
            } else {
                for user in staff {
                    println!("{:>6}  {}", user.id, user.name);
                }
            }
        }
    }

    Ok(())
}
