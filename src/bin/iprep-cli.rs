use anyhow::Result;
use clap::{Parser, Subcommand};

use ip_reputation::api::{ClientConfig, ReputationClient};

#[derive(Parser)]
#[command(name = "iprep-cli", version, about = "Command line client for the IP reputation service")]
struct Cli {
    /// Base URL of the reputation service
    #[arg(long, env = "IPREP_URL", default_value = "http://127.0.0.1:8080/")]
    url: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 10u64)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the reputation of an IP
    Reputation { ip: String },
    /// Create or overwrite the reputation of an IP
    Set {
        ip: String,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        reputation: u8,
    },
    /// Set an IP's reputation to 0
    Ban { ip: String },
    /// Set an IP's reputation to 100
    Unban { ip: String },
    /// Remove the entry for an IP
    Delete { ip: String },
    /// Report a violation against an IP
    Violation { ip: String, violation: String },
    /// List configured violation penalties
    Violations,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = ReputationClient::new(ClientConfig {
        base_url: cli.url,
        timeout_secs: cli.timeout,
    })?;

    match cli.command {
        Commands::Reputation { ip } => match client.reputation(&ip).await? {
            Some(entry) => println!("{} {}", entry.ip, entry.reputation),
            None => {
                eprintln!("No reputation entry for {}", ip);
                std::process::exit(1);
            }
        },
        Commands::Set { ip, reputation } => {
            client.set_reputation(&ip, reputation).await?;
            println!("Set {} to {}", ip, reputation);
        }
        Commands::Ban { ip } => {
            client.ban(&ip).await?;
            println!("Banned {}", ip);
        }
        Commands::Unban { ip } => {
            client.unban(&ip).await?;
            println!("Unbanned {}", ip);
        }
        Commands::Delete { ip } => {
            client.delete(&ip).await?;
            println!("Deleted {}", ip);
        }
        Commands::Violation { ip, violation } => {
            client.report_violation(&ip, &violation).await?;
            println!("Reported {} for {}", violation, ip);
        }
        Commands::Violations => {
            let violations = client.violations().await?;
            for (name, penalty) in &violations.penalties {
                println!("{:<40} {}", name, penalty);
            }
            println!("{:<40} {}", "(default)", violations.default_penalty);
        }
    }

    Ok(())
}
