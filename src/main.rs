mod broker;
mod cli;
mod client;
mod events;
mod facade;
mod ipc;
mod telephony;

use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Command};
use telephony::SubscriptionId;
use telephony::sim::SimulatedPlatform;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            socket,
            sim_accounts,
            default_sub,
            sim_contacts,
        } => {
            let platform = Arc::new(
                SimulatedPlatform::with_sim_accounts(sim_accounts, SubscriptionId(default_sub))
                    .with_contacts(&sim_contacts),
            );
            if let Err(e) = broker::run(socket, platform).await {
                tracing::error!(error = %e, "broker failed");
                eprintln!("telefacaded serve: {e}");
                std::process::exit(1);
            }
        }
        Command::Client { socket, action } => {
            if let Err(e) = client::run(socket, action).await {
                tracing::error!(error = %e, "client failed");
                eprintln!("telefacaded client: {e}");
                std::process::exit(1);
            }
        }
    }
}
