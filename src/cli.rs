use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "telefacaded", about = "Telephony scripting facade daemon")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the facade daemon on the simulated platform
    Serve {
        /// Socket path (default: $XDG_RUNTIME_DIR/telefacade/facade.sock)
        #[arg(long)]
        socket: Option<PathBuf>,

        /// Number of SIM accounts to seed, subscription ids 1..=N
        #[arg(long, default_value_t = 1)]
        sim_accounts: u16,

        /// Default voice subscription id
        #[arg(long, default_value_t = 1)]
        default_sub: i32,

        /// Contact lookup to seed, repeatable
        #[arg(long = "sim-contact", value_name = "URI=NUMBER", value_parser = parse_contact)]
        sim_contacts: Vec<(String, String)>,
    },

    /// Talk to a running daemon
    Client {
        /// Socket path (default: $XDG_RUNTIME_DIR/telefacade/facade.sock)
        #[arg(long)]
        socket: Option<PathBuf>,

        #[command(subcommand)]
        action: ClientAction,
    },
}

#[derive(Subcommand)]
pub enum ClientAction {
    /// Invoke a facade method and print its result
    Invoke {
        /// Method name, e.g. telecomGetCallState
        method: String,

        /// Parameters as key=string or key:=scalar (bool or integer)
        params: Vec<String>,
    },

    /// Track state categories and print events as they arrive
    Watch {
        #[arg(required = true, value_enum)]
        categories: Vec<WatchCategory>,

        /// Track a specific subscription instead of the default
        #[arg(long)]
        sub_id: Option<i32>,

        /// Exit after this many events
        #[arg(long)]
        count: Option<usize>,
    },

    /// Inject a platform state payload (connects as harness)
    Inject {
        /// Payload kind, e.g. data_connection_state
        kind: String,

        /// Payload fields as key=string or key:=scalar (bool or integer)
        params: Vec<String>,

        /// Target subscription (default: the platform default)
        #[arg(long)]
        sub_id: Option<i32>,
    },
}

/// Parse `URI=NUMBER`. The number follows the last `=`, so query
/// strings in the URI are kept.
fn parse_contact(arg: &str) -> Result<(String, String), String> {
    match arg.rsplit_once('=') {
        Some((uri, number)) if !uri.is_empty() && !number.is_empty() => {
            Ok((uri.to_string(), number.to_string()))
        }
        _ => Err(format!("expected URI=NUMBER, got {arg:?}")),
    }
}

/// State categories a client can watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WatchCategory {
    /// Call state and precise call state
    Call,
    /// Modem power level
    PowerLevel,
    /// Data connection state
    DataConnection,
    /// Service state
    Service,
}
