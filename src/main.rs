// Entrypoint for the CLI application.
// - Keeps `main` small: read config, build the API client, dispatch one
//   action per invocation.
// - A missing API token is the one fatal precondition: nothing works
//   without it, so bail before any request is attempted.

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use htb_cli::actions;
use htb_cli::api::{ApiClient, Config};

#[derive(Parser)]
#[command(
    name = "htb",
    about = "simple commands to call the HackTheBox v4 API",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print info about a machine (default: the active machine)
    Machine {
        /// Machine name, id or IP
        machine: Option<String>,
    },
    /// Show the currently active (spawned) machine
    Active,
    /// Get the official pdf writeup for a machine (default: active) and
    /// save it to a file
    Writeup {
        /// Machine name or id
        machine: Option<String>,
    },
    /// Print the to-do list, or toggle a machine in and out of it
    Todo {
        /// Machine to add or remove; omit to list
        machine: Option<String>,
    },
    /// Spawn an instance of a machine
    Spawn {
        /// Machine name or id
        machine: String,
    },
    /// Kill the currently active machine
    Kill,
    /// Request a reset for the currently active machine
    Reset,
    /// Submit a flag for the currently active machine - either flag text
    /// or a filename
    Own {
        /// Flag text (hex) or a path to a flag file
        flag: String,
    },
    /// Re-download all machine listings into the local cache file
    Refresh,
}

fn main() -> anyhow::Result<()> {
    // Diagnostics go through tracing; default to warnings only so the
    // stale-cache nag shows up without RUST_LOG.
    tracing_subscriber::registry()
        .with(fmt::layer().without_time())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    if config.token.is_none() {
        eprintln!("no API token found in HTB_API_TOKEN, you need one to make API requests");
        eprintln!("generate one under Account Settings at https://app.hackthebox.com");
        std::process::exit(1);
    }

    let api = ApiClient::new(&config)?;
    match cli.command {
        Commands::Machine { machine } => actions::machine_info(&api, &config, machine.as_deref()),
        Commands::Active => actions::show_active(&api),
        Commands::Writeup { machine } => actions::fetch_writeup(&api, &config, machine.as_deref()),
        Commands::Todo { machine } => match machine {
            Some(machine) => actions::toggle_todo(&api, &config, &machine),
            None => actions::show_todo(&api),
        },
        Commands::Spawn { machine } => actions::spawn_machine(&api, &config, &machine),
        Commands::Kill => actions::kill_machine(&api),
        Commands::Reset => actions::reset_machine(&api),
        Commands::Own { flag } => actions::submit_flag(&api, &flag),
        Commands::Refresh => actions::refresh_cache(&api, &config),
    }
}
