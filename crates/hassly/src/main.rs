mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use hassly_api::{HubClient, NoEcho};

use crate::cli::{Cli, Command, GlobalOpts};
use crate::config::TokenPolicy;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a hub connection
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "hassly", &mut std::io::stdout());
            Ok(())
        }

        // The reachability probe works without a token
        Command::Check => {
            let client = build_client(&cli.global, TokenPolicy::Optional)?;
            commands::connection::check(&client, &cli.global).await
        }

        // All other commands authenticate against the hub
        cmd => {
            let mut client = build_client(&cli.global, TokenPolicy::Required)?;

            tracing::debug!(command = ?cmd, "dispatching command");
            let result = commands::dispatch(cmd, &mut client, &cli.global).await;
            client.disconnect().await;
            result
        }
    }
}

/// Build a `HubClient` from the config file, profile, and CLI overrides.
fn build_client(global: &GlobalOpts, tokens: TokenPolicy) -> Result<HubClient, CliError> {
    let cfg = config::load_config_or_default();
    let profile_name = config::active_profile_name(global, &cfg);
    let client_config = config::resolve_client_config(&cfg, &profile_name, global, tokens)?;

    let mut client = HubClient::from_config(client_config)
        .with_span(tracing::info_span!("hub", profile = %profile_name));
    if global.skip_ping {
        client = client.with_echo_probe(Arc::new(NoEcho));
    }
    Ok(client)
}
