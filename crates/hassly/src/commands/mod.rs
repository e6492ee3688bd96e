//! Command dispatch: bridges CLI args -> `HubClient` operations -> output formatting.

pub mod calendar;
pub mod call;
pub mod config_cmd;
pub mod connection;
pub mod entities;

use hassly_api::HubClient;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a hub-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    client: &mut HubClient,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Test => connection::test(client, global).await,
        Command::Entities(args) => entities::list(client, args, global).await,
        Command::States(args) => entities::states(client, args, global).await,
        Command::Validate(args) => entities::validate(client, args, global).await,
        Command::Call(args) => call::handle(client, args, global).await,
        Command::Calendar(args) => calendar::handle(client, args, global).await,
        // Check, Config and Completions are handled before dispatch
        Command::Check | Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
