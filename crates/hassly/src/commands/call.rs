//! Service call handler.

use hassly_api::HubClient;

use crate::cli::{CallArgs, GlobalOpts};
use crate::error::CliError;

pub async fn handle(
    client: &mut HubClient,
    args: CallArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    // send_command never connects on its own.
    client.connect().await?;
    client
        .send_command(&args.domain, &args.service, &args.entity_id)
        .await?;

    if !global.quiet {
        eprintln!(
            "Called {}.{} on {}",
            args.domain, args.service, args.entity_id
        );
    }
    Ok(())
}
