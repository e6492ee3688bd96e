//! Reachability and connection test handlers.

use serde::Serialize;

use hassly_api::HubClient;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct Report {
    url: String,
    cloud_relay: bool,
    ok: bool,
}

impl Report {
    fn for_client(client: &HubClient) -> Self {
        let config = client.config();
        Self {
            url: config
                .endpoint
                .as_ref()
                .map(|e| e.websocket_url.to_string())
                .unwrap_or_default(),
            cloud_relay: config.use_cloud_relay,
            ok: true,
        }
    }
}

fn print_report(report: &Report, message: &str, global: &GlobalOpts) {
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        report,
        |_| output::status_line(true, message, color),
        |r| r.ok.to_string(),
    );
    output::print_output(&out, global.quiet);
}

pub async fn check(client: &HubClient, global: &GlobalOpts) -> Result<(), CliError> {
    client
        .check_connectivity()
        .await
        .map_err(CliError::Unreachable)?;

    let config = client.config();
    let message = if config.use_cloud_relay {
        "Using cloud relay, local probe skipped".to_owned()
    } else if let Some(ref e) = config.endpoint {
        format!("{}:{} is reachable", e.host, e.port)
    } else {
        "reachable".to_owned()
    };
    print_report(&Report::for_client(client), &message, global);
    Ok(())
}

pub async fn test(client: &HubClient, global: &GlobalOpts) -> Result<(), CliError> {
    client.test_connection().await?;

    let report = Report::for_client(client);
    let message = format!("Connected and authenticated at {}", report.url);
    print_report(&report, &message, global);
    Ok(())
}
