//! Entity listing, state and validation handlers.

use tabled::Tabled;

use hassly_api::{EntityState, EntitySummary, EntityValidation, HubClient};

use crate::cli::{EntitiesArgs, EntityIdsArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct EntityRow {
    #[tabled(rename = "Entity ID")]
    entity_id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Domain")]
    domain: String,
}

impl From<&EntitySummary> for EntityRow {
    fn from(e: &EntitySummary) -> Self {
        Self {
            entity_id: e.entity_id.clone(),
            name: e.name.clone(),
            domain: e.domain.clone(),
        }
    }
}

#[derive(Tabled)]
struct StateRow {
    #[tabled(rename = "Entity ID")]
    entity_id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Last Changed")]
    last_changed: String,
}

impl From<&EntityState> for StateRow {
    fn from(s: &EntityState) -> Self {
        Self {
            entity_id: s.entity_id.clone(),
            name: s.friendly_name().unwrap_or_default().to_owned(),
            state: s.state.clone().unwrap_or_else(|| "-".into()),
            unit: s
                .attributes
                .get("unit_of_measurement")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            last_changed: s.last_changed.clone().unwrap_or_default(),
        }
    }
}

fn validation_detail(v: &EntityValidation, color: bool) -> String {
    let mut lines = Vec::with_capacity(v.valid.len() + v.invalid.len());
    lines.extend(v.valid.iter().map(|id| output::status_line(true, id, color)));
    lines.extend(
        v.invalid
            .iter()
            .map(|id| output::status_line(false, &format!("{id} (not found)"), color)),
    );
    lines.join("\n")
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn list(
    client: &mut HubClient,
    args: EntitiesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut entities = client.get_entities().await?;
    if let Some(ref domain) = args.domain {
        entities.retain(|e| &e.domain == domain);
    }

    let out = output::render_list(&global.output, &entities, |e| EntityRow::from(e), |e| {
        e.entity_id.clone()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn states(
    client: &mut HubClient,
    args: EntityIdsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let states = client.get_entity_states(&args.entity_ids).await?;
    let states: Vec<EntityState> = states.into_values().collect();

    let out = output::render_list(&global.output, &states, |s| StateRow::from(s), |s| {
        format!("{}\t{}", s.entity_id, s.state.as_deref().unwrap_or_default())
    });
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn validate(
    client: &mut HubClient,
    args: EntityIdsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let validation = client.validate_entities(&args.entity_ids).await?;

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &validation,
        |v| validation_detail(v, color),
        |v| v.invalid.join("\n"),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
