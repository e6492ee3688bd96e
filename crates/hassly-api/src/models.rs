// Hub data shapes and the pure transformations applied to them.
//
// Everything here is independent of the channel: state records in,
// presentation-ready summaries and calendar events out.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Domains surfaced by [`summarize`].
pub const SUPPORTED_DOMAINS: [&str; 5] = ["light", "sensor", "climate", "vacuum", "cover"];

/// Entity id prefix identifying calendar entities.
pub const CALENDAR_PREFIX: &str = "calendar.";

// ── Entity state ─────────────────────────────────────────────────────

/// A raw state record from `get_states`.
///
/// Uses `#[serde(flatten)]` so fields beyond the core set survive a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    /// e.g. `"light.kitchen"`.
    pub entity_id: String,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub attributes: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_changed: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EntityState {
    /// Everything before the first `.` of the entity id.
    pub fn domain(&self) -> &str {
        self.entity_id
            .split_once('.')
            .map_or(self.entity_id.as_str(), |(domain, _)| domain)
    }

    /// The `friendly_name` attribute, if the hub set one.
    pub fn friendly_name(&self) -> Option<&str> {
        self.attributes.get("friendly_name").and_then(Value::as_str)
    }
}

/// Presentation view of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub entity_id: String,
    /// Friendly name, falling back to the entity id.
    pub name: String,
    pub domain: String,
}

/// Result of [`partition`]: requested ids split by whether the hub knows them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityValidation {
    pub valid: Vec<String>,
    pub invalid: Vec<String>,
}

/// Keep supported domains and sort by `(domain, name)`.
pub fn summarize(states: impl IntoIterator<Item = EntityState>) -> Vec<EntitySummary> {
    let mut summaries: Vec<EntitySummary> = states
        .into_iter()
        .filter(|s| SUPPORTED_DOMAINS.contains(&s.domain()))
        .map(|s| EntitySummary {
            name: s.friendly_name().unwrap_or(&s.entity_id).to_owned(),
            domain: s.domain().to_owned(),
            entity_id: s.entity_id,
        })
        .collect();

    summaries.sort_by(|a, b| (&a.domain, &a.name).cmp(&(&b.domain, &b.name)));
    summaries
}

/// Index states by entity id, keeping only the requested ids.
pub fn select_states<S: AsRef<str>>(
    states: impl IntoIterator<Item = EntityState>,
    wanted: &[S],
) -> BTreeMap<String, EntityState> {
    let wanted: HashSet<&str> = wanted.iter().map(AsRef::as_ref).collect();
    states
        .into_iter()
        .filter(|s| wanted.contains(s.entity_id.as_str()))
        .map(|s| (s.entity_id.clone(), s))
        .collect()
}

/// Split `ids` into known and unknown, preserving input order in both.
pub fn partition<S: AsRef<str>>(
    ids: &[S],
    known: &BTreeMap<String, EntityState>,
) -> EntityValidation {
    let (valid, invalid) = ids
        .iter()
        .map(|id| id.as_ref().to_owned())
        .partition(|id| known.contains_key(id));
    EntityValidation { valid, invalid }
}

// ── Calendar ─────────────────────────────────────────────────────────

/// A calendar event as returned by `calendar.get_events`, tagged with the
/// calendar it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Date or date-time string; ordering key for merged results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// All remaining fields the hub sends.
    #[serde(flatten)]
    pub extra: Map<String, Value>,

    /// Display name derived from the calendar entity id.
    #[serde(default)]
    pub calendar_name: String,

    /// Entity id of the source calendar.
    #[serde(default)]
    pub calendar_id: String,
}

/// Parameters for [`HubClient::get_calendar_events`](crate::HubClient::get_calendar_events).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarQuery {
    /// Sent as `start_date_time` when set.
    pub start: Option<String>,
    /// Sent as `end_date_time` when set.
    pub end: Option<String>,
    /// Cap on the merged result. `0` returns everything.
    pub limit: usize,
}

impl Default for CalendarQuery {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            limit: 10,
        }
    }
}

impl CalendarQuery {
    /// `service_data` payload for `calendar.get_events`. Empty bounds are omitted.
    pub fn service_data(&self) -> Map<String, Value> {
        let mut data = Map::new();
        if let Some(start) = self.start.as_deref().filter(|s| !s.is_empty()) {
            data.insert("start_date_time".into(), Value::from(start));
        }
        if let Some(end) = self.end.as_deref().filter(|s| !s.is_empty()) {
            data.insert("end_date_time".into(), Value::from(end));
        }
        data
    }
}

pub fn is_calendar(entity_id: &str) -> bool {
    entity_id.starts_with(CALENDAR_PREFIX)
}

/// `calendar.family_events` → `Family Events`.
pub fn calendar_display_name(entity_id: &str) -> String {
    let bare = entity_id.strip_prefix(CALENDAR_PREFIX).unwrap_or(entity_id);
    title_case(&bare.replace('_', " "))
}

/// Upper-case the first letter of every run of letters, lower-case the rest.
fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_word = false;
    for ch in input.chars() {
        if ch.is_alphabetic() {
            if in_word {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(ch);
            in_word = false;
        }
    }
    out
}

/// Pull `response[entity_id].events` out of a `get_events` result and tag
/// each event with its calendar.
///
/// A missing response or events list is an empty batch, not an error.
pub fn extract_events(
    result: &Value,
    entity_id: &str,
) -> Result<Vec<CalendarEvent>, serde_json::Error> {
    let Some(raw) = result
        .get("response")
        .and_then(|response| response.get(entity_id))
        .and_then(|calendar| calendar.get("events"))
    else {
        return Ok(Vec::new());
    };

    let mut events: Vec<CalendarEvent> = serde_json::from_value(raw.clone())?;
    let calendar_name = calendar_display_name(entity_id);
    for event in &mut events {
        event.calendar_name.clone_from(&calendar_name);
        entity_id.clone_into(&mut event.calendar_id);
    }
    Ok(events)
}

/// Sort by start time (missing sorts first), then cap at `limit`.
pub fn sort_and_limit(events: &mut Vec<CalendarEvent>, limit: usize) {
    events.sort_by(|a, b| {
        a.start
            .as_deref()
            .unwrap_or_default()
            .cmp(b.start.as_deref().unwrap_or_default())
    });
    if limit > 0 && events.len() > limit {
        events.truncate(limit);
    }
}
