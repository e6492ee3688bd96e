//! Calendar event handler.

use chrono::{Days, Local, NaiveDate};
use tabled::Tabled;

use hassly_api::{CalendarEvent, CalendarQuery, HubClient};

use crate::cli::{CalendarArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "Start")]
    start: String,
    #[tabled(rename = "End")]
    end: String,
    #[tabled(rename = "Summary")]
    summary: String,
    #[tabled(rename = "Calendar")]
    calendar: String,
}

impl From<&CalendarEvent> for EventRow {
    fn from(e: &CalendarEvent) -> Self {
        Self {
            start: e.start.clone().unwrap_or_default(),
            end: e.end.clone().unwrap_or_default(),
            summary: e.summary.clone().unwrap_or_default(),
            calendar: e.calendar_name.clone(),
        }
    }
}

// ── Query window ────────────────────────────────────────────────────

/// Fill in missing bounds: start of `today`, then start + `days`.
fn query_window(args: &CalendarArgs, today: NaiveDate) -> Result<CalendarQuery, CliError> {
    let start = match args.start {
        Some(ref s) => s.clone(),
        None => today.and_time(chrono::NaiveTime::MIN).format(DATE_TIME_FORMAT).to_string(),
    };

    let end = match args.end {
        Some(ref e) => e.clone(),
        None => {
            let base = if args.start.is_some() {
                start_date(&start)?
            } else {
                today
            };
            let end = base
                .checked_add_days(Days::new(args.days))
                .ok_or_else(|| CliError::Validation {
                    field: "days".into(),
                    reason: format!("{} days from {base} is out of range", args.days),
                })?;
            end.and_time(chrono::NaiveTime::MIN)
                .format(DATE_TIME_FORMAT)
                .to_string()
        }
    };

    Ok(CalendarQuery {
        start: Some(start),
        end: Some(end),
        limit: args.limit,
    })
}

/// Date part of an ISO 8601 date or date-time.
fn start_date(value: &str) -> Result<NaiveDate, CliError> {
    let date_part = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|e| CliError::Validation {
        field: "start".into(),
        reason: format!("expected YYYY-MM-DD[THH:MM:SS], got '{value}': {e}"),
    })
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    client: &mut HubClient,
    args: CalendarArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let query = query_window(&args, Local::now().date_naive())?;
    tracing::debug!(?query, "fetching calendar events");

    let events = client.get_calendar_events(&query).await?;

    let out = output::render_list(&global.output, &events, |e| EventRow::from(e), |e| {
        format!(
            "{}\t{}",
            e.start.as_deref().unwrap_or_default(),
            e.summary.as_deref().unwrap_or_default()
        )
    });
    output::print_output(&out, global.quiet);
    Ok(())
}
