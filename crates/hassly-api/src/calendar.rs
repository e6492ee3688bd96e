// Calendar discovery and event aggregation.

use tracing::{debug, error, info, instrument, warn};

use crate::client::HubClient;
use crate::error::Error;
use crate::messages::{Outbound, Reply, Target};
use crate::models::{self, CalendarEvent, CalendarQuery};

const CALENDAR_DOMAIN: &str = "calendar";
const GET_EVENTS_SERVICE: &str = "get_events";

impl HubClient {
    /// Upcoming events across every calendar entity, merged and sorted by
    /// start time, capped at `query.limit`.
    ///
    /// Calendars are queried one at a time. A calendar whose query fails or
    /// returns something unreadable is skipped; the others still count.
    #[instrument(parent = &self.span, skip_all, fields(limit = query.limit))]
    pub async fn get_calendar_events(
        &mut self,
        query: &CalendarQuery,
    ) -> Result<Vec<CalendarEvent>, Error> {
        let id = self.next_request_id();
        let calendars: Vec<String> = self
            .fetch_states(id)
            .await?
            .into_iter()
            .map(|state| state.entity_id)
            .filter(|entity_id| models::is_calendar(entity_id))
            .collect();

        if calendars.is_empty() {
            info!("no calendar entities found");
            return Ok(Vec::new());
        }
        debug!(count = calendars.len(), "found calendars");

        let service_data = query.service_data();
        let mut events = Vec::new();

        for entity_id in &calendars {
            let message = Outbound::CallService {
                id: self.next_request_id(),
                domain: CALENDAR_DOMAIN,
                service: GET_EVENTS_SERVICE,
                target: Target { entity_id },
                service_data: &service_data,
                return_response: true,
            };

            match self.request(&message).await? {
                Reply::Failure { error, .. } => {
                    error!(
                        calendar = %entity_id,
                        reason = %error.message_or_unknown(),
                        "Failed to get events for calendar"
                    );
                }
                Reply::Success { result, .. } => match models::extract_events(&result, entity_id) {
                    Ok(batch) => {
                        debug!(calendar = %entity_id, count = batch.len(), "received events");
                        events.extend(batch);
                    }
                    Err(e) => {
                        warn!(calendar = %entity_id, error = %e, "skipping unreadable events");
                    }
                },
            }
        }

        models::sort_and_limit(&mut events, query.limit);
        Ok(events)
    }
}
