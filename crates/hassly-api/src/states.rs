// Entity state queries and service calls.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument};

use crate::client::HubClient;
use crate::error::Error;
use crate::messages::{Outbound, Reply, Target};
use crate::models::{self, EntityState, EntitySummary, EntityValidation};

/// Request id used for every entity state query.
const STATES_QUERY_ID: u64 = 1;

impl HubClient {
    /// List entities in the supported domains, sorted by domain then name.
    #[instrument(parent = &self.span, skip_all)]
    pub async fn get_entities(&mut self) -> Result<Vec<EntitySummary>, Error> {
        let states = self.fetch_states(STATES_QUERY_ID).await?;
        let summaries = models::summarize(states);
        debug!(count = summaries.len(), "listed entities");
        Ok(summaries)
    }

    /// Current state of each requested entity the hub knows about.
    ///
    /// Unknown ids are silently absent from the result.
    #[instrument(parent = &self.span, skip_all, fields(requested = entity_ids.len()))]
    pub async fn get_entity_states<S: AsRef<str>>(
        &mut self,
        entity_ids: &[S],
    ) -> Result<BTreeMap<String, EntityState>, Error> {
        let states = self.fetch_states(STATES_QUERY_ID).await?;
        Ok(models::select_states(states, entity_ids))
    }

    /// Split `entity_ids` into ids the hub knows and ids it doesn't.
    ///
    /// Both lists keep the input order.
    #[instrument(parent = &self.span, skip_all, fields(requested = entity_ids.len()))]
    pub async fn validate_entities<S: AsRef<str>>(
        &mut self,
        entity_ids: &[S],
    ) -> Result<EntityValidation, Error> {
        let known = self.get_entity_states(entity_ids).await?;
        let validation = models::partition(entity_ids, &known);
        debug!(
            valid = validation.valid.len(),
            invalid = validation.invalid.len(),
            "validated entities"
        );
        Ok(validation)
    }

    /// Fire a service call at an entity without waiting for the outcome.
    ///
    /// Requires an open connection; unlike the read operations this never
    /// connects on its own and returns [`Error::NotConnected`] instead.
    #[instrument(parent = &self.span, skip(self))]
    pub async fn send_command(
        &mut self,
        domain: &str,
        service: &str,
        entity_id: &str,
    ) -> Result<(), Error> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }

        let service_data = Map::new();
        let id = self.next_request_id();
        let message = Outbound::CallService {
            id,
            domain,
            service,
            target: Target { entity_id },
            service_data: &service_data,
            return_response: false,
        };
        self.send(&message).await?;
        info!(id, "service call sent");
        Ok(())
    }

    /// Issue `get_states` and decode the records.
    ///
    /// Records that fail to decode are dropped.
    pub(crate) async fn fetch_states(&mut self, id: u64) -> Result<Vec<EntityState>, Error> {
        self.ensure_connected().await?;

        match self.request(&Outbound::GetStates { id }).await? {
            Reply::Failure { error, .. } => {
                let message = error.message_or_unknown();
                error!(reason = %message, "Failed to get states");
                Err(Error::States { message })
            }
            Reply::Success { result, .. } => decode_states(result),
        }
    }
}

fn decode_states(result: Value) -> Result<Vec<EntityState>, Error> {
    let records = match result {
        Value::Array(records) => records,
        Value::Null => return Ok(Vec::new()),
        other => {
            return Err(Error::Deserialization {
                message: "expected an array of state records".into(),
                body: other.to_string(),
            });
        }
    };

    let states = records
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<EntityState>(record) {
            Ok(state) => Some(state),
            Err(e) => {
                debug!(error = %e, "skipping malformed state record");
                None
            }
        })
        .collect();
    Ok(states)
}
