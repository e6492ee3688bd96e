#![allow(clippy::unwrap_used)]
// Integration tests for `HubClient` against an in-process fake hub.

mod common;

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use pretty_assertions::assert_eq;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use common::{
    AuthBehavior, FakeHub, client_for, closed_port, fast_timeouts, result_err, result_ok, state,
    states_only,
};
use hassly_api::{
    CalendarQuery, ConnectionTestFailure, EchoError, EchoProbe, Error, HubClient, NoEcho,
    Unreachable,
};

// ── Helpers ─────────────────────────────────────────────────────────

#[derive(Debug)]
struct RefusedEcho;

impl EchoProbe for RefusedEcho {
    fn echo(&self, _addr: IpAddr, timeout: Duration) -> BoxFuture<'_, Result<(), EchoError>> {
        Box::pin(async move { Err(EchoError::Timeout(timeout)) })
    }
}

fn calendar_hub_responder(
    states: Vec<Value>,
    events: Value,
) -> impl Fn(&Value) -> Option<Value> + Send + Sync + 'static {
    move |request| match request["type"].as_str() {
        Some("get_states") => Some(result_ok(request, Value::Array(states.clone()))),
        Some("call_service") => {
            let entity_id = request["target"]["entity_id"].as_str().unwrap();
            if entity_id == "calendar.broken" {
                return Some(result_err(request, "Calendar unavailable"));
            }
            Some(result_ok(
                request,
                json!({
                    "context": { "id": "ctx" },
                    "response": { entity_id: { "events": events[entity_id].clone() } }
                }),
            ))
        }
        _ => None,
    }
}

// ── Entity queries ──────────────────────────────────────────────────

#[tokio::test]
async fn test_get_entities_filters_and_sorts() {
    let hub = FakeHub::start(
        AuthBehavior::Accept,
        states_only(vec![
            state("switch.fan", Some("Fan")),
            state("sensor.temp", Some("Temperature")),
            state("light.porch", None),
            state("light.kitchen", Some("Kitchen")),
            state("climate.hall", Some("Hall")),
            state("automation.morning", Some("Morning")),
        ]),
    )
    .await;
    let mut client = client_for(&hub, "good-token");

    let entities = client.get_entities().await.unwrap();

    let ids: Vec<&str> = entities.iter().map(|e| e.entity_id.as_str()).collect();
    assert_eq!(
        ids,
        ["climate.hall", "light.kitchen", "light.porch", "sensor.temp"]
    );
    assert_eq!(entities[2].name, "light.porch");
    assert_eq!(entities[1].domain, "light");
    assert!(client.is_connected(), "read operations connect on demand");
    assert_eq!(hub.received(), vec![json!({ "id": 1, "type": "get_states" })]);
}

#[tokio::test]
async fn test_state_queries_reuse_id_one() {
    let hub = FakeHub::start(
        AuthBehavior::Accept,
        states_only(vec![state("light.a", None)]),
    )
    .await;
    let mut client = client_for(&hub, "good-token");

    client.get_entities().await.unwrap();
    client.get_entity_states(&["light.a"]).await.unwrap();
    client.get_entities().await.unwrap();

    let ids: Vec<Value> = hub.received().into_iter().map(|r| r["id"].clone()).collect();
    assert_eq!(ids, [json!(1), json!(1), json!(1)]);
    assert_eq!(hub.sessions(), 1, "one connection serves every request");
}

#[tokio::test]
async fn test_get_entity_states_returns_requested_subset() {
    let hub = FakeHub::start(
        AuthBehavior::Accept,
        states_only(vec![
            state("light.a", Some("A")),
            state("light.b", Some("B")),
            state("sensor.c", Some("C")),
        ]),
    )
    .await;
    let mut client = client_for(&hub, "good-token");

    let states = client
        .get_entity_states(&["sensor.c", "light.a", "vacuum.missing"])
        .await
        .unwrap();

    let keys: Vec<&str> = states.keys().map(String::as_str).collect();
    assert_eq!(keys, ["light.a", "sensor.c"]);
    assert_eq!(states["light.a"].friendly_name(), Some("A"));
    assert_eq!(states["sensor.c"].state.as_deref(), Some("on"));
    assert_eq!(states["sensor.c"].extra["context"]["id"], "01J0000000000000000000000");
}

#[tokio::test]
async fn test_validate_entities_partitions_in_input_order() {
    let hub = FakeHub::start(
        AuthBehavior::Accept,
        states_only(vec![state("light.a", None), state("sensor.b", None)]),
    )
    .await;
    let mut client = client_for(&hub, "good-token");

    let result = client
        .validate_entities(&["sensor.b", "light.nope", "light.a", "cover.gone"])
        .await
        .unwrap();

    assert_eq!(result.valid, ["sensor.b", "light.a"]);
    assert_eq!(result.invalid, ["light.nope", "cover.gone"]);
}

#[tokio::test]
async fn test_state_query_failure_carries_hub_message() {
    let hub = FakeHub::start(AuthBehavior::Accept, |request: &Value| {
        Some(result_err(request, "Unauthorized"))
    })
    .await;
    let mut client = client_for(&hub, "good-token");

    let err = client.get_entities().await.unwrap_err();

    assert!(
        matches!(err, Error::States { ref message } if message == "Unauthorized"),
        "got {err:?}"
    );
    assert_eq!(err.to_string(), "Failed to get states: Unauthorized");
}

// ── Service calls ───────────────────────────────────────────────────

#[tokio::test]
async fn test_send_command_without_connection_fails_fast() {
    let hub = FakeHub::start(AuthBehavior::Accept, |_: &Value| None).await;
    let mut client = client_for(&hub, "good-token");

    let err = client
        .send_command("light", "turn_on", "light.kitchen")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotConnected), "got {err:?}");
    assert_eq!(hub.sessions(), 0, "send_command must not connect");
}

#[tokio::test]
async fn test_send_command_is_fire_and_forget() {
    let hub = FakeHub::start(AuthBehavior::Accept, |_: &Value| None).await;
    let mut client = client_for(&hub, "good-token");
    client.connect().await.unwrap();

    client
        .send_command("light", "turn_on", "light.kitchen")
        .await
        .unwrap();
    client
        .send_command("cover", "close_cover", "cover.garage")
        .await
        .unwrap();
    // Give the hub a moment to record both frames.
    client.disconnect().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let received = hub.received();
    assert_eq!(
        received,
        vec![
            json!({
                "type": "call_service",
                "id": 1,
                "domain": "light",
                "service": "turn_on",
                "target": { "entity_id": "light.kitchen" },
                "service_data": {},
                "return_response": false
            }),
            json!({
                "type": "call_service",
                "id": 2,
                "domain": "cover",
                "service": "close_cover",
                "target": { "entity_id": "cover.garage" },
                "service_data": {},
                "return_response": false
            }),
        ]
    );
}

// ── Calendar ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_calendar_without_calendars_makes_one_query() {
    let hub = FakeHub::start(
        AuthBehavior::Accept,
        states_only(vec![state("light.a", None), state("sensor.calendar_sync", None)]),
    )
    .await;
    let mut client = client_for(&hub, "good-token");

    let events = client
        .get_calendar_events(&CalendarQuery::default())
        .await
        .unwrap();

    assert!(events.is_empty());
    let received = hub.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["type"], "get_states");
}

#[tokio::test]
async fn test_calendar_merges_sorts_then_limits() {
    let events = json!({
        "calendar.family": [
            { "start": "2025-03-02", "end": "2025-03-03", "summary": "Trip" },
            { "start": "2025-01-01", "end": "2025-01-02", "summary": "New Year" }
        ],
        "calendar.bin_collection": [
            { "start": "2025-02-15", "end": "2025-02-16", "summary": "Recycling" }
        ]
    });
    let hub = FakeHub::start(
        AuthBehavior::Accept,
        calendar_hub_responder(
            vec![
                state("calendar.family", None),
                state("light.a", None),
                state("calendar.bin_collection", None),
            ],
            events,
        ),
    )
    .await;
    let mut client = client_for(&hub, "good-token");

    let query = CalendarQuery {
        start: Some("2025-01-01T00:00:00".into()),
        end: Some("2025-12-31T00:00:00".into()),
        limit: 2,
    };
    let merged = client.get_calendar_events(&query).await.unwrap();

    let starts: Vec<&str> = merged.iter().filter_map(|e| e.start.as_deref()).collect();
    assert_eq!(starts, ["2025-01-01", "2025-02-15"]);
    assert_eq!(merged[0].calendar_name, "Family");
    assert_eq!(merged[0].calendar_id, "calendar.family");
    assert_eq!(merged[1].calendar_name, "Bin Collection");

    let received = hub.received();
    let ids: Vec<u64> = received.iter().map(|r| r["id"].as_u64().unwrap()).collect();
    assert_eq!(ids, [1, 2, 3], "discovery and service calls draw fresh ids");

    let call = &received[1];
    assert_eq!(call["domain"], "calendar");
    assert_eq!(call["service"], "get_events");
    assert_eq!(call["target"]["entity_id"], "calendar.family");
    assert_eq!(call["return_response"], true);
    assert_eq!(
        call["service_data"],
        json!({
            "start_date_time": "2025-01-01T00:00:00",
            "end_date_time": "2025-12-31T00:00:00"
        })
    );
}

#[tokio::test]
async fn test_calendar_skips_failing_calendar() {
    let events = json!({
        "calendar.home": [ { "start": "2025-05-01", "summary": "Boiler service" } ]
    });
    let hub = FakeHub::start(
        AuthBehavior::Accept,
        calendar_hub_responder(
            vec![state("calendar.broken", None), state("calendar.home", None)],
            events,
        ),
    )
    .await;
    let mut client = client_for(&hub, "good-token");

    let merged = client
        .get_calendar_events(&CalendarQuery::default())
        .await
        .unwrap();

    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].summary.as_deref(), Some("Boiler service"));
    assert_eq!(hub.received().len(), 3);
    assert!(
        hub.received()[1]["service_data"]
            .as_object()
            .unwrap()
            .is_empty(),
        "unset bounds are omitted"
    );
}

// ── Connection lifecycle ────────────────────────────────────────────

#[tokio::test]
async fn test_connection_accepts_valid_token() {
    let hub = FakeHub::start(AuthBehavior::Accept, |_: &Value| None).await;
    let client = client_for(&hub, "good-token");

    assert_eq!(client.test_connection().await, Ok(()));
    assert!(!client.is_connected(), "test channel is not kept");
    assert_eq!(hub.sessions(), 1);
}

#[tokio::test]
async fn test_connection_reports_invalid_token() {
    let hub = FakeHub::start(AuthBehavior::Reject, |_: &Value| None).await;
    let client = client_for(&hub, "bad-token");

    let result = client.test_connection().await;

    assert_eq!(result, Err(ConnectionTestFailure::InvalidToken));
    assert_eq!(result.unwrap_err().to_string(), "Invalid access token");
}

#[tokio::test]
async fn test_connect_rejects_invalid_token() {
    let hub = FakeHub::start(AuthBehavior::Reject, |_: &Value| None).await;
    let mut client = client_for(&hub, "bad-token");

    let err = client.connect().await.unwrap_err();

    assert!(matches!(err, Error::AuthenticationFailed), "got {err:?}");
    assert!(err.is_auth_failure());
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_connection_flags_unexpected_greeting() {
    let hub = FakeHub::start(AuthBehavior::BadGreeting, |_: &Value| None).await;
    let client = client_for(&hub, "good-token");

    assert_eq!(
        client.test_connection().await,
        Err(ConnectionTestFailure::UnexpectedResponse)
    );
}

#[tokio::test]
async fn test_connect_does_not_inspect_greeting() {
    let hub = FakeHub::start(AuthBehavior::BadGreeting, |_: &Value| None).await;
    let mut client = client_for(&hub, "good-token");

    client.connect().await.unwrap();
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_connection_times_out_on_silent_hub() {
    let hub = FakeHub::start(AuthBehavior::Silent, |_: &Value| None).await;
    let client = client_for(&hub, "good-token");

    let result = client.test_connection().await;

    assert_eq!(result, Err(ConnectionTestFailure::TimedOut));
    assert!(
        result
            .unwrap_err()
            .to_string()
            .starts_with("Connection timed out.")
    );
}

#[tokio::test]
async fn test_failed_echo_never_opens_a_channel() {
    let hub = FakeHub::start(AuthBehavior::Accept, |_: &Value| None).await;
    let client = client_for(&hub, "good-token").with_echo_probe(Arc::new(RefusedEcho));

    let result = client.test_connection().await;

    assert_eq!(
        result,
        Err(ConnectionTestFailure::Unreachable(Unreachable::CannotPing {
            host: "127.0.0.1".into()
        }))
    );
    assert_eq!(hub.connections(), 0, "no TCP or WebSocket attempt after echo failure");
}

#[tokio::test]
async fn test_check_connectivity_refused_port() {
    let port = closed_port().await;
    let client = HubClient::new(Some(&format!("http://127.0.0.1:{port}")), None, false)
        .unwrap()
        .with_echo_probe(Arc::new(NoEcho))
        .with_timeouts(fast_timeouts());

    let result = client.check_connectivity().await;

    assert_eq!(
        result,
        Err(Unreachable::Refused {
            host: "127.0.0.1".into(),
            port
        })
    );
    assert_eq!(
        result.unwrap_err().to_string(),
        format!("Connection refused on 127.0.0.1:{port}. Please verify Home Assistant is running.")
    );
}

#[tokio::test]
async fn test_check_connectivity_skipped_for_cloud_relay() {
    let client = HubClient::new(Some("https://unreachable.invalid"), None, true)
        .unwrap()
        .with_echo_probe(Arc::new(RefusedEcho));

    assert_eq!(client.check_connectivity().await, Ok(()));
}

#[tokio::test]
async fn test_unconfigured_client_reports_missing_url() {
    let client = HubClient::new(None, None, false).unwrap();

    assert_eq!(
        client.test_connection().await,
        Err(ConnectionTestFailure::Unreachable(Unreachable::NotConfigured))
    );
}

#[tokio::test]
async fn test_disconnect_twice_is_harmless() {
    let hub = FakeHub::start(AuthBehavior::Accept, |_: &Value| None).await;
    let mut client = client_for(&hub, "good-token");

    client.connect().await.unwrap();
    assert!(client.is_connected());

    client.disconnect().await;
    client.disconnect().await;
    assert!(!client.is_connected());

    // Never connected at all.
    let mut idle = client_for(&hub, "good-token");
    idle.disconnect().await;
    assert!(!idle.is_connected());
}

#[tokio::test]
async fn test_connect_replaces_existing_connection() {
    let hub = FakeHub::start(AuthBehavior::Accept, |_: &Value| None).await;
    let mut client = client_for(&hub, "good-token");

    client.connect().await.unwrap();
    client.connect().await.unwrap();

    assert!(client.is_connected());
    assert_eq!(hub.sessions(), 2);
}

// ── Reconfiguration ─────────────────────────────────────────────────

#[tokio::test]
async fn test_update_config_applies_working_settings() {
    let hub = FakeHub::start(AuthBehavior::Accept, |_: &Value| None).await;
    let mut client = client_for(&hub, "old-token");
    client.connect().await.unwrap();

    client
        .update_config(None, Some(SecretString::from("new-token".to_owned())))
        .await
        .unwrap();

    let token = client.config().access_token.as_ref().unwrap();
    assert_eq!(token.expose_secret(), "new-token");
    assert!(!client.is_connected(), "old connection is released");
}

#[tokio::test]
async fn test_update_config_rolls_back_on_failure() {
    let hub = FakeHub::start(AuthBehavior::Accept, |_: &Value| None).await;
    let mut client = client_for(&hub, "good-token");
    let original = client.config().endpoint.clone();

    let port = closed_port().await;
    let err = client
        .update_config(
            Some(&format!("http://127.0.0.1:{port}")),
            Some(SecretString::from("other-token".to_owned())),
        )
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            Error::Reconfigure(ConnectionTestFailure::Unreachable(Unreachable::Refused { .. }))
        ),
        "got {err:?}"
    );
    assert!(
        err.to_string()
            .starts_with("Failed to connect with new configuration: Connection refused")
    );
    assert_eq!(client.config().endpoint, original);
    assert_eq!(
        client
            .config()
            .access_token
            .as_ref()
            .unwrap()
            .expose_secret(),
        "good-token"
    );

    // Still usable with the restored settings.
    assert_eq!(client.test_connection().await, Ok(()));
}

#[tokio::test]
async fn test_update_config_ignores_empty_url() {
    let hub = FakeHub::start(AuthBehavior::Accept, |_: &Value| None).await;
    let mut client = client_for(&hub, "good-token");
    let original = client.config().endpoint.clone();

    client.update_config(Some(""), None).await.unwrap();

    assert_eq!(client.config().endpoint, original);
}

#[tokio::test]
async fn test_update_config_ignores_empty_token() {
    let hub = FakeHub::start(AuthBehavior::Accept, |_: &Value| None).await;
    let mut client = client_for(&hub, "good-token");

    client
        .update_config(None, Some(SecretString::from(String::new())))
        .await
        .unwrap();

    let token = client.config().access_token.as_ref().unwrap();
    assert_eq!(token.expose_secret(), "good-token");
}

// ── Blocking wrapper ────────────────────────────────────────────────

#[test]
fn test_blocking_wrapper_outside_runtime() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();
    let hub = runtime.block_on(FakeHub::start(AuthBehavior::Reject, |_: &Value| None));
    let client = client_for(&hub, "bad-token");

    assert_eq!(
        client.test_connection_blocking(),
        Err(ConnectionTestFailure::InvalidToken)
    );
}

#[tokio::test]
async fn test_blocking_wrapper_inside_runtime_returns_failure() {
    let client = HubClient::new(Some("http://127.0.0.1:8123"), None, false).unwrap();

    let result = client.test_connection_blocking();

    assert!(
        matches!(result, Err(ConnectionTestFailure::Other(ref msg)) if msg.contains("async runtime")),
        "got {result:?}"
    );
}
