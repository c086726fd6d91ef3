//! Platform Event Webhook
//!
//! Receives subscribed platform events. Health probes are acknowledged
//! immediately; every other event is counted per subscriber and logged.

use axum::{extract::State, http::HeaderMap, Extension, Json};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use installgate_core::InstallationIdentity;

use crate::api::handlers::AppState;

/// Event type the platform uses to probe webhook health
pub const HEALTH_EVENT_TYPE: &str = "ones:events:health";

/// Header carrying the event type
pub const EVENT_TYPE_HEADER: &str = "x-ones-event-type";

/// Header carrying the event id
pub const EVENT_ID_HEADER: &str = "x-ones-event-id";

/// Event envelope
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformEvent {
    #[serde(rename = "eventID", default)]
    pub event_id: String,

    #[serde(default)]
    pub event_type: String,

    #[serde(default)]
    pub event_data: serde_json::Value,

    #[serde(default)]
    pub timestamp: i64,

    #[serde(rename = "subscriberID", default)]
    pub subscriber_id: String,
}

/// Acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct EventAck {
    pub status: String,

    /// Events seen so far for the subscriber; absent for health probes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

/// Per-subscriber event counter
///
/// Diagnostic only, lost on restart.
#[derive(Debug, Default)]
pub struct EventTally {
    counts: RwLock<HashMap<String, u64>>,
}

impl EventTally {
    /// Count one event for `subscriber_id`, returning the new total
    pub fn record(&self, subscriber_id: &str) -> u64 {
        let mut counts = self.counts.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let count = counts.entry(subscriber_id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Events counted for `subscriber_id`
    pub fn count(&self, subscriber_id: &str) -> u64 {
        let counts = self.counts.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        counts.get(subscriber_id).copied().unwrap_or(0)
    }
}

/// Event webhook
///
/// POST /events/webhook
pub async fn handle_event(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<InstallationIdentity>,
    headers: HeaderMap,
    Json(event): Json<PlatformEvent>,
) -> Json<EventAck> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("");
    let event_type = header(EVENT_TYPE_HEADER);

    if event_type == HEALTH_EVENT_TYPE {
        debug!(installation_id = %identity.installation_id, "Event webhook health probe");
        return Json(EventAck {
            status: "success".into(),
            count: None,
        });
    }

    let count = state.events.record(&event.subscriber_id);

    info!(
        installation_id = %identity.installation_id,
        event_id = %header(EVENT_ID_HEADER),
        event_type = %event_type,
        body_event_id = %event.event_id,
        body_event_type = %event.event_type,
        subscriber_id = %event.subscriber_id,
        timestamp = event.timestamp,
        count = count,
        "Received platform event"
    );
    debug!(event_data = %event.event_data, "Event payload");

    Json(EventAck {
        status: "success".into(),
        count: Some(count),
    })
}
