//! Cyanite webhook payload types and routing.
//!
//! The body is kept as a `serde_json::Value` until after signature
//! verification so the exact document can be re-serialized. Only then is it
//! read as a [`WebhookEvent`] and classified.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event type sent when a webhook is registered or tested from the dashboard.
pub const TEST_EVENT_TYPE: &str = "TEST";

/// Nested event type announcing an audio analysis.
pub const AUDIO_ANALYSIS_EVENT: &str = "AudioAnalysisV6";

/// Nested event status for a completed analysis.
pub const FINISHED_STATUS: &str = "finished";

/// Webhook payload as sent by Cyanite.
///
/// Unknown fields are ignored. `event` and `resource` are absent on `TEST`
/// payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub event: Option<EventDetails>,
    #[serde(default)]
    pub resource: Option<Resource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDetails {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
}

/// What the webhook endpoint should do with a verified payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventAction {
    /// Analysis finished; fetch the full result for this track.
    FetchAnalysis { track_id: String },
    /// Finished analysis announced without a resource id.
    MissingResource,
    /// Anything else is acknowledged and dropped.
    Ignore,
}

/// Whether the raw payload is a `TEST` event.
///
/// Looks only at the top-level `type` so it works before any other field is
/// trusted.
pub fn is_test_event(body: &Value) -> bool {
    body.get("type").and_then(Value::as_str) == Some(TEST_EVENT_TYPE)
}

impl WebhookEvent {
    /// Read a verified body. Payloads that do not fit the shape are ignored
    /// rather than rejected.
    pub fn from_value(body: &Value) -> Option<Self> {
        serde_json::from_value(body.clone()).ok()
    }

    pub fn action(&self) -> EventAction {
        let finished = self.event.as_ref().is_some_and(|e| {
            e.kind == AUDIO_ANALYSIS_EVENT && e.status == FINISHED_STATUS
        });

        if !finished {
            return EventAction::Ignore;
        }

        match &self.resource {
            Some(resource) if !resource.id.is_empty() => EventAction::FetchAnalysis {
                track_id: resource.id.clone(),
            },
            _ => EventAction::MissingResource,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_test_event() {
        assert!(is_test_event(&json!({"type": "TEST"})));
        assert!(!is_test_event(&json!({"type": "test"})));
        assert!(!is_test_event(&json!({"type": "EVENT"})));
        assert!(!is_test_event(&json!({"event": {"type": "TEST"}})));
        assert!(!is_test_event(&json!(["TEST"])));
    }

    #[test]
    fn test_finished_analysis_fetches_track() {
        let body = json!({
            "type": "EVENT",
            "event": {"type": "AudioAnalysisV6", "status": "finished"},
            "resource": {"id": "abc123", "type": "LibraryTrack"}
        });

        let event = WebhookEvent::from_value(&body).unwrap();
        assert_eq!(
            event.action(),
            EventAction::FetchAnalysis {
                track_id: "abc123".to_string()
            }
        );
    }

    #[test]
    fn test_other_events_are_ignored() {
        let cases = [
            json!({"type": "EVENT", "event": {"type": "AudioAnalysisV6", "status": "processing"}, "resource": {"id": "a"}}),
            json!({"type": "EVENT", "event": {"type": "AudioAnalysisV6", "status": "failed"}, "resource": {"id": "a"}}),
            json!({"type": "EVENT", "event": {"type": "KeywordSearch", "status": "finished"}, "resource": {"id": "a"}}),
            json!({"type": "EVENT"}),
        ];

        for body in cases {
            let event = WebhookEvent::from_value(&body).unwrap();
            assert_eq!(event.action(), EventAction::Ignore, "{body}");
        }
    }

    #[test]
    fn test_finished_without_resource() {
        let body = json!({
            "type": "EVENT",
            "event": {"type": "AudioAnalysisV6", "status": "finished"}
        });
        let event = WebhookEvent::from_value(&body).unwrap();
        assert_eq!(event.action(), EventAction::MissingResource);

        let body = json!({
            "type": "EVENT",
            "event": {"type": "AudioAnalysisV6", "status": "finished"},
            "resource": {"id": ""}
        });
        let event = WebhookEvent::from_value(&body).unwrap();
        assert_eq!(event.action(), EventAction::MissingResource);
    }

    #[test]
    fn test_unexpected_shape() {
        assert!(WebhookEvent::from_value(&json!({"event": {}})).is_none());
        assert!(WebhookEvent::from_value(&json!(42)).is_none());
    }
}
