use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single event offered in the swipe feed.
///
/// The `id` is stable across fetches and is the diffing key for the
/// currently displayed card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCard {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "townId")]
    pub town_id: String,
    #[serde(rename = "startsAt")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(rename = "endsAt", default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(rename = "photoUrl", default)]
    pub photo_url: Option<String>,
    #[serde(rename = "organizerName", default)]
    pub organizer_name: Option<String>,
    #[serde(rename = "spotsLeft", default)]
    pub spots_left: Option<u32>,
}

impl EventCard {
    pub fn formatted_start(&self) -> String {
        match self.starts_at {
            Some(dt) => dt.format("%b %d, %H:%M").to_string(),
            None => "TBD".to_string(),
        }
    }
}

/// An event the signed-in user organizes, as listed under "my events".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: i64,
    pub title: String,
    #[serde(rename = "townId")]
    pub town_id: String,
    #[serde(rename = "startsAt")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(rename = "attendeeCount", default)]
    pub attendee_count: u32,
    #[serde(default)]
    pub cancelled: bool,
}

/// Payload for creating or editing an event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventDraft {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "townId")]
    pub town_id: String,
    #[serde(rename = "startsAt")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(rename = "endsAt", skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
}

/// Pending join-request counts keyed by event id.
///
/// Kept as one aggregate under a single cache key so list views can render
/// badges without a per-event round trip.
pub type PendingCounts = HashMap<String, u32>;

/// Server acknowledgement for responding to a join request. Carries the
/// confirmed pending count for the event, which feeds cross-view patches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestAck {
    #[serde(rename = "eventId")]
    pub event_id: i64,
    pub pending: u32,
}
