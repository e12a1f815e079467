use serde::{Deserialize, Serialize};

use crate::services::calendar::EventSummary;

// GET /authorize/callback
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

// POST /bookings
//
// Every field is optional at the wire level so that validation can report all
// omissions at once instead of failing on the first one serde meets.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub mentor_email: Option<String>,
    pub user_email: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub topic: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResult {
    pub success: bool,
    pub event_id: String,
    pub event_link: String,
    pub meet_link: Option<String>,
}

// GET /calendar/status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub is_connected: bool,
    pub has_access_token: bool,
    pub has_refresh_token: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// POST /calendar/disconnect
#[derive(Debug, Serialize)]
pub struct DisconnectResponse {
    pub success: bool,
}

// GET /calendar/events
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    pub time_min: String,
    pub time_max: String,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub events: Vec<EventSummary>,
}

// Health check
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
