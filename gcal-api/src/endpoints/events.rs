use super::{Attendee, CalendarId, EventDateTime, Person};
use crate::macros::setter;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tower_api_client::{Method, Request, RequestData};

// Common

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub html_link: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub start: EventDateTime,
    #[serde(default)]
    pub end: EventDateTime,
    #[serde(default)]
    pub organizer: Option<Person>,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    /// Legacy Meet link, still populated alongside `conferenceData`.
    #[serde(default)]
    pub hangout_link: Option<String>,
    #[serde(default)]
    pub conference_data: Option<ConferenceData>,
}

impl Event {
    /// Join link of the attached conference: its first entry point, falling
    /// back to `hangoutLink`.
    pub fn conference_link(&self) -> Option<&str> {
        self.conference_data
            .as_ref()
            .and_then(|conference| conference.entry_points.first())
            .and_then(|entry_point| entry_point.uri.as_deref())
            .or(self.hangout_link.as_deref())
    }

    /// Start instant; all-day events start at midnight UTC.
    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        self.start.date_time.or_else(|| {
            self.start
                .date
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        })
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.starts_at()
            .cmp(&other.starts_at())
            .then_with(|| self.id.cmp(&other.id))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_request: Option<CreateConferenceRequest>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry_points: Vec<EntryPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conference_id: Option<String>,
}

impl ConferenceData {
    /// Ask the provider to allocate a Google Meet conference. `request_id`
    /// must be unique per attempt; reusing one returns the earlier conference.
    pub fn hangouts_meet(request_id: impl Into<String>) -> Self {
        Self {
            create_request: Some(CreateConferenceRequest {
                request_id: request_id.into(),
                conference_solution_key: ConferenceSolutionKey {
                    kind: "hangoutsMeet".to_string(),
                },
                status: None,
            }),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateConferenceRequest {
    pub request_id: String,
    pub conference_solution_key: ConferenceSolutionKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ConferenceRequestStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConferenceSolutionKey {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceRequestStatus {
    pub status_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EntryPoint {
    pub entry_point_type: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Reminders {
    pub use_default: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<ReminderOverride>,
}

impl Reminders {
    pub fn overrides(overrides: Vec<ReminderOverride>) -> Self {
        Self {
            use_default: false,
            overrides,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReminderOverride {
    pub method: ReminderMethod,
    pub minutes: u32,
}

impl ReminderOverride {
    pub fn email(minutes: u32) -> Self {
        Self {
            method: ReminderMethod::Email,
            minutes,
        }
    }

    pub fn popup(minutes: u32) -> Self {
        Self {
            method: ReminderMethod::Popup,
            minutes,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReminderMethod {
    Email,
    Popup,
}

/// Who receives invitation e-mails for an insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SendUpdates {
    #[default]
    All,
    ExternalOnly,
    None,
}

impl std::fmt::Display for SendUpdates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::ExternalOnly => f.write_str("externalOnly"),
            Self::None => f.write_str("none"),
        }
    }
}

// Requests

#[derive(Debug, Clone)]
pub struct InsertEvent {
    calendar_id: CalendarId,
    send_updates: SendUpdates,
    event: NewEvent,
}

impl InsertEvent {
    pub fn new(summary: impl Into<String>, start: EventDateTime, end: EventDateTime) -> Self {
        Self {
            calendar_id: CalendarId::default(),
            send_updates: SendUpdates::default(),
            event: NewEvent::new(summary, start, end),
        }
    }

    setter!(calendar_id: CalendarId);
    setter!(send_updates: SendUpdates);
    setter!(opt event.description: String);
    setter!(opt event.location: String);
    setter!(opt event.organizer: Person);
    setter!(event.attendees: Vec<Attendee>);
    setter!(opt event.conference_data: ConferenceData);
    setter!(opt event.reminders: Reminders);

    pub fn event(&self) -> &NewEvent {
        &self.event
    }
}

impl Request for InsertEvent {
    type Data = NewEvent;
    type Response = Event;
    const METHOD: Method = Method::POST;

    fn endpoint(&self) -> Cow<'_, str> {
        // conferenceDataVersion=1 is required for createRequest to be honoured.
        format!(
            "/calendars/{}/events?conferenceDataVersion=1&sendUpdates={}",
            self.calendar_id.path_segment(),
            self.send_updates
        )
        .into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Json(&self.event)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub start: EventDateTime,
    pub end: EventDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizer: Option<Person>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attendees: Vec<Attendee>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conference_data: Option<ConferenceData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminders: Option<Reminders>,
}

impl NewEvent {
    pub fn new(summary: impl Into<String>, start: EventDateTime, end: EventDateTime) -> Self {
        Self {
            summary: summary.into(),
            description: None,
            location: None,
            start,
            end,
            organizer: None,
            attendees: Vec::new(),
            conference_data: None,
            reminders: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListEvents {
    calendar_id: CalendarId,
    query: ListEventsQuery,
}

/// Range query expanded into single occurrences, ordered by start time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEventsQuery {
    time_min: DateTime<Utc>,
    time_max: DateTime<Utc>,
    single_events: bool,
    order_by: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_results: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_token: Option<String>,
}

impl ListEvents {
    pub fn new(time_min: DateTime<Utc>, time_max: DateTime<Utc>) -> Self {
        Self {
            calendar_id: CalendarId::default(),
            query: ListEventsQuery {
                time_min,
                time_max,
                single_events: true,
                order_by: "startTime",
                max_results: None,
                page_token: None,
            },
        }
    }

    setter!(calendar_id: CalendarId);
    setter!(opt query.max_results: u32);
    setter!(opt query.page_token: String);
}

impl Request for ListEvents {
    type Data = ListEventsQuery;
    type Response = EventsResponse;

    fn endpoint(&self) -> Cow<'_, str> {
        format!("/calendars/{}/events", self.calendar_id.path_segment()).into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Query(&self.query)
    }
}

// Responses

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsResponse {
    #[serde(default)]
    pub items: Vec<Event>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
}
