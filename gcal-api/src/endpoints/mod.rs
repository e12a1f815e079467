pub mod events;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalendarId {
    #[default]
    #[serde(rename = "primary")]
    Primary,
    #[serde(untagged)]
    Id(String),
}

impl CalendarId {
    /// Percent-encoded form for use inside a request path. Shared calendar ids
    /// are e-mail addresses and may contain `#` (e.g. holiday calendars).
    pub fn path_segment(&self) -> String {
        urlencoding::encode(&self.to_string()).into_owned()
    }
}

impl Display for CalendarId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Id(id) => f.write_str(id),
        }
    }
}

impl From<&str> for CalendarId {
    fn from(s: &str) -> Self {
        match s {
            "" | "primary" => CalendarId::Primary,
            _ => CalendarId::Id(s.to_string()),
        }
    }
}

impl From<String> for CalendarId {
    fn from(s: String) -> Self {
        CalendarId::from(s.as_str())
    }
}

/// Start or end of an event. Timed events carry `dateTime`, all-day events
/// carry `date`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventDateTime {
    pub fn at(date_time: DateTime<Utc>) -> Self {
        Self {
            date_time: Some(date_time),
            ..Self::default()
        }
    }

    pub fn in_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = Some(time_zone.into());
        self
    }

    pub fn is_all_day(&self) -> bool {
        self.date_time.is_none() && self.date.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Person {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            display_name: None,
        }
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Set by the provider on responses; ignored on insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_status: Option<String>,
}

impl Attendee {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            display_name: None,
            organizer: None,
            response_status: None,
        }
    }
}

impl From<&str> for Attendee {
    fn from(email: &str) -> Self {
        Attendee::new(email)
    }
}

impl From<String> for Attendee {
    fn from(email: String) -> Self {
        Attendee::new(email)
    }
}
