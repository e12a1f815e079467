use crate::endpoints::{
    CalendarId, EventDateTime,
    events::{InsertEvent, ListEvents},
};
use chrono::{DateTime, Utc};

#[derive(Default)]
pub struct EventRepository {
    calendar_id: CalendarId,
}

impl EventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_calendar(mut self, calendar_id: impl Into<CalendarId>) -> Self {
        self.calendar_id = calendar_id.into();
        self
    }

    pub fn insert(
        &self,
        summary: impl Into<String>,
        start: EventDateTime,
        end: EventDateTime,
    ) -> InsertEvent {
        InsertEvent::new(summary, start, end).calendar_id(self.calendar_id.clone())
    }

    pub fn list(&self, time_min: DateTime<Utc>, time_max: DateTime<Utc>) -> ListEvents {
        ListEvents::new(time_min, time_max).calendar_id(self.calendar_id.clone())
    }
}
