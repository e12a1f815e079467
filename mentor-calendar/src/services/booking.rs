use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{BookingRequest, BookingResult};
use crate::services::calendar::{CalendarClient, CalendarError, EventSpec};
use crate::services::credential_store::CredentialStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookingError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Invalid fields: {}", .0.join("; "))]
    InvalidFields(Vec<String>),

    #[error("Calendar not connected: {0}")]
    NeedsAuthorization(String),

    #[error("Calendar provider rejected the booking: {0}")]
    ProviderRejected(String),

    #[error("Calendar provider temporarily unavailable: {0}")]
    Transient(String),
}

impl BookingError {
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::MissingFields(_) => "MissingFields",
            BookingError::InvalidFields(_) => "InvalidFields",
            BookingError::NeedsAuthorization(_) => "NeedsAuthorization",
            BookingError::ProviderRejected(_) => "ProviderRejected",
            BookingError::Transient(_) => "Transient",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            BookingError::MissingFields(_) | BookingError::InvalidFields(_) => {
                StatusCode::BAD_REQUEST
            }
            BookingError::NeedsAuthorization(_) => StatusCode::UNAUTHORIZED,
            BookingError::ProviderRejected(_) | BookingError::Transient(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Only transient provider failures are worth offering a retry for.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BookingError::Transient(_))
    }
}

impl From<CalendarError> for BookingError {
    fn from(err: CalendarError) -> Self {
        match err {
            CalendarError::Unauthorized(details) => BookingError::NeedsAuthorization(details),
            CalendarError::ProviderRejected(details) => BookingError::ProviderRejected(details),
            CalendarError::Transient(details) => BookingError::Transient(details),
        }
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = json!({
            "success": false,
            "kind": self.kind(),
            "error": self.to_string(),
            "retryable": self.is_retryable(),
        });

        match &self {
            BookingError::MissingFields(fields) => {
                body["details"] = json!(format!("Please provide: {}", fields.join(", ")));
                body["missingFields"] = json!(fields);
            }
            BookingError::InvalidFields(problems) => {
                body["details"] = json!(problems.join("; "));
            }
            BookingError::NeedsAuthorization(details)
            | BookingError::ProviderRejected(details)
            | BookingError::Transient(details) => {
                body["details"] = json!(details);
            }
        }

        (status, Json(body)).into_response()
    }
}

/// A request that passed field validation.
#[derive(Debug)]
struct ValidatedBooking {
    mentor_email: String,
    user_email: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    topic: String,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

impl ValidatedBooking {
    fn parse(request: &BookingRequest) -> Result<Self, BookingError> {
        let fields = [
            ("mentorEmail", present(&request.mentor_email)),
            ("userEmail", present(&request.user_email)),
            ("startTime", present(&request.start_time)),
            ("endTime", present(&request.end_time)),
            ("topic", present(&request.topic)),
        ];
        let missing: Vec<&'static str> = fields
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect();

        let [(_, Some(mentor_email)), (_, Some(user_email)), (_, Some(start_time)), (_, Some(end_time)), (_, Some(topic))] =
            fields
        else {
            return Err(BookingError::MissingFields(missing));
        };

        let mut problems = Vec::new();
        for (name, email) in [("mentorEmail", mentor_email), ("userEmail", user_email)] {
            if !looks_like_email(email) {
                problems.push(format!("{} is not a valid e-mail address", name));
            }
        }

        let parse_time = |name: &str, value: &str, problems: &mut Vec<String>| {
            match DateTime::parse_from_rfc3339(value) {
                Ok(time) => Some(time.with_timezone(&Utc)),
                Err(_) => {
                    problems.push(format!("{} must be an RFC 3339 timestamp", name));
                    None
                }
            }
        };
        let start = parse_time("startTime", start_time, &mut problems);
        let end = parse_time("endTime", end_time, &mut problems);

        if let (Some(start), Some(end)) = (start, end) {
            if start >= end {
                problems.push("startTime must be before endTime".to_string());
            }
        }

        match (start, end) {
            (Some(start_time), Some(end_time)) if problems.is_empty() => Ok(Self {
                mentor_email: mentor_email.to_string(),
                user_email: user_email.to_string(),
                start_time,
                end_time,
                topic: topic.to_string(),
            }),
            _ => Err(BookingError::InvalidFields(problems)),
        }
    }

    fn event_spec(&self) -> EventSpec {
        EventSpec {
            summary: format!("Mentor session: {}", self.topic),
            description: format!(
                "Mentoring session booked through the accelerator platform.\n\nMentor: {}\nFounder: {}\nTopic: {}",
                self.mentor_email, self.user_email, self.topic
            ),
            start_time: self.start_time,
            end_time: self.end_time,
            attendee_emails: vec![self.mentor_email.clone(), self.user_email.clone()],
            location: None,
        }
    }
}

/// Validates a booking request and turns it into a calendar event with a
/// video link.
pub struct BookingOrchestrator {
    store: Arc<dyn CredentialStore>,
    calendar: Arc<dyn CalendarClient>,
}

impl BookingOrchestrator {
    pub fn new(store: Arc<dyn CredentialStore>, calendar: Arc<dyn CalendarClient>) -> Self {
        Self { store, calendar }
    }

    /// Not idempotent: each successful call creates a new event.
    pub async fn book(
        &self,
        principal: Option<&str>,
        request: BookingRequest,
    ) -> Result<BookingResult, BookingError> {
        let booking = ValidatedBooking::parse(&request).inspect_err(|err| {
            tracing::warn!(kind = err.kind(), details = %err, "Booking request rejected");
        })?;

        let Some(principal) = principal else {
            return Err(BookingError::NeedsAuthorization(
                "Connect your calendar first".to_string(),
            ));
        };

        let snapshot = self
            .store
            .get(principal)
            .map_err(|e| BookingError::Transient(e.to_string()))?;
        if !snapshot.is_connected() {
            tracing::info!(principal, "Booking attempted without calendar credentials");
            return Err(BookingError::NeedsAuthorization(
                "Connect your calendar first".to_string(),
            ));
        }

        let created = self
            .calendar
            .create_event(principal, &booking.event_spec())
            .await
            .map_err(|err| {
                // The stored credential is left in place; the next
                // authorization overwrites it.
                tracing::warn!(principal, error = %err, "Calendar event creation failed");
                BookingError::from(err)
            })?;

        tracing::info!(
            principal,
            event_id = %created.event_id,
            has_meet_link = created.meet_link.is_some(),
            "Mentor session booked"
        );

        Ok(BookingResult {
            success: true,
            event_id: created.event_id,
            event_link: created.event_link,
            meet_link: created.meet_link,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Credential, ExpiringToken};
    use crate::services::calendar::{CreatedEvent, EventSummary};
    use crate::services::credential_store::InMemoryCredentialStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every call and answers with a canned result.
    struct RecordingCalendar {
        calls: Mutex<Vec<(String, EventSpec)>>,
        result: Result<CreatedEvent, CalendarError>,
    }

    impl RecordingCalendar {
        fn answering(result: Result<CreatedEvent, CalendarError>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                result,
            })
        }

        fn calls(&self) -> Vec<(String, EventSpec)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CalendarClient for RecordingCalendar {
        async fn create_event(
            &self,
            principal: &str,
            spec: &EventSpec,
        ) -> Result<CreatedEvent, CalendarError> {
            self.calls
                .lock()
                .unwrap()
                .push((principal.to_string(), spec.clone()));
            self.result.clone()
        }

        async fn list_events(
            &self,
            _principal: &str,
            _time_min: DateTime<Utc>,
            _time_max: DateTime<Utc>,
        ) -> Result<Vec<EventSummary>, CalendarError> {
            Ok(Vec::new())
        }
    }

    fn created() -> CreatedEvent {
        CreatedEvent {
            event_id: "evt-123".to_string(),
            event_link: "https://calendar.google.com/event?eid=evt-123".to_string(),
            meet_link: Some("https://meet.google.com/abc-defg-hij".to_string()),
        }
    }

    fn request() -> BookingRequest {
        BookingRequest {
            mentor_email: Some("sarah@x.com".to_string()),
            user_email: Some("alex@y.com".to_string()),
            start_time: Some("2024-01-15T14:00:00Z".to_string()),
            end_time: Some("2024-01-15T15:00:00Z".to_string()),
            topic: Some("Fundraising".to_string()),
        }
    }

    fn connected_store() -> Arc<InMemoryCredentialStore> {
        let store = Arc::new(InMemoryCredentialStore::new());
        store
            .put(
                "principal-a",
                Credential::new(ExpiringToken::new(
                    "ya29.valid",
                    Utc::now() + chrono::Duration::hours(1),
                )),
            )
            .unwrap();
        store
    }

    #[tokio::test]
    async fn books_session_with_exactly_mentor_and_user() {
        let calendar = RecordingCalendar::answering(Ok(created()));
        let orchestrator = BookingOrchestrator::new(connected_store(), calendar.clone());

        let result = orchestrator
            .book(Some("principal-a"), request())
            .await
            .unwrap();

        assert_eq!(
            result,
            BookingResult {
                success: true,
                event_id: "evt-123".to_string(),
                event_link: "https://calendar.google.com/event?eid=evt-123".to_string(),
                meet_link: Some("https://meet.google.com/abc-defg-hij".to_string()),
            }
        );

        let calls = calendar.calls();
        assert_eq!(calls.len(), 1);
        let (principal, spec) = &calls[0];
        assert_eq!(principal, "principal-a");
        assert_eq!(spec.attendee_emails, vec!["sarah@x.com", "alex@y.com"]);
        assert_eq!(spec.summary, "Mentor session: Fundraising");
        assert!(spec.description.contains("sarah@x.com"));
        assert!(spec.description.contains("alex@y.com"));
        assert_eq!(spec.end_time - spec.start_time, chrono::Duration::hours(1));
    }

    #[tokio::test]
    async fn reports_every_missing_field_without_calling_the_provider() {
        let calendar = RecordingCalendar::answering(Ok(created()));
        let orchestrator = BookingOrchestrator::new(connected_store(), calendar.clone());

        let err = orchestrator
            .book(
                Some("principal-a"),
                BookingRequest {
                    mentor_email: Some("sarah@x.com".to_string()),
                    start_time: Some("  ".to_string()),
                    ..BookingRequest::default()
                },
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            BookingError::MissingFields(vec!["userEmail", "startTime", "endTime", "topic"])
        );
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(calendar.calls().is_empty());
    }

    #[tokio::test]
    async fn reports_every_malformed_field() {
        let calendar = RecordingCalendar::answering(Ok(created()));
        let orchestrator = BookingOrchestrator::new(connected_store(), calendar.clone());

        let err = orchestrator
            .book(
                Some("principal-a"),
                BookingRequest {
                    user_email: Some("alex".to_string()),
                    start_time: Some("tomorrow".to_string()),
                    ..request()
                },
            )
            .await
            .unwrap_err();

        let BookingError::InvalidFields(problems) = err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(problems.len(), 2);
        assert!(problems[0].starts_with("userEmail"));
        assert!(problems[1].starts_with("startTime"));
        assert!(calendar.calls().is_empty());
    }

    #[tokio::test]
    async fn end_must_follow_start() {
        let calendar = RecordingCalendar::answering(Ok(created()));
        let orchestrator = BookingOrchestrator::new(connected_store(), calendar.clone());

        let err = orchestrator
            .book(
                Some("principal-a"),
                BookingRequest {
                    end_time: Some("2024-01-15T14:00:00Z".to_string()),
                    ..request()
                },
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            BookingError::InvalidFields(vec!["startTime must be before endTime".to_string()])
        );
    }

    #[tokio::test]
    async fn needs_authorization_without_credentials() {
        let calendar = RecordingCalendar::answering(Ok(created()));
        let orchestrator =
            BookingOrchestrator::new(Arc::new(InMemoryCredentialStore::new()), calendar.clone());

        let err = orchestrator
            .book(Some("principal-a"), request())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "NeedsAuthorization");
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert!(calendar.calls().is_empty());
    }

    #[tokio::test]
    async fn needs_authorization_without_principal() {
        let calendar = RecordingCalendar::answering(Ok(created()));
        let orchestrator = BookingOrchestrator::new(connected_store(), calendar.clone());

        let err = orchestrator.book(None, request()).await.unwrap_err();

        assert_eq!(err.kind(), "NeedsAuthorization");
        assert!(calendar.calls().is_empty());
    }

    #[tokio::test]
    async fn provider_unauthorized_leaves_credentials_in_place() {
        let store = connected_store();
        let calendar = RecordingCalendar::answering(Err(CalendarError::Unauthorized(
            "(401 Unauthorized) Invalid Credentials".to_string(),
        )));
        let orchestrator = BookingOrchestrator::new(store.clone(), calendar);

        let err = orchestrator
            .book(Some("principal-a"), request())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "NeedsAuthorization");
        assert!(store.get("principal-a").unwrap().is_connected());
    }

    #[tokio::test]
    async fn transient_failures_are_retryable_and_rejections_are_not() {
        let transient = BookingOrchestrator::new(
            connected_store(),
            RecordingCalendar::answering(Err(CalendarError::Transient("timed out".to_string()))),
        )
        .book(Some("principal-a"), request())
        .await
        .unwrap_err();
        assert_eq!(transient.kind(), "Transient");
        assert!(transient.is_retryable());
        assert_eq!(transient.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let rejected = BookingOrchestrator::new(
            connected_store(),
            RecordingCalendar::answering(Err(CalendarError::ProviderRejected(
                "(400 Bad Request) The specified time range is empty.".to_string(),
            ))),
        )
        .book(Some("principal-a"), request())
        .await
        .unwrap_err();
        assert_eq!(rejected.kind(), "ProviderRejected");
        assert!(!rejected.is_retryable());
        assert_eq!(rejected.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
