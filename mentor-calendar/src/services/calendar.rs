use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gcal_api::{
    endpoints::{
        events::{ConferenceData, Event, ReminderOverride, Reminders},
        Attendee, EventDateTime, Person,
    },
    CalendarApiError, Client, Request,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{CalendarConfiguration, OAuthConfiguration};
use crate::services::credential_store::CredentialStore;
use crate::services::oauth_client::{OAuthClient, TokenError};

/// Reasons Google attaches to a 403 that really mean "slow down".
const RATE_LIMIT_REASONS: [&str; 2] = ["rateLimitExceeded", "userRateLimitExceeded"];

/// Reasons Google attaches to a 403 caused by the credential itself.
const AUTH_REASONS: [&str; 2] = ["insufficientPermissions", "authError"];

/// Upper bound on pages fetched for one listing.
const MAX_EVENT_PAGES: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    /// No usable credential, or the provider refused it even after a refresh.
    #[error("Calendar access not authorized: {0}")]
    Unauthorized(String),

    #[error("Calendar provider rejected the request: {0}")]
    ProviderRejected(String),

    /// Network failure, timeout, throttling or a provider-side error. Safe to
    /// retry.
    #[error("Calendar provider temporarily unavailable: {0}")]
    Transient(String),
}

impl From<TokenError> for CalendarError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Rejected(_) => CalendarError::Unauthorized(err.to_string()),
            TokenError::Transport(_) | TokenError::InvalidResponse(_) => {
                CalendarError::Transient(err.to_string())
            }
        }
    }
}

/// Map a Calendar API failure onto the three outcomes callers act on.
pub fn classify(err: CalendarApiError) -> CalendarError {
    let message = err.to_string();
    let CalendarApiError::Google(status, detail) = &err else {
        return CalendarError::Transient(message);
    };

    match status.as_u16() {
        401 => CalendarError::Unauthorized(message),
        403 if RATE_LIMIT_REASONS.iter().any(|r| detail.has_reason(r)) => {
            CalendarError::Transient(message)
        }
        403 if AUTH_REASONS.iter().any(|r| detail.has_reason(r)) => {
            CalendarError::Unauthorized(message)
        }
        408 | 429 | 500..=599 => CalendarError::Transient(message),
        _ if message.contains("invalid_grant") || message.contains("Invalid Credentials") => {
            CalendarError::Unauthorized(message)
        }
        _ => CalendarError::ProviderRejected(message),
    }
}

/// What to put on the calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSpec {
    pub summary: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Participants besides the organizer.
    pub attendee_emails: Vec<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedEvent {
    pub event_id: String,
    pub event_link: String,
    pub meet_link: Option<String>,
}

impl From<Event> for CreatedEvent {
    fn from(event: Event) -> Self {
        Self {
            meet_link: event.conference_link().map(str::to_string),
            event_id: event.id,
            event_link: event.html_link,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub id: String,
    pub summary: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub event_link: String,
    pub meet_link: Option<String>,
}

impl From<Event> for EventSummary {
    fn from(event: Event) -> Self {
        Self {
            start: event.starts_at(),
            end: event.end.date_time,
            meet_link: event.conference_link().map(str::to_string),
            id: event.id,
            summary: event.summary,
            event_link: event.html_link,
        }
    }
}

#[async_trait]
pub trait CalendarClient: Send + Sync {
    /// Create a timed event with a freshly allocated video conference.
    async fn create_event(
        &self,
        principal: &str,
        spec: &EventSpec,
    ) -> Result<CreatedEvent, CalendarError>;

    /// Events overlapping `[time_min, time_max)`, ordered by start.
    async fn list_events(
        &self,
        principal: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<EventSummary>, CalendarError>;
}

/// Google Calendar backed client. Credentials are read from the store on
/// every call and refreshed on demand.
pub struct GoogleCalendarClient {
    config: CalendarConfiguration,
    oauth: OAuthConfiguration,
    store: Arc<dyn CredentialStore>,
}

impl GoogleCalendarClient {
    pub fn new(
        config: CalendarConfiguration,
        oauth: OAuthConfiguration,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            config,
            oauth,
            store,
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_seconds)
    }

    fn api(&self, access_token: &str) -> Client {
        Client::with_base_url(&self.config.api_base_url, access_token)
    }

    /// Unique per call, so a retried booking never reuses a half-created
    /// conference.
    fn conference_request_id() -> String {
        format!(
            "meet-{}-{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple()
        )
    }

    fn organizer(&self) -> Person {
        let organizer = Person::new(&self.config.organizer_email);
        match &self.config.organizer_name {
            Some(name) => organizer.display_name(name),
            None => organizer,
        }
    }

    /// Organizer first, then each participant once (case-insensitive).
    fn attendees(&self, emails: &[String]) -> Vec<Attendee> {
        let mut seen: Vec<String> = Vec::with_capacity(emails.len() + 1);
        std::iter::once(self.config.organizer_email.as_str())
            .chain(emails.iter().map(String::as_str))
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .filter(|email| {
                let key = email.to_lowercase();
                if seen.contains(&key) {
                    false
                } else {
                    seen.push(key);
                    true
                }
            })
            .map(Attendee::new)
            .collect()
    }

    async fn refresh(&self, principal: &str, refresh_token: &str) -> Result<String, CalendarError> {
        let client = OAuthClient::new(&self.oauth)
            .map_err(|e| CalendarError::Unauthorized(e.to_string()))?;

        let credential = tokio::time::timeout(self.timeout(), client.refresh_access_token(refresh_token))
            .await
            .map_err(|_| CalendarError::Transient("Token refresh timed out".to_string()))??;

        let access_token = credential.access.secret.clone();
        self.store
            .put(principal, credential)
            .map_err(|e| CalendarError::Transient(e.to_string()))?;

        tracing::info!(principal, "Refreshed calendar access token");
        Ok(access_token)
    }

    /// Run `call` with the principal's access token, refreshing once when
    /// the token is missing or the provider answers 401.
    async fn with_access<T, F, Fut>(&self, principal: &str, call: F) -> Result<T, CalendarError>
    where
        F: Fn(Client) -> Fut,
        Fut: Future<Output = Result<T, CalendarApiError>>,
    {
        let snapshot = self
            .store
            .get(principal)
            .map_err(|e| CalendarError::Transient(e.to_string()))?;

        let (access_token, refreshed) = match (snapshot.access_token, &snapshot.refresh_token) {
            (Some(access), _) => (access, false),
            (None, Some(refresh)) => (self.refresh(principal, refresh).await?, true),
            (None, None) => {
                return Err(CalendarError::Unauthorized(
                    "No calendar credentials stored".to_string(),
                ))
            }
        };

        let result = self.timed(call(self.api(&access_token))).await;
        match (result, snapshot.refresh_token) {
            (Err(CalendarError::Unauthorized(details)), Some(refresh)) if !refreshed => {
                tracing::debug!(principal, details = %details, "Access token rejected, refreshing");
                let access_token = self.refresh(principal, &refresh).await?;
                self.timed(call(self.api(&access_token))).await
            }
            (result, _) => result,
        }
    }

    async fn timed<T>(
        &self,
        call: impl Future<Output = Result<T, CalendarApiError>>,
    ) -> Result<T, CalendarError> {
        match tokio::time::timeout(self.timeout(), call).await {
            Ok(result) => result.map_err(classify),
            Err(_) => Err(CalendarError::Transient(format!(
                "Calendar request timed out after {}s",
                self.config.request_timeout_seconds
            ))),
        }
    }
}

#[async_trait]
impl CalendarClient for GoogleCalendarClient {
    async fn create_event(
        &self,
        principal: &str,
        spec: &EventSpec,
    ) -> Result<CreatedEvent, CalendarError> {
        let time_zone = &self.config.time_zone;
        let mut request = Request::events()
            .with_calendar(self.config.calendar_id.as_str())
            .insert(
                &spec.summary,
                EventDateTime::at(spec.start_time).in_time_zone(time_zone),
                EventDateTime::at(spec.end_time).in_time_zone(time_zone),
            )
            .description(&spec.description)
            .organizer(self.organizer())
            .attendees(self.attendees(&spec.attendee_emails))
            .conference_data(ConferenceData::hangouts_meet(Self::conference_request_id()))
            .reminders(Reminders::overrides(vec![
                ReminderOverride::email(24 * 60),
                ReminderOverride::popup(10),
            ]));
        if let Some(location) = &spec.location {
            request = request.location(location);
        }

        tracing::debug!(
            principal,
            attendees = request.event().attendees.len(),
            "Creating calendar event"
        );

        let event = self
            .with_access(principal, |client| {
                let request = request.clone();
                async move { client.send(request).await }
            })
            .await?;

        let created = CreatedEvent::from(event);
        if created.meet_link.is_none() {
            tracing::warn!(event_id = %created.event_id, "Provider did not allocate a conference");
        }
        tracing::info!(principal, event_id = %created.event_id, "Calendar event created");
        Ok(created)
    }

    async fn list_events(
        &self,
        principal: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<EventSummary>, CalendarError> {
        let request = Request::events()
            .with_calendar(self.config.calendar_id.as_str())
            .list(time_min, time_max);

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;
        for page in 1..=MAX_EVENT_PAGES {
            let page_request = match page_token.take() {
                Some(token) => request.clone().page_token(token),
                None => request.clone(),
            };

            let response = self
                .with_access(principal, |client| {
                    let request = page_request.clone();
                    async move { client.send(request).await }
                })
                .await?;

            events.extend(response.items);
            page_token = response.next_page_token;
            if page_token.is_none() {
                break;
            }
            if page == MAX_EVENT_PAGES {
                tracing::warn!(principal, pages = page, "Event listing truncated");
            }
        }

        events.sort();
        Ok(events.into_iter().map(EventSummary::from).collect())
    }
}
