use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use tracing::Instrument;

use super::principal_from;
use crate::{
    error::ServerError,
    models::{EventsQuery, EventsResponse},
    AppState,
};

fn parse_time(name: &str, value: &str) -> Result<DateTime<Utc>, ServerError> {
    DateTime::parse_from_rfc3339(value)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|_| ServerError::BadRequest(format!("{} must be an RFC 3339 timestamp", name)))
}

/// Events on the booking calendar within a window, for availability checks.
pub async fn list_events(
    State(state): State<AppState>,
    jar: CookieJar,
    query: Result<Query<EventsQuery>, QueryRejection>,
) -> Result<Json<EventsResponse>, ServerError> {
    let Query(query) = query.map_err(|e| ServerError::BadRequest(e.body_text()))?;

    let time_min = parse_time("timeMin", &query.time_min)?;
    let time_max = parse_time("timeMax", &query.time_max)?;
    if time_min >= time_max {
        return Err(ServerError::BadRequest(
            "timeMin must be before timeMax".to_string(),
        ));
    }

    let principal = principal_from(&jar)
        .ok_or_else(|| ServerError::Unauthorized("Connect your calendar first".to_string()))?;

    let span = tracing::info_span!("list_events", principal = %principal);
    let events = state
        .calendar
        .list_events(&principal, time_min, time_max)
        .instrument(span)
        .await?;

    tracing::debug!(count = events.len(), "Listed calendar events");
    Ok(Json(EventsResponse { events }))
}
