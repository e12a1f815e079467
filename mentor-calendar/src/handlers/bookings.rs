use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::Instrument;

use super::principal_from;
use crate::{
    models::{BookingRequest, BookingResult},
    services::BookingError,
    AppState,
};

pub async fn create_booking(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<BookingRequest>, JsonRejection>,
) -> Result<Json<BookingResult>, BookingError> {
    let principal = principal_from(&jar);

    let span = tracing::info_span!(
        "create_booking",
        principal = principal.as_deref().unwrap_or("anonymous")
    );

    async move {
        let Json(request) = payload
            .map_err(|rejection| BookingError::InvalidFields(vec![rejection.body_text()]))?;

        let result = state.bookings.book(principal.as_deref(), request).await?;
        Ok::<_, BookingError>(Json(result))
    }
    .instrument(span)
    .await
}
