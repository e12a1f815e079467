use axum::{
    extract::{Query, State},
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use super::{found, principal_from};
use crate::{models::CallbackParams, services::CallbackOutcome, AppState};

/// Provider redirect target. Always answers with a redirect back to the UI.
pub async fn authorize_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Response {
    let principal = principal_from(&jar);
    let outcome = state
        .authorization
        .handle_callback(params, principal.as_deref())
        .await;

    if let CallbackOutcome::Failed(failure) = &outcome {
        tracing::info!(reason = failure.reason(), "Authorization attempt failed");
    }

    found(&outcome.redirect_url(&state.ui_redirect_url))
}
