use axum::{extract::State, response::Response};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use super::{found, principal_cookie, principal_from};
use crate::{error::ServerError, AppState};

/// Send the browser to the provider's consent screen. A principal id is
/// minted on first visit.
pub async fn authorize(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Response), ServerError> {
    let principal = principal_from(&jar).unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = tracing::info_span!("authorize", principal = %principal);
    let _enter = span.enter();

    let url = state
        .authorization
        .build_authorization_url(&principal)
        .inspect_err(|e| tracing::error!(error = %e, "Cannot start authorization"))?;

    let jar = jar.add(principal_cookie(
        principal,
        state.secure_cookies,
        state.principal_cookie_max_age,
    ));
    Ok((jar, found(&url)))
}
