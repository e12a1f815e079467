use axum::{extract::State, Json};
use axum_extra::extract::cookie::CookieJar;

use super::principal_from;
use crate::{
    error::ServerError,
    models::{ConnectionStatus, DisconnectResponse},
    AppState,
};

pub async fn calendar_status(State(state): State<AppState>, jar: CookieJar) -> Json<ConnectionStatus> {
    let principal = principal_from(&jar);
    Json(state.status.status(principal.as_deref()))
}

pub async fn disconnect(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<DisconnectResponse>, ServerError> {
    if let Some(principal) = principal_from(&jar) {
        state
            .store
            .clear(&principal)
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        tracing::info!(principal = %principal, "Calendar disconnected");
    }

    Ok(Json(DisconnectResponse { success: true }))
}
