mod authorize;
mod bookings;
mod callback;
mod events;
mod status;

pub use authorize::authorize;
pub use bookings::create_booking;
pub use callback::authorize_callback;
pub use events::list_events;
pub use status::{calendar_status, disconnect};

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use uuid::Uuid;

use crate::models::HealthResponse;

/// Cookie carrying the browser's principal id.
pub const PRINCIPAL_COOKIE: &str = "mc_principal";

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// 302 to `location`.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Principal id from the cookie; anything but a UUID is ignored.
fn principal_from(jar: &CookieJar) -> Option<String> {
    jar.get(PRINCIPAL_COOKIE)
        .map(|cookie| cookie.value())
        .and_then(|value| Uuid::parse_str(value).ok())
        .map(|id| id.to_string())
}

fn principal_cookie(principal: String, secure: bool, max_age: time::Duration) -> Cookie<'static> {
    Cookie::build((PRINCIPAL_COOKIE, principal))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
}
