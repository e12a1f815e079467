pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;

pub use config::Configuration;
pub use error::ServerError;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use services::{
    AuthorizationFlow, BookingOrchestrator, CalendarClient, ConnectionStatusProbe,
    CredentialStore, GoogleCalendarClient, InMemoryCredentialStore,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub authorization: Arc<AuthorizationFlow>,
    pub bookings: Arc<BookingOrchestrator>,
    pub calendar: Arc<dyn CalendarClient>,
    pub status: Arc<ConnectionStatusProbe>,
    pub store: Arc<dyn CredentialStore>,
    pub ui_redirect_url: String,
    pub secure_cookies: bool,
    /// Lifetime of the principal cookie, matching the refresh token's.
    pub principal_cookie_max_age: time::Duration,
}

impl AppState {
    /// Production wiring: in-memory credentials and the Google Calendar API.
    pub fn new(configuration: &Configuration) -> Self {
        let store: Arc<dyn CredentialStore> = Arc::new(InMemoryCredentialStore::new());
        let calendar = Arc::new(GoogleCalendarClient::new(
            configuration.calendar.clone(),
            configuration.oauth.clone(),
            store.clone(),
        ));
        Self::with_services(configuration, store, calendar)
    }

    pub fn with_services(
        configuration: &Configuration,
        store: Arc<dyn CredentialStore>,
        calendar: Arc<dyn CalendarClient>,
    ) -> Self {
        Self {
            authorization: Arc::new(AuthorizationFlow::new(
                configuration.oauth.clone(),
                store.clone(),
                configuration.server.authorization_ttl_seconds,
            )),
            bookings: Arc::new(BookingOrchestrator::new(store.clone(), calendar.clone())),
            calendar,
            status: Arc::new(ConnectionStatusProbe::new(store.clone())),
            store,
            ui_redirect_url: configuration.server.ui_redirect_url.clone(),
            secure_cookies: configuration.server.secure_cookies,
            principal_cookie_max_age: time::Duration::days(configuration.oauth.refresh_token_ttl_days),
        }
    }
}

/// The UI calls the API with cookies from its own origin.
fn cors_layer(ui_redirect_url: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    let origin = url::Url::parse(ui_redirect_url)
        .ok()
        .map(|url| url.origin().ascii_serialization())
        .and_then(|origin| HeaderValue::from_str(&origin).ok());

    match origin {
        Some(origin) => cors.allow_origin(origin),
        None => {
            tracing::warn!(ui_redirect_url, "UI redirect URL has no origin, CORS disabled");
            cors
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.ui_redirect_url);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/authorize", get(handlers::authorize))
        .route("/authorize/callback", get(handlers::authorize_callback))
        .route("/calendar/status", get(handlers::calendar_status))
        .route("/calendar/disconnect", post(handlers::disconnect))
        .route("/calendar/events", get(handlers::list_events))
        .route("/bookings", post(handlers::create_booking))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
                .layer(cors),
        )
        .with_state(state)
}
