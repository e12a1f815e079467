pub mod authorization;
pub mod booking;
pub mod calendar;
pub mod credential_store;
pub mod oauth_client;
pub mod status;

pub use authorization::{AuthorizationFailure, AuthorizationFlow, CallbackOutcome};
pub use booking::{BookingError, BookingOrchestrator};
pub use calendar::{CalendarClient, CalendarError, GoogleCalendarClient};
pub use credential_store::{CredentialStore, CredentialStoreError, InMemoryCredentialStore};
pub use oauth_client::OAuthClient;
pub use status::ConnectionStatusProbe;
