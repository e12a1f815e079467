pub mod endpoints;
mod error;
mod macros;
pub mod repositories;

pub use crate::error::{CalendarApiError, ErrorDetail, ErrorItem};
use repositories::*;
pub use tower_api_client::Request as ApiRequest;
use tower_api_client::Client as ApiClient;

pub const BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

pub struct Client {
    inner: ApiClient,
}

impl Client {
    pub fn new(access_token: &str) -> Self {
        Self::with_base_url(BASE_URL, access_token)
    }

    /// Point the client at a different API root, e.g. a regional proxy or a
    /// local mock server.
    pub fn with_base_url(base_url: &str, access_token: &str) -> Self {
        Self {
            inner: ApiClient::new(base_url.trim_end_matches('/')).bearer_auth(access_token),
        }
    }

    pub async fn send<R>(&self, request: R) -> Result<R::Response, CalendarApiError>
    where
        R: ApiRequest,
    {
        self.inner.send(request).await.map_err(From::from)
    }
}

pub struct Request;

impl Request {
    pub fn events() -> EventRepository {
        EventRepository::new()
    }
}
