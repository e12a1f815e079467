use base64::Engine;
use chrono::{Duration, Utc};
use oauth2::{
    basic::{BasicClient, BasicErrorResponseType},
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    HttpRequest, HttpResponse, RedirectUrl, RefreshToken, RequestTokenError, Scope,
    StandardErrorResponse, TokenResponse, TokenUrl,
};
use rand::Rng;
use thiserror::Error;

use crate::config::OAuthConfiguration;
use crate::error::ServerError;
use crate::models::{Credential, ExpiringToken};

/// Calendar read/write plus event read/write.
pub const CALENDAR_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/calendar",
    "https://www.googleapis.com/auth/calendar.events",
];

/// Used when the token endpoint omits `expires_in`.
const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::hours(1);

type ConfiguredClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

type TokenRequestError =
    RequestTokenError<reqwest::Error, StandardErrorResponse<BasicErrorResponseType>>;

// Simple async HTTP client for OAuth2
async fn http_client(request: HttpRequest) -> Result<HttpResponse, reqwest::Error> {
    let client = reqwest::Client::new();
    let mut builder = client
        .request(request.method().clone(), request.uri().to_string())
        .body(request.body().clone());

    for (name, value) in request.headers() {
        builder = builder.header(name.as_str(), value.as_bytes());
    }

    let response = builder.send().await?;
    let status = response.status();
    let body = response.bytes().await?.to_vec();

    let mut http_response = HttpResponse::new(body);
    *http_response.status_mut() = status;

    Ok(http_response)
}

/// Failure talking to the token endpoint.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The provider refused the grant (`invalid_grant`, revoked consent, ...).
    #[error("Token request rejected: {0}")]
    Rejected(String),

    #[error("Token endpoint unreachable: {0}")]
    Transport(String),

    #[error("Unexpected token response: {0}")]
    InvalidResponse(String),
}

impl From<TokenRequestError> for TokenError {
    fn from(err: TokenRequestError) -> Self {
        match err {
            RequestTokenError::ServerResponse(response) => TokenError::Rejected(response.to_string()),
            RequestTokenError::Request(e) => TokenError::Transport(e.to_string()),
            RequestTokenError::Parse(e, _) => TokenError::InvalidResponse(e.to_string()),
            RequestTokenError::Other(message) => TokenError::InvalidResponse(message),
        }
    }
}

pub struct OAuthClient {
    client_id: String,
    client_secret: String,
    auth_url: AuthUrl,
    token_url: TokenUrl,
    redirect_url: RedirectUrl,
    refresh_token_ttl: Duration,
}

impl OAuthClient {
    /// Validate the configuration and build a client. Every unset setting is
    /// reported at once, before any request to the provider is built.
    pub fn new(config: &OAuthConfiguration) -> Result<Self, ServerError> {
        let missing = config.missing_settings();
        if !missing.is_empty() {
            return Err(ServerError::MissingConfiguration(missing));
        }

        let (Some(client_id), Some(client_secret), Some(redirect_uri)) = (
            config.client_id.as_deref(),
            config.client_secret.as_deref(),
            config.redirect_uri.as_deref(),
        ) else {
            return Err(ServerError::MissingConfiguration(config.missing_settings()));
        };

        let auth_url = AuthUrl::new(config.auth_url.clone())
            .map_err(|e| ServerError::Configuration(format!("Invalid auth URL: {}", e)))?;

        let token_url = TokenUrl::new(config.token_url.clone())
            .map_err(|e| ServerError::Configuration(format!("Invalid token URL: {}", e)))?;

        let redirect_url = RedirectUrl::new(redirect_uri.trim().to_string())
            .map_err(|e| ServerError::Configuration(format!("Invalid redirect URI: {}", e)))?;

        Ok(Self {
            client_id: client_id.trim().to_string(),
            client_secret: client_secret.trim().to_string(),
            auth_url,
            token_url,
            redirect_url,
            refresh_token_ttl: Duration::days(config.refresh_token_ttl_days),
        })
    }

    fn client(&self) -> ConfiguredClient {
        BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_auth_uri(self.auth_url.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone())
    }

    /// Consent URL requesting offline access and forcing the consent screen,
    /// so a refresh token is issued even when the user authorized before.
    pub fn build_authorization_url(&self, state: &str) -> String {
        let csrf_token = CsrfToken::new(state.to_string());
        let (auth_url, _) = self
            .client()
            .authorize_url(|| csrf_token)
            .add_scopes(CALENDAR_SCOPES.iter().map(|s| Scope::new(s.to_string())))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();
        auth_url.to_string()
    }

    /// Exchange an authorization code for access and refresh tokens
    pub async fn exchange_code(&self, code: &str) -> Result<Credential, TokenError> {
        let token_result = self
            .client()
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&http_client)
            .await?;

        let credential = self.credential_from(&token_result);

        tracing::debug!(
            access_expires_at = %credential.access.expires_at,
            has_refresh_token = credential.refresh.is_some(),
            "Exchanged authorization code for tokens"
        );

        Ok(credential)
    }

    /// Mint a new access token from a refresh token. The provider usually
    /// does not rotate the refresh token, in which case `refresh` is `None`.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<Credential, TokenError> {
        let token_result = self
            .client()
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&http_client)
            .await?;

        let credential = self.credential_from(&token_result);

        tracing::debug!(
            access_expires_at = %credential.access.expires_at,
            rotated = credential.refresh.is_some(),
            "Refreshed access token"
        );

        Ok(credential)
    }

    fn credential_from(&self, token_result: &impl TokenResponse) -> Credential {
        let now = Utc::now();
        let access_ttl = token_result
            .expires_in()
            .and_then(|ttl| Duration::from_std(ttl).ok())
            .unwrap_or(DEFAULT_ACCESS_TOKEN_TTL);

        let access = ExpiringToken::new(token_result.access_token().secret(), now + access_ttl);
        let credential = Credential::new(access);

        match token_result.refresh_token() {
            Some(refresh) => credential.with_refresh(ExpiringToken::new(
                refresh.secret(),
                now + self.refresh_token_ttl,
            )),
            None => credential,
        }
    }

    /// Generate a random CSRF state token
    pub fn generate_state_token() -> String {
        let mut rng = rand::rng();
        let random_bytes: Vec<u8> = (0..32).map(|_| rng.random()).collect();
        base64::prelude::BASE64_URL_SAFE_NO_PAD.encode(&random_bytes)
    }
}
