use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

use crate::config::OAuthConfiguration;
use crate::error::ServerError;
use crate::models::CallbackParams;
use crate::services::credential_store::CredentialStore;
use crate::services::oauth_client::OAuthClient;

/// An authorization that has been redirected to the provider and is waiting
/// for its callback.
#[derive(Debug, Clone)]
struct PendingAuthorization {
    principal: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationFailure {
    /// The provider reported an error, usually the user declining consent.
    Denied(String),
    NoCode,
    /// The `state` parameter is missing, unknown, expired or was issued to
    /// another browser.
    InvalidState,
    ExchangeFailed(String),
}

impl AuthorizationFailure {
    pub fn reason(&self) -> &'static str {
        match self {
            AuthorizationFailure::Denied(_) => "authorization_denied",
            AuthorizationFailure::NoCode => "no_code",
            AuthorizationFailure::InvalidState => "invalid_state",
            AuthorizationFailure::ExchangeFailed(_) => "token_exchange_failed",
        }
    }

    fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        match self {
            AuthorizationFailure::Denied(details) => {
                vec![("error", "auth_failed"), ("details", details)]
            }
            AuthorizationFailure::NoCode => vec![("error", "no_code")],
            AuthorizationFailure::InvalidState => vec![("error", "invalid_state")],
            AuthorizationFailure::ExchangeFailed(details) => {
                vec![("error", "token_exchange_failed"), ("details", details)]
            }
        }
    }
}

/// Terminal state of one authorization attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Connected { principal: String },
    Failed(AuthorizationFailure),
}

impl CallbackOutcome {
    /// UI location the browser is sent back to, carrying the outcome in its
    /// query string.
    pub fn redirect_url(&self, ui_base: &str) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        match self {
            CallbackOutcome::Connected { .. } => {
                query.append_pair("success", "calendar_connected");
            }
            CallbackOutcome::Failed(failure) => {
                for (key, value) in failure.query_pairs() {
                    query.append_pair(key, value);
                }
            }
        }

        let separator = if ui_base.contains('?') { '&' } else { '?' };
        format!("{}{}{}", ui_base, separator, query.finish())
    }
}

/// Drives the OAuth authorization-code dance for calendar access.
pub struct AuthorizationFlow {
    pending: DashMap<String, PendingAuthorization>,
    ttl: Duration,
    oauth: OAuthConfiguration,
    store: Arc<dyn CredentialStore>,
}

impl AuthorizationFlow {
    pub fn new(oauth: OAuthConfiguration, store: Arc<dyn CredentialStore>, ttl_seconds: u64) -> Self {
        tracing::info!(
            "Authorization flow initialized with TTL of {} seconds",
            ttl_seconds
        );
        Self {
            pending: DashMap::new(),
            ttl: Duration::from_secs(ttl_seconds),
            oauth,
            store,
        }
    }

    /// Start an authorization for `principal` and return the consent URL.
    ///
    /// Configuration is validated first; nothing is recorded when it is
    /// incomplete.
    pub fn build_authorization_url(&self, principal: &str) -> Result<String, ServerError> {
        let client = OAuthClient::new(&self.oauth)?;

        self.prune_expired();

        let state = OAuthClient::generate_state_token();
        let url = client.build_authorization_url(&state);
        self.pending.insert(
            state,
            PendingAuthorization {
                principal: principal.to_string(),
                created_at: Utc::now(),
            },
        );

        tracing::info!(principal, "Authorization started, awaiting provider");
        Ok(url)
    }

    /// Resolve a provider callback arriving from the browser identified by
    /// `principal`. Checks run in a fixed order: provider error, missing code,
    /// unknown state or foreign browser, then the code exchange.
    pub async fn handle_callback(
        &self,
        params: CallbackParams,
        principal: Option<&str>,
    ) -> CallbackOutcome {
        self.prune_expired();

        if let Some(error) = params.error {
            // The attempt is over either way; drop its pending entry.
            if let Some(state) = params.state.as_deref() {
                self.pending.remove(state);
            }
            let details = match params.error_description {
                Some(description) => format!("{}: {}", error, description),
                None => error,
            };
            tracing::warn!(details = %details, "Authorization denied by provider");
            return CallbackOutcome::Failed(AuthorizationFailure::Denied(details));
        }

        let Some(code) = params.code.filter(|c| !c.is_empty()) else {
            tracing::warn!("Authorization callback without code");
            return CallbackOutcome::Failed(AuthorizationFailure::NoCode);
        };

        let Some(pending) = params.state.as_deref().and_then(|s| self.take_pending(s)) else {
            tracing::warn!("Authorization callback with unknown or expired state");
            return CallbackOutcome::Failed(AuthorizationFailure::InvalidState);
        };

        // The state is spent either way; only the browser that started the
        // attempt may finish it.
        if principal != Some(pending.principal.as_str()) {
            tracing::warn!(
                principal = %pending.principal,
                "Authorization callback from a different browser"
            );
            return CallbackOutcome::Failed(AuthorizationFailure::InvalidState);
        }

        let span = tracing::info_span!("authorization_exchange", principal = %pending.principal);
        let exchanged = self
            .exchange(&pending.principal, &code)
            .instrument(span.clone())
            .await;
        let _enter = span.enter();

        match exchanged {
            Ok(()) => {
                tracing::info!("Calendar connected");
                CallbackOutcome::Connected {
                    principal: pending.principal,
                }
            }
            Err(details) => {
                tracing::warn!(details = %details, "Token exchange failed");
                CallbackOutcome::Failed(AuthorizationFailure::ExchangeFailed(details))
            }
        }
    }

    /// Exchange the code and persist the result. Nothing is stored unless the
    /// exchange succeeded.
    async fn exchange(&self, principal: &str, code: &str) -> Result<(), String> {
        let client = OAuthClient::new(&self.oauth).map_err(|e| e.to_string())?;
        let credential = client.exchange_code(code).await.map_err(|e| e.to_string())?;
        self.store
            .put(principal, credential)
            .map_err(|e| e.to_string())
    }

    fn take_pending(&self, state: &str) -> Option<PendingAuthorization> {
        let (_, pending) = self.pending.remove(state)?;
        if self.is_expired(&pending, Utc::now()) {
            return None;
        }
        Some(pending)
    }

    fn is_expired(&self, pending: &PendingAuthorization, now: DateTime<Utc>) -> bool {
        let age = now
            .signed_duration_since(pending.created_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        age >= self.ttl
    }

    fn prune_expired(&self) {
        let now = Utc::now();
        let initial_count = self.pending.len();
        self.pending.retain(|_, pending| !self.is_expired(pending, now));

        let cleaned = initial_count.saturating_sub(self.pending.len());
        if cleaned > 0 {
            tracing::debug!(
                "Dropped {} expired authorizations, {} pending",
                cleaned,
                self.pending.len()
            );
        }
    }

    /// Number of authorizations awaiting a callback (for monitoring)
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::credential_store::InMemoryCredentialStore;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const UI: &str = "http://localhost:3000/surge";

    fn oauth(token_url: String) -> OAuthConfiguration {
        OAuthConfiguration {
            client_id: Some("client-123".to_string()),
            client_secret: Some("secret-456".to_string()),
            redirect_uri: Some("http://localhost:8080/authorize/callback".to_string()),
            token_url,
            ..OAuthConfiguration::default()
        }
    }

    fn flow(token_url: String) -> (AuthorizationFlow, Arc<InMemoryCredentialStore>) {
        let store = Arc::new(InMemoryCredentialStore::new());
        (AuthorizationFlow::new(oauth(token_url), store.clone(), 600), store)
    }

    fn state_of(authorization_url: &str) -> String {
        url::Url::parse(authorization_url)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    #[test]
    fn incomplete_configuration_records_nothing() {
        let store = Arc::new(InMemoryCredentialStore::new());
        let flow = AuthorizationFlow::new(OAuthConfiguration::default(), store, 600);

        let err = flow.build_authorization_url("principal-a").unwrap_err();
        assert!(matches!(err, ServerError::MissingConfiguration(ref m) if m.len() == 3));
        assert_eq!(flow.pending_count(), 0);
    }

    #[tokio::test]
    async fn provider_error_redirects_with_auth_failed() {
        let (flow, _) = flow("http://127.0.0.1:9/token".into());
        let outcome = flow
            .handle_callback(
                CallbackParams {
                    error: Some("access_denied".into()),
                    state: Some("whatever".into()),
                    ..CallbackParams::default()
                },
                Some("principal-a"),
            )
            .await;

        assert_eq!(
            outcome,
            CallbackOutcome::Failed(AuthorizationFailure::Denied("access_denied".into()))
        );
        let location = outcome.redirect_url(UI);
        assert!(location.starts_with("http://localhost:3000/surge?error=auth_failed"));
        assert!(location.contains("details=access_denied"));
    }

    #[tokio::test]
    async fn error_takes_precedence_over_code() {
        let (flow, _) = flow("http://127.0.0.1:9/token".into());
        let outcome = flow
            .handle_callback(
                CallbackParams {
                    code: Some("auth-code".into()),
                    error: Some("access_denied".into()),
                    ..CallbackParams::default()
                },
                Some("principal-a"),
            )
            .await;
        assert_eq!(outcome.redirect_url(UI), format!("{UI}?error=auth_failed&details=access_denied"));
    }

    #[tokio::test]
    async fn missing_code_redirects_with_no_code() {
        let (flow, _) = flow("http://127.0.0.1:9/token".into());
        let outcome = flow
            .handle_callback(CallbackParams::default(), Some("principal-a"))
            .await;

        assert_eq!(outcome, CallbackOutcome::Failed(AuthorizationFailure::NoCode));
        assert_eq!(outcome.redirect_url(UI), format!("{UI}?error=no_code"));
    }

    #[tokio::test]
    async fn unknown_state_is_rejected_without_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (flow, store) = flow(format!("{}/token", server.uri()));
        let outcome = flow
            .handle_callback(
                CallbackParams {
                    code: Some("auth-code".into()),
                    state: Some("forged".into()),
                    ..CallbackParams::default()
                },
                Some("principal-a"),
            )
            .await;

        assert_eq!(outcome, CallbackOutcome::Failed(AuthorizationFailure::InvalidState));
        assert_eq!(outcome.redirect_url(UI), format!("{UI}?error=invalid_state"));
        assert_eq!(store.principal_count(), 0);
    }

    #[tokio::test]
    async fn failed_exchange_redirects_with_details_and_stores_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Malformed auth code."
            })))
            .mount(&server)
            .await;

        let (flow, store) = flow(format!("{}/token", server.uri()));
        let url = flow.build_authorization_url("principal-a").unwrap();

        let outcome = flow
            .handle_callback(
                CallbackParams {
                    code: Some("bad-code".into()),
                    state: Some(state_of(&url)),
                    ..CallbackParams::default()
                },
                Some("principal-a"),
            )
            .await;

        let CallbackOutcome::Failed(AuthorizationFailure::ExchangeFailed(ref details)) = outcome else {
            panic!("unexpected outcome: {outcome:?}");
        };
        assert!(!details.is_empty());
        let location = outcome.redirect_url(UI);
        assert!(location.starts_with(&format!("{UI}?error=token_exchange_failed&details=")));
        assert!(!store.get("principal-a").unwrap().is_connected());
        assert_eq!(flow.pending_count(), 0);
    }

    #[tokio::test]
    async fn successful_exchange_connects_the_principal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.access",
                "expires_in": 3599,
                "refresh_token": "1//refresh",
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (flow, store) = flow(format!("{}/token", server.uri()));
        let url = flow.build_authorization_url("principal-a").unwrap();
        let state = state_of(&url);

        let outcome = flow
            .handle_callback(
                CallbackParams {
                    code: Some("auth-code".into()),
                    state: Some(state.clone()),
                    ..CallbackParams::default()
                },
                Some("principal-a"),
            )
            .await;

        assert_eq!(
            outcome,
            CallbackOutcome::Connected {
                principal: "principal-a".into()
            }
        );
        assert_eq!(outcome.redirect_url(UI), format!("{UI}?success=calendar_connected"));

        let snapshot = store.get("principal-a").unwrap();
        assert_eq!(snapshot.access_token.as_deref(), Some("ya29.access"));
        assert_eq!(snapshot.refresh_token.as_deref(), Some("1//refresh"));

        // A state value is single use.
        let replay = flow
            .handle_callback(
                CallbackParams {
                    code: Some("auth-code".into()),
                    state: Some(state),
                    ..CallbackParams::default()
                },
                Some("principal-a"),
            )
            .await;
        assert_eq!(replay, CallbackOutcome::Failed(AuthorizationFailure::InvalidState));
    }

    #[tokio::test]
    async fn expired_state_is_rejected() {
        let store = Arc::new(InMemoryCredentialStore::new());
        let flow = AuthorizationFlow::new(oauth("http://127.0.0.1:9/token".into()), store, 0);
        let url = flow.build_authorization_url("principal-a").unwrap();

        let outcome = flow
            .handle_callback(
                CallbackParams {
                    code: Some("auth-code".into()),
                    state: Some(state_of(&url)),
                    ..CallbackParams::default()
                },
                Some("principal-a"),
            )
            .await;
        assert_eq!(outcome, CallbackOutcome::Failed(AuthorizationFailure::InvalidState));
    }

    #[tokio::test]
    async fn callback_from_another_browser_is_rejected_without_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (flow, store) = flow(format!("{}/token", server.uri()));
        let url = flow.build_authorization_url("principal-a").unwrap();
        let state = state_of(&url);

        let outcome = flow
            .handle_callback(
                CallbackParams {
                    code: Some("victim-code".into()),
                    state: Some(state.clone()),
                    ..CallbackParams::default()
                },
                Some("principal-b"),
            )
            .await;
        assert_eq!(outcome, CallbackOutcome::Failed(AuthorizationFailure::InvalidState));
        assert_eq!(store.principal_count(), 0);

        // The state was spent, so the rightful browser cannot reuse it either.
        let retry = flow
            .handle_callback(
                CallbackParams {
                    code: Some("victim-code".into()),
                    state: Some(state),
                    ..CallbackParams::default()
                },
                None,
            )
            .await;
        assert_eq!(retry, CallbackOutcome::Failed(AuthorizationFailure::InvalidState));
    }

    #[tokio::test]
    async fn callback_without_principal_is_rejected() {
        let (flow, _) = flow("http://127.0.0.1:9/token".into());
        let url = flow.build_authorization_url("principal-a").unwrap();

        let outcome = flow
            .handle_callback(
                CallbackParams {
                    code: Some("auth-code".into()),
                    state: Some(state_of(&url)),
                    ..CallbackParams::default()
                },
                None,
            )
            .await;
        assert_eq!(outcome, CallbackOutcome::Failed(AuthorizationFailure::InvalidState));
        assert_eq!(flow.pending_count(), 0);
    }

    #[test]
    fn redirect_appends_to_existing_query() {
        let outcome = CallbackOutcome::Failed(AuthorizationFailure::ExchangeFailed(
            "Token endpoint unreachable: connection refused".into(),
        ));
        assert_eq!(
            outcome.redirect_url("http://localhost:3000/surge?tab=mentors"),
            "http://localhost:3000/surge?tab=mentors&error=token_exchange_failed&details=Token+endpoint+unreachable%3A+connection+refused"
        );
    }
}
