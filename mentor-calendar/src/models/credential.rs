use chrono::{DateTime, Utc};

/// An opaque provider token and the instant it stops being usable.
#[derive(Clone, PartialEq, Eq)]
pub struct ExpiringToken {
    pub secret: String,
    pub expires_at: DateTime<Utc>,
}

impl ExpiringToken {
    pub fn new(secret: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl std::fmt::Debug for ExpiringToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringToken")
            .field("secret", &"[redacted]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Tokens minted by one exchange or refresh. `refresh` is `None` when the
/// provider did not issue a new refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access: ExpiringToken,
    pub refresh: Option<ExpiringToken>,
}

impl Credential {
    pub fn new(access: ExpiringToken) -> Self {
        Self {
            access,
            refresh: None,
        }
    }

    pub fn with_refresh(mut self, refresh: ExpiringToken) -> Self {
        self.refresh = Some(refresh);
        self
    }
}

/// What a principal currently holds, with expired tokens already dropped.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialSnapshot {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl CredentialSnapshot {
    pub fn is_connected(&self) -> bool {
        self.access_token.is_some() || self.refresh_token.is_some()
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token.is_some()
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.is_some()
    }
}

impl std::fmt::Debug for CredentialSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |token: &Option<String>| token.as_ref().map(|_| "[redacted]");
        f.debug_struct("CredentialSnapshot")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}
