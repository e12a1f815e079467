use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use thiserror::Error;

use crate::models::{Credential, CredentialSnapshot, ExpiringToken};

#[derive(Debug, Error)]
pub enum CredentialStoreError {
    #[error("Credential store unavailable: {0}")]
    Unavailable(String),
}

/// Calendar credentials, keyed by principal id.
///
/// Implementations must replace an entry atomically: a concurrent `get` sees
/// either the old or the new access token together with its expiry, never a
/// mix of the two.
pub trait CredentialStore: Send + Sync {
    /// Store freshly minted tokens. A credential without a refresh token keeps
    /// the refresh token already on file.
    fn put(&self, principal: &str, credential: Credential) -> Result<(), CredentialStoreError>;

    fn get(&self, principal: &str) -> Result<CredentialSnapshot, CredentialStoreError>;

    fn clear(&self, principal: &str) -> Result<(), CredentialStoreError>;
}

#[derive(Debug, Clone, Default)]
struct StoredCredential {
    access: Option<ExpiringToken>,
    refresh: Option<ExpiringToken>,
}

impl StoredCredential {
    fn snapshot_at(&self, now: DateTime<Utc>) -> CredentialSnapshot {
        let live = |token: &Option<ExpiringToken>| {
            token
                .as_ref()
                .filter(|t| !t.is_expired_at(now))
                .map(|t| t.secret.clone())
        };

        CredentialSnapshot {
            access_token: live(&self.access),
            refresh_token: live(&self.refresh),
        }
    }
}

/// Process-local store. Entries live as long as their longest-lived token;
/// fully expired entries are pruned when read.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    entries: DashMap<String, StoredCredential>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop entries whose tokens have all expired.
    fn prune_expired(&self) {
        let now = Utc::now();
        let initial_count = self.entries.len();
        self.entries
            .retain(|_, stored| stored.snapshot_at(now).is_connected());

        let cleaned = initial_count.saturating_sub(self.entries.len());
        if cleaned > 0 {
            tracing::debug!(
                "Pruned {} expired calendar credentials, {} remaining",
                cleaned,
                self.entries.len()
            );
        }
    }

    /// Number of principals with an entry (for monitoring)
    pub fn principal_count(&self) -> usize {
        self.entries.len()
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn put(&self, principal: &str, credential: Credential) -> Result<(), CredentialStoreError> {
        let Credential { access, refresh } = credential;
        let refreshed = refresh.is_some();

        self.prune_expired();

        match self.entries.entry(principal.to_string()) {
            Entry::Occupied(mut entry) => {
                let stored = entry.get_mut();
                stored.access = Some(access);
                if let Some(refresh) = refresh {
                    stored.refresh = Some(refresh);
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(StoredCredential {
                    access: Some(access),
                    refresh,
                });
            }
        }

        tracing::debug!(principal, refreshed, "Stored calendar credential");
        Ok(())
    }

    fn get(&self, principal: &str) -> Result<CredentialSnapshot, CredentialStoreError> {
        let now = Utc::now();
        let snapshot = match self.entries.get(principal) {
            Some(entry) => entry.snapshot_at(now),
            None => return Ok(CredentialSnapshot::default()),
        };

        if !snapshot.is_connected() {
            self.entries
                .remove_if(principal, |_, stored| !stored.snapshot_at(now).is_connected());
            tracing::debug!(principal, "Pruned expired calendar credential");
        }

        Ok(snapshot)
    }

    fn clear(&self, principal: &str) -> Result<(), CredentialStoreError> {
        self.entries.remove(principal);
        tracing::debug!(principal, "Cleared calendar credential");
        Ok(())
    }
}
