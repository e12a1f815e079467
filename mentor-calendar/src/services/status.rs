use std::sync::Arc;

use crate::models::ConnectionStatus;
use crate::services::credential_store::CredentialStore;

/// Answers "has this principal connected a calendar?" from the store alone.
pub struct ConnectionStatusProbe {
    store: Arc<dyn CredentialStore>,
}

impl ConnectionStatusProbe {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Connected iff an access or refresh credential is on file. A store
    /// failure reads as not connected.
    pub fn is_connected(&self, principal: &str) -> bool {
        self.status(Some(principal)).is_connected
    }

    pub fn status(&self, principal: Option<&str>) -> ConnectionStatus {
        let Some(principal) = principal else {
            return ConnectionStatus::default();
        };

        match self.store.get(principal) {
            Ok(snapshot) => ConnectionStatus {
                is_connected: snapshot.is_connected(),
                has_access_token: snapshot.has_access_token(),
                has_refresh_token: snapshot.has_refresh_token(),
                error: None,
            },
            Err(e) => {
                tracing::warn!(principal, error = %e, "Connection status check failed");
                ConnectionStatus {
                    error: Some(e.to_string()),
                    ..ConnectionStatus::default()
                }
            }
        }
    }
}
