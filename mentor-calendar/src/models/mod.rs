mod credential;
mod requests;

pub use credential::{Credential, CredentialSnapshot, ExpiringToken};
pub use requests::*;
