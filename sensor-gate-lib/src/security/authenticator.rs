use tracing::debug;

use crate::security::{Credential, CredentialStore, Principal};

/// Realm advertised in the `WWW-Authenticate` challenge
pub const DEFAULT_REALM: &str = "Sensor API";

/// Verifies presented credentials against the [`CredentialStore`].
#[derive(Debug, Clone)]
pub struct Authenticator {
    store: CredentialStore,
    realm: String,
}

impl Authenticator {
    pub fn new(store: CredentialStore) -> Self {
        Self { store, realm: DEFAULT_REALM.to_string() }
    }

    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = realm.into();
        self
    }

    /// Resolve a credential to a known principal, or `None`.
    ///
    /// Unknown identifier and wrong secret are indistinguishable to the caller.
    pub fn authenticate(&self, credential: &Credential) -> Option<Principal> {
        let principal = self.store.verify(credential);
        if principal.is_none() {
            debug!(identifier = %credential.identifier(), "credential rejected");
        }
        principal
    }

    /// Challenge value for a 401 response, e.g. `Basic realm="Sensor API"`
    pub fn challenge(&self) -> String {
        format!("Basic realm=\"{}\"", self.realm)
    }
}
