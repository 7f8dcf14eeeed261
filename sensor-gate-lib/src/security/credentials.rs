//! Principals, presented credentials and the static credential store.

use ahash::AHashMap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bcrypt::{BcryptError, Version};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;
use tracing::error;

use crate::config::PrincipalConfig;

/// bcrypt work factor, paid once per authentication attempt
const DIGEST_COST: u32 = 6;
const SALT_LEN: usize = 16;

/// Closed set of roles a principal can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Read and write access, plus administrative actions
    #[serde(alias = "admin")]
    Administrator,
    /// Read-only access
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "administrator",
            Role::Viewer => "viewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub identifier: String,
    pub role: Role,
}

/// Identifier and secret claimed by a single request. Never stored.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    identifier: String,
    secret: String,
}

impl Credential {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self { identifier: identifier.into(), secret: secret.into() }
    }

    /// Parse an `Authorization` header value of the form `Basic base64(identifier:secret)`.
    ///
    /// The scheme is matched case-insensitively. The identifier ends at the
    /// first `:`; the secret may contain further colons.
    pub fn from_authorization_header(value: &str) -> Option<Self> {
        let (scheme, encoded) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (identifier, secret) = decoded.split_once(':')?;
        Some(Self::new(identifier, secret))
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// bcrypt digest of a secret
#[derive(Clone)]
pub struct SecretDigest {
    salt: [u8; SALT_LEN],
    hash: String,
}

impl SecretDigest {
    /// Digest `secret` under a fresh random salt
    pub fn new(secret: &str) -> Result<Self, BcryptError> {
        Self::with_salt(secret, rand::random())
    }

    pub fn with_salt(secret: &str, salt: [u8; SALT_LEN]) -> Result<Self, BcryptError> {
        Ok(Self { salt, hash: derive(secret, salt)? })
    }

    /// Recompute the digest for `candidate` and compare in constant time
    pub fn verify(&self, candidate: &str) -> bool {
        match derive(candidate, self.salt) {
            Ok(computed) => computed.as_bytes().ct_eq(self.hash.as_bytes()).into(),
            Err(_) => false,
        }
    }
}

impl fmt::Debug for SecretDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretDigest(<redacted>)")
    }
}

// bcrypt reads at most 72 bytes and rejects NUL, so the secret is pre-hashed
// into a fixed 44-byte ASCII input.
fn derive(secret: &str, salt: [u8; SALT_LEN]) -> Result<String, BcryptError> {
    let prehashed = STANDARD.encode(Sha256::digest(secret.as_bytes()));
    let parts = bcrypt::hash_with_salt(prehashed, DIGEST_COST, salt)?;
    Ok(parts.format_for_version(Version::TwoB))
}

#[derive(Debug, Clone)]
struct StoredPrincipal {
    role: Role,
    digest: SecretDigest,
}

/// Directory of known principals, built once at startup and immutable afterwards.
///
/// Only digests are kept; plaintext secrets from the configuration are dropped
/// once the store is built.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    principals: AHashMap<String, StoredPrincipal>,
    /// Verified against when the identifier is unknown so both failure paths cost the same
    decoy: Option<SecretDigest>,
}

impl CredentialStore {
    pub fn new() -> Self {
        let decoy = SecretDigest::new("")
            .inspect_err(|e| error!(error = %e, "failed to build decoy digest"))
            .ok();
        Self { principals: AHashMap::new(), decoy }
    }

    /// Build from configuration. Duplicate identifiers keep the first definition.
    pub fn from_config(principals: &[PrincipalConfig]) -> Self {
        let mut store = Self::new();
        for p in principals {
            store.insert(&p.identifier, &p.secret, p.role);
        }
        store
    }

    /// Add a principal unless the identifier is already taken.
    /// Returns false when it was already present or its secret could not be digested.
    pub fn insert(&mut self, identifier: &str, secret: &str, role: Role) -> bool {
        if self.principals.contains_key(identifier) {
            return false;
        }
        let digest = match SecretDigest::new(secret) {
            Ok(digest) => digest,
            Err(e) => {
                error!(identifier, error = %e, "failed to digest secret, principal ignored");
                return false;
            }
        };
        self.principals.insert(identifier.to_string(), StoredPrincipal { role, digest });
        true
    }

    /// Exact, case-sensitive lookup followed by secret verification
    pub fn verify(&self, credential: &Credential) -> Option<Principal> {
        match self.principals.get(credential.identifier()) {
            Some(stored) => stored.digest.verify(credential.secret()).then(|| Principal {
                identifier: credential.identifier().to_string(),
                role: stored.role,
            }),
            None => {
                if let Some(decoy) = &self.decoy {
                    let _ = decoy.verify(credential.secret());
                }
                None
            }
        }
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}
