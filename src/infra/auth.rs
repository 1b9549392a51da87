//! Bearer token verification.
//!
//! Token issuance is handled elsewhere; this service only maps an opaque token
//! to the caller it was issued for.

use crate::domain::identity::{Principal, Role};
use anyhow::{anyhow, Context};
use std::collections::HashMap;

pub trait TokenVerifier: Send + Sync {
    /// The caller a token belongs to, or `None` if the token is unknown.
    fn verify(&self, token: &str) -> Option<Principal>;
}

/// Fixed token table, loaded from `token:user_id:role` entries.
#[derive(Debug, Default, Clone)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, Principal>,
}

impl StaticTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a comma separated list of `token:user_id:role` entries.
    pub fn from_entries(entries: &str) -> anyhow::Result<Self> {
        let mut verifier = Self::new();
        for entry in entries.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
            let [token, user, role] = parts.as_slice() else {
                return Err(anyhow!(
                    "API token entry '{}' must look like token:user_id:role",
                    entry
                ));
            };
            if token.is_empty() {
                return Err(anyhow!("API token entry '{}' has an empty token", entry));
            }
            let subject = uuid::Uuid::parse_str(user)
                .with_context(|| format!("API token entry '{}' has a malformed user id", entry))?
                .to_string();
            let role: Role = role.parse().map_err(|e: String| anyhow!(e))?;
            verifier.insert(*token, Principal { subject, role });
        }
        Ok(verifier)
    }

    pub fn insert(&mut self, token: impl Into<String>, principal: Principal) {
        self.tokens.insert(token.into(), principal);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl TokenVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> Option<Principal> {
        self.tokens.get(token).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: &str = "6f9619ff-8b86-d011-b42d-00c04fc964ff";

    #[test]
    fn parses_entries() {
        let v = StaticTokenVerifier::from_entries(&format!(
            " alice:{USER}:vendor , bob:{}:2,",
            USER.to_uppercase()
        ))
        .unwrap();
        assert_eq!(v.len(), 2);
        let alice = v.verify("alice").unwrap();
        assert_eq!(alice.role, Role::Vendor);
        assert_eq!(alice.subject, USER);
        assert_eq!(v.verify("bob").unwrap().role, Role::Admin);
        assert!(v.verify("carol").is_none());
    }

    #[test]
    fn empty_entries_accept_nobody() {
        let v = StaticTokenVerifier::from_entries("").unwrap();
        assert!(v.is_empty());
        assert!(v.verify("").is_none());
    }

    #[test]
    fn rejects_malformed_entries() {
        assert!(StaticTokenVerifier::from_entries("alice").is_err());
        assert!(StaticTokenVerifier::from_entries("alice:not-a-uuid:vendor").is_err());
        assert!(StaticTokenVerifier::from_entries(&format!("alice:{USER}:root")).is_err());
        assert!(StaticTokenVerifier::from_entries(&format!(":{USER}:admin")).is_err());
    }
}
