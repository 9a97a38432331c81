//! Identity verification seam.
//!
//! Token cryptography belongs to the external identity provider. This module
//! only defines the contract and a static verifier for local runs and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use courtside_auth::{AccessError, VerifiedIdentity};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("invalid identity token")]
    InvalidToken,
}

impl From<IdentityError> for AccessError {
    fn from(_: IdentityError) -> Self {
        AccessError::InvalidIdentity
    }
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError>;
}

/// Fixed token → identity table.
///
/// Loaded from JSON of the form `{"<token>": {"uid": .., "email": .., "name": ..}}`.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityVerifier {
    tokens: HashMap<String, VerifiedIdentity>,
}

impl StaticIdentityVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            tokens: serde_json::from_str(raw)?,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>, identity: VerifiedIdentity) -> Self {
        self.tokens.insert(token.into(), identity);
        self
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl IdentityVerifier for StaticIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(IdentityError::InvalidToken);
        }
        self.tokens.get(token).cloned().ok_or(IdentityError::InvalidToken)
    }
}
