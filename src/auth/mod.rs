//! Authorization capability
//!
//! Defines the seam between the authentication provider and the component
//! that actually verifies tokens. The provider never looks inside a token;
//! it hands the request to an [`Authorizer`] and receives a claims map back.

use async_trait::async_trait;
use hyper::http::request::Parts;
use std::collections::HashMap;
use thiserror::Error;
use tracing::Span;

pub mod jwt;

/// Untyped verified claims as produced by an authorizer
pub type ClaimsMap = HashMap<String, serde_json::Value>;

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Malformed claims: '{claim}' {reason}")]
    MalformedClaims { claim: String, reason: String },

    #[error("Provisioning failed: {0}")]
    Provision(String),

    #[error("Unknown module: {0}")]
    UnknownModule(String),

    #[error("Invalid module configuration: {0}")]
    InvalidConfig(String),
}

impl AuthError {
    /// Whether the error was caused by the presented token itself
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidToken(_) | AuthError::TokenExpired | AuthError::InvalidSignature
        )
    }
}

/// Options supplied to an authorizer at startup
#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    /// Span under which the authorizer emits its log events
    pub logger: Span,
}

/// Auxiliary options passed with every authorization call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeOptions {
    pub request_id: String,
}

/// Outcome of a single authorization call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Authorization {
    pub claims: Option<ClaimsMap>,
    pub authenticated: bool,
}

impl Authorization {
    /// Request carried no credentials
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Request carried credentials that verified to `claims`
    pub fn verified(claims: ClaimsMap) -> Self {
        Self {
            claims: Some(claims),
            authenticated: true,
        }
    }
}

/// Token verifier the authentication provider delegates to
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Prepare the authorizer for use (keys, validation rules, logger)
    fn provision(&mut self, opts: ProvisionOptions) -> Result<(), AuthError>;

    /// Verify the credentials carried by a request
    async fn authorize(
        &self,
        request: &Parts,
        opts: &AuthorizeOptions,
    ) -> Result<Authorization, AuthError>;
}
