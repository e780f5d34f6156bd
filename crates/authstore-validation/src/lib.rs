//! AuthStore Validation
//!
//! Reference-token validation: exchange an opaque reference id for the
//! stored token, unprotect its payload, and check it is still usable.
//!
//! Every token-level failure (unknown reference id, missing payload,
//! unprotect failure, inactive status, expiry) collapses into a single
//! [`ValidationOutcome::Unauthenticated`] that carries no reason, so
//! callers cannot distinguish why authentication was not established.
//! Reasons are only visible at `debug` level. Store failures still
//! propagate as errors; a database outage is not an authentication
//! decision.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use authstore_core::{ReferenceToken, Result, TokenStore};

/// The principal reconstructed from a protected token payload.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessTicket {
    pub subject: String,
    pub scopes: Vec<String>,
    pub claims: serde_json::Value,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessTicket {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            scopes: Vec::new(),
            claims: serde_json::Value::Null,
            expires_at: None,
        }
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

/// Deliberately opaque: the cause of an unprotect failure never reaches
/// the caller of the validation flow.
#[derive(Debug, Error)]
#[error("the token payload could not be unprotected")]
pub struct ProtectionError;

/// Seam for the external secure-data-format collaborator that encrypted
/// the payload. No cryptography lives in this crate.
pub trait TicketProtector: Send + Sync {
    fn unprotect(&self, payload: &str) -> std::result::Result<AccessTicket, ProtectionError>;
}

/// Result of a validation attempt. `Unauthenticated` is a unit variant
/// on purpose: all rejection causes are indistinguishable.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Authenticated(AccessTicket),
    Unauthenticated,
}

impl ValidationOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, ValidationOutcome::Authenticated(_))
    }

    pub fn ticket(self) -> Option<AccessTicket> {
        match self {
            ValidationOutcome::Authenticated(ticket) => Some(ticket),
            ValidationOutcome::Unauthenticated => None,
        }
    }
}

pub struct ReferenceTokenValidator<T: ReferenceToken> {
    tokens: Arc<dyn TokenStore<T>>,
    protector: Arc<dyn TicketProtector>,
}

impl<T: ReferenceToken> ReferenceTokenValidator<T> {
    pub fn new(tokens: Arc<dyn TokenStore<T>>, protector: Arc<dyn TicketProtector>) -> Self {
        Self { tokens, protector }
    }

    pub async fn validate(&self, reference_id: &str) -> Result<ValidationOutcome> {
        let Some(token) = self.tokens.find_by_reference_id(reference_id).await? else {
            debug!("reference token not found");
            return Ok(ValidationOutcome::Unauthenticated);
        };

        if !token.is_active() {
            debug!("reference token is not active");
            return Ok(ValidationOutcome::Unauthenticated);
        }

        let now = Utc::now();
        if token.expires_at().is_some_and(|at| at <= now) {
            debug!("reference token has expired");
            return Ok(ValidationOutcome::Unauthenticated);
        }

        let Some(payload) = token.payload() else {
            debug!("reference token has no payload");
            return Ok(ValidationOutcome::Unauthenticated);
        };

        let ticket = match self.protector.unprotect(payload) {
            Ok(ticket) => ticket,
            Err(_) => {
                debug!("reference token payload could not be unprotected");
                return Ok(ValidationOutcome::Unauthenticated);
            }
        };

        if ticket.expires_at.is_some_and(|at| at <= now) {
            debug!("reconstructed ticket has expired");
            return Ok(ValidationOutcome::Unauthenticated);
        }

        Ok(ValidationOutcome::Authenticated(ticket))
    }
}
