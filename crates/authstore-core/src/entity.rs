//! Domain Entities
//!
//! The four OAuth entity kinds persisted by this layer, plus the
//! [`EntityDocument`] trait that custom entity types implement to be
//! resolvable through the store resolvers.
//!
//! Timestamps serialize as epoch milliseconds so the same document
//! shape works for both the BSON and the SQL/JSON backends.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The closed set of entity kinds this storage layer persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Application,
    Authorization,
    Scope,
    Token,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Application => "application",
            EntityKind::Authorization => "authorization",
            EntityKind::Scope => "scope",
            EntityKind::Token => "token",
        })
    }
}

/// A storable entity type.
///
/// `KIND` ties the type to one entity kind; the resolvers reject a
/// requested type whose kind does not match theirs. Custom entity types
/// must keep the built-in serde field names (`client_id`, `subject`,
/// `reference_id`, ...) for the kind-specific store queries to work.
pub trait EntityDocument:
    Serialize + DeserializeOwned + Clone + Send + Sync + Unpin + 'static
{
    const KIND: EntityKind;

    fn id(&self) -> &str;
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// ============================================================================
// Application
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    Public,
    Confidential,
}

/// A registered client application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    #[serde(rename = "_id")]
    pub id: String,
    pub client_id: String,
    /// Pre-hashed secret for confidential clients; hashing is the
    /// caller's responsibility.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub client_type: ClientType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub post_logout_redirect_uris: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Application {
    pub fn new(client_id: impl Into<String>, client_type: ClientType) -> Self {
        Self {
            id: new_id(),
            client_id: client_id.into(),
            client_secret: None,
            client_type,
            display_name: None,
            redirect_uris: Vec::new(),
            post_logout_redirect_uris: Vec::new(),
            permissions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uris.push(uri.into());
        self
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

impl EntityDocument for Application {
    const KIND: EntityKind = EntityKind::Application;

    fn id(&self) -> &str {
        &self.id
    }
}

// ============================================================================
// Authorization
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationStatus {
    Valid,
    Revoked,
}

/// A grant given by a subject to an application for a set of scopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Authorization {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    pub subject: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub status: AuthorizationStatus,
    /// "permanent" or "ad-hoc" in the upstream model; free-form here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_type: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Authorization {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            application_id: None,
            subject: subject.into(),
            scopes: Vec::new(),
            status: AuthorizationStatus::Valid,
            authorization_type: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_application(mut self, application_id: impl Into<String>) -> Self {
        self.application_id = Some(application_id.into());
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn revoke(&mut self) {
        self.status = AuthorizationStatus::Revoked;
    }

    pub fn is_valid(&self) -> bool {
        self.status == AuthorizationStatus::Valid
    }
}

impl EntityDocument for Authorization {
    const KIND: EntityKind = EntityKind::Authorization;

    fn id(&self) -> &str {
        &self.id
    }
}

// ============================================================================
// Scope
// ============================================================================

/// A named scope definition and the resources it maps to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scope {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub resources: Vec<String>,
}

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            display_name: None,
            description: None,
            resources: Vec::new(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resources.push(resource.into());
        self
    }
}

impl EntityDocument for Scope {
    const KIND: EntityKind = EntityKind::Scope;

    fn id(&self) -> &str {
        &self.id
    }
}

// ============================================================================
// Token
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Valid,
    Revoked,
    Redeemed,
}

/// A persisted token. Reference tokens carry an opaque `reference_id`
/// handed to the client and keep the protected payload server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    /// Protected payload; opaque to this layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    pub status: TokenStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl Token {
    pub fn new() -> Self {
        Self {
            id: new_id(),
            application_id: None,
            authorization_id: None,
            subject: None,
            reference_id: None,
            payload: None,
            token_type: None,
            status: TokenStatus::Valid,
            created_at: Utc::now(),
            expires_at: None,
            redeemed_at: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_reference_id(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn with_authorization(mut self, authorization_id: impl Into<String>) -> Self {
        self.authorization_id = Some(authorization_id.into());
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn revoke(&mut self) {
        self.status = TokenStatus::Revoked;
    }

    pub fn redeem(&mut self) {
        self.status = TokenStatus::Redeemed;
        self.redeemed_at = Some(Utc::now());
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl Default for Token {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityDocument for Token {
    const KIND: EntityKind = EntityKind::Token;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Accessors the reference-token validation flow needs from a token
/// entity, so it can run over custom token types too.
pub trait ReferenceToken: EntityDocument {
    fn payload(&self) -> Option<&str>;
    fn expires_at(&self) -> Option<DateTime<Utc>>;
    fn is_active(&self) -> bool;
}

impl ReferenceToken for Token {
    fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    fn is_active(&self) -> bool {
        self.status == TokenStatus::Valid
    }
}
