//! AuthStore Core
//!
//! Shared foundation for the AuthStore persistence layer:
//! - Domain entities for the four OAuth entity kinds
//!   (applications, authorizations, scopes, tokens)
//! - Store traits implemented by each persistence backend
//! - Error types shared across the workspace

pub mod entity;
pub mod error;
pub mod store;

pub use entity::{
    Application, Authorization, AuthorizationStatus, ClientType, EntityDocument, EntityKind,
    ReferenceToken, Scope, Token, TokenStatus,
};
pub use error::{Result, StoreError};
pub use store::{ApplicationStore, AuthorizationStore, EntityStore, ScopeStore, TokenStore};
