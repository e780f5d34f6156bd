//! Error Types

use thiserror::Error;

use crate::entity::EntityKind;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Operator/programmer configuration mistake. Fatal, never retried;
    /// the message names the remediation.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The cancellation signal was already triggered before a database
    /// handle acquisition started.
    #[error("Operation was canceled before a database handle could be acquired")]
    Canceled,

    #[error("Database error: {0}")]
    Database(#[source] BoxError),

    #[error("Serialization error: {0}")]
    Serialization(#[source] BoxError),
}

impl StoreError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn database(err: impl Into<BoxError>) -> Self {
        Self::Database(err.into())
    }

    pub fn serialization(err: impl Into<BoxError>) -> Self {
        Self::Serialization(err.into())
    }

    /// The requested entity type does not belong to the resolver's kind.
    pub fn incompatible_entity(kind: EntityKind, requested: &str) -> Self {
        Self::configuration(format!(
            "the entity type '{requested}' is not compatible with the {kind} stores; \
             use the built-in {kind} entity or a custom type whose EntityDocument \
             kind is '{kind}'"
        ))
    }

    /// No service of the given type was ever registered.
    pub fn unregistered_service(type_name: &str) -> Self {
        Self::configuration(format!(
            "no service of type '{type_name}' has been registered; register one on \
             the ServiceRegistry before resolving stores"
        ))
    }

    /// A service slot exists but was explicitly registered as absent.
    pub fn absent_service(type_name: &str) -> Self {
        Self::configuration(format!(
            "the service of type '{type_name}' was explicitly registered as absent; \
             replace the registration with an instance before resolving stores"
        ))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incompatible_entity_names_type_and_kind() {
        let err = StoreError::incompatible_entity(EntityKind::Token, "my_crate::Widget");
        let msg = err.to_string();
        assert!(msg.contains("my_crate::Widget"));
        assert!(msg.contains("token stores"));
        assert!(err.is_configuration());
    }

    #[test]
    fn unregistered_and_absent_messages_differ() {
        let missing = StoreError::unregistered_service("Foo").to_string();
        let absent = StoreError::absent_service("Foo").to_string();
        assert_ne!(missing, absent);
        assert!(missing.contains("has been registered"));
        assert!(absent.contains("explicitly registered as absent"));
    }

    #[test]
    fn canceled_is_not_a_configuration_error() {
        assert!(!StoreError::Canceled.is_configuration());
    }
}
