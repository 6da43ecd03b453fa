//! Per-client retry specifications.
//!
//! A [`ClientSpec`] identifies one logical remote service and carries the
//! failure classes an external retry layer is allowed to re-invoke on: a set
//! of HTTP status codes and a set of transport [`FailureCategory`] values.
//! Specs are immutable once built, live for the process lifetime, and are
//! looked up by service name from a [`SpecRegistry`].

use std::collections::HashMap;

use bon::Builder;
use http::StatusCode;
use serde::Deserialize;
use snafu::{Snafu, ensure};

use crate::error::root_cause;

/// Categories of transport failure that may be declared retryable.
///
/// A category matches a failure when the failure itself, or its deepest
/// underlying cause, belongs to the category. The deepest cause is found by
/// walking the error `source()` chain, because transport and decoding layers
/// routinely wrap the I/O error that actually went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureCategory {
    /// Any I/O failure ([`std::io::Error`]).
    Io,
    /// A failure to establish or keep a connection.
    Connect,
    /// The operation timed out before completing.
    Timeout,
}

impl FailureCategory {
    /// Does this single error belong to the category?
    fn covers(self, err: &(dyn std::error::Error + 'static)) -> bool {
        use std::io::ErrorKind;

        match self {
            Self::Io => err.downcast_ref::<std::io::Error>().is_some(),
            Self::Connect => matches!(
                err.downcast_ref::<std::io::Error>().map(std::io::Error::kind),
                Some(
                    ErrorKind::ConnectionRefused
                        | ErrorKind::ConnectionReset
                        | ErrorKind::ConnectionAborted
                        | ErrorKind::NotConnected
                )
            ),
            Self::Timeout => matches!(
                err.downcast_ref::<std::io::Error>().map(std::io::Error::kind),
                Some(ErrorKind::TimedOut)
            ),
        }
    }

    /// Matches the failure itself or its deepest underlying cause.
    #[must_use]
    pub fn matches(self, err: &(dyn std::error::Error + 'static)) -> bool {
        self.covers(err) || self.covers(root_cause(err))
    }
}

/// The retry specification for one logical remote service.
#[derive(Debug, Clone, Builder, Deserialize)]
#[builder(state_mod(name = "builder"))]
pub struct ClientSpec {
    /// The logical service name. Must be non-empty.
    #[builder(into)]
    name: String,

    /// Status codes an external retry layer may re-invoke on.
    #[serde(default)]
    #[builder(default)]
    retry_on_status: Vec<u16>,

    /// Transport failure categories an external retry layer may re-invoke
    /// on.
    #[serde(default)]
    #[builder(default)]
    retry_on: Vec<FailureCategory>,
}

impl ClientSpec {
    /// Returns the logical service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Is `status` in the retryable status set?
    #[must_use]
    pub fn retries_on_status(&self, status: StatusCode) -> bool {
        self.retry_on_status.contains(&status.as_u16())
    }

    /// Does `err` match any declared retryable failure category?
    #[must_use]
    pub fn retries_on_failure(&self, err: &(dyn std::error::Error + 'static)) -> bool {
        self.retry_on.iter().any(|category| category.matches(err))
    }
}

/// Client specs indexed by service name.
///
/// Built at configuration time; the dispatcher for each declared client is
/// handed the spec found under its name.
#[derive(Debug, Clone, Default)]
pub struct SpecRegistry {
    specs: HashMap<String, ClientSpec>,
}

impl SpecRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a spec under its service name.
    ///
    /// # Errors
    ///
    /// Errors if the spec's name is empty or already registered.
    pub fn register(&mut self, spec: ClientSpec) -> Result<(), RegistryError> {
        ensure!(!spec.name.is_empty(), EmptyNameSnafu);
        ensure!(
            !self.specs.contains_key(&spec.name),
            DuplicateNameSnafu {
                name: spec.name.as_str()
            }
        );
        self.specs.insert(spec.name.clone(), spec);
        Ok(())
    }

    /// Looks up the spec registered under `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&ClientSpec> {
        self.specs.get(name)
    }
}

/// Errors that can occur when registering a client spec.
#[derive(Debug, Snafu)]
pub enum RegistryError {
    /// A spec must carry a non-empty service name.
    #[snafu(display("client spec name must be set"))]
    EmptyName,
    /// Each service name may be registered once.
    #[snafu(display("a spec named {name:?} is already registered"))]
    DuplicateName {
        /// The already-registered name.
        name: String,
    },
}

impl crate::Error for RegistryError {
    fn is_retryable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(display("request interrupted"))]
    struct Wrapped {
        source: std::io::Error,
    }

    fn refused() -> Wrapped {
        Wrapped {
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        }
    }

    #[test]
    fn categories_match_the_root_cause() {
        let err = refused();
        assert!(FailureCategory::Io.matches(&err));
        assert!(FailureCategory::Connect.matches(&err));
        assert!(!FailureCategory::Timeout.matches(&err));
    }

    #[test]
    fn categories_match_the_immediate_error() {
        let bare = std::io::Error::from(std::io::ErrorKind::TimedOut);
        assert!(FailureCategory::Timeout.matches(&bare));
        assert!(!FailureCategory::Connect.matches(&bare));
    }

    #[test]
    fn spec_matches_declared_categories_only() {
        let spec = ClientSpec::builder()
            .name("localhost")
            .retry_on(vec![FailureCategory::Io])
            .build();

        assert!(spec.retries_on_failure(&refused()));

        let undeclared = ClientSpec::builder().name("localhost").build();
        assert!(!undeclared.retries_on_failure(&refused()));
    }

    #[test]
    fn status_set_membership() {
        let spec = ClientSpec::builder()
            .name("localhost")
            .retry_on_status(vec![503])
            .build();

        assert!(spec.retries_on_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!spec.retries_on_status(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn registry_rejects_empty_and_duplicate_names() {
        let mut registry = SpecRegistry::new();
        let err = registry
            .register(ClientSpec::builder().name("").build())
            .unwrap_err();
        assert!(matches!(err, RegistryError::EmptyName));

        registry
            .register(ClientSpec::builder().name("localhost").build())
            .unwrap();
        let err = registry
            .register(ClientSpec::builder().name("localhost").build())
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName { .. }));
        assert!(registry.find("localhost").is_some());
    }

    #[test]
    fn deserializes_from_configuration() {
        let spec: ClientSpec = serde_json::from_str(
            r#"{"name": "billing", "retry_on_status": [503], "retry_on": ["io", "connect"]}"#,
        )
        .unwrap();

        assert_eq!(spec.name(), "billing");
        assert!(spec.retries_on_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(spec.retries_on_failure(&refused()));
    }
}
