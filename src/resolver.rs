//! Service-name resolution.
//!
//! A client declaration that carries no explicit base URL is resolved from
//! its logical service name through a [`ServiceResolver`]. The resolver is
//! an external collaborator; [`StaticResolver`] is the map-backed
//! implementation used when addresses come from configuration.

use std::collections::HashMap;

use snafu::{OptionExt, Snafu};

use crate::{BaseUrl, IntoBaseUrl};

/// Resolves a logical service name to a base URL.
pub trait ServiceResolver {
    /// The error type returned when a name cannot be resolved.
    type Error: crate::Error;

    /// Resolves `name` to the base URL calls to that service target.
    ///
    /// # Errors
    ///
    /// Errors if no address is known for `name`.
    fn resolve(&self, name: &str) -> Result<BaseUrl, Self::Error>;
}

/// A fixed name-to-address table, typically loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    services: HashMap<String, BaseUrl>,
}

impl StaticResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the base URL for a service name, replacing any previous
    /// entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed as a valid URI.
    pub fn insert<U: IntoBaseUrl>(
        &mut self,
        name: impl Into<String>,
        url: U,
    ) -> Result<(), U::Error> {
        self.services.insert(name.into(), url.into_base_url()?);
        Ok(())
    }
}

impl ServiceResolver for StaticResolver {
    type Error = ResolveError;

    fn resolve(&self, name: &str) -> Result<BaseUrl, Self::Error> {
        self.services
            .get(name)
            .cloned()
            .context(UnknownServiceSnafu { name })
    }
}

/// Errors that can occur when resolving a service name.
#[derive(Debug, Snafu)]
pub enum ResolveError {
    /// The resolver knows no address for the requested service.
    #[snafu(display("no address is known for service {name:?}"))]
    UnknownService {
        /// The service name that failed to resolve.
        name: String,
    },
}

impl crate::Error for ResolveError {
    fn is_retryable(&self) -> bool {
        false
    }
}
