//! The per-service dispatcher.
//!
//! A [`RestClient`] binds one resolved base address, one
//! [`ClientSpec`](crate::spec::ClientSpec), and one descriptor table to a
//! transport. It is the single entry point for every declared method of a
//! logical service: one instance serves all calls for the process lifetime.
//! Each invocation looks up the method's cached descriptor, builds a fresh
//! [`ResolvedRequest`] from the live arguments, executes it, and returns the
//! classified outcome. Calls are independent and share no mutable state, so
//! a client can be used concurrently without locking.

use bon::Builder;
use serde::de::DeserializeOwned;
use snafu::OptionExt;

use crate::dispatch::{CallError, execute};
use crate::http::{HttpClient, HttpResponse};
use crate::request::{ArgValue, ResolvedRequest, UnknownMethodSnafu};
use crate::resolver::ServiceResolver;
use crate::signature::{MethodTable, SignatureDescriptor};
use crate::spec::ClientSpec;
use crate::{BaseUrl, IntoBaseUrl};

/// The dispatcher for one declared client.
#[derive(Builder)]
#[builder(state_mod(name = "builder"))]
pub struct RestClient<C: HttpClient> {
    /// The retry specification of the logical service.
    spec: ClientSpec,

    /// The resolved base address all calls target.
    #[builder(setters(name = "base_url_value"))]
    base_url: BaseUrl,

    /// The descriptor table, derived once at construction.
    methods: MethodTable,

    /// The transport that executes resolved requests.
    http_client: C,

    /// Marks classified failures as retryable. Set when an external retry
    /// executor wraps this client; without it every failure is terminal.
    #[builder(default = false)]
    retry_enabled: bool,
}

impl<C: HttpClient, S: builder::State> RestClientBuilder<C, S> {
    /// Sets the base URL from anything that converts into one.
    ///
    /// Accepts any type that implements [`IntoBaseUrl`], including `&str`,
    /// [`String`], [`Url`](url::Url), [`Uri`](http::Uri), and [`BaseUrl`].
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed as a valid URI.
    pub fn base_url<U: IntoBaseUrl>(
        self,
        url: U,
    ) -> Result<RestClientBuilder<C, builder::SetBaseUrl<S>>, U::Error>
    where
        S::BaseUrl: builder::IsUnset,
    {
        Ok(self.base_url_value(url.into_base_url()?))
    }

    /// Resolves the base URL from a service name, for declarations that
    /// carry no explicit URL.
    ///
    /// # Errors
    ///
    /// Propagates the resolver's error when the name is unknown.
    pub fn base_url_resolved<R: ServiceResolver>(
        self,
        resolver: &R,
        name: &str,
    ) -> Result<RestClientBuilder<C, builder::SetBaseUrl<S>>, R::Error>
    where
        S::BaseUrl: builder::IsUnset,
    {
        Ok(self.base_url_value(resolver.resolve(name)?))
    }
}

impl<C: HttpClient> RestClient<C> {
    /// The logical service name this client dispatches for.
    #[must_use]
    pub fn name(&self) -> &str {
        self.spec.name()
    }

    /// The descriptor declared under `method`, if any.
    #[must_use]
    pub fn descriptor(&self, method: &str) -> Option<&SignatureDescriptor> {
        self.methods.get(method)
    }

    /// Invokes a declared method and decodes the response body into `T`.
    ///
    /// `Ok(None)` means the call succeeded without an entity: an empty
    /// response body, or a not-found response for methods declared with an
    /// optional return shape.
    ///
    /// # Errors
    ///
    /// Returns a [`CallError`] carrying the retryable/terminal
    /// classification; inspect it through
    /// [`Error::is_retryable`](crate::Error::is_retryable).
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        args: &[Option<ArgValue>],
    ) -> Result<Option<T>, CallError<C::Error, <C::Response as HttpResponse>::Error>> {
        let descriptor = self
            .methods
            .get(method)
            .context(UnknownMethodSnafu { name: method })?;

        let request = ResolvedRequest::build(descriptor, &self.base_url, args)?;

        execute(
            &self.http_client,
            request,
            descriptor.returns(),
            &self.spec,
            self.retry_enabled,
        )
        .await
        .into_result()
    }

    /// Invokes a declared method and discards any response payload.
    ///
    /// # Errors
    ///
    /// Same contract as [`RestClient::call`].
    pub async fn call_unit(
        &self,
        method: &str,
        args: &[Option<ArgValue>],
    ) -> Result<(), CallError<C::Error, <C::Response as HttpResponse>::Error>> {
        self.call::<serde_json::Value>(method, args).await.map(|_| ())
    }
}
