//! HTTP transport abstractions.
//!
//! The dispatch core needs exactly one capability from the outside world:
//! execute a request envelope and hand back a response or a failure. These
//! traits decouple the crate from any specific HTTP implementation: users
//! provide their own [`HttpClient`] (e.g. backed by `reqwest`, `hyper`, or
//! a WASM-compatible client). Connection pooling, TLS, and socket-level
//! timeouts all live behind this seam.

#[cfg(all(not(target_arch = "wasm32"), feature = "http-client-reqwest-0_12"))]
mod reqwest_0_12;

use bytes::Bytes;
use http::{HeaderMap, Request, StatusCode};

use crate::platform::{MaybeSend, MaybeSendSync};

/// Defines the common interface for executing HTTP requests.
pub trait HttpClient: MaybeSendSync {
    /// The error type returned by the client for a failed request.
    type Error: crate::Error;

    /// The associated response type returned by this HTTP client.
    type Response: HttpResponse;

    /// Executes an HTTP request and returns an owned response.
    ///
    /// The request carries its body as [`Bytes`]; a request without a body
    /// carries an empty payload. A timeout or cancellation inside the
    /// transport must surface as an error here; the dispatch core has no
    /// timeout logic of its own.
    fn execute(
        &self,
        request: Request<Bytes>,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + MaybeSend;
}

/// Defines the common interface for HTTP responses.
pub trait HttpResponse: MaybeSendSync {
    /// The error type when getting the response body.
    type Error: crate::Error;

    /// Returns the HTTP status code of the response.
    fn status(&self) -> StatusCode;

    /// Returns the response's HTTP headers.
    fn headers(&self) -> HeaderMap;

    /// Consumes the response and asynchronously returns its body as
    /// [`Bytes`].
    fn body(self) -> impl Future<Output = Result<Bytes, Self::Error>> + MaybeSend;
}
