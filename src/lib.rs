//! Implements declarative remote-call dispatch over HTTP.
//!
//! A client declares its remote methods as data (HTTP verb, path template,
//! and the role each parameter plays) and this crate does the rest: it
//! derives a cacheable [`SignatureDescriptor`](signature::SignatureDescriptor)
//! per method, assembles each invocation into a concrete request, executes
//! it through a pluggable transport, and classifies the outcome so an
//! external retry layer can decide whether to re-invoke.
//!
//! ```ignore
//! use budstikke::client::RestClient;
//! use budstikke::request::ArgValue;
//! use budstikke::signature::{MethodDecl, MethodTable, ParamDecl, ReturnShape};
//! use budstikke::spec::ClientSpec;
//!
//! let mut methods = MethodTable::new();
//! methods.declare(
//!     "find_user",
//!     &MethodDecl::builder()
//!         .paths(["/users/{id}"])
//!         .produces(["application/json"])
//!         .params(vec![ParamDecl::Path])
//!         .returns(ReturnShape::Optional)
//!         .build(),
//! )?;
//!
//! let client = RestClient::builder()
//!     .spec(ClientSpec::builder().name("users").retry_on_status(vec![503]).build())
//!     .base_url("http://users.local:8080")?
//!     .methods(methods)
//!     .http_client(reqwest::Client::new())
//!     .build();
//!
//! let user: Option<User> = client.call("find_user", &[Some(ArgValue::text(42))]).await?;
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod base_url;
pub mod client;
pub mod dispatch;
mod error;
pub mod http;
pub mod platform;
pub mod prelude;
pub mod request;
pub mod resolver;
pub mod retry;
pub mod signature;
pub mod spec;

pub use base_url::{BaseUrl, IntoBaseUrl};
pub use error::{BoxedError, Error, root_cause};

/// Documentation
pub mod _documentation {
    #[doc = include_str!("../README.md")]
    mod readme {}
    #[doc = include_str!("../CHANGELOG.md")]
    pub mod changelog {}
}

pub use bytes::Bytes;
