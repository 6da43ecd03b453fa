//! Call execution and outcome classification.
//!
//! [`execute`] sends one [`ResolvedRequest`] through the transport and
//! classifies what came back into exactly one [`Outcome`]: a decoded value,
//! an absence, or a failure marked retryable or terminal. Classification is
//! the whole job. The executor never loops; re-invoking a retryable call
//! is the retry layer's decision, and a retry re-runs request building and
//! execution from the original arguments.

use bytes::Bytes;
use http::StatusCode;
use serde::de::DeserializeOwned;
use snafu::Snafu;

use crate::http::{HttpClient, HttpResponse};
use crate::request::{ContractError, ResolvedRequest};
use crate::signature::ReturnShape;
use crate::spec::ClientSpec;

/// The classified result of one remote call.
#[derive(Debug)]
pub enum Outcome<T, ReqErr: crate::Error, RespErr: crate::Error> {
    /// A successful response. `None` when the transport yielded no entity.
    Value(Option<T>),
    /// A not-found response mapped to absence. Only produced for methods
    /// whose declared return shape is optional.
    Absent,
    /// A failure the external retry layer may re-invoke.
    Retryable {
        /// The classified failure, `is_retryable() == true`.
        source: CallError<ReqErr, RespErr>,
    },
    /// A failure that propagates to the caller unchanged.
    Terminal {
        /// The classified failure, `is_retryable() == false`.
        source: CallError<ReqErr, RespErr>,
    },
}

impl<T, ReqErr: crate::Error, RespErr: crate::Error> Outcome<T, ReqErr, RespErr> {
    /// Wraps a classified failure in the variant its flag dictates.
    fn failure(source: CallError<ReqErr, RespErr>) -> Self {
        if crate::Error::is_retryable(&source) {
            Self::Retryable { source }
        } else {
            Self::Terminal { source }
        }
    }

    /// Collapses the outcome into the caller-facing result: `Absent`
    /// becomes `Ok(None)`, failures become errors that still carry their
    /// classification via [`crate::Error::is_retryable`].
    pub fn into_result(self) -> Result<Option<T>, CallError<ReqErr, RespErr>> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Absent => Ok(None),
            Self::Retryable { source } | Self::Terminal { source } => Err(source),
        }
    }
}

/// Executes one resolved request and classifies the result.
///
/// `returns` decides the decoding target and whether a not-found response
/// may map to [`Outcome::Absent`]; `spec` and `retry_enabled` govern the
/// retryable-versus-terminal split. With retry disabled every failure is
/// terminal.
pub async fn execute<C: HttpClient, T: DeserializeOwned>(
    http_client: &C,
    request: ResolvedRequest,
    returns: ReturnShape,
    spec: &ClientSpec,
    retry_enabled: bool,
) -> Outcome<T, C::Error, <C::Response as HttpResponse>::Error> {
    tracing::debug!(verb = %request.verb(), uri = %request.uri(), "dispatching remote call");

    let response = match http_client.execute(request.into_request()).await {
        Ok(response) => response,
        Err(source) => {
            let retryable = retry_enabled && spec.retries_on_failure(&source);
            tracing::debug!(retryable, "transport failure before a response");
            return Outcome::failure(CallError::Transport { source, retryable });
        }
    };

    let status = response.status();
    let body = match response.body().await {
        Ok(body) => body,
        Err(source) => {
            let retryable = retry_enabled && spec.retries_on_failure(&source);
            return Outcome::failure(CallError::ResponseBody { source, retryable });
        }
    };

    if status.is_success() {
        return match returns {
            ReturnShape::Unit => Outcome::Value(None),
            ReturnShape::Value | ReturnShape::Optional if body.is_empty() => Outcome::Value(None),
            ReturnShape::Value | ReturnShape::Optional => match serde_json::from_slice(&body) {
                Ok(value) => Outcome::Value(Some(value)),
                Err(source) => Outcome::failure(CallError::Decode { source }),
            },
        };
    }

    // Absence takes priority over retry policy and is independent of it.
    if returns == ReturnShape::Optional && status == StatusCode::NOT_FOUND {
        return Outcome::Absent;
    }

    let retryable = retry_enabled && spec.retries_on_status(status);
    tracing::debug!(status = status.as_u16(), retryable, "remote call failed");
    Outcome::failure(CallError::Status {
        status,
        body,
        retryable,
    })
}

/// Errors produced by a classified call.
#[derive(Debug, Snafu)]
pub enum CallError<ReqErr: crate::Error, RespErr: crate::Error> {
    /// The declaration and the invocation disagree; a caller bug.
    #[snafu(context(false), display("contract violation"))]
    Contract {
        /// The underlying violation.
        source: ContractError,
    },
    /// The transport failed before a response was obtained.
    #[snafu(display("transport failure"))]
    Transport {
        /// The underlying transport error.
        source: ReqErr,
        /// Whether the declared failure categories cover this error.
        retryable: bool,
    },
    /// Reading the response body failed.
    #[snafu(display("failed to read the response body"))]
    ResponseBody {
        /// The underlying error.
        source: RespErr,
        /// Whether the declared failure categories cover this error.
        retryable: bool,
    },
    /// The server answered with a non-success status.
    #[snafu(display("remote call failed with status {status}"))]
    Status {
        /// The response status code.
        status: StatusCode,
        /// The response body, preserved for the caller.
        body: Bytes,
        /// Whether the status is in the declared retryable set.
        retryable: bool,
    },
    /// A success response body could not be decoded into the declared
    /// return shape.
    #[snafu(display("cannot decode the response body"))]
    Decode {
        /// The underlying error.
        source: serde_json::Error,
    },
}

impl<ReqErr: crate::Error, RespErr: crate::Error> crate::Error for CallError<ReqErr, RespErr> {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Contract { .. } | Self::Decode { .. } => false,
            Self::Transport { retryable, .. }
            | Self::ResponseBody { retryable, .. }
            | Self::Status { retryable, .. } => *retryable,
        }
    }
}
