//! Error types and the [`Error`] trait.
//!
//! Every error in this crate implements the [`Error`] trait, which extends
//! [`std::error::Error`] with retry classification: a failure is either
//! retryable (an external retry layer may re-invoke the whole call) or
//! terminal (it propagates to the caller unchanged). [`BoxedError`] provides
//! type-erased error handling while preserving retryability.

use std::convert::Infallible;

use snafu::{AsErrorSource, Snafu};

use crate::platform::MaybeSendSync;

/// Errors that may occur in this crate.
pub trait Error: std::error::Error + AsErrorSource + MaybeSendSync + 'static {
    /// If true, re-invoking the failed call from its original arguments may
    /// succeed. The crate never retries internally; it only classifies.
    fn is_retryable(&self) -> bool;
}

impl Error for Infallible {
    fn is_retryable(&self) -> bool {
        false
    }
}

/// Upper bound on the `source()` chain walk.
///
/// Wrapped errors can in principle form a cycle; the walk gives up rather
/// than spin.
const MAX_CAUSE_DEPTH: usize = 32;

/// Returns the deepest underlying cause of `err`.
///
/// Follows the [`std::error::Error::source`] chain until it ends, at most
/// [`MAX_CAUSE_DEPTH`] links deep. Transport and decoding layers routinely
/// wrap lower-level I/O failures, so retry classification has to look past
/// the outermost error.
#[must_use]
pub fn root_cause<'a>(err: &'a (dyn std::error::Error + 'static)) -> &'a (dyn std::error::Error + 'static) {
    let mut current = err;
    for _ in 0..MAX_CAUSE_DEPTH {
        match current.source() {
            Some(next) => current = next,
            None => break,
        }
    }
    current
}

/// A boxed error that can be used without type parameters.
#[derive(Debug, Snafu)]
#[snafu(transparent)]
pub struct BoxedError {
    source: Box<dyn Error>,
}

impl BoxedError {
    /// Create a new boxed error from a generic `Error`.
    pub fn from_err<E: Error + 'static>(err: E) -> Self {
        Self {
            source: Box::new(err),
        }
    }
}

impl Error for BoxedError {
    fn is_retryable(&self) -> bool {
        self.source.is_retryable()
    }
}
