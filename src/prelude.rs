//! Imports for syntax extensions.

pub use crate::Error as _;
pub use crate::IntoBaseUrl as _;
pub use crate::resolver::ServiceResolver as _;
