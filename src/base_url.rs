//! A validated client base URL.
//!
//! [`BaseUrl`] is a newtype over [`Uri`] that guarantees the address has been
//! validated. It can be constructed from common string and URL types via
//! [`IntoBaseUrl`]. Each declared client resolves to exactly one base URL,
//! either explicitly configured or looked up by service name through a
//! [`ServiceResolver`](crate::resolver::ServiceResolver).

use std::convert::Infallible;

use http::{Uri, uri::InvalidUri};
use serde::{Deserialize, Serialize};
use url::Url;

/// A validated base URL for one remote service.
///
/// This is a newtype over [`Uri`] which can be constructed from common
/// string and URL types via [`IntoBaseUrl`]. Once constructed, it can be
/// freely cloned and shared across calls without re-validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(Uri);

impl Serialize for BaseUrl {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for BaseUrl {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.into_base_url().map_err(serde::de::Error::custom)
    }
}

impl BaseUrl {
    /// Returns the inner [`Uri`].
    #[must_use]
    pub fn as_uri(&self) -> &Uri {
        &self.0
    }

    /// Consumes the [`BaseUrl`] and returns the inner [`Uri`].
    #[must_use]
    pub fn into_uri(self) -> Uri {
        self.0
    }

    /// Renders the base address without a trailing slash, ready for a path
    /// template to be appended.
    #[must_use]
    pub(crate) fn trimmed(&self) -> String {
        let rendered = self.0.to_string();
        rendered
            .strip_suffix('/')
            .map_or(rendered.clone(), ToOwned::to_owned)
    }
}

/// Conversion trait for types that can be turned into a [`BaseUrl`].
pub trait IntoBaseUrl {
    /// The error type returned if the conversion fails.
    type Error;

    /// Attempts to convert this value into a [`BaseUrl`].
    fn into_base_url(self) -> Result<BaseUrl, Self::Error>;
}

impl IntoBaseUrl for BaseUrl {
    type Error = Infallible;

    fn into_base_url(self) -> Result<BaseUrl, Self::Error> {
        Ok(self)
    }
}

impl IntoBaseUrl for Uri {
    type Error = Infallible;

    fn into_base_url(self) -> Result<BaseUrl, Self::Error> {
        Ok(BaseUrl(self))
    }
}

impl IntoBaseUrl for Url {
    type Error = InvalidUri;

    fn into_base_url(self) -> Result<BaseUrl, Self::Error> {
        self.as_str().parse::<Uri>().map(BaseUrl)
    }
}

impl IntoBaseUrl for &str {
    type Error = InvalidUri;

    fn into_base_url(self) -> Result<BaseUrl, Self::Error> {
        self.parse::<Uri>().map(BaseUrl)
    }
}

impl IntoBaseUrl for String {
    type Error = InvalidUri;

    fn into_base_url(self) -> Result<BaseUrl, Self::Error> {
        self.parse::<Uri>().map(BaseUrl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str_and_url_agree() {
        let from_str = "http://localhost:8080/api".into_base_url().unwrap();
        let from_url = Url::parse("http://localhost:8080/api")
            .unwrap()
            .into_base_url()
            .unwrap();
        assert_eq!(from_str, from_url);
    }

    #[test]
    fn trimmed_drops_a_trailing_slash() {
        let base = "http://localhost:8080/".into_base_url().unwrap();
        assert_eq!(base.trimmed(), "http://localhost:8080");

        let base = "http://localhost:8080/api".into_base_url().unwrap();
        assert_eq!(base.trimmed(), "http://localhost:8080/api");
    }

    #[test]
    fn round_trips_through_serde() {
        let base: BaseUrl = serde_json::from_str("\"http://svc.local/v1\"").unwrap();
        assert_eq!(base.as_uri(), &"http://svc.local/v1".parse::<Uri>().unwrap());
        assert_eq!(
            serde_json::to_string(&base).unwrap(),
            "\"http://svc.local/v1\""
        );
    }
}
