//! Method signature descriptors.
//!
//! A [`MethodDecl`] is the declarative description of one remote method:
//! verb, path template, media types, static headers, and the role each
//! parameter plays. [`SignatureDescriptor::derive`] normalizes a declaration
//! into the metadata the request builder consumes. Derivation is a pure
//! function of the declaration, with no argument values involved, so the
//! result is cacheable for the process lifetime, and deriving twice yields
//! field-for-field identical descriptors.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use bon::Builder;
use http::Method;
use snafu::{ResultExt, Snafu, ensure};

/// A validated media type such as `application/json`.
///
/// Only the `type/subtype` essence is validated; parameters after a `;` are
/// carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType(String);

impl MediaType {
    /// The wildcard media type `*/*`.
    #[must_use]
    pub fn any() -> Self {
        Self("*/*".to_string())
    }

    /// The generic binary media type `application/octet-stream`.
    #[must_use]
    pub fn octet_stream() -> Self {
        Self("application/octet-stream".to_string())
    }

    /// The `application/json` media type.
    #[must_use]
    pub fn json() -> Self {
        Self("application/json".to_string())
    }

    /// Returns the media type as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_token(part: &str) -> bool {
    !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c))
}

impl FromStr for MediaType {
    type Err = MediaTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let essence = trimmed.split(';').next().unwrap_or("");
        let valid = essence
            .split_once('/')
            .is_some_and(|(ty, subty)| is_token(ty) && is_token(subty));
        ensure!(valid, MediaTypeSnafu { value: trimmed });
        Ok(Self(trimmed.to_string()))
    }
}

/// The error returned when a string is not a syntactically valid media type.
#[derive(Debug, Snafu)]
#[snafu(display("{value:?} is not a valid media type"))]
pub struct MediaTypeError {
    value: String,
}

impl crate::Error for MediaTypeError {
    fn is_retryable(&self) -> bool {
        false
    }
}

/// The declared role of one method parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamDecl {
    /// Substituted into the path template, positionally.
    Path,
    /// Appended to the query string under the declared key.
    Query(
        /// The query key.
        String,
    ),
    /// Sent as a request header under the declared name.
    Header(
        /// The header name.
        String,
    ),
    /// No role tag. The first untagged parameter becomes the request body.
    Untagged,
}

impl ParamDecl {
    /// A query parameter declaration under `key`.
    pub fn query(key: impl Into<String>) -> Self {
        Self::Query(key.into())
    }

    /// A header parameter declaration under `name`.
    pub fn header(name: impl Into<String>) -> Self {
        Self::Header(name.into())
    }
}

/// The role a parameter ends up with after derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamRole {
    /// Substituted into the path template, positionally.
    PathVariable,
    /// Appended to the query string under the key.
    QueryParam(
        /// The query key.
        String,
    ),
    /// Sent as a request header under the name.
    HeaderParam(
        /// The header name.
        String,
    ),
    /// Serialized as the request body.
    Body,
    /// Declared but not mapped into the request.
    Unused,
}

/// The declared return convention of a remote method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReturnShape {
    /// The method yields no payload; response bodies are discarded.
    #[default]
    Unit,
    /// The method yields a decoded payload.
    Value,
    /// The method yields a payload or nothing; a not-found response maps to
    /// nothing instead of a failure.
    Optional,
}

/// The declarative description of one remote method.
///
/// List-valued fields mirror the shape of the declaration surface: only the
/// first verb and the first path entry are consulted.
#[derive(Debug, Clone, Builder)]
#[builder(state_mod(name = "builder"))]
pub struct MethodDecl {
    /// HTTP verbs; only the first entry is used. Empty means GET.
    #[builder(default)]
    methods: Vec<Method>,

    /// Path templates; only the first entry is used. Empty means `/`.
    #[builder(default, with = |paths: impl IntoIterator<Item = impl Into<String>>| paths.into_iter().map(Into::into).collect())]
    paths: Vec<String>,

    /// Media types the caller accepts in the response.
    #[builder(default, with = |produces: impl IntoIterator<Item = impl Into<String>>| produces.into_iter().map(Into::into).collect())]
    produces: Vec<String>,

    /// Media types of the request body; only the first entry is used.
    #[builder(default, with = |consumes: impl IntoIterator<Item = impl Into<String>>| consumes.into_iter().map(Into::into).collect())]
    consumes: Vec<String>,

    /// Literal `"name:value"` header strings applied to every request.
    #[builder(default, with = |headers: impl IntoIterator<Item = impl Into<String>>| headers.into_iter().map(Into::into).collect())]
    headers: Vec<String>,

    /// Parameter declarations, in declaration order.
    #[builder(default)]
    params: Vec<ParamDecl>,

    /// The declared return convention.
    #[builder(default)]
    returns: ReturnShape,
}

/// Normalized, cacheable metadata for one remote method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureDescriptor {
    verb: Method,
    path_template: String,
    accept: Vec<MediaType>,
    content_type: MediaType,
    static_headers: Vec<String>,
    roles: Vec<ParamRole>,
    returns: ReturnShape,
}

impl SignatureDescriptor {
    /// Derives the descriptor for a method declaration.
    ///
    /// Deterministic and side-effect-free: the same declaration always
    /// yields the same descriptor.
    ///
    /// # Errors
    ///
    /// Errors if a `produces`/`consumes` entry is not a valid media type or
    /// a static header literal lacks its `:` separator. Both are declaration
    /// bugs, never retried.
    pub fn derive(decl: &MethodDecl) -> Result<Self, DeriveError> {
        let verb = decl.methods.first().cloned().unwrap_or(Method::GET);
        let path_template = decl
            .paths
            .first()
            .cloned()
            .unwrap_or_else(|| "/".to_string());

        let accept = if decl.produces.is_empty() {
            vec![MediaType::any()]
        } else {
            decl.produces
                .iter()
                .map(|value| value.parse())
                .collect::<Result<_, _>>()
                .context(AcceptSnafu)?
        };

        let content_type = match decl.consumes.first() {
            Some(value) => value.parse().context(ContentTypeSnafu)?,
            None => MediaType::octet_stream(),
        };

        for header in &decl.headers {
            ensure!(
                header.split_once(':').is_some_and(|(name, _)| !name.is_empty()),
                HeaderLiteralSnafu {
                    header: header.as_str()
                }
            );
        }

        // The first untagged parameter becomes the body; any later untagged
        // parameters are left unmapped rather than rejected.
        let mut body_taken = false;
        let roles = decl
            .params
            .iter()
            .map(|param| match param {
                ParamDecl::Path => ParamRole::PathVariable,
                ParamDecl::Query(key) => ParamRole::QueryParam(key.clone()),
                ParamDecl::Header(name) => ParamRole::HeaderParam(name.clone()),
                ParamDecl::Untagged if body_taken => ParamRole::Unused,
                ParamDecl::Untagged => {
                    body_taken = true;
                    ParamRole::Body
                }
            })
            .collect();

        Ok(Self {
            verb,
            path_template,
            accept,
            content_type,
            static_headers: decl.headers.clone(),
            roles,
            returns: decl.returns,
        })
    }

    /// The HTTP verb.
    #[must_use]
    pub fn verb(&self) -> &Method {
        &self.verb
    }

    /// The path template, with `{placeholder}` segments still unexpanded.
    #[must_use]
    pub fn path_template(&self) -> &str {
        &self.path_template
    }

    /// The media types accepted in the response.
    #[must_use]
    pub fn accept(&self) -> &[MediaType] {
        &self.accept
    }

    /// The request content type.
    #[must_use]
    pub fn content_type(&self) -> &MediaType {
        &self.content_type
    }

    /// The literal `"name:value"` headers applied to every request.
    #[must_use]
    pub fn static_headers(&self) -> &[String] {
        &self.static_headers
    }

    /// Parameter roles, in declaration order.
    #[must_use]
    pub fn roles(&self) -> &[ParamRole] {
        &self.roles
    }

    /// The declared return convention.
    #[must_use]
    pub fn returns(&self) -> ReturnShape {
        self.returns
    }
}

/// Errors that can occur when deriving a descriptor.
#[derive(Debug, Snafu)]
pub enum DeriveError {
    /// A `produces` entry is not a valid media type.
    #[snafu(display("invalid accept media type"))]
    Accept {
        /// The underlying error.
        source: MediaTypeError,
    },
    /// The `consumes` entry is not a valid media type.
    #[snafu(display("invalid content media type"))]
    ContentType {
        /// The underlying error.
        source: MediaTypeError,
    },
    /// A static header literal is missing its `name:value` separator.
    #[snafu(display("header literal {header:?} is missing a name before ':'"))]
    HeaderLiteral {
        /// The rejected literal.
        header: String,
    },
}

impl crate::Error for DeriveError {
    fn is_retryable(&self) -> bool {
        false
    }
}

/// The per-client descriptor table: method name to derived descriptor.
///
/// Built once when the client is assembled; descriptors are immutable and
/// shared by every subsequent call.
#[derive(Debug, Clone, Default)]
pub struct MethodTable {
    methods: HashMap<String, SignatureDescriptor>,
}

impl MethodTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives and stores the descriptor for `name`.
    ///
    /// # Errors
    ///
    /// Errors if derivation fails or `name` is already declared.
    pub fn declare(
        &mut self,
        name: impl Into<String>,
        decl: &MethodDecl,
    ) -> Result<(), DeclareError> {
        let name = name.into();
        let descriptor = SignatureDescriptor::derive(decl).context(DeriveSnafu { name: &*name })?;
        ensure!(
            !self.methods.contains_key(&name),
            DuplicateMethodSnafu { name: &*name }
        );
        self.methods.insert(name, descriptor);
        Ok(())
    }

    /// Looks up the descriptor declared under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SignatureDescriptor> {
        self.methods.get(name)
    }

    /// The number of declared methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Whether no methods have been declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Errors that can occur when declaring a method on a table.
#[derive(Debug, Snafu)]
pub enum DeclareError {
    /// The declaration could not be derived into a descriptor.
    #[snafu(display("cannot derive a descriptor for method {name:?}"))]
    Derive {
        /// The method name being declared.
        name: String,
        /// The underlying error.
        source: DeriveError,
    },
    /// Each method name may be declared once per client.
    #[snafu(display("method {name:?} is already declared"))]
    DuplicateMethod {
        /// The already-declared name.
        name: String,
    },
}

impl crate::Error for DeclareError {
    fn is_retryable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_get_and_root() {
        let decl = MethodDecl::builder().build();
        let descriptor = SignatureDescriptor::derive(&decl).unwrap();

        assert_eq!(descriptor.verb(), &Method::GET);
        assert_eq!(descriptor.path_template(), "/");
        assert_eq!(descriptor.accept(), &[MediaType::any()]);
        assert_eq!(descriptor.content_type(), &MediaType::octet_stream());
        assert!(descriptor.roles().is_empty());
        assert_eq!(descriptor.returns(), ReturnShape::Unit);
    }

    #[test]
    fn only_the_first_verb_and_path_are_used() {
        let decl = MethodDecl::builder()
            .methods(vec![Method::POST, Method::DELETE])
            .paths(["/first", "/second"])
            .build();
        let descriptor = SignatureDescriptor::derive(&decl).unwrap();

        assert_eq!(descriptor.verb(), &Method::POST);
        assert_eq!(descriptor.path_template(), "/first");
    }

    #[test]
    fn first_untagged_parameter_wins_the_body() {
        let decl = MethodDecl::builder()
            .params(vec![
                ParamDecl::query("page"),
                ParamDecl::Untagged,
                ParamDecl::Untagged,
            ])
            .build();
        let descriptor = SignatureDescriptor::derive(&decl).unwrap();

        assert_eq!(
            descriptor.roles(),
            &[
                ParamRole::QueryParam("page".to_string()),
                ParamRole::Body,
                ParamRole::Unused,
            ]
        );
    }

    #[test]
    fn derivation_is_idempotent() {
        let decl = MethodDecl::builder()
            .methods(vec![Method::PUT])
            .paths(["/things/{id}"])
            .produces(["application/json"])
            .consumes(["application/json"])
            .headers(["X-Flavor:plain"])
            .params(vec![ParamDecl::Path, ParamDecl::Untagged])
            .returns(ReturnShape::Value)
            .build();

        let first = SignatureDescriptor::derive(&decl).unwrap();
        let second = SignatureDescriptor::derive(&decl).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn malformed_media_types_are_rejected() {
        let decl = MethodDecl::builder().produces(["not a media type"]).build();
        let err = SignatureDescriptor::derive(&decl).unwrap_err();
        assert!(matches!(err, DeriveError::Accept { .. }));

        let decl = MethodDecl::builder().consumes(["application"]).build();
        let err = SignatureDescriptor::derive(&decl).unwrap_err();
        assert!(matches!(err, DeriveError::ContentType { .. }));
    }

    #[test]
    fn media_type_parameters_are_carried_through() {
        let parsed: MediaType = "text/plain; charset=utf-8".parse().unwrap();
        assert_eq!(parsed.as_str(), "text/plain; charset=utf-8");

        assert!("*/*".parse::<MediaType>().is_ok());
        assert!("/plain".parse::<MediaType>().is_err());
        assert!("text/".parse::<MediaType>().is_err());
    }

    #[test]
    fn header_literals_need_a_name_and_separator() {
        let decl = MethodDecl::builder().headers(["X-Flavor plain"]).build();
        let err = SignatureDescriptor::derive(&decl).unwrap_err();
        assert!(matches!(err, DeriveError::HeaderLiteral { .. }));

        let decl = MethodDecl::builder().headers([":plain"]).build();
        assert!(SignatureDescriptor::derive(&decl).is_err());
    }

    #[test]
    fn table_rejects_duplicates_and_serves_lookups() {
        let mut table = MethodTable::new();
        table.declare("foo", &MethodDecl::builder().build()).unwrap();

        let err = table
            .declare("foo", &MethodDecl::builder().build())
            .unwrap_err();
        assert!(matches!(err, DeclareError::DuplicateMethod { .. }));

        assert_eq!(table.len(), 1);
        assert!(table.get("foo").is_some());
        assert!(table.get("bar").is_none());
    }
}
