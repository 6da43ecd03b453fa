//! Request assembly.
//!
//! [`ResolvedRequest::build`] combines a [`SignatureDescriptor`] with one
//! concrete argument vector into a fully concrete request: target URI with
//! path variables substituted and query parameters appended, header map,
//! and optional body. The result is immutable, built fresh per call, and
//! handed exactly once to the transport. No network I/O happens here.

use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Uri};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use snafu::{OptionExt, ResultExt, Snafu, ensure};

use crate::BaseUrl;
use crate::signature::{ParamRole, SignatureDescriptor};

/// Everything except RFC 3986 unreserved characters is escaped when a path
/// variable is substituted.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// One runtime argument to a declared method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    /// A value rendered into the path, the query string, or a header.
    Text(String),
    /// A pre-encoded body payload.
    Payload(Bytes),
    /// A JSON body payload, serialized according to the content type.
    Json(serde_json::Value),
}

impl ArgValue {
    /// A text argument from anything displayable.
    pub fn text(value: impl ToString) -> Self {
        Self::Text(value.to_string())
    }

    /// A JSON body argument from anything serializable.
    ///
    /// # Errors
    ///
    /// Errors if `value` cannot be represented as JSON.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            Self::Payload(_) | Self::Json(_) => None,
        }
    }

    fn to_body(&self) -> Result<Bytes, serde_json::Error> {
        match self {
            Self::Text(value) => Ok(Bytes::copy_from_slice(value.as_bytes())),
            Self::Payload(bytes) => Ok(bytes.clone()),
            Self::Json(value) => Ok(Bytes::from(serde_json::to_vec(value)?)),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Bytes> for ArgValue {
    fn from(value: Bytes) -> Self {
        Self::Payload(value)
    }
}

/// A fully concrete request, derived from a descriptor and live arguments.
#[derive(Debug)]
pub struct ResolvedRequest {
    verb: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl ResolvedRequest {
    /// Builds the request for one call.
    ///
    /// `args` must match the descriptor's parameter list in length and
    /// order; `None` is only legal at an [`ParamRole::Unused`] position.
    ///
    /// # Errors
    ///
    /// Every failure here is a [`ContractError`]: a disagreement between
    /// the declaration and the supplied arguments, terminal by definition.
    pub fn build(
        descriptor: &SignatureDescriptor,
        base: &BaseUrl,
        args: &[Option<ArgValue>],
    ) -> Result<Self, ContractError> {
        ensure!(
            args.len() == descriptor.roles().len(),
            AritySnafu {
                declared: descriptor.roles().len(),
                supplied: args.len(),
            }
        );

        // Required arguments must all be present before anything is built.
        for (index, (role, arg)) in descriptor.roles().iter().zip(args).enumerate() {
            ensure!(
                arg.is_some() || matches!(role, ParamRole::Unused),
                MissingArgumentSnafu { index }
            );
        }

        let path_values = text_values(descriptor, args, |role| {
            matches!(role, ParamRole::PathVariable)
        })?;
        let mut target = base.trimmed();
        if !descriptor.path_template().starts_with('/') {
            target.push('/');
        }
        target.push_str(&expand_template(
            descriptor.path_template(),
            &path_values,
        )?);

        let query_pairs = query_pairs(descriptor, args)?;
        if !query_pairs.is_empty() {
            let rendered = serde_html_form::to_string(&query_pairs).context(QuerySnafu)?;
            // The template itself may already carry a query string.
            target.push(if target.contains('?') { '&' } else { '?' });
            target.push_str(&rendered);
        }

        let uri = target.parse::<Uri>().context(UriSnafu { uri: &*target })?;

        let mut headers = HeaderMap::new();
        let accept = descriptor
            .accept()
            .iter()
            .map(crate::signature::MediaType::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        headers.insert(ACCEPT, header_value(&accept)?);
        headers.insert(
            CONTENT_TYPE,
            header_value(descriptor.content_type().as_str())?,
        );

        for literal in descriptor.static_headers() {
            let (name, value) = literal
                .split_once(':')
                .context(HeaderLiteralSnafu {
                    header: literal.as_str(),
                })?;
            headers.append(header_name(name)?, header_value(value)?);
        }

        // Argument headers are applied after static ones and replace them.
        for (index, role) in descriptor.roles().iter().enumerate() {
            if let ParamRole::HeaderParam(name) = role {
                let value = argument_text(args, index)?;
                headers.insert(header_name(name)?, header_value(value)?);
            }
        }

        let mut body = None;
        if let Some(index) = descriptor
            .roles()
            .iter()
            .position(|role| matches!(role, ParamRole::Body))
        {
            let arg = args[index].as_ref().context(MissingArgumentSnafu { index })?;
            body = Some(arg.to_body().context(BodyEncodeSnafu)?);
        }

        Ok(Self {
            verb: descriptor.verb().clone(),
            uri,
            headers,
            body,
        })
    }

    /// The HTTP verb.
    #[must_use]
    pub fn verb(&self) -> &Method {
        &self.verb
    }

    /// The fully resolved, percent-encoded target URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The complete header map.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The body payload, if the method declares one.
    #[must_use]
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Converts into the request envelope the transport executes.
    #[must_use]
    pub fn into_request(self) -> Request<Bytes> {
        let (mut parts, ()) = Request::new(()).into_parts();
        parts.method = self.verb;
        parts.uri = self.uri;
        parts.headers = self.headers;
        Request::from_parts(parts, self.body.unwrap_or_default())
    }
}

/// Collects the text values of arguments whose role matches `select`, in
/// declaration order.
fn text_values<'a>(
    descriptor: &SignatureDescriptor,
    args: &'a [Option<ArgValue>],
    select: impl Fn(&ParamRole) -> bool,
) -> Result<Vec<&'a str>, ContractError> {
    descriptor
        .roles()
        .iter()
        .enumerate()
        .filter(|(_, role)| select(role))
        .map(|(index, _)| argument_text(args, index))
        .collect()
}

fn argument_text(args: &[Option<ArgValue>], index: usize) -> Result<&str, ContractError> {
    args[index]
        .as_ref()
        .context(MissingArgumentSnafu { index })?
        .as_text()
        .context(TextExpectedSnafu { index })
}

/// Replaces the template's `{placeholder}` segments left to right with the
/// supplied values. Placeholders are filled by parameter declaration order;
/// the placeholder's own name is never consulted. Surplus values are
/// ignored.
fn expand_template(template: &str, values: &[&str]) -> Result<String, ContractError> {
    let mut expanded = String::with_capacity(template.len());
    let mut values = values.iter().copied();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        expanded.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];
        let close = after_open
            .find('}')
            .context(TemplateSnafu { template })?;
        let value = values.next().context(PathVariablesSnafu { template })?;
        expanded.extend(utf8_percent_encode(value, PATH_SEGMENT));
        rest = &after_open[close + 1..];
    }
    expanded.push_str(rest);
    Ok(expanded)
}

/// Collects query pairs in declaration order. A key declared twice keeps
/// its first position but takes the last value, map semantics.
fn query_pairs(
    descriptor: &SignatureDescriptor,
    args: &[Option<ArgValue>],
) -> Result<Vec<(String, String)>, ContractError> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for (index, role) in descriptor.roles().iter().enumerate() {
        if let ParamRole::QueryParam(key) = role {
            let value = argument_text(args, index)?;
            if let Some(existing) = pairs.iter_mut().find(|(name, _)| name == key) {
                existing.1 = value.to_string();
            } else {
                pairs.push((key.clone(), value.to_string()));
            }
        }
    }
    Ok(pairs)
}

fn header_name(name: &str) -> Result<HeaderName, ContractError> {
    name.parse::<HeaderName>()
        .context(HeaderNameSnafu { name })
}

fn header_value(value: &str) -> Result<HeaderValue, ContractError> {
    HeaderValue::from_str(value).context(HeaderValueSnafu { value })
}

/// A disagreement between a method's declaration and how it was invoked.
///
/// Contract violations represent caller or declaration bugs. They are
/// always terminal and never retried.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ContractError {
    /// No method with the invoked name was declared on the client.
    #[snafu(display("method {name:?} is not declared on this client"))]
    UnknownMethod {
        /// The invoked method name.
        name: String,
    },
    /// The argument vector does not match the declared parameter list.
    #[snafu(display("{declared} parameters declared but {supplied} arguments supplied"))]
    Arity {
        /// Number of declared parameters.
        declared: usize,
        /// Number of supplied arguments.
        supplied: usize,
    },
    /// An argument required by the descriptor was not supplied.
    #[snafu(display("argument {index} is required but was not supplied"))]
    MissingArgument {
        /// Position of the absent argument.
        index: usize,
    },
    /// A path, query, or header position was given a non-text argument.
    #[snafu(display("argument {index} must be a text value"))]
    TextExpected {
        /// Position of the offending argument.
        index: usize,
    },
    /// A placeholder in the path template is never closed.
    #[snafu(display("path template {template:?} has an unterminated placeholder"))]
    Template {
        /// The offending template.
        template: String,
    },
    /// The template has more placeholders than path-variable arguments.
    #[snafu(display(
        "path template {template:?} has more placeholders than path-variable arguments"
    ))]
    PathVariables {
        /// The offending template.
        template: String,
    },
    /// The query pairs could not be encoded.
    #[snafu(display("cannot encode query parameters"))]
    Query {
        /// The underlying error.
        source: serde_html_form::ser::Error,
    },
    /// The composed target failed URI validation.
    #[snafu(display("composed target {uri:?} is not a valid URI"))]
    Uri {
        /// The rejected URI string.
        uri: String,
        /// The underlying error.
        source: http::uri::InvalidUri,
    },
    /// A static header literal is missing its `name:value` separator.
    #[snafu(display("header literal {header:?} is missing a ':' separator"))]
    HeaderLiteral {
        /// The rejected literal.
        header: String,
    },
    /// A header name was rejected by the HTTP layer.
    #[snafu(display("invalid header name {name:?}"))]
    HeaderName {
        /// The rejected name.
        name: String,
        /// The underlying error.
        source: http::header::InvalidHeaderName,
    },
    /// A header value was rejected by the HTTP layer.
    #[snafu(display("invalid header value {value:?}"))]
    HeaderValue {
        /// The rejected value.
        value: String,
        /// The underlying error.
        source: http::header::InvalidHeaderValue,
    },
    /// The body argument could not be serialized.
    #[snafu(display("cannot serialize the body argument"))]
    BodyEncode {
        /// The underlying error.
        source: serde_json::Error,
    },
}

impl crate::Error for ContractError {
    fn is_retryable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use http::Method;

    use crate::IntoBaseUrl;
    use crate::signature::{MethodDecl, ParamDecl, SignatureDescriptor};

    fn base() -> BaseUrl {
        "http://localhost:8080".into_base_url().unwrap()
    }

    fn descriptor(decl: &MethodDecl) -> SignatureDescriptor {
        SignatureDescriptor::derive(decl).unwrap()
    }

    #[test]
    fn a_method_without_body_parameter_sends_no_payload() {
        let decl = MethodDecl::builder()
            .params(vec![ParamDecl::query("page")])
            .build();
        let request = ResolvedRequest::build(
            &descriptor(&decl),
            &base(),
            &[Some(ArgValue::text(2))],
        )
        .unwrap();

        assert!(request.body().is_none());
        let envelope = request.into_request();
        assert!(envelope.body().is_empty());
    }

    #[test]
    fn only_the_first_untagged_argument_becomes_the_body() {
        let decl = MethodDecl::builder()
            .methods(vec![Method::POST])
            .params(vec![ParamDecl::Untagged, ParamDecl::Untagged])
            .build();
        let request = ResolvedRequest::build(
            &descriptor(&decl),
            &base(),
            &[
                Some(ArgValue::Payload(Bytes::from_static(b"first"))),
                Some(ArgValue::Payload(Bytes::from_static(b"ignored"))),
            ],
        )
        .unwrap();

        assert_eq!(request.body().unwrap().as_ref(), b"first");
        // The ignored argument must leave no other trace on the request.
        assert_eq!(request.uri().to_string(), "http://localhost:8080/");
    }

    #[test]
    fn path_variables_fill_placeholders_in_declaration_order() {
        let decl = MethodDecl::builder()
            .paths(["/repos/{owner}/{name}"])
            .params(vec![ParamDecl::Path, ParamDecl::Path])
            .build();
        let request = ResolvedRequest::build(
            &descriptor(&decl),
            &base(),
            &[Some(ArgValue::text("acme")), Some(ArgValue::text("widgets"))],
        )
        .unwrap();

        // First declared path argument lands in the first placeholder,
        // regardless of the placeholder names.
        assert_eq!(
            request.uri().to_string(),
            "http://localhost:8080/repos/acme/widgets"
        );
    }

    #[test]
    fn path_values_are_percent_encoded() {
        let decl = MethodDecl::builder()
            .paths(["/files/{name}"])
            .params(vec![ParamDecl::Path])
            .build();
        let request = ResolvedRequest::build(
            &descriptor(&decl),
            &base(),
            &[Some(ArgValue::text("a b/c"))],
        )
        .unwrap();

        assert_eq!(
            request.uri().to_string(),
            "http://localhost:8080/files/a%20b%2Fc"
        );
    }

    #[test]
    fn query_parameters_are_appended_and_encoded() {
        let decl = MethodDecl::builder()
            .params(vec![ParamDecl::query("q"), ParamDecl::query("page")])
            .build();
        let request = ResolvedRequest::build(
            &descriptor(&decl),
            &base(),
            &[Some(ArgValue::text("a b")), Some(ArgValue::text(3))],
        )
        .unwrap();

        assert_eq!(
            request.uri().to_string(),
            "http://localhost:8080/?q=a+b&page=3"
        );
    }

    #[test]
    fn duplicate_query_keys_keep_the_last_value() {
        let decl = MethodDecl::builder()
            .params(vec![ParamDecl::query("page"), ParamDecl::query("page")])
            .build();
        let request = ResolvedRequest::build(
            &descriptor(&decl),
            &base(),
            &[Some(ArgValue::text(1)), Some(ArgValue::text(2))],
        )
        .unwrap();

        assert_eq!(request.uri().to_string(), "http://localhost:8080/?page=2");
    }

    #[test]
    fn argument_headers_override_static_ones() {
        let decl = MethodDecl::builder()
            .headers(["X-Trace:static", "X-Keep:yes"])
            .params(vec![ParamDecl::header("X-Trace")])
            .build();
        let request = ResolvedRequest::build(
            &descriptor(&decl),
            &base(),
            &[Some(ArgValue::text("from-arg"))],
        )
        .unwrap();

        assert_eq!(request.headers().get("X-Trace").unwrap(), "from-arg");
        assert_eq!(request.headers().get("X-Keep").unwrap(), "yes");
    }

    #[test]
    fn accept_and_content_type_reflect_the_descriptor() {
        let decl = MethodDecl::builder()
            .produces(["application/json", "text/plain"])
            .consumes(["application/json"])
            .build();
        let request = ResolvedRequest::build(&descriptor(&decl), &base(), &[]).unwrap();

        assert_eq!(
            request.headers().get(ACCEPT).unwrap(),
            "application/json, text/plain"
        );
        assert_eq!(
            request.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn defaults_apply_when_nothing_is_declared() {
        let request =
            ResolvedRequest::build(&descriptor(&MethodDecl::builder().build()), &base(), &[])
                .unwrap();

        assert_eq!(request.verb(), &Method::GET);
        assert_eq!(request.uri().to_string(), "http://localhost:8080/");
        assert_eq!(request.headers().get(ACCEPT).unwrap(), "*/*");
        assert_eq!(
            request.headers().get(CONTENT_TYPE).unwrap(),
            "application/octet-stream"
        );
    }

    #[test]
    fn missing_required_arguments_violate_the_contract() {
        let decl = MethodDecl::builder()
            .params(vec![ParamDecl::query("page")])
            .build();

        let err = ResolvedRequest::build(&descriptor(&decl), &base(), &[None]).unwrap_err();
        assert!(matches!(err, ContractError::MissingArgument { index: 0 }));
        assert!(!crate::Error::is_retryable(&err));

        let err = ResolvedRequest::build(&descriptor(&decl), &base(), &[]).unwrap_err();
        assert!(matches!(err, ContractError::Arity { .. }));
    }

    #[test]
    fn unused_positions_tolerate_missing_arguments() {
        let decl = MethodDecl::builder()
            .params(vec![ParamDecl::Untagged, ParamDecl::Untagged])
            .build();
        let request = ResolvedRequest::build(
            &descriptor(&decl),
            &base(),
            &[Some(ArgValue::Payload(Bytes::from_static(b"body"))), None],
        )
        .unwrap();

        assert_eq!(request.body().unwrap().as_ref(), b"body");
    }

    #[test]
    fn too_few_path_arguments_violate_the_contract() {
        let decl = MethodDecl::builder()
            .paths(["/a/{x}/{y}"])
            .params(vec![ParamDecl::Path])
            .build();
        let err = ResolvedRequest::build(
            &descriptor(&decl),
            &base(),
            &[Some(ArgValue::text(1))],
        )
        .unwrap_err();

        assert!(matches!(err, ContractError::PathVariables { .. }));
    }

    #[test]
    fn envelope_carries_verb_uri_headers_and_body() {
        let decl = MethodDecl::builder()
            .methods(vec![Method::PUT])
            .paths(["/things/{id}"])
            .consumes(["application/json"])
            .params(vec![ParamDecl::Path, ParamDecl::Untagged])
            .build();
        let request = ResolvedRequest::build(
            &descriptor(&decl),
            &base(),
            &[
                Some(ArgValue::text(7)),
                Some(ArgValue::json(&serde_json::json!({"on": true})).unwrap()),
            ],
        )
        .unwrap();

        let envelope = request.into_request();
        assert_eq!(envelope.method(), &Method::PUT);
        assert_eq!(
            envelope.uri().to_string(),
            "http://localhost:8080/things/7"
        );
        assert_eq!(
            envelope.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(envelope.body().as_ref(), br#"{"on":true}"#);
    }
}
