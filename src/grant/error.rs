//! The closed protocol error taxonomy.
//!
//! Every failure a flow or endpoint can report to a client is one of the
//! codes below, rendered as the standard `{"error": ...}` body or as an
//! attribute of a `WWW-Authenticate` challenge. There is deliberately no
//! string-typed error channel: callers match on [`ErrorCode`], never on
//! message text.
//!
//! [`ErrorCode`]: enum.ErrorCode.html

use std::borrow::Cow;
use std::fmt;
use std::str;
use std::vec;

use serde::{Deserialize, Serialize};

/// Error codes of the protocol. The set is closed.
///
/// `ServerError` exists because a handler failure must be reportable both in
/// a response body and through a redirect, where an HTTP 5xx status cannot
/// reach the client.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorCode {
    /// The request is missing a required parameter, repeats a parameter,
    /// carries credentials in more than one way, or is otherwise malformed.
    InvalidRequest,

    /// Client authentication failed.
    InvalidClient,

    /// The authenticated client is not authorized to use this grant type.
    UnauthorizedClient,

    /// The redirection uri does not match a registered one.
    RedirectUriMismatch,

    /// The resource owner or the server denied the request.
    AccessDenied,

    /// The server does not support obtaining authorization this way.
    UnsupportedResponseType,

    /// The grant type is not supported by this token endpoint.
    UnsupportedGrantType,

    /// The requested scope is invalid, unknown, malformed, or exceeds what
    /// was or may be granted.
    InvalidScope,

    /// The presented grant material (code, owner credentials, refresh
    /// token) is invalid, expired, consumed, or owned by another client.
    InvalidGrant,

    /// The bearer token is unknown, expired, or revoked.
    InvalidToken,

    /// The bearer token does not cover the required scope.
    InsufficientScope,

    /// The resource owner has not yet decided on the device grant.
    AuthorizationPending,

    /// The device polls faster than the advertised interval.
    SlowDown,

    /// The device code pair has expired.
    ExpiredToken,

    /// The server failed to fulfill an otherwise valid request.
    ServerError,
}

impl ErrorCode {
    /// The protocol spelling of the code.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::InvalidClient => "invalid_client",
            ErrorCode::UnauthorizedClient => "unauthorized_client",
            ErrorCode::RedirectUriMismatch => "redirect_uri_mismatch",
            ErrorCode::AccessDenied => "access_denied",
            ErrorCode::UnsupportedResponseType => "unsupported_response_type",
            ErrorCode::UnsupportedGrantType => "unsupported_grant_type",
            ErrorCode::InvalidScope => "invalid_scope",
            ErrorCode::InvalidGrant => "invalid_grant",
            ErrorCode::InvalidToken => "invalid_token",
            ErrorCode::InsufficientScope => "insufficient_scope",
            ErrorCode::AuthorizationPending => "authorization_pending",
            ErrorCode::SlowDown => "slow_down",
            ErrorCode::ExpiredToken => "expired_token",
            ErrorCode::ServerError => "server_error",
        }
    }
}

impl AsRef<str> for ErrorCode {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a string that is not a known error code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownErrorCode(String);

impl fmt::Display for UnknownErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "not a recognized error code: {}", self.0)
    }
}

impl str::FromStr for ErrorCode {
    type Err = UnknownErrorCode;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        Ok(match string {
            "invalid_request" => ErrorCode::InvalidRequest,
            "invalid_client" => ErrorCode::InvalidClient,
            "unauthorized_client" => ErrorCode::UnauthorizedClient,
            "redirect_uri_mismatch" => ErrorCode::RedirectUriMismatch,
            "access_denied" => ErrorCode::AccessDenied,
            "unsupported_response_type" => ErrorCode::UnsupportedResponseType,
            "unsupported_grant_type" => ErrorCode::UnsupportedGrantType,
            "invalid_scope" => ErrorCode::InvalidScope,
            "invalid_grant" => ErrorCode::InvalidGrant,
            "invalid_token" => ErrorCode::InvalidToken,
            "insufficient_scope" => ErrorCode::InsufficientScope,
            "authorization_pending" => ErrorCode::AuthorizationPending,
            "slow_down" => ErrorCode::SlowDown,
            "expired_token" => ErrorCode::ExpiredToken,
            "server_error" => ErrorCode::ServerError,
            other => return Err(UnknownErrorCode(other.to_string())),
        })
    }
}

impl Serialize for ErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let string = String::deserialize(deserializer)?;
        string.parse().map_err(serde::de::Error::custom)
    }
}

/// A failed flow, carrying the error code and optional human-facing detail.
///
/// The description and uri are additions for the client developer; they must
/// never contain host-internal detail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowError {
    code: ErrorCode,
    description: Option<Cow<'static, str>>,
    uri: Option<Cow<'static, str>>,
}

impl FlowError {
    /// Construct an error from its code alone.
    pub fn new(code: ErrorCode) -> Self {
        FlowError {
            code,
            description: None,
            uri: None,
        }
    }

    /// Construct an error with a short text explanation.
    pub fn with_description(code: ErrorCode, description: impl Into<Cow<'static, str>>) -> Self {
        FlowError {
            code,
            description: Some(description.into()),
            uri: None,
        }
    }

    /// The formal kind of the error.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Provide a short text explanation for the error.
    pub fn explain(&mut self, description: impl Into<Cow<'static, str>>) {
        self.description = Some(description.into());
    }

    /// A uri identifying a resource explaining the error in detail.
    pub fn explain_uri(&mut self, uri: url::Url) {
        self.uri = Some(String::from(uri).into())
    }

    /// The serializable response body for this error.
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.code,
            error_description: self.description.as_ref().map(|d| d.to_string()),
            error_uri: self.uri.as_ref().map(|u| u.to_string()),
        }
    }

    /// Iterate over the key value pairs that describe this error.
    ///
    /// These pairs are added to redirect queries and challenge headers.
    pub fn iter(&self) -> <&Self as IntoIterator>::IntoIter {
        self.into_iter()
    }
}

impl From<ErrorCode> for FlowError {
    fn from(code: ErrorCode) -> Self {
        FlowError::new(code)
    }
}

/// The error as key-value pairs.
impl IntoIterator for &'_ FlowError {
    type Item = (&'static str, Cow<'static, str>);
    type IntoIter = vec::IntoIter<(&'static str, Cow<'static, str>)>;

    fn into_iter(self) -> Self::IntoIter {
        let mut pairs = vec![("error", Cow::Borrowed(self.code.as_str()))];
        if let Some(description) = &self.description {
            pairs.push(("error_description", description.clone()));
        }
        if let Some(uri) = &self.uri {
            pairs.push(("error_uri", uri.clone()));
        }
        pairs.into_iter()
    }
}

/// Wire shape of an error response body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// The error code.
    pub error: ErrorCode,

    /// Optional short explanation for the client developer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,

    /// Optional uri with a detailed explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_spelling_roundtrip() {
        let codes = [
            ErrorCode::InvalidRequest,
            ErrorCode::InvalidClient,
            ErrorCode::UnauthorizedClient,
            ErrorCode::RedirectUriMismatch,
            ErrorCode::AccessDenied,
            ErrorCode::UnsupportedResponseType,
            ErrorCode::UnsupportedGrantType,
            ErrorCode::InvalidScope,
            ErrorCode::InvalidGrant,
            ErrorCode::InvalidToken,
            ErrorCode::InsufficientScope,
            ErrorCode::AuthorizationPending,
            ErrorCode::SlowDown,
            ErrorCode::ExpiredToken,
            ErrorCode::ServerError,
        ];
        for code in codes {
            assert_eq!(code.as_str().parse::<ErrorCode>().unwrap(), code);
        }
        assert!("not_a_code".parse::<ErrorCode>().is_err());
    }

    #[test]
    fn body_serialization() {
        let error = FlowError::with_description(ErrorCode::InvalidGrant, "code already used");
        let json = serde_json::to_string(&error.body()).unwrap();
        let parsed: ErrorBody = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.error, ErrorCode::InvalidGrant);
        assert_eq!(parsed.error_description.as_deref(), Some("code already used"));
        assert_eq!(parsed.error_uri, None);
    }

    #[test]
    fn bare_body_parses() {
        let parsed: ErrorBody = serde_json::from_str("{\"error\":\"invalid_client\"}").unwrap();
        assert_eq!(parsed.error, ErrorCode::InvalidClient);
        assert_eq!(parsed.error_description, None);
    }
}
