//! Extraction of token-request parameters across their three carriers.
//!
//! Parameters may arrive in the request body, in the query string, and,
//! for client credentials, in the `Authorization` header. This module
//! flattens the carriers into one view under the strict rules of the
//! protocol: credentials travel in at most one carrier, a parameter present
//! in both body and query must agree on its value, and a repeated parameter
//! is never usable. Violations fail with `invalid_request` before any data
//! handler call is made.
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::grant::error::{ErrorCode, FlowError};

use super::query::NormalizedParameter;
use super::Request;

/// Where the client credentials travelled, and their values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    /// No credentials accompanied the request.
    None,

    /// `Authorization: Basic` header.
    Header {
        /// The decoded client identifier.
        client_id: String,
        /// The decoded client secret.
        client_secret: String,
    },

    /// `client_id`/`client_secret` form-body parameters.
    Body {
        /// The client identifier.
        client_id: String,
        /// The client secret.
        client_secret: String,
    },

    /// `client_id`/`client_secret` query parameters.
    Query {
        /// The client identifier.
        client_id: String,
        /// The client secret.
        client_secret: String,
    },
}

impl Credentials {
    /// The id/secret pair, whatever the carrier.
    pub fn pair(&self) -> Option<(&str, &str)> {
        match self {
            Credentials::None => None,
            Credentials::Header {
                client_id,
                client_secret,
            }
            | Credentials::Body {
                client_id,
                client_secret,
            }
            | Credentials::Query {
                client_id,
                client_secret,
            } => Some((client_id, client_secret)),
        }
    }

    /// Whether the credentials came in as HTTP Basic.
    ///
    /// Decides between 400 and 401 when client authentication fails.
    pub fn via_basic(&self) -> bool {
        matches!(self, Credentials::Header { .. })
    }
}

/// The flat parameter view over one token request.
#[derive(Clone, Debug)]
pub struct TokenParams {
    params: NormalizedParameter,
    credentials: Credentials,
}

impl TokenParams {
    /// Get a parameter that appeared exactly once.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.unique_value(key)
    }

    /// Get a required parameter or fail with `invalid_request`.
    pub fn require(&self, key: &str) -> Result<&str, FlowError> {
        match self.params.unique_value(key) {
            Some(value) => Ok(value),
            None if self.params.is_poisoned(key) => Err(FlowError::with_description(
                ErrorCode::InvalidRequest,
                format!("parameter `{}` must appear exactly once", key),
            )),
            None => Err(FlowError::with_description(
                ErrorCode::InvalidRequest,
                format!("missing parameter `{}`", key),
            )),
        }
    }

    /// The tagged credential carrier.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

/// A parsed `Authorization` header.
#[derive(Clone, Debug)]
pub(crate) enum ParsedAuthorization {
    /// `Basic` scheme credentials.
    Basic {
        client_id: String,
        client_secret: String,
    },
    /// `Bearer` or `OAuth` scheme token.
    Bearer(String),
}

/// The header was present but not usable.
pub(crate) struct MalformedHeader;

/// Parse an `Authorization` header value.
///
/// `Basic` must decode to utf-8 `id:secret` where the secret may itself
/// contain colons. Scheme names match case-insensitively; anything other
/// than `Basic`, `Bearer`, or `OAuth` is malformed.
pub(crate) fn parse_authorization(header: &str) -> Result<ParsedAuthorization, MalformedHeader> {
    let (scheme, rest) = header.split_once(' ').ok_or(MalformedHeader)?;
    let rest = rest.trim();
    if rest.is_empty() {
        return Err(MalformedHeader);
    }

    if scheme.eq_ignore_ascii_case("basic") {
        let decoded = STANDARD.decode(rest).map_err(|_| MalformedHeader)?;
        let decoded = String::from_utf8(decoded).map_err(|_| MalformedHeader)?;
        let (client_id, client_secret) = decoded.split_once(':').ok_or(MalformedHeader)?;
        Ok(ParsedAuthorization::Basic {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    } else if scheme.eq_ignore_ascii_case("bearer") || scheme.eq_ignore_ascii_case("oauth") {
        Ok(ParsedAuthorization::Bearer(rest.to_string()))
    } else {
        Err(MalformedHeader)
    }
}

fn carrier_credentials(
    params: &NormalizedParameter, carrier: &str,
) -> Result<Option<(String, String)>, FlowError> {
    if params.is_poisoned("client_id") || params.is_poisoned("client_secret") {
        return Err(FlowError::with_description(
            ErrorCode::InvalidRequest,
            format!("client credentials repeated in the {}", carrier),
        ));
    }
    match (
        params.unique_value("client_id"),
        params.unique_value("client_secret"),
    ) {
        (Some(id), Some(secret)) => Ok(Some((id.to_string(), secret.to_string()))),
        (None, Some(_)) => Err(FlowError::with_description(
            ErrorCode::InvalidRequest,
            format!("client_secret without client_id in the {}", carrier),
        )),
        // An id alone does not make the carrier authoritative.
        _ => Ok(None),
    }
}

/// Run the extraction for one token request.
pub fn extract_token_params(request: &Request) -> Result<TokenParams, FlowError> {
    let header = match request.authorization() {
        None => None,
        Some(raw) => Some(parse_authorization(raw).map_err(|_| {
            FlowError::with_description(
                ErrorCode::InvalidRequest,
                "malformed or unsupported authorization header",
            )
        })?),
    };

    let empty = NormalizedParameter::new();
    let body = request.body().unwrap_or(&empty);
    let query = request.query();

    // Body wins the merge; a key in both carriers must agree on its value.
    let mut merged = NormalizedParameter::new();
    for (key, value) in body.iter() {
        merged.insert_raw(key.to_string(), value.map(str::to_string));
    }
    for (key, value) in query.iter() {
        if !body.contains(key) {
            merged.insert_raw(key.to_string(), value.map(str::to_string));
            continue;
        }
        match (body.unique_value(key), value) {
            (Some(body_value), Some(query_value)) if body_value == query_value => {}
            _ => {
                return Err(FlowError::with_description(
                    ErrorCode::InvalidRequest,
                    format!("parameter `{}` appears with conflicting values", key),
                ))
            }
        }
    }

    let header_creds = match header {
        Some(ParsedAuthorization::Basic {
            client_id,
            client_secret,
        }) => Some((client_id, client_secret)),
        // A bearer header is no client credential at the token endpoint.
        Some(ParsedAuthorization::Bearer(_)) | None => None,
    };
    let body_creds = carrier_credentials(body, "request body")?;
    let query_creds = carrier_credentials(query, "query string")?;

    let carriers = usize::from(header_creds.is_some())
        + usize::from(body_creds.is_some())
        + usize::from(query_creds.is_some());
    if carriers > 1 {
        return Err(FlowError::with_description(
            ErrorCode::InvalidRequest,
            "client credentials must travel in exactly one carrier",
        ));
    }

    let credentials = if let Some((client_id, client_secret)) = header_creds {
        Credentials::Header {
            client_id,
            client_secret,
        }
    } else if let Some((client_id, client_secret)) = body_creds {
        Credentials::Body {
            client_id,
            client_secret,
        }
    } else if let Some((client_id, client_secret)) = query_creds {
        Credentials::Query {
            client_id,
            client_secret,
        }
    } else {
        Credentials::None
    };

    Ok(TokenParams {
        params: merged,
        credentials,
    })
}
