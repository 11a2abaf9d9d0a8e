//! Protecting resources with bearer tokens.
//!
//! The guard extracts a bearer credential from the `Authorization` header,
//! the form body (`oauth_token` or `access_token`), or the query string. A
//! request supplying tokens through more than one of those, or both
//! parameter names at once, is rejected as `invalid_request` without any
//! data handler call. A found token is resolved and checked against the
//! request's clock reading; the resolved token and its grant record are
//! returned for the host to attach to its request context.
use std::fmt;

use chrono::Utc;
use log::warn;

use crate::grant::error::ErrorCode;
use crate::primitives::grant::{AccessToken, AuthInfo};
use crate::primitives::handler::{DataHandler, HandlerError};
use crate::primitives::scope::Scope;
use crate::primitives::Time;

use super::params::{parse_authorization, ParsedAuthorization};
use super::query::NormalizedParameter;
use super::{Request, Response, Status};

/// Token metadata attached to an admitted request.
#[derive(Clone, Debug)]
pub struct Authorized {
    /// The resolved access token.
    pub token: AccessToken,

    /// The grant record the token was issued from.
    pub auth_info: AuthInfo,
}

/// An error signalling that resource access was not permitted.
#[derive(Clone, Debug)]
pub enum GuardError {
    /// The request supplied no bearer material at all.
    NoAuthentication {
        /// Realm for the challenge.
        realm: String,
    },

    /// Bearer material was malformed or supplied through several carriers.
    InvalidRequest {
        /// Realm for the challenge.
        realm: String,
    },

    /// The token is unknown, expired, or revoked.
    InvalidToken {
        /// Realm for the challenge.
        realm: String,
    },

    /// The token is valid but does not cover the required scope.
    InsufficientScope {
        /// Realm for the challenge.
        realm: String,
        /// The scope the resource requires.
        scope: Scope,
    },

    /// The data handler failed; no challenge is sent.
    Internal,
}

impl GuardError {
    /// The status the response must carry.
    pub fn status(&self) -> Status {
        match self {
            GuardError::NoAuthentication { .. } => Status::Unauthorized,
            GuardError::InvalidRequest { .. } => Status::BadRequest,
            GuardError::InvalidToken { .. } => Status::Unauthorized,
            GuardError::InsufficientScope { .. } => Status::Forbidden,
            GuardError::Internal => Status::InternalServerError,
        }
    }

    /// The content of the `WWW-Authenticate` header, if one applies.
    ///
    /// A request without any bearer material is challenged with the bare
    /// realm; every other rejection names its error code.
    pub fn www_authenticate(&self) -> Option<String> {
        let mut header = BearerHeader::new();
        match self {
            GuardError::NoAuthentication { realm } => {
                header.add_kvp("realm", Some(realm));
            }
            GuardError::InvalidRequest { realm } => {
                header.add_kvp("realm", Some(realm));
                header.add_kvp("error", Some(ErrorCode::InvalidRequest.as_str()));
            }
            GuardError::InvalidToken { realm } => {
                header.add_kvp("realm", Some(realm));
                header.add_kvp("error", Some(ErrorCode::InvalidToken.as_str()));
            }
            GuardError::InsufficientScope { realm, scope } => {
                header.add_kvp("realm", Some(realm));
                header.add_kvp("error", Some(ErrorCode::InsufficientScope.as_str()));
                header.add_kvp("scope", Some(scope));
            }
            GuardError::Internal => return None,
        }
        Some(header.finalize())
    }

    /// Turn the rejection into a complete response.
    pub fn into_response(self) -> Response {
        let mut response = Response::with_status(self.status());
        response.www_authenticate = self.www_authenticate();
        response
    }
}

struct BearerHeader {
    content: String,
    first_option: bool,
}

impl BearerHeader {
    fn new() -> Self {
        BearerHeader {
            content: "Bearer".to_string(),
            first_option: true,
        }
    }

    fn add_kvp(&mut self, key: &'static str, value: Option<impl fmt::Display>) {
        if let Some(value) = value {
            if self.first_option {
                self.content.push(' ');
                self.first_option = false;
            } else {
                self.content.push_str(", ");
            }
            self.content.push_str(&format!("{}=\"{}\"", key, value));
        }
    }

    fn finalize(self) -> String {
        self.content
    }
}

/// Bearer-token guard for a protected resource.
pub struct ResourceGuard {
    realm: String,
    required_scope: Option<Scope>,
    optional: bool,
}

impl ResourceGuard {
    /// A guard challenging with the given realm, requiring a token on every
    /// request and no particular scope.
    pub fn new(realm: impl Into<String>) -> Self {
        ResourceGuard {
            realm: realm.into(),
            required_scope: None,
            optional: false,
        }
    }

    /// Require the granted scope to cover the given one.
    pub fn require_scope(mut self, scope: Scope) -> Self {
        self.required_scope = Some(scope);
        self
    }

    /// Admit requests without any bearer material instead of rejecting
    /// them; such requests resolve to `Ok(None)`.
    pub fn allow_anonymous(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Decide access for one request, sampling the clock now.
    pub fn protect(
        &self, handler: &mut dyn DataHandler, request: &Request,
    ) -> Result<Option<Authorized>, GuardError> {
        self.protect_at(handler, request, Utc::now())
    }

    /// Decide access for one request against the given clock reading.
    pub fn protect_at(
        &self, handler: &mut dyn DataHandler, request: &Request, now: Time,
    ) -> Result<Option<Authorized>, GuardError> {
        let token = match self.extract_token(request)? {
            Some(token) => token,
            None if self.optional => return Ok(None),
            None => {
                return Err(GuardError::NoAuthentication {
                    realm: self.realm.clone(),
                })
            }
        };

        let token = match handler.get_access_token(&token) {
            Ok(token) => token,
            Err(HandlerError::Internal(detail)) => {
                warn!("data handler failure: {}", detail);
                return Err(GuardError::Internal);
            }
            Err(_) => {
                return Err(GuardError::InvalidToken {
                    realm: self.realm.clone(),
                })
            }
        };

        if token.expired(now) {
            return Err(GuardError::InvalidToken {
                realm: self.realm.clone(),
            });
        }

        let auth_info = match handler.get_auth_info_by_id(&token.auth_id) {
            Ok(info) => info,
            Err(HandlerError::Internal(detail)) => {
                warn!("data handler failure: {}", detail);
                return Err(GuardError::Internal);
            }
            Err(_) => {
                return Err(GuardError::InvalidToken {
                    realm: self.realm.clone(),
                })
            }
        };

        if let Some(required) = &self.required_scope {
            let covered = token
                .scope
                .as_ref()
                .map_or(false, |granted| required.is_subset_of(granted));
            if !covered {
                return Err(GuardError::InsufficientScope {
                    realm: self.realm.clone(),
                    scope: required.clone(),
                });
            }
        }

        Ok(Some(Authorized { token, auth_info }))
    }

    /// Find the bearer token among the three carriers, enforcing that only
    /// one of them supplies one.
    fn extract_token(&self, request: &Request) -> Result<Option<String>, GuardError> {
        let invalid = || GuardError::InvalidRequest {
            realm: self.realm.clone(),
        };

        let mut found: Vec<String> = Vec::new();

        if let Some(header) = request.authorization() {
            match parse_authorization(header) {
                Ok(ParsedAuthorization::Bearer(token)) => found.push(token),
                // Basic authorization is no bearer material here.
                Ok(ParsedAuthorization::Basic { .. }) => {}
                Err(_) => return Err(invalid()),
            }
        }

        if request.method().allows_body() {
            if let Some(body) = request.body() {
                if let Some(token) = carrier_token(body).map_err(|_| invalid())? {
                    found.push(token);
                }
            }
        }

        if let Some(token) = carrier_token(request.query()).map_err(|_| invalid())? {
            found.push(token);
        }

        if found.len() > 1 {
            return Err(invalid());
        }
        Ok(found.pop())
    }
}

struct CarrierConflict;

/// The token in one parameter carrier, if any.
///
/// Both recognized parameter names in one carrier, or a repeated parameter,
/// are a conflict.
fn carrier_token(params: &NormalizedParameter) -> Result<Option<String>, CarrierConflict> {
    if params.is_poisoned("oauth_token") || params.is_poisoned("access_token") {
        return Err(CarrierConflict);
    }
    match (
        params.unique_value("oauth_token"),
        params.unique_value("access_token"),
    ) {
        (Some(_), Some(_)) => Err(CarrierConflict),
        (Some(token), None) | (None, Some(token)) => Ok(Some(token.to_string())),
        (None, None) => Ok(None),
    }
}
