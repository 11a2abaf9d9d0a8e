//! Grant-type flows and the registry dispatching to them.
//!
//! Each supported `grant_type` is a [`GrantFlow`]: a small state machine
//! that validates one extracted token request, drives the host's
//! [`DataHandler`] through the required lookups, and produces either a
//! token response or a [`FlowError`]. Flows share a fixed guard order,
//! stopping at the first failure:
//!
//! 1. parameter presence and shape (`invalid_request`),
//! 2. client authentication (`invalid_client`),
//! 3. grant-type authorization (`unauthorized_client`),
//! 4. scope check (`invalid_scope`),
//! 5. grant-material validity (`invalid_grant`).
//!
//! The [`FlowRegistry`] maps `grant_type` strings to flows. New grant types
//! are added by registering a flow value, not by touching the dispatcher.
//!
//! [`GrantFlow`]: trait.GrantFlow.html
//! [`DataHandler`]: ../primitives/handler/trait.DataHandler.html
//! [`FlowError`]: error/struct.FlowError.html
//! [`FlowRegistry`]: struct.FlowRegistry.html

pub mod authorization_code;
pub mod client_credentials;
pub mod device;
pub mod error;
pub mod password;
pub mod refresh;

use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::endpoint::params::TokenParams;
use crate::primitives::grant::{AccessToken, Client};
use crate::primitives::handler::{DataHandler, HandlerError};
use crate::primitives::scope::Scope;
use crate::primitives::Time;

use self::error::{ErrorCode, FlowError};

/// The token response shape of the protocol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Always `Bearer` for tokens issued by this crate.
    pub token_type: String,

    /// The issued bearer string.
    pub access_token: String,

    /// Lifetime of the token in seconds.
    pub expires_in: i64,

    /// The refresh token, when the host policy attached one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// The granted scope, space-delimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Build the response for a freshly issued token.
    pub fn bearer(token: &AccessToken) -> Self {
        TokenResponse {
            token_type: "Bearer".to_string(),
            access_token: token.token.clone(),
            expires_in: token.expires_in,
            refresh_token: token.refresh_token.clone(),
            scope: token.scope.as_ref().map(Scope::to_string),
        }
    }
}

/// Response of the device-code provisioning phase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAuthorization {
    /// The code the device polls the token endpoint with.
    pub device_code: String,

    /// The short code the resource owner enters out of band.
    pub user_code: String,

    /// Where the resource owner should go to enter the user code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_uri: Option<String>,

    /// Lifetime of the pair in seconds.
    pub expires_in: i64,

    /// Minimum seconds between polls.
    pub interval: i64,
}

/// Successful outcome of a token-endpoint flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrantResponse {
    /// An issued bearer token.
    Bearer(TokenResponse),

    /// A provisioned device code pair.
    Device(DeviceAuthorization),
}

/// A single grant-type state machine.
///
/// Implementations must be stateless per request: `execute` is a pure
/// function of the request, the handler, and `now`. The `now` instant is
/// sampled once at endpoint entry; all expiry comparisons inside a flow use
/// it so that one request observes one clock reading.
pub trait GrantFlow {
    /// The `grant_type` value this flow answers to.
    fn grant_type(&self) -> &'static str;

    /// Run the flow for one extracted request.
    fn execute(
        &self, handler: &mut dyn DataHandler, request: &TokenParams, now: Time,
    ) -> Result<GrantResponse, FlowError>;
}

/// Maps `grant_type` strings to the flow handling them.
#[derive(Default)]
pub struct FlowRegistry {
    flows: HashMap<&'static str, Box<dyn GrantFlow + Send + Sync>>,
}

impl FlowRegistry {
    /// A registry without any flows.
    pub fn empty() -> Self {
        FlowRegistry::default()
    }

    /// A registry with all built-in flows.
    pub fn standard() -> Self {
        let mut registry = FlowRegistry::empty();
        registry.register(Box::new(client_credentials::ClientCredentials));
        registry.register(Box::new(password::Password));
        registry.register(Box::new(authorization_code::AuthorizationCode));
        registry.register(Box::new(refresh::Refresh));
        registry.register(Box::new(device::DeviceCode::default()));
        registry.register(Box::new(device::DeviceToken));
        registry
    }

    /// Register a flow under its `grant_type`, replacing any previous one.
    pub fn register(&mut self, flow: Box<dyn GrantFlow + Send + Sync>) {
        self.flows.insert(flow.grant_type(), flow);
    }

    /// Look up the flow for a `grant_type`.
    pub fn get(&self, grant_type: &str) -> Option<&(dyn GrantFlow + Send + Sync)> {
        self.flows.get(grant_type).map(|flow| &**flow)
    }

    /// The registered `grant_type` values.
    pub fn grant_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.flows.keys().copied()
    }
}

/// Map a handler failure onto the protocol error the caller expected.
///
/// `NotFound` and `Denied` become `expected`; `Internal` becomes a bare
/// `server_error` with the detail kept in the log.
pub(crate) fn handler_failure(err: HandlerError, expected: ErrorCode) -> FlowError {
    match err {
        HandlerError::NotFound | HandlerError::Denied(_) => FlowError::new(expected),
        HandlerError::Internal(detail) => {
            warn!("data handler failure: {}", detail);
            FlowError::new(ErrorCode::ServerError)
        }
    }
}

/// Guards 1-3: credential presence, client authentication, grant-type
/// authorization.
pub(crate) fn authenticate_client(
    handler: &mut dyn DataHandler, request: &TokenParams, grant_type: &'static str,
) -> Result<Client, FlowError> {
    let (client_id, client_secret) = match request.credentials().pair() {
        Some(pair) => pair,
        None => {
            return Err(FlowError::with_description(
                ErrorCode::InvalidRequest,
                "client credentials are required",
            ))
        }
    };

    let client = handler
        .validate_client(client_id, client_secret, grant_type)
        .map_err(|err| handler_failure(err, ErrorCode::InvalidClient))?;

    if !client.may_use(grant_type) {
        return Err(FlowError::new(ErrorCode::UnauthorizedClient));
    }

    Ok(client)
}

/// Guard 4: parse the optional `scope` parameter and let the handler decide.
pub(crate) fn negotiate_scope(
    handler: &mut dyn DataHandler, client_id: &str, request: &TokenParams,
) -> Result<Option<Scope>, FlowError> {
    let scope = match request.get("scope") {
        None => None,
        Some(raw) => Some(raw.parse::<Scope>().map_err(|_| {
            FlowError::with_description(ErrorCode::InvalidScope, "malformed scope")
        })?),
    };

    handler
        .validate_scope(client_id, scope.as_ref())
        .map_err(|err| handler_failure(err, ErrorCode::InvalidScope))?;

    Ok(scope)
}
