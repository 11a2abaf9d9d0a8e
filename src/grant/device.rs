//! The two-phase device grant.
//!
//! Phase one (`device_code`): an input-constrained device authenticates and
//! receives a `device_code`/`user_code` pair; the resource owner enters the
//! user code elsewhere. Phase two (`device_token`): the device polls the
//! token endpoint with the device code and is answered with
//! `authorization_pending`, `slow_down`, `access_denied`, `expired_token`,
//! or the token response once the owner approved.
//!
//! Clients permitted the device flow list both `device_code` and
//! `device_token` in their allowed grants.
use crate::endpoint::params::TokenParams;
use crate::primitives::grant::DeviceGrantState;
use crate::primitives::handler::DataHandler;
use crate::primitives::Time;

use super::error::{ErrorCode, FlowError};
use super::{
    authenticate_client, handler_failure, negotiate_scope, DeviceAuthorization, GrantFlow,
    GrantResponse, TokenResponse,
};

/// Provisions device code pairs (phase one).
#[derive(Default)]
pub struct DeviceCode {
    /// Where the resource owner should enter the user code, if the host
    /// wants the address conveyed in the response.
    pub verification_uri: Option<String>,
}

impl DeviceCode {
    /// Provision with a verification uri included in every response.
    pub fn with_verification_uri(uri: impl Into<String>) -> Self {
        DeviceCode {
            verification_uri: Some(uri.into()),
        }
    }
}

impl GrantFlow for DeviceCode {
    fn grant_type(&self) -> &'static str {
        "device_code"
    }

    fn execute(
        &self, handler: &mut dyn DataHandler, request: &TokenParams, now: Time,
    ) -> Result<GrantResponse, FlowError> {
        let client = authenticate_client(handler, request, self.grant_type())?;
        let scope = negotiate_scope(handler, &client.client_id, request)?;

        let grant = handler
            .create_device_grant(&client.client_id, scope.as_ref())
            .map_err(|err| handler_failure(err, ErrorCode::ServerError))?;

        Ok(GrantResponse::Device(DeviceAuthorization {
            device_code: grant.device_code,
            user_code: grant.user_code,
            verification_uri: self.verification_uri.clone(),
            expires_in: (grant.expires_at - now).num_seconds(),
            interval: grant.interval,
        }))
    }
}

/// Polls a device code for the owner's verdict (phase two).
pub struct DeviceToken;

impl GrantFlow for DeviceToken {
    fn grant_type(&self) -> &'static str {
        "device_token"
    }

    fn execute(
        &self, handler: &mut dyn DataHandler, request: &TokenParams, now: Time,
    ) -> Result<GrantResponse, FlowError> {
        let client = authenticate_client(handler, request, self.grant_type())?;

        let device_code = request.require("device_code")?;

        let grant = handler
            .get_device_grant(device_code)
            .map_err(|err| handler_failure(err, ErrorCode::InvalidGrant))?;

        if grant.client_id != client.client_id || grant.consumed {
            return Err(FlowError::new(ErrorCode::InvalidGrant));
        }
        if grant.expires_at <= now {
            return Err(FlowError::new(ErrorCode::ExpiredToken));
        }

        // Pacing is judged against the previous poll; this one is recorded
        // regardless of the outcome.
        let too_fast = grant
            .last_polled_at
            .map_or(false, |last| (now - last).num_seconds() < grant.interval);
        handler
            .record_device_poll(device_code, now)
            .map_err(|err| handler_failure(err, ErrorCode::ServerError))?;
        if too_fast {
            return Err(FlowError::new(ErrorCode::SlowDown));
        }

        let user_id = match grant.state {
            DeviceGrantState::Pending => {
                return Err(FlowError::new(ErrorCode::AuthorizationPending))
            }
            DeviceGrantState::Denied => return Err(FlowError::new(ErrorCode::AccessDenied)),
            DeviceGrantState::Approved { user_id } => user_id,
        };

        handler
            .consume_device_grant(device_code)
            .map_err(|err| handler_failure(err, ErrorCode::ServerError))?;

        let auth_info = handler
            .create_or_update_auth_info(&grant.client_id, Some(&user_id), grant.scope.as_ref(), None)
            .map_err(|err| handler_failure(err, ErrorCode::ServerError))?;

        let token = handler
            .create_or_update_access_token(&auth_info)
            .map_err(|err| handler_failure(err, ErrorCode::ServerError))?;

        Ok(GrantResponse::Bearer(TokenResponse::bearer(&token)))
    }
}
