//! The `authorization_code` (web server) grant.
//!
//! Redeems a single-use code minted at the end-user endpoint. The code must
//! belong to the authenticated client, match the redirection uri it was
//! negotiated under, be unexpired and unused. The record is marked used
//! *before* the token is issued so a concurrent replay observes the used
//! state; any mismatch or reuse answers with `invalid_grant`.
use crate::endpoint::params::TokenParams;
use crate::primitives::handler::DataHandler;
use crate::primitives::Time;

use super::error::{ErrorCode, FlowError};
use super::{authenticate_client, handler_failure, GrantFlow, GrantResponse, TokenResponse};

/// Exchanges authorization codes for tokens.
pub struct AuthorizationCode;

impl GrantFlow for AuthorizationCode {
    fn grant_type(&self) -> &'static str {
        "authorization_code"
    }

    fn execute(
        &self, handler: &mut dyn DataHandler, request: &TokenParams, now: Time,
    ) -> Result<GrantResponse, FlowError> {
        let client = authenticate_client(handler, request, self.grant_type())?;

        let code = request.require("code")?;
        let redirect_uri = request.require("redirect_uri")?;

        let auth_info = handler
            .get_auth_info_by_code(code)
            .map_err(|err| handler_failure(err, ErrorCode::InvalidGrant))?;

        // The code must have been issued to this client, for this uri.
        if auth_info.client_id != client.client_id {
            return Err(FlowError::new(ErrorCode::InvalidGrant));
        }
        if auth_info.redirect_uri.as_deref() != Some(redirect_uri) {
            return Err(FlowError::new(ErrorCode::InvalidGrant));
        }
        if !auth_info.code_usable(now) {
            return Err(FlowError::new(ErrorCode::InvalidGrant));
        }

        handler
            .mark_auth_info_used(&auth_info)
            .map_err(|err| handler_failure(err, ErrorCode::ServerError))?;

        let token = handler
            .create_or_update_access_token(&auth_info)
            .map_err(|err| handler_failure(err, ErrorCode::ServerError))?;

        Ok(GrantResponse::Bearer(TokenResponse::bearer(&token)))
    }
}
