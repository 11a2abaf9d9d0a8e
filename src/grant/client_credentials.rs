//! The `client_credentials` grant.
//!
//! A confidential client trades its own credentials directly for an access
//! token. There is no resource owner involved, so the resulting grant record
//! has none and no refresh token is attached unless the host policy emits
//! one.
use crate::endpoint::params::TokenParams;
use crate::primitives::handler::DataHandler;
use crate::primitives::Time;

use super::error::{ErrorCode, FlowError};
use super::{
    authenticate_client, handler_failure, negotiate_scope, GrantFlow, GrantResponse, TokenResponse,
};

/// Issues tokens to clients acting on their own behalf.
pub struct ClientCredentials;

impl GrantFlow for ClientCredentials {
    fn grant_type(&self) -> &'static str {
        "client_credentials"
    }

    fn execute(
        &self, handler: &mut dyn DataHandler, request: &TokenParams, _now: Time,
    ) -> Result<GrantResponse, FlowError> {
        let client = authenticate_client(handler, request, self.grant_type())?;
        let scope = negotiate_scope(handler, &client.client_id, request)?;

        let auth_info = handler
            .create_or_update_auth_info(&client.client_id, None, scope.as_ref(), None)
            .map_err(|err| handler_failure(err, ErrorCode::InvalidGrant))?;

        let token = handler
            .create_or_update_access_token(&auth_info)
            .map_err(|err| handler_failure(err, ErrorCode::ServerError))?;

        Ok(GrantResponse::Bearer(TokenResponse::bearer(&token)))
    }
}
