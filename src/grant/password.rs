//! The resource-owner `password` grant.
//!
//! The client forwards the owner's username and password; the handler
//! authenticates the owner and the resulting grant record is bound to them.
//! Wrong owner credentials are grant material, not client authentication,
//! and therefore answer with `invalid_grant`.
use crate::endpoint::params::TokenParams;
use crate::primitives::handler::DataHandler;
use crate::primitives::Time;

use super::error::{ErrorCode, FlowError};
use super::{
    authenticate_client, handler_failure, negotiate_scope, GrantFlow, GrantResponse, TokenResponse,
};

/// Issues tokens against resource-owner credentials.
pub struct Password;

impl GrantFlow for Password {
    fn grant_type(&self) -> &'static str {
        "password"
    }

    fn execute(
        &self, handler: &mut dyn DataHandler, request: &TokenParams, _now: Time,
    ) -> Result<GrantResponse, FlowError> {
        let client = authenticate_client(handler, request, self.grant_type())?;

        let username = request.require("username")?;
        let password = request.require("password")?;

        let scope = negotiate_scope(handler, &client.client_id, request)?;

        let user_id = handler
            .get_user(username, password)
            .map_err(|err| handler_failure(err, ErrorCode::InvalidGrant))?;

        let auth_info = handler
            .create_or_update_auth_info(&client.client_id, Some(&user_id), scope.as_ref(), None)
            .map_err(|err| handler_failure(err, ErrorCode::InvalidGrant))?;

        let token = handler
            .create_or_update_access_token(&auth_info)
            .map_err(|err| handler_failure(err, ErrorCode::ServerError))?;

        Ok(GrantResponse::Bearer(TokenResponse::bearer(&token)))
    }
}
