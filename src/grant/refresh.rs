//! The `refresh_token` grant.
//!
//! Trades a refresh token for a fresh access token. The refresh token must
//! belong to the authenticated client; a requested scope must be a subset of
//! the originating grant's scope and becomes the scope of the new token.
//! Whether the refresh token itself is rotated is host policy: the response
//! carries whatever refresh token the handler attached to the new access
//! token.
use crate::endpoint::params::TokenParams;
use crate::primitives::handler::DataHandler;
use crate::primitives::scope::Scope;
use crate::primitives::Time;

use super::error::{ErrorCode, FlowError};
use super::{authenticate_client, handler_failure, GrantFlow, GrantResponse, TokenResponse};

/// Exchanges refresh tokens for new access tokens.
pub struct Refresh;

impl GrantFlow for Refresh {
    fn grant_type(&self) -> &'static str {
        "refresh_token"
    }

    fn execute(
        &self, handler: &mut dyn DataHandler, request: &TokenParams, now: Time,
    ) -> Result<GrantResponse, FlowError> {
        let client = authenticate_client(handler, request, self.grant_type())?;

        let refresh_token = request.require("refresh_token")?;

        let mut auth_info = handler
            .get_auth_info_by_refresh_token(refresh_token)
            .map_err(|err| handler_failure(err, ErrorCode::InvalidGrant))?;

        if auth_info.client_id != client.client_id {
            return Err(FlowError::new(ErrorCode::InvalidGrant));
        }
        if !auth_info.refresh_usable(now) {
            return Err(FlowError::new(ErrorCode::InvalidGrant));
        }

        // A narrower scope may be requested; never a wider one.
        if let Some(raw) = request.get("scope") {
            let requested = raw.parse::<Scope>().map_err(|_| {
                FlowError::with_description(ErrorCode::InvalidScope, "malformed scope")
            })?;
            let original = auth_info.scope.as_ref().ok_or_else(|| {
                FlowError::with_description(
                    ErrorCode::InvalidScope,
                    "the originating grant carries no scope",
                )
            })?;
            if !requested.is_subset_of(original) {
                return Err(FlowError::with_description(
                    ErrorCode::InvalidScope,
                    "scope exceeds the originating grant",
                ));
            }
            auth_info.scope = Some(requested);
        }

        let token = handler
            .create_or_update_access_token(&auth_info)
            .map_err(|err| handler_failure(err, ErrorCode::ServerError))?;

        Ok(GrantResponse::Bearer(TokenResponse::bearer(&token)))
    }
}
