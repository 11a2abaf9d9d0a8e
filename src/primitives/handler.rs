//! The persistence and authentication seam implemented by the host.
//!
//! The protocol core never touches storage directly. Every lookup, creation
//! and consumption of clients, grants and tokens goes through a single
//! [`DataHandler`] implementation supplied by the host application. The core
//! may call the operations in any order but only asks for tokens after the
//! corresponding grant has been validated, and it stops calling once a
//! request has failed.
//!
//! Implementations must be safe under whatever concurrency model the host
//! server runs. The check-and-mark pair around authorization codes
//! ([`get_auth_info_by_code`] and [`mark_auth_info_used`]) is expected to be
//! atomic with respect to concurrent exchanges of the same code; a handler
//! that cannot provide this lets two clients redeem one code, which is a
//! host bug and not detectable from inside the core.
//!
//! [`DataHandler`]: trait.DataHandler.html
//! [`get_auth_info_by_code`]: trait.DataHandler.html#tymethod.get_auth_info_by_code
//! [`mark_auth_info_used`]: trait.DataHandler.html#tymethod.mark_auth_info_used
use thiserror::Error;

use super::grant::{AccessToken, AuthInfo, Client, DeviceGrant};
use super::scope::Scope;
use super::Time;

/// Failure modes of a data handler call.
///
/// `NotFound` and `Denied` are the expected protocol-relevant answers and
/// are mapped to the matching OAuth error by the calling flow. Anything the
/// host store cannot answer cleanly is `Internal`: it surfaces to the client
/// as a bare `server_error` and the contained detail is only ever logged.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HandlerError {
    /// No record matches the lookup.
    #[error("no matching record")]
    NotFound,

    /// The host rejected the operation for policy reasons.
    ///
    /// The reason is for the host's own logs; flows translate `Denied` into
    /// the appropriate error code without distinguishing causes, so that an
    /// unknown client and a wrong secret stay indistinguishable.
    #[error("denied: {0}")]
    Denied(String),

    /// The backing store failed.
    #[error("storage failure: {0}")]
    Internal(String),
}

/// Shorthand for results of data handler operations.
pub type HandlerResult<T> = Result<T, HandlerError>;

/// The capability set the host provides for persistence and authentication.
///
/// See the module documentation for ordering and atomicity expectations.
pub trait DataHandler {
    /// Authenticate a client for use of the given grant type.
    ///
    /// Secrets are opaque byte strings and must be compared in constant
    /// time. Authorization of the grant type itself is evaluated by the core
    /// from the returned record's allowed-grants set; a handler may reject
    /// earlier but then the client learns `invalid_client` rather than
    /// `unauthorized_client`.
    fn validate_client(
        &mut self, client_id: &str, client_secret: &str, grant_type: &str,
    ) -> HandlerResult<Client>;

    /// Authenticate a resource owner and return their identifier.
    fn get_user(&mut self, username: &str, password: &str) -> HandlerResult<String>;

    /// Create, or refresh, the grant record for a client/owner pair.
    ///
    /// Called with `user_id: None` for client-credentials grants. When a
    /// `redirect_uri` is given the handler mints a fresh single-use code for
    /// the record.
    fn create_or_update_auth_info(
        &mut self, client_id: &str, user_id: Option<&str>, scope: Option<&Scope>,
        redirect_uri: Option<&str>,
    ) -> HandlerResult<AuthInfo>;

    /// Look up the grant record a code was minted for.
    fn get_auth_info_by_code(&mut self, code: &str) -> HandlerResult<AuthInfo>;

    /// Look up the grant record a refresh token is attached to.
    fn get_auth_info_by_refresh_token(&mut self, refresh_token: &str) -> HandlerResult<AuthInfo>;

    /// Look up a grant record by its identifier.
    fn get_auth_info_by_id(&mut self, id: &str) -> HandlerResult<AuthInfo>;

    /// Mark the record's code as exchanged. Idempotent.
    fn mark_auth_info_used(&mut self, auth_info: &AuthInfo) -> HandlerResult<()>;

    /// Materialize an access token for the given grant record.
    ///
    /// The record passed in may carry a narrower scope than the stored one
    /// (refresh exchanges); the issued token uses the passed scope. Whether
    /// the returned token carries the retained refresh token, a rotated one,
    /// or none at all is host policy.
    fn create_or_update_access_token(&mut self, auth_info: &AuthInfo) -> HandlerResult<AccessToken>;

    /// Resolve a bearer string to the issued token.
    fn get_access_token(&mut self, token: &str) -> HandlerResult<AccessToken>;

    /// Decide whether the client may be granted the requested scope.
    fn validate_scope(&mut self, client_id: &str, scope: Option<&Scope>) -> HandlerResult<()>;

    /// Decide whether the uri is registered for the client.
    fn validate_redirect_uri(&mut self, client_id: &str, redirect_uri: &str) -> HandlerResult<()>;

    /// Mint a `device_code`/`user_code` pair bound to the client and scope.
    fn create_device_grant(
        &mut self, client_id: &str, scope: Option<&Scope>,
    ) -> HandlerResult<DeviceGrant>;

    /// Look up a device grant by its device code.
    fn get_device_grant(&mut self, device_code: &str) -> HandlerResult<DeviceGrant>;

    /// Record that the device polled at the given instant.
    fn record_device_poll(&mut self, device_code: &str, now: Time) -> HandlerResult<()>;

    /// Mark an approved device grant as exchanged. Idempotent.
    fn consume_device_grant(&mut self, device_code: &str) -> HandlerResult<()>;
}

impl<'a, H: DataHandler + ?Sized> DataHandler for &'a mut H {
    fn validate_client(
        &mut self, client_id: &str, client_secret: &str, grant_type: &str,
    ) -> HandlerResult<Client> {
        (**self).validate_client(client_id, client_secret, grant_type)
    }

    fn get_user(&mut self, username: &str, password: &str) -> HandlerResult<String> {
        (**self).get_user(username, password)
    }

    fn create_or_update_auth_info(
        &mut self, client_id: &str, user_id: Option<&str>, scope: Option<&Scope>,
        redirect_uri: Option<&str>,
    ) -> HandlerResult<AuthInfo> {
        (**self).create_or_update_auth_info(client_id, user_id, scope, redirect_uri)
    }

    fn get_auth_info_by_code(&mut self, code: &str) -> HandlerResult<AuthInfo> {
        (**self).get_auth_info_by_code(code)
    }

    fn get_auth_info_by_refresh_token(&mut self, refresh_token: &str) -> HandlerResult<AuthInfo> {
        (**self).get_auth_info_by_refresh_token(refresh_token)
    }

    fn get_auth_info_by_id(&mut self, id: &str) -> HandlerResult<AuthInfo> {
        (**self).get_auth_info_by_id(id)
    }

    fn mark_auth_info_used(&mut self, auth_info: &AuthInfo) -> HandlerResult<()> {
        (**self).mark_auth_info_used(auth_info)
    }

    fn create_or_update_access_token(&mut self, auth_info: &AuthInfo) -> HandlerResult<AccessToken> {
        (**self).create_or_update_access_token(auth_info)
    }

    fn get_access_token(&mut self, token: &str) -> HandlerResult<AccessToken> {
        (**self).get_access_token(token)
    }

    fn validate_scope(&mut self, client_id: &str, scope: Option<&Scope>) -> HandlerResult<()> {
        (**self).validate_scope(client_id, scope)
    }

    fn validate_redirect_uri(&mut self, client_id: &str, redirect_uri: &str) -> HandlerResult<()> {
        (**self).validate_redirect_uri(client_id, redirect_uri)
    }

    fn create_device_grant(
        &mut self, client_id: &str, scope: Option<&Scope>,
    ) -> HandlerResult<DeviceGrant> {
        (**self).create_device_grant(client_id, scope)
    }

    fn get_device_grant(&mut self, device_code: &str) -> HandlerResult<DeviceGrant> {
        (**self).get_device_grant(device_code)
    }

    fn record_device_poll(&mut self, device_code: &str, now: Time) -> HandlerResult<()> {
        (**self).record_device_poll(device_code, now)
    }

    fn consume_device_grant(&mut self, device_code: &str) -> HandlerResult<()> {
        (**self).consume_device_grant(device_code)
    }
}

impl<H: DataHandler + ?Sized> DataHandler for Box<H> {
    fn validate_client(
        &mut self, client_id: &str, client_secret: &str, grant_type: &str,
    ) -> HandlerResult<Client> {
        (**self).validate_client(client_id, client_secret, grant_type)
    }

    fn get_user(&mut self, username: &str, password: &str) -> HandlerResult<String> {
        (**self).get_user(username, password)
    }

    fn create_or_update_auth_info(
        &mut self, client_id: &str, user_id: Option<&str>, scope: Option<&Scope>,
        redirect_uri: Option<&str>,
    ) -> HandlerResult<AuthInfo> {
        (**self).create_or_update_auth_info(client_id, user_id, scope, redirect_uri)
    }

    fn get_auth_info_by_code(&mut self, code: &str) -> HandlerResult<AuthInfo> {
        (**self).get_auth_info_by_code(code)
    }

    fn get_auth_info_by_refresh_token(&mut self, refresh_token: &str) -> HandlerResult<AuthInfo> {
        (**self).get_auth_info_by_refresh_token(refresh_token)
    }

    fn get_auth_info_by_id(&mut self, id: &str) -> HandlerResult<AuthInfo> {
        (**self).get_auth_info_by_id(id)
    }

    fn mark_auth_info_used(&mut self, auth_info: &AuthInfo) -> HandlerResult<()> {
        (**self).mark_auth_info_used(auth_info)
    }

    fn create_or_update_access_token(&mut self, auth_info: &AuthInfo) -> HandlerResult<AccessToken> {
        (**self).create_or_update_access_token(auth_info)
    }

    fn get_access_token(&mut self, token: &str) -> HandlerResult<AccessToken> {
        (**self).get_access_token(token)
    }

    fn validate_scope(&mut self, client_id: &str, scope: Option<&Scope>) -> HandlerResult<()> {
        (**self).validate_scope(client_id, scope)
    }

    fn validate_redirect_uri(&mut self, client_id: &str, redirect_uri: &str) -> HandlerResult<()> {
        (**self).validate_redirect_uri(client_id, redirect_uri)
    }

    fn create_device_grant(
        &mut self, client_id: &str, scope: Option<&Scope>,
    ) -> HandlerResult<DeviceGrant> {
        (**self).create_device_grant(client_id, scope)
    }

    fn get_device_grant(&mut self, device_code: &str) -> HandlerResult<DeviceGrant> {
        (**self).get_device_grant(device_code)
    }

    fn record_device_poll(&mut self, device_code: &str, now: Time) -> HandlerResult<()> {
        (**self).record_device_poll(device_code, now)
    }

    fn consume_device_grant(&mut self, device_code: &str) -> HandlerResult<()> {
        (**self).consume_device_grant(device_code)
    }
}
