//! Owning records of the authorization data model.
//!
//! These can be stored in a database without worrying about lifetimes and
//! are what the [`DataHandler`] hands back and forth across the persistence
//! seam. Secrets never appear on any of them: a [`Client`] record is the
//! public identity of a client, authentication data stays inside the host
//! store.
//!
//! [`DataHandler`]: ../handler/trait.DataHandler.html
use std::collections::HashSet;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::scope::Scope;
use super::Time;

/// A registered client as seen by the protocol core.
///
/// The client either exists or it does not; its secret is compared inside
/// the data handler and is deliberately absent here so that no response can
/// ever echo it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// The public identifier of the client.
    pub client_id: String,

    /// Redirection uris registered for the client, matched verbatim.
    ///
    /// An empty list means the client takes part in no redirect-based flow.
    pub redirect_uris: Vec<String>,

    /// The `grant_type` values the client may use, `None` meaning all.
    pub allowed_grants: Option<HashSet<String>>,
}

impl Client {
    /// Create a client without grant-type restrictions.
    pub fn new(client_id: impl Into<String>) -> Self {
        Client {
            client_id: client_id.into(),
            redirect_uris: Vec::new(),
            allowed_grants: None,
        }
    }

    /// Register redirection uris, replacing any previous list.
    pub fn with_redirect_uris<I, U>(mut self, uris: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<String>,
    {
        self.redirect_uris = uris.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict the client to the given `grant_type` values.
    pub fn with_allowed_grants<I, G>(mut self, grants: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: Into<String>,
    {
        self.allowed_grants = Some(grants.into_iter().map(Into::into).collect());
        self
    }

    /// Whether the client is authorized for the given grant type.
    pub fn may_use(&self, grant_type: &str) -> bool {
        match &self.allowed_grants {
            None => true,
            Some(grants) => grants.contains(grant_type),
        }
    }

    /// Whether the uri appears verbatim in the registered list.
    pub fn redirect_registered(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|registered| registered == uri)
    }
}

/// An authorization grant: the recorded intent of a resource owner (or of a
/// client acting on its own behalf) to let a client obtain tokens.
///
/// Created at the end-user endpoint or by a flow, destroyed by host policy.
/// For the authorization-code flow it additionally carries a single-use
/// `code`; the flow marks the record used *before* issuing tokens, so a
/// concurrent replay observes the used state. The attached refresh token
/// outlives the access tokens issued from this record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthInfo {
    /// Identifier of this record in the host store.
    pub id: String,

    /// The client the grant was issued to.
    pub client_id: String,

    /// The resource owner, `None` for client-credentials grants.
    pub user_id: Option<String>,

    /// The granted scope.
    pub scope: Option<Scope>,

    /// The redirection uri the grant was negotiated under, if any.
    pub redirect_uri: Option<String>,

    /// The single-use authorization code, if one was minted.
    pub code: Option<String>,

    /// When the code stops being exchangeable, `None` meaning never.
    pub code_expires_at: Option<Time>,

    /// Whether the code has already been exchanged.
    pub code_used: bool,

    /// The refresh token attached to this grant, if any.
    pub refresh_token: Option<String>,

    /// When the refresh token stops being exchangeable, `None` meaning never.
    pub refresh_expires_at: Option<Time>,
}

impl AuthInfo {
    /// Whether the code may still be exchanged at the given instant.
    pub fn code_usable(&self, now: Time) -> bool {
        if self.code_used {
            return false;
        }
        match self.code_expires_at {
            Some(until) => now < until,
            None => true,
        }
    }

    /// Whether the refresh token may still be exchanged at the given instant.
    pub fn refresh_usable(&self, now: Time) -> bool {
        match self.refresh_expires_at {
            Some(until) => now < until,
            None => true,
        }
    }
}

/// An issued bearer token together with its issuance metadata.
///
/// Immutable after issuance; revocation is modelled as deletion in the host
/// store. Whether `refresh_token` is the retained, a rotated, or no refresh
/// token at all is the host's policy; the core echoes exactly what the
/// handler put here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    /// The opaque bearer string.
    pub token: String,

    /// The [`AuthInfo`] record the token was issued from.
    ///
    /// [`AuthInfo`]: struct.AuthInfo.html
    pub auth_id: String,

    /// The client owning the token.
    pub client_id: String,

    /// The resource owner, `None` for client-credentials grants.
    pub user_id: Option<String>,

    /// The granted scope.
    pub scope: Option<Scope>,

    /// Issuance timestamp.
    pub issued_at: Time,

    /// Lifetime in seconds from `issued_at`.
    pub expires_in: i64,

    /// The refresh token to hand to the client, if any.
    pub refresh_token: Option<String>,
}

impl AccessToken {
    /// The instant the token stops being valid.
    pub fn expires_at(&self) -> Time {
        self.issued_at + Duration::seconds(self.expires_in)
    }

    /// Whether the token is expired at the given instant.
    pub fn expired(&self, now: Time) -> bool {
        self.expires_at() <= now
    }
}

/// Outcome of the resource owner's decision on a device grant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceGrantState {
    /// The owner has not decided yet.
    Pending,

    /// The owner approved the device, identified by the contained user id.
    Approved {
        /// The resource owner who entered the user code.
        user_id: String,
    },

    /// The owner denied the device.
    Denied,
}

/// A pending device authorization: the `device_code`/`user_code` pair bound
/// to a client and scope, waiting for the resource owner's verdict.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceGrant {
    /// The code the device polls the token endpoint with.
    pub device_code: String,

    /// The short code the resource owner enters out of band.
    pub user_code: String,

    /// The client the pair was issued to.
    pub client_id: String,

    /// The requested scope.
    pub scope: Option<Scope>,

    /// The owner's decision so far.
    pub state: DeviceGrantState,

    /// When the pair stops being usable.
    pub expires_at: Time,

    /// Minimum seconds the device must wait between polls.
    pub interval: i64,

    /// The instant of the most recent poll, if any.
    pub last_polled_at: Option<Time>,

    /// Whether an approved grant has already been exchanged for tokens.
    pub consumed: bool,
}
