//! A complete in-memory data handler.
//!
//! `MemoryHandler` keeps every record of the data model in hash maps and is
//! the reference implementation of [`DataHandler`]: the test suite runs on
//! it and hosts can use it for prototyping before writing their own store.
//! Secrets and passwords are compared in constant time. All policy knobs the
//! protocol core leaves to the host (token lifetime, refresh rotation,
//! device poll interval) are plain setters here.
//!
//! [`DataHandler`]: ../handler/trait.DataHandler.html
use std::collections::HashMap;

use chrono::{Duration, Utc};
use subtle::ConstantTimeEq;

use super::generator::{RandomGenerator, TokenGenerator};
use super::grant::{AccessToken, AuthInfo, Client, DeviceGrant, DeviceGrantState};
use super::handler::{DataHandler, HandlerError, HandlerResult};
use super::scope::Scope;
use super::Time;

struct ClientRecord {
    client: Client,
    secret: String,
    allowed_scope: Option<Scope>,
}

/// An in-memory hash map store implementing the full handler contract.
pub struct MemoryHandler<G: TokenGenerator = RandomGenerator> {
    clients: HashMap<String, ClientRecord>,
    users: HashMap<String, String>,
    auth_infos: HashMap<String, AuthInfo>,
    codes: HashMap<String, String>,
    refresh_tokens: HashMap<String, String>,
    access_tokens: HashMap<String, AccessToken>,
    access_by_auth: HashMap<String, String>,
    device_grants: HashMap<String, DeviceGrant>,
    user_codes: HashMap<String, String>,
    generator: G,
    token_ttl: i64,
    code_ttl: i64,
    device_ttl: i64,
    device_interval: i64,
    rotate_refresh: bool,
    refresh_for_client_credentials: bool,
    next_id: u64,
}

impl MemoryHandler<RandomGenerator> {
    /// Create an empty store with a 16-byte random generator.
    pub fn new() -> Self {
        MemoryHandler::with_generator(RandomGenerator::new(16))
    }
}

impl Default for MemoryHandler<RandomGenerator> {
    fn default() -> Self {
        MemoryHandler::new()
    }
}

impl<G: TokenGenerator> MemoryHandler<G> {
    /// Create an empty store minting strings with the given generator.
    pub fn with_generator(generator: G) -> Self {
        MemoryHandler {
            clients: HashMap::new(),
            users: HashMap::new(),
            auth_infos: HashMap::new(),
            codes: HashMap::new(),
            refresh_tokens: HashMap::new(),
            access_tokens: HashMap::new(),
            access_by_auth: HashMap::new(),
            device_grants: HashMap::new(),
            user_codes: HashMap::new(),
            generator,
            token_ttl: 3600,
            code_ttl: 600,
            device_ttl: 1800,
            device_interval: 5,
            rotate_refresh: false,
            refresh_for_client_credentials: false,
            next_id: 0,
        }
    }

    /// Insert or replace a client together with its secret and the scope it
    /// may be granted (`None` meaning unrestricted).
    pub fn register_client(
        &mut self, client: Client, secret: impl Into<String>, allowed_scope: Option<Scope>,
    ) {
        self.clients.insert(
            client.client_id.clone(),
            ClientRecord {
                client,
                secret: secret.into(),
                allowed_scope,
            },
        );
    }

    /// Insert or replace a resource owner. The username doubles as user id.
    pub fn register_user(&mut self, username: impl Into<String>, password: impl Into<String>) {
        self.users.insert(username.into(), password.into());
    }

    /// Lifetime of issued access tokens, in seconds.
    pub fn token_valid_for(&mut self, seconds: i64) {
        self.token_ttl = seconds;
    }

    /// Lifetime of minted authorization codes, in seconds.
    pub fn code_valid_for(&mut self, seconds: i64) {
        self.code_ttl = seconds;
    }

    /// Lifetime of device code pairs, in seconds.
    pub fn device_valid_for(&mut self, seconds: i64) {
        self.device_ttl = seconds;
    }

    /// Minimum seconds a device must wait between polls.
    pub fn device_poll_interval(&mut self, seconds: i64) {
        self.device_interval = seconds;
    }

    /// Replace the refresh token on every refresh exchange instead of
    /// retaining it.
    pub fn rotate_refresh_tokens(&mut self, rotate: bool) {
        self.rotate_refresh = rotate;
    }

    /// Attach refresh tokens to client-credentials grants as well.
    pub fn refresh_for_client_credentials(&mut self, emit: bool) {
        self.refresh_for_client_credentials = emit;
    }

    /// Approve the device grant identified by the user code, binding it to
    /// the resource owner. Returns false if the code is unknown.
    pub fn approve_device_grant(&mut self, user_code: &str, user_id: impl Into<String>) -> bool {
        let device_code = match self.user_codes.get(user_code) {
            Some(code) => code.clone(),
            None => return false,
        };
        match self.device_grants.get_mut(&device_code) {
            Some(grant) => {
                grant.state = DeviceGrantState::Approved {
                    user_id: user_id.into(),
                };
                true
            }
            None => false,
        }
    }

    /// Deny the device grant identified by the user code. Returns false if
    /// the code is unknown.
    pub fn deny_device_grant(&mut self, user_code: &str) -> bool {
        let device_code = match self.user_codes.get(user_code) {
            Some(code) => code.clone(),
            None => return false,
        };
        match self.device_grants.get_mut(&device_code) {
            Some(grant) => {
                grant.state = DeviceGrantState::Denied;
                true
            }
            None => false,
        }
    }

    /// Unconditionally delete the token, modelling revocation.
    pub fn revoke_access_token(&mut self, token: &str) {
        if let Some(record) = self.access_tokens.remove(token) {
            self.access_by_auth.remove(&record.auth_id);
        }
    }

    fn next_auth_id(&mut self) -> String {
        self.next_id += 1;
        format!("auth-{}", self.next_id)
    }

    fn constant_time_eq(provided: &str, stored: &str) -> bool {
        provided.as_bytes().ct_eq(stored.as_bytes()).into()
    }
}

impl<G: TokenGenerator> DataHandler for MemoryHandler<G> {
    fn validate_client(
        &mut self, client_id: &str, client_secret: &str, _grant_type: &str,
    ) -> HandlerResult<Client> {
        // An unknown client and a wrong secret must look the same.
        let record = self
            .clients
            .get(client_id)
            .ok_or_else(|| HandlerError::Denied("client authentication failed".into()))?;
        if !Self::constant_time_eq(client_secret, &record.secret) {
            return Err(HandlerError::Denied("client authentication failed".into()));
        }
        Ok(record.client.clone())
    }

    fn get_user(&mut self, username: &str, password: &str) -> HandlerResult<String> {
        let stored = self
            .users
            .get(username)
            .ok_or_else(|| HandlerError::Denied("resource owner authentication failed".into()))?;
        if !Self::constant_time_eq(password, stored) {
            return Err(HandlerError::Denied(
                "resource owner authentication failed".into(),
            ));
        }
        Ok(username.to_string())
    }

    fn create_or_update_auth_info(
        &mut self, client_id: &str, user_id: Option<&str>, scope: Option<&Scope>,
        redirect_uri: Option<&str>,
    ) -> HandlerResult<AuthInfo> {
        if !self.clients.contains_key(client_id) {
            return Err(HandlerError::NotFound);
        }

        let existing_id = self
            .auth_infos
            .values()
            .find(|info| info.client_id == client_id && info.user_id.as_deref() == user_id)
            .map(|info| info.id.clone());

        let (id, kept_refresh) = match existing_id {
            Some(id) => {
                // Drop the stale code index, keep the refresh token unless
                // rotation is on.
                let previous = self.auth_infos.remove(&id).expect("indexed record exists");
                if let Some(old_code) = &previous.code {
                    self.codes.remove(old_code);
                }
                let kept = if self.rotate_refresh {
                    if let Some(old_refresh) = &previous.refresh_token {
                        self.refresh_tokens.remove(old_refresh);
                    }
                    None
                } else {
                    previous.refresh_token
                };
                (id, kept)
            }
            None => (self.next_auth_id(), None),
        };

        let now = Utc::now();
        let code = redirect_uri.map(|_| self.generator.generate());
        let wants_refresh = user_id.is_some() || self.refresh_for_client_credentials;
        let refresh_token = match (wants_refresh, kept_refresh) {
            (false, _) => None,
            (true, Some(kept)) => Some(kept),
            (true, None) => Some(self.generator.generate()),
        };

        let info = AuthInfo {
            id: id.clone(),
            client_id: client_id.to_string(),
            user_id: user_id.map(str::to_string),
            scope: scope.cloned(),
            redirect_uri: redirect_uri.map(str::to_string),
            code: code.clone(),
            code_expires_at: code.as_ref().map(|_| now + Duration::seconds(self.code_ttl)),
            code_used: false,
            refresh_token: refresh_token.clone(),
            refresh_expires_at: None,
        };

        if let Some(code) = code {
            self.codes.insert(code, id.clone());
        }
        if let Some(refresh) = refresh_token {
            self.refresh_tokens.insert(refresh, id.clone());
        }
        self.auth_infos.insert(id, info.clone());
        Ok(info)
    }

    fn get_auth_info_by_code(&mut self, code: &str) -> HandlerResult<AuthInfo> {
        let id = self.codes.get(code).ok_or(HandlerError::NotFound)?;
        self.auth_infos
            .get(id)
            .cloned()
            .ok_or(HandlerError::NotFound)
    }

    fn get_auth_info_by_refresh_token(&mut self, refresh_token: &str) -> HandlerResult<AuthInfo> {
        let id = self
            .refresh_tokens
            .get(refresh_token)
            .ok_or(HandlerError::NotFound)?;
        self.auth_infos
            .get(id)
            .cloned()
            .ok_or(HandlerError::NotFound)
    }

    fn get_auth_info_by_id(&mut self, id: &str) -> HandlerResult<AuthInfo> {
        self.auth_infos
            .get(id)
            .cloned()
            .ok_or(HandlerError::NotFound)
    }

    fn mark_auth_info_used(&mut self, auth_info: &AuthInfo) -> HandlerResult<()> {
        let stored = self
            .auth_infos
            .get_mut(&auth_info.id)
            .ok_or(HandlerError::NotFound)?;
        stored.code_used = true;
        Ok(())
    }

    fn create_or_update_access_token(&mut self, auth_info: &AuthInfo) -> HandlerResult<AccessToken> {
        let stored_refresh = {
            let stored = self
                .auth_infos
                .get(&auth_info.id)
                .ok_or(HandlerError::NotFound)?;
            stored.refresh_token.clone()
        };

        let refresh_token = if self.rotate_refresh && stored_refresh.is_some() {
            let rotated = self.generator.generate();
            if let Some(old) = stored_refresh {
                self.refresh_tokens.remove(&old);
            }
            self.refresh_tokens
                .insert(rotated.clone(), auth_info.id.clone());
            let stored = self
                .auth_infos
                .get_mut(&auth_info.id)
                .expect("present above");
            stored.refresh_token = Some(rotated.clone());
            Some(rotated)
        } else {
            stored_refresh
        };

        let token = AccessToken {
            token: self.generator.generate(),
            auth_id: auth_info.id.clone(),
            client_id: auth_info.client_id.clone(),
            user_id: auth_info.user_id.clone(),
            scope: auth_info.scope.clone(),
            issued_at: Utc::now(),
            expires_in: self.token_ttl,
            refresh_token,
        };

        // One live token per grant record.
        if let Some(old) = self
            .access_by_auth
            .insert(auth_info.id.clone(), token.token.clone())
        {
            self.access_tokens.remove(&old);
        }
        self.access_tokens.insert(token.token.clone(), token.clone());
        Ok(token)
    }

    fn get_access_token(&mut self, token: &str) -> HandlerResult<AccessToken> {
        self.access_tokens
            .get(token)
            .cloned()
            .ok_or(HandlerError::NotFound)
    }

    fn validate_scope(&mut self, client_id: &str, scope: Option<&Scope>) -> HandlerResult<()> {
        let record = self.clients.get(client_id).ok_or(HandlerError::NotFound)?;
        match (scope, &record.allowed_scope) {
            (None, _) => Ok(()),
            (Some(_), None) => Ok(()),
            (Some(requested), Some(allowed)) => {
                if requested.is_subset_of(allowed) {
                    Ok(())
                } else {
                    Err(HandlerError::Denied("scope exceeds the allowed set".into()))
                }
            }
        }
    }

    fn validate_redirect_uri(&mut self, client_id: &str, redirect_uri: &str) -> HandlerResult<()> {
        let record = self.clients.get(client_id).ok_or(HandlerError::NotFound)?;
        if record.client.redirect_registered(redirect_uri) {
            Ok(())
        } else {
            Err(HandlerError::Denied("redirection uri not registered".into()))
        }
    }

    fn create_device_grant(
        &mut self, client_id: &str, scope: Option<&Scope>,
    ) -> HandlerResult<DeviceGrant> {
        if !self.clients.contains_key(client_id) {
            return Err(HandlerError::NotFound);
        }

        let device_code = self.generator.generate();
        let user_code: String = self
            .generator
            .generate()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(8)
            .collect::<String>()
            .to_uppercase();

        let grant = DeviceGrant {
            device_code: device_code.clone(),
            user_code: user_code.clone(),
            client_id: client_id.to_string(),
            scope: scope.cloned(),
            state: DeviceGrantState::Pending,
            expires_at: Utc::now() + Duration::seconds(self.device_ttl),
            interval: self.device_interval,
            last_polled_at: None,
            consumed: false,
        };

        self.user_codes.insert(user_code, device_code.clone());
        self.device_grants.insert(device_code, grant.clone());
        Ok(grant)
    }

    fn get_device_grant(&mut self, device_code: &str) -> HandlerResult<DeviceGrant> {
        self.device_grants
            .get(device_code)
            .cloned()
            .ok_or(HandlerError::NotFound)
    }

    fn record_device_poll(&mut self, device_code: &str, now: Time) -> HandlerResult<()> {
        let grant = self
            .device_grants
            .get_mut(device_code)
            .ok_or(HandlerError::NotFound)?;
        grant.last_polled_at = Some(now);
        Ok(())
    }

    fn consume_device_grant(&mut self, device_code: &str) -> HandlerResult<()> {
        let grant = self
            .device_grants
            .get_mut(device_code)
            .ok_or(HandlerError::NotFound)?;
        grant.consumed = true;
        Ok(())
    }
}
