//! # oauth-kit
//!
//! An OAuth2 (draft-10 era) authorization server and client library with
//! pluggable grant flows and a host-supplied persistence seam.
//!
//! ## About
//!
//! `oauth-kit` implements the protocol core of an authorization server: the
//! token endpoint, the end-user authorization endpoint, and a bearer-token
//! guard for protected resources. It depends on a front-end facing web server
//! for network operations and on a back-end implementation for policies and
//! data storage. The back-end seam is a single trait, [`DataHandler`], which
//! the host implements over its own store of clients, authorization grants,
//! access tokens, refresh tokens, and device grants. The crate itself holds
//! no state between requests.
//!
//! ## Serve tokens
//!
//! Translate each incoming HTTP request into an [`endpoint::Request`] (the
//! method, the `Authorization` header, and the decoded query and form-body
//! parameters) and hand it to a [`TokenEndpoint`]. The endpoint extracts the
//! client credentials under the strict one-carrier rule, looks up the flow
//! registered for the request's `grant_type` and runs it against your data
//! handler, then renders the outcome in the negotiated format (JSON, XML, or
//! form-urlencoded). Grant types are added by registering additional
//! [`GrantFlow`] implementations with the [`FlowRegistry`]; the standard
//! registry covers client credentials, resource-owner password,
//! authorization code, refresh token, and the two-phase device flow.
//!
//! The end-user endpoint asks an [`OwnerSolicitor`], which is your session
//! and consent handling, whether the resource owner approves, and answers
//! with the redirect the protocol prescribes: an authorization code in the
//! query, or an implicit token in the fragment.
//!
//! ## Guard resources
//!
//! A [`ResourceGuard`] extracts a bearer token from the `Authorization`
//! header, the form body, or the query string (rejecting requests that use
//! more than one), validates it through the data handler, and either hands
//! back the resolved token metadata for your request context or produces the
//! matching `WWW-Authenticate` challenge.
//!
//! ## Act as a client
//!
//! [`TokenClient`] builds token-endpoint requests for every grant type over
//! a host-supplied [`HttpBackend`] and parses responses into the same closed
//! error taxonomy the server side uses. The most recent exchange stays
//! available for diagnostics.
//!
//! _WARNING_: Hosts MUST ensure a secure transportation layer when talking
//! to confidential clients. This means using TLS for communication over
//! HTTPS.
//!
//! [`DataHandler`]: primitives/handler/trait.DataHandler.html
//! [`endpoint::Request`]: endpoint/struct.Request.html
//! [`TokenEndpoint`]: endpoint/token/struct.TokenEndpoint.html
//! [`GrantFlow`]: grant/trait.GrantFlow.html
//! [`FlowRegistry`]: grant/struct.FlowRegistry.html
//! [`OwnerSolicitor`]: endpoint/authorization/trait.OwnerSolicitor.html
//! [`ResourceGuard`]: endpoint/resource/struct.ResourceGuard.html
//! [`TokenClient`]: client/struct.TokenClient.html
//! [`HttpBackend`]: client/trait.HttpBackend.html
#![warn(missing_docs)]

pub mod client;
pub mod endpoint;
pub mod grant;
pub mod primitives;
