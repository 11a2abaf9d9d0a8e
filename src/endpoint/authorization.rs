//! The end-user (authorization) endpoint.
//!
//! Validates a client's authorization request, asks the host (via the
//! [`OwnerSolicitor`]) whether the resource owner consents, and answers
//! with the redirect the protocol prescribes: a single-use code in the
//! query for `response_type=code`, an implicit token in the fragment for
//! `response_type=token`, or the matching error code. The `state` parameter
//! is echoed verbatim on every redirect.
//!
//! Errors discovered before the redirection uri is validated cannot be
//! delivered by redirect and render directly as 400; everything after uses
//! the error-redirect, including handler failures, which travel as
//! `server_error` because a 5xx status cannot reach the client through a
//! redirect.
//!
//! [`OwnerSolicitor`]: trait.OwnerSolicitor.html
use log::{debug, warn};
use url::Url;

use crate::grant::error::{ErrorCode, FlowError};
use crate::grant::handler_failure;
use crate::primitives::handler::{DataHandler, HandlerError};
use crate::primitives::scope::Scope;

use super::format::{render, Format};
use super::{Method, Request, Response, Status};

/// `response_type` values at the end-user endpoint (closed).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ResponseType {
    /// Mint an authorization code, delivered in the redirect query.
    Code,

    /// Mint a token directly, delivered in the redirect fragment.
    Token,
}

impl ResponseType {
    /// The protocol spelling of the value.
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseType::Code => "code",
            ResponseType::Token => "token",
        }
    }
}

/// What the client asked for, presented to the resource owner.
#[derive(Clone, Debug, PartialEq)]
pub struct PreGrant {
    /// The requesting client.
    pub client_id: String,

    /// The validated redirection target.
    pub redirect_uri: String,

    /// The kind of response the client asked for.
    pub response_type: ResponseType,

    /// The requested scope.
    pub scope: Option<Scope>,

    /// Opaque client state, echoed on the redirect.
    pub state: Option<String>,
}

/// Answer of an [`OwnerSolicitor`] to indicate the owner's choice.
///
/// [`OwnerSolicitor`]: trait.OwnerSolicitor.html
pub enum OwnerConsent {
    /// The owner did not authorize the client.
    Denied,

    /// The owner has not yet decided, i.e. the response is a consent page
    /// the host rendered for the user.
    InProgress(Response),

    /// Authorization was granted by the specified owner.
    Authorized {
        /// The authenticated resource owner.
        owner_id: String,
    },
}

/// Checks consent with the owner of a resource, identified in a request.
///
/// The host implements this over its session handling: ensure a resource
/// owner is currently authenticated, show the consent page on GET, read the
/// decision on POST. For one-off uses, wrap a closure in [`FnSolicitor`].
///
/// [`FnSolicitor`]: struct.FnSolicitor.html
pub trait OwnerSolicitor {
    /// Decide whether the owner consents to the presented grant.
    fn check_consent(&mut self, request: &Request, pre_grant: &PreGrant) -> OwnerConsent;
}

/// A solicitor defined as a closure.
pub struct FnSolicitor<F>(pub F);

impl<F> OwnerSolicitor for FnSolicitor<F>
where
    F: FnMut(&Request, &PreGrant) -> OwnerConsent,
{
    fn check_consent(&mut self, request: &Request, pre_grant: &PreGrant) -> OwnerConsent {
        (self.0)(request, pre_grant)
    }
}

/// The end-user endpoint.
#[derive(Default)]
pub struct AuthorizationEndpoint;

impl AuthorizationEndpoint {
    /// Create the endpoint.
    pub fn new() -> Self {
        AuthorizationEndpoint
    }

    /// Handle one authorization request.
    pub fn handle(
        &self, handler: &mut dyn DataHandler, solicitor: &mut dyn OwnerSolicitor,
        request: &Request,
    ) -> Response {
        if !matches!(request.method(), Method::Get | Method::Post) {
            return Response::method_not_allowed();
        }

        let client_id = match param(request, "client_id") {
            Some(value) => value.to_string(),
            None => {
                return direct_error(FlowError::with_description(
                    ErrorCode::InvalidRequest,
                    "client_id is required",
                ))
            }
        };
        let redirect_raw = match param(request, "redirect_uri") {
            Some(value) => value.to_string(),
            None => {
                return direct_error(FlowError::with_description(
                    ErrorCode::InvalidRequest,
                    "redirect_uri is required",
                ))
            }
        };

        // Until the uri is known-good nothing may be delivered through it.
        if let Err(err) = handler.validate_redirect_uri(&client_id, &redirect_raw) {
            return match err {
                HandlerError::Internal(detail) => {
                    warn!("data handler failure: {}", detail);
                    direct_error(FlowError::new(ErrorCode::ServerError))
                }
                _ => direct_error(FlowError::new(ErrorCode::RedirectUriMismatch)),
            };
        }
        let redirect_uri: Url = match redirect_raw.parse() {
            Ok(url) => url,
            Err(_) => {
                return direct_error(FlowError::with_description(
                    ErrorCode::InvalidRequest,
                    "redirect_uri is not a valid uri",
                ))
            }
        };

        let state = param(request, "state").map(str::to_string);

        let response_type = match param(request, "response_type") {
            None => {
                let err =
                    FlowError::with_description(ErrorCode::InvalidRequest, "response_type is required");
                return error_redirect(&redirect_uri, &err, state.as_deref(), None);
            }
            Some("code") => ResponseType::Code,
            Some("token") => ResponseType::Token,
            Some(_) => {
                let err = FlowError::new(ErrorCode::UnsupportedResponseType);
                return error_redirect(&redirect_uri, &err, state.as_deref(), None);
            }
        };

        let scope = match param(request, "scope") {
            None => None,
            Some(raw) => match raw.parse::<Scope>() {
                Ok(scope) => Some(scope),
                Err(_) => {
                    let err =
                        FlowError::with_description(ErrorCode::InvalidScope, "malformed scope");
                    return error_redirect(&redirect_uri, &err, state.as_deref(), Some(response_type));
                }
            },
        };
        if let Err(err) = handler.validate_scope(&client_id, scope.as_ref()) {
            let err = handler_failure(err, ErrorCode::InvalidScope);
            return error_redirect(&redirect_uri, &err, state.as_deref(), Some(response_type));
        }

        let pre_grant = PreGrant {
            client_id: client_id.clone(),
            redirect_uri: redirect_raw.clone(),
            response_type,
            scope: scope.clone(),
            state: state.clone(),
        };

        let owner_id = match solicitor.check_consent(request, &pre_grant) {
            OwnerConsent::InProgress(response) => return response,
            OwnerConsent::Denied => {
                debug!("consent denied for client {}", client_id);
                let err = FlowError::new(ErrorCode::AccessDenied);
                return error_redirect(&redirect_uri, &err, state.as_deref(), Some(response_type));
            }
            OwnerConsent::Authorized { owner_id } => owner_id,
        };

        let auth_info = match handler.create_or_update_auth_info(
            &client_id,
            Some(&owner_id),
            scope.as_ref(),
            Some(&redirect_raw),
        ) {
            Ok(info) => info,
            Err(err) => {
                let err = handler_failure(err, ErrorCode::ServerError);
                return error_redirect(&redirect_uri, &err, state.as_deref(), Some(response_type));
            }
        };

        match response_type {
            ResponseType::Code => {
                let code = match &auth_info.code {
                    Some(code) => code.clone(),
                    None => {
                        let err = FlowError::new(ErrorCode::ServerError);
                        return error_redirect(
                            &redirect_uri,
                            &err,
                            state.as_deref(),
                            Some(response_type),
                        );
                    }
                };
                let mut pairs = vec![("code", code)];
                if let Some(state) = &state {
                    pairs.push(("state", state.clone()));
                }
                redirect_with_query(&redirect_uri, pairs)
            }
            ResponseType::Token => {
                let token = match handler.create_or_update_access_token(&auth_info) {
                    Ok(token) => token,
                    Err(err) => {
                        let err = handler_failure(err, ErrorCode::ServerError);
                        return error_redirect(
                            &redirect_uri,
                            &err,
                            state.as_deref(),
                            Some(response_type),
                        );
                    }
                };
                let mut pairs = vec![
                    ("access_token", token.token.clone()),
                    ("token_type", "Bearer".to_string()),
                    ("expires_in", token.expires_in.to_string()),
                ];
                if let Some(scope) = &token.scope {
                    pairs.push(("scope", scope.to_string()));
                }
                if let Some(state) = &state {
                    pairs.push(("state", state.clone()));
                }
                redirect_with_fragment(&redirect_uri, pairs)
            }
        }
    }
}

fn param<'a>(request: &'a Request, key: &str) -> Option<&'a str> {
    request
        .query()
        .unique_value(key)
        .or_else(|| request.body().and_then(|body| body.unique_value(key)))
}

/// A 400/500 answer for requests whose redirection target is not trusted.
fn direct_error(err: FlowError) -> Response {
    let status = match err.code() {
        ErrorCode::ServerError => Status::InternalServerError,
        _ => Status::BadRequest,
    };
    let body = render(&err.body(), Format::Json).unwrap_or_default();
    Response::payload(status, Format::Json.content_type(), body)
}

/// Deliver an error through the validated redirection uri.
///
/// Implicit requests carry their parameters in the fragment, so their
/// errors travel there as well; everything else uses the query.
fn error_redirect(
    url: &Url, err: &FlowError, state: Option<&str>, response_type: Option<ResponseType>,
) -> Response {
    let mut pairs: Vec<(&str, String)> = err
        .iter()
        .map(|(key, value)| (key, value.into_owned()))
        .collect();
    if let Some(state) = state {
        pairs.push(("state", state.to_string()));
    }
    match response_type {
        Some(ResponseType::Token) => redirect_with_fragment(url, pairs),
        _ => redirect_with_query(url, pairs),
    }
}

fn redirect_with_query(url: &Url, pairs: Vec<(&str, String)>) -> Response {
    let mut url = url.clone();
    {
        let mut query = url.query_pairs_mut();
        query.extend_pairs(pairs.iter().map(|(key, value)| (*key, value.as_str())));
    }
    Response::redirect(url)
}

fn redirect_with_fragment(url: &Url, pairs: Vec<(&str, String)>) -> Response {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    serializer.extend_pairs(pairs.iter().map(|(key, value)| (*key, value.as_str())));
    let fragment = serializer.finish();

    let mut url = url.clone();
    url.set_fragment(Some(&fragment));
    Response::redirect(url)
}
