//! The token endpoint.
//!
//! Classifies one POST request, selects the registered flow for its
//! `grant_type`, runs it against the host's data handler with a single
//! clock reading, and renders the outcome, or the protocol error, in the
//! negotiated format.
use chrono::Utc;
use log::{debug, warn};

use crate::grant::error::{ErrorCode, FlowError};
use crate::grant::{FlowRegistry, GrantResponse};
use crate::primitives::handler::DataHandler;

use super::format::{render, Format};
use super::params::{extract_token_params, Credentials};
use super::{Method, Request, Response, Status};

/// Dispatches token requests to the registered grant flows.
pub struct TokenEndpoint {
    registry: FlowRegistry,
    default_format: Format,
    realm: String,
}

impl TokenEndpoint {
    /// An endpoint over the given registry, answering in JSON by default
    /// and challenging with realm `oauth`.
    pub fn new(registry: FlowRegistry) -> Self {
        TokenEndpoint {
            registry,
            default_format: Format::Json,
            realm: "oauth".to_string(),
        }
    }

    /// An endpoint with all built-in flows.
    pub fn standard() -> Self {
        TokenEndpoint::new(FlowRegistry::standard())
    }

    /// The realm announced in `WWW-Authenticate: Basic` challenges.
    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = realm.into();
        self
    }

    /// The format used when the request names none.
    pub fn with_default_format(mut self, format: Format) -> Self {
        self.default_format = format;
        self
    }

    /// Handle one token request.
    pub fn handle(&self, handler: &mut dyn DataHandler, request: &Request) -> Response {
        if request.method() != Method::Post {
            return Response::method_not_allowed();
        }

        // One clock reading per request; every expiry check uses it.
        let now = Utc::now();

        let params = match extract_token_params(request) {
            Ok(params) => params,
            Err(err) => return self.error_response(&err, &Credentials::None, self.default_format),
        };

        let format = match params.get("format") {
            None => self.default_format,
            Some(value) => match Format::from_param(value) {
                Some(format) => format,
                None => {
                    let err = FlowError::with_description(
                        ErrorCode::InvalidRequest,
                        "unknown response format",
                    );
                    return self.error_response(&err, params.credentials(), self.default_format);
                }
            },
        };

        let grant_type = match params.require("grant_type") {
            Ok(grant_type) => grant_type,
            Err(err) => return self.error_response(&err, params.credentials(), format),
        };

        let flow = match self.registry.get(grant_type) {
            Some(flow) => flow,
            None => {
                let err = FlowError::new(ErrorCode::UnsupportedGrantType);
                return self.error_response(&err, params.credentials(), format);
            }
        };

        debug!("dispatching {} grant", grant_type);
        match flow.execute(handler, &params, now) {
            Ok(grant) => self.grant_response(grant, format),
            Err(err) => self.error_response(&err, params.credentials(), format),
        }
    }

    fn grant_response(&self, grant: GrantResponse, format: Format) -> Response {
        let body = match &grant {
            GrantResponse::Bearer(token) => render(token, format),
            GrantResponse::Device(device) => render(device, format),
        };
        match body {
            Ok(body) => Response::payload(Status::Ok, format.content_type(), body).no_store(),
            Err(err) => {
                warn!("token response rendering failed: {}", err);
                self.error_response(
                    &FlowError::new(ErrorCode::ServerError),
                    &Credentials::None,
                    format,
                )
            }
        }
    }

    fn error_response(&self, err: &FlowError, credentials: &Credentials, format: Format) -> Response {
        let status = match err.code() {
            ErrorCode::ServerError => Status::InternalServerError,
            // Basic authentication failures challenge back over the header.
            ErrorCode::InvalidClient if credentials.via_basic() => Status::Unauthorized,
            _ => Status::BadRequest,
        };

        let body = render(&err.body(), format).unwrap_or_else(|render_err| {
            warn!("error body rendering failed: {}", render_err);
            String::new()
        });

        let mut response = Response::payload(status, format.content_type(), body);
        if status == Status::Unauthorized {
            response.www_authenticate = Some(format!("Basic realm=\"{}\"", self.realm));
        }
        response
    }
}
