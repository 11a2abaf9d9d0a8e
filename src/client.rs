//! The relying-party side of the protocol.
//!
//! [`TokenClient`] builds token-endpoint requests for every grant type and
//! parses the answers into the same closed taxonomy the server side uses.
//! The crate performs no I/O of its own: the host supplies the actual HTTP
//! user agent behind the [`HttpBackend`] trait and remains responsible for
//! TLS. Transport failures are reported distinctly from protocol errors.
//!
//! The most recent request/response pair is retained as an opaque
//! diagnostic handle. It is not part of the protocol contract and exists
//! so a host can log or inspect what went over the wire last.
//!
//! [`TokenClient`]: struct.TokenClient.html
//! [`HttpBackend`]: trait.HttpBackend.html
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::endpoint::authorization::ResponseType;
use crate::endpoint::Method;
use crate::grant::error::ErrorBody;
use crate::grant::{DeviceAuthorization, TokenResponse};

/// An HTTP request for the host user agent to perform.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpRequest {
    /// The request method.
    pub method: Method,

    /// The absolute request target.
    pub url: Url,

    /// Headers to set, including authorization and content type.
    pub headers: Vec<(&'static str, String)>,

    /// The encoded request body, if any.
    pub body: Option<String>,
}

/// The answer the host user agent produced.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpResponse {
    /// The numeric status code.
    pub status: u16,

    /// The response body.
    pub body: String,
}

/// A failure below the protocol: connection, resolution, timeout.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

/// The host-supplied HTTP user agent.
pub trait HttpBackend {
    /// Perform one request and return the raw answer.
    fn execute(&mut self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Client-side failures, split by tier.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ClientError {
    /// The server answered with a protocol error.
    #[error("authorization server answered {}", .0.error)]
    Protocol(ErrorBody),

    /// The exchange never completed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The answer was not decodable as either tokens or a protocol error.
    #[error("malformed token endpoint answer: {0}")]
    Malformed(String),
}

/// The grant material of one token request.
#[derive(Clone, Debug)]
pub enum GrantRequest<'a> {
    /// `client_credentials`.
    ClientCredentials {
        /// Scope to request, if any.
        scope: Option<&'a str>,
    },

    /// `password`.
    Password {
        /// The resource owner's username.
        username: &'a str,
        /// The resource owner's password.
        password: &'a str,
        /// Scope to request, if any.
        scope: Option<&'a str>,
    },

    /// `authorization_code`.
    AuthorizationCode {
        /// The code received on the redirect.
        code: &'a str,
        /// The redirection uri the code was delivered to.
        redirect_uri: &'a str,
    },

    /// `refresh_token`.
    RefreshToken {
        /// The refresh token to exchange.
        refresh_token: &'a str,
        /// A narrower scope to request, if any.
        scope: Option<&'a str>,
    },

    /// `device_token`, polling phase of the device flow.
    DeviceToken {
        /// The device code being polled.
        device_code: &'a str,
    },
}

impl GrantRequest<'_> {
    fn grant_type(&self) -> &'static str {
        match self {
            GrantRequest::ClientCredentials { .. } => "client_credentials",
            GrantRequest::Password { .. } => "password",
            GrantRequest::AuthorizationCode { .. } => "authorization_code",
            GrantRequest::RefreshToken { .. } => "refresh_token",
            GrantRequest::DeviceToken { .. } => "device_token",
        }
    }

    fn append_to(&self, pairs: &mut Vec<(&'static str, String)>) {
        match self {
            GrantRequest::ClientCredentials { scope } => {
                if let Some(scope) = scope {
                    pairs.push(("scope", scope.to_string()));
                }
            }
            GrantRequest::Password {
                username,
                password,
                scope,
            } => {
                pairs.push(("username", username.to_string()));
                pairs.push(("password", password.to_string()));
                if let Some(scope) = scope {
                    pairs.push(("scope", scope.to_string()));
                }
            }
            GrantRequest::AuthorizationCode { code, redirect_uri } => {
                pairs.push(("code", code.to_string()));
                pairs.push(("redirect_uri", redirect_uri.to_string()));
            }
            GrantRequest::RefreshToken {
                refresh_token,
                scope,
            } => {
                pairs.push(("refresh_token", refresh_token.to_string()));
                if let Some(scope) = scope {
                    pairs.push(("scope", scope.to_string()));
                }
            }
            GrantRequest::DeviceToken { device_code } => {
                pairs.push(("device_code", device_code.to_string()));
            }
        }
    }
}

/// The most recent HTTP exchange, kept for diagnostics.
#[derive(Clone, Debug)]
pub struct Exchange {
    /// The request that went out.
    pub request: HttpRequest,

    /// The answer, absent when transport failed.
    pub response: Option<HttpResponse>,
}

/// A token-endpoint client for one registered client identity.
pub struct TokenClient<B> {
    backend: B,
    token_url: Url,
    client_id: String,
    client_secret: String,
    last_exchange: Option<Exchange>,
}

impl<B: HttpBackend> TokenClient<B> {
    /// A client talking to `token_url`, authenticating as `client_id` over
    /// HTTP Basic.
    pub fn new(
        backend: B, token_url: Url, client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        TokenClient {
            backend,
            token_url,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            last_exchange: None,
        }
    }

    /// Request an access token with the given grant material.
    pub fn request_token(&mut self, grant: GrantRequest) -> Result<TokenResponse, ClientError> {
        let mut pairs = vec![("grant_type", grant.grant_type().to_string())];
        grant.append_to(&mut pairs);
        self.exchange(pairs)
    }

    /// Start the device flow: provision a `device_code`/`user_code` pair.
    pub fn request_device_authorization(
        &mut self, scope: Option<&str>,
    ) -> Result<DeviceAuthorization, ClientError> {
        let mut pairs = vec![("grant_type", "device_code".to_string())];
        if let Some(scope) = scope {
            pairs.push(("scope", scope.to_string()));
        }
        self.exchange(pairs)
    }

    /// The request of the most recent exchange, if any took place.
    pub fn last_request(&self) -> Option<&HttpRequest> {
        self.last_exchange.as_ref().map(|exchange| &exchange.request)
    }

    /// The response of the most recent exchange, if one arrived.
    pub fn last_response(&self) -> Option<&HttpResponse> {
        self.last_exchange
            .as_ref()
            .and_then(|exchange| exchange.response.as_ref())
    }

    fn exchange<T: DeserializeOwned>(
        &mut self, pairs: Vec<(&'static str, String)>,
    ) -> Result<T, ClientError> {
        let body = serde_urlencoded::to_string(&pairs)
            .map_err(|err| ClientError::Malformed(err.to_string()))?;
        let credentials =
            STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));

        let request = HttpRequest {
            method: Method::Post,
            url: self.token_url.clone(),
            headers: vec![
                ("Authorization", format!("Basic {}", credentials)),
                (
                    "Content-Type",
                    "application/x-www-form-urlencoded".to_string(),
                ),
            ],
            body: Some(body),
        };

        self.last_exchange = Some(Exchange {
            request: request.clone(),
            response: None,
        });

        let response = self.backend.execute(&request)?;
        if let Some(exchange) = &mut self.last_exchange {
            exchange.response = Some(response.clone());
        }

        if response.status == 200 {
            serde_json::from_str(&response.body)
                .map_err(|err| ClientError::Malformed(err.to_string()))
        } else {
            match serde_json::from_str::<ErrorBody>(&response.body) {
                Ok(error) => Err(ClientError::Protocol(error)),
                Err(err) => Err(ClientError::Malformed(err.to_string())),
            }
        }
    }
}

/// Build the end-user authorization url a client sends the owner to.
///
/// `state` is carried through the round trip verbatim.
pub fn authorize_url(
    endpoint: &Url, response_type: ResponseType, client_id: &str, redirect_uri: &str,
    scope: Option<&str>, state: Option<&str>,
) -> Url {
    let mut url = endpoint.clone();
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("response_type", response_type.as_str());
        query.append_pair("client_id", client_id);
        query.append_pair("redirect_uri", redirect_uri);
        if let Some(scope) = scope {
            query.append_pair("scope", scope);
        }
        if let Some(state) = state {
            query.append_pair("state", state);
        }
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::error::ErrorCode;
    use base64::Engine as _;

    struct Canned {
        status: u16,
        body: String,
    }

    impl HttpBackend for Canned {
        fn execute(&mut self, _: &HttpRequest) -> Result<HttpResponse, TransportError> {
            Ok(HttpResponse {
                status: self.status,
                body: self.body.clone(),
            })
        }
    }

    struct Unreachable;

    impl HttpBackend for Unreachable {
        fn execute(&mut self, _: &HttpRequest) -> Result<HttpResponse, TransportError> {
            Err(TransportError("connection refused".into()))
        }
    }

    fn token_url() -> Url {
        "https://auth.example/token".parse().unwrap()
    }

    #[test]
    fn request_shape() {
        let backend = Canned {
            status: 200,
            body: "{\"token_type\":\"Bearer\",\"access_token\":\"AT\",\"expires_in\":3600}"
                .to_string(),
        };
        let mut client = TokenClient::new(backend, token_url(), "c1", "s1");

        client
            .request_token(GrantRequest::ClientCredentials {
                scope: Some("read"),
            })
            .unwrap();

        let request = client.last_request().unwrap();
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.url, token_url());
        let authorization = request
            .headers
            .iter()
            .find(|(name, _)| *name == "Authorization")
            .map(|(_, value)| value.clone())
            .unwrap();
        assert_eq!(
            authorization,
            format!("Basic {}", STANDARD.encode("c1:s1"))
        );
        let body = request.body.clone().unwrap();
        assert!(body.contains("grant_type=client_credentials"));
        assert!(body.contains("scope=read"));
    }

    #[test]
    fn success_parses_tokens() {
        let backend = Canned {
            status: 200,
            body: concat!(
                "{\"token_type\":\"Bearer\",\"access_token\":\"AT\",",
                "\"expires_in\":3600,\"refresh_token\":\"RT\",\"scope\":\"read\"}"
            )
            .to_string(),
        };
        let mut client = TokenClient::new(backend, token_url(), "c1", "s1");

        let tokens = client
            .request_token(GrantRequest::RefreshToken {
                refresh_token: "old",
                scope: None,
            })
            .unwrap();

        assert_eq!(tokens.access_token, "AT");
        assert_eq!(tokens.refresh_token.as_deref(), Some("RT"));
        assert_eq!(tokens.scope.as_deref(), Some("read"));
        assert!(client.last_response().is_some());
    }

    #[test]
    fn protocol_error_is_typed() {
        let backend = Canned {
            status: 400,
            body: "{\"error\":\"invalid_grant\"}".to_string(),
        };
        let mut client = TokenClient::new(backend, token_url(), "c1", "s1");

        let err = client
            .request_token(GrantRequest::AuthorizationCode {
                code: "XYZ",
                redirect_uri: "https://app/cb",
            })
            .unwrap_err();

        match err {
            ClientError::Protocol(body) => assert_eq!(body.error, ErrorCode::InvalidGrant),
            other => panic!("expected a protocol error, got {:?}", other),
        }
    }

    #[test]
    fn unknown_error_code_is_malformed() {
        let backend = Canned {
            status: 400,
            body: "{\"error\":\"tea_time\"}".to_string(),
        };
        let mut client = TokenClient::new(backend, token_url(), "c1", "s1");

        let err = client
            .request_token(GrantRequest::ClientCredentials { scope: None })
            .unwrap_err();
        assert!(matches!(err, ClientError::Malformed(_)));
    }

    #[test]
    fn transport_error_is_distinct() {
        let mut client = TokenClient::new(Unreachable, token_url(), "c1", "s1");

        let err = client
            .request_token(GrantRequest::ClientCredentials { scope: None })
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        // The request went out, no answer came back.
        assert!(client.last_request().is_some());
        assert!(client.last_response().is_none());
    }

    #[test]
    fn device_authorization_parses() {
        let backend = Canned {
            status: 200,
            body: concat!(
                "{\"device_code\":\"DC\",\"user_code\":\"UC\",",
                "\"expires_in\":1800,\"interval\":5}"
            )
            .to_string(),
        };
        let mut client = TokenClient::new(backend, token_url(), "c1", "s1");

        let device = client.request_device_authorization(Some("read")).unwrap();
        assert_eq!(device.device_code, "DC");
        assert_eq!(device.user_code, "UC");
        assert_eq!(device.interval, 5);
        assert_eq!(device.verification_uri, None);
    }

    #[test]
    fn authorize_url_carries_the_request() {
        let endpoint: Url = "https://auth.example/authorize".parse().unwrap();
        let url = authorize_url(
            &endpoint,
            ResponseType::Code,
            "c1",
            "https://app/cb",
            Some("read"),
            Some("abc"),
        );

        let pairs: std::collections::HashMap<String, String> =
            url.query_pairs().into_owned().collect();
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["client_id"], "c1");
        assert_eq!(pairs["redirect_uri"], "https://app/cb");
        assert_eq!(pairs["scope"], "read");
        assert_eq!(pairs["state"], "abc");
    }
}
