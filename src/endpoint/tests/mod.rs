use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::endpoint::{Method, Request, Response};
use crate::primitives::grant::Client;
use crate::primitives::memory::MemoryHandler;

pub mod defaults {
    pub const EXAMPLE_CLIENT_ID: &str = "ClientId";
    pub const EXAMPLE_PASSPHRASE: &str = "VGhpcyBpcyBhIHZlcnkgc2VjdXJlIHBhc3NwaHJhc2UK";
    pub const EXAMPLE_OWNER_ID: &str = "Owner";
    pub const EXAMPLE_OWNER_PASSWORD: &str = "correct horse battery staple";
    pub const EXAMPLE_REDIRECT_URI: &str = "https://client.example/endpoint";
    pub const EXAMPLE_SCOPE: &str = "example default";
}

use self::defaults::*;

/// A store with one confidential client and one resource owner registered.
fn example_handler() -> MemoryHandler {
    let mut handler = MemoryHandler::new();
    handler.register_client(
        Client::new(EXAMPLE_CLIENT_ID).with_redirect_uris([EXAMPLE_REDIRECT_URI]),
        EXAMPLE_PASSPHRASE,
        Some(EXAMPLE_SCOPE.parse().unwrap()),
    );
    handler.register_user(EXAMPLE_OWNER_ID, EXAMPLE_OWNER_PASSWORD);
    handler
}

/// A POST to the token endpoint with the given form body.
fn token_request(pairs: Vec<(&str, &str)>) -> Request {
    Request::new(Method::Post).with_body(pairs)
}

/// A POST carrying the example client's credentials plus the given body.
fn credentialed_request(mut pairs: Vec<(&'static str, &str)>) -> Request {
    pairs.push(("client_id", EXAMPLE_CLIENT_ID));
    pairs.push(("client_secret", EXAMPLE_PASSPHRASE));
    token_request(pairs)
}

fn basic_authorization(client_id: &str, passphrase: &str) -> String {
    format!(
        "Basic {}",
        STANDARD.encode(format!("{}:{}", client_id, passphrase))
    )
}

fn json_body(response: &Response) -> serde_json::Value {
    assert_eq!(response.content_type.as_deref(), Some("application/json"));
    serde_json::from_str(response.body.as_deref().expect("expected a body")).expect("expected json")
}

fn error_code(response: &Response) -> String {
    json_body(response)["error"]
        .as_str()
        .expect("expected an error code")
        .to_string()
}

mod token;
