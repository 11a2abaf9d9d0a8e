use super::defaults::*;
use super::{
    basic_authorization, credentialed_request, error_code, example_handler, json_body,
    token_request,
};
use crate::endpoint::token::TokenEndpoint;
use crate::endpoint::{Method, Request, Status};
use crate::primitives::grant::Client;
use crate::primitives::handler::DataHandler;
use crate::primitives::memory::MemoryHandler;

#[test]
fn client_credentials_success() {
    let mut handler = example_handler();
    let endpoint = TokenEndpoint::standard();

    let request = credentialed_request(vec![
        ("grant_type", "client_credentials"),
        ("scope", "example"),
    ]);
    let response = endpoint.handle(&mut handler, &request);

    assert_eq!(response.status, Status::Ok);
    assert!(response.no_store);
    let body = json_body(&response);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 3600);
    assert_eq!(body["scope"], "example");
    assert!(!body["access_token"].as_str().unwrap().is_empty());
    // No resource owner, no refresh token unless the host emits one.
    assert!(body.get("refresh_token").is_none());
}

#[test]
fn client_credentials_basic_authorization() {
    let mut handler = example_handler();
    let endpoint = TokenEndpoint::standard();

    let request = token_request(vec![("grant_type", "client_credentials")])
        .with_authorization(basic_authorization(EXAMPLE_CLIENT_ID, EXAMPLE_PASSPHRASE));
    let response = endpoint.handle(&mut handler, &request);

    assert_eq!(response.status, Status::Ok);
    assert_eq!(json_body(&response)["token_type"], "Bearer");
}

#[test]
fn invalid_client_over_basic_is_challenged() {
    let mut handler = example_handler();
    let endpoint = TokenEndpoint::standard().with_realm("token");

    let request = token_request(vec![("grant_type", "client_credentials")])
        .with_authorization(basic_authorization(EXAMPLE_CLIENT_ID, "the wrong passphrase"));
    let response = endpoint.handle(&mut handler, &request);

    assert_eq!(response.status, Status::Unauthorized);
    assert_eq!(
        response.www_authenticate.as_deref(),
        Some("Basic realm=\"token\"")
    );
    assert_eq!(error_code(&response), "invalid_client");
}

#[test]
fn invalid_client_in_body_is_bad_request() {
    let mut handler = example_handler();
    let endpoint = TokenEndpoint::standard();

    let request = token_request(vec![
        ("grant_type", "client_credentials"),
        ("client_id", EXAMPLE_CLIENT_ID),
        ("client_secret", "the wrong passphrase"),
    ]);
    let response = endpoint.handle(&mut handler, &request);

    assert_eq!(response.status, Status::BadRequest);
    assert!(response.www_authenticate.is_none());
    assert_eq!(error_code(&response), "invalid_client");
}

#[test]
fn credentials_in_two_carriers_rejected() {
    let mut handler = example_handler();
    let endpoint = TokenEndpoint::standard();

    let request = credentialed_request(vec![("grant_type", "client_credentials")])
        .with_authorization(basic_authorization(EXAMPLE_CLIENT_ID, EXAMPLE_PASSPHRASE));
    let response = endpoint.handle(&mut handler, &request);

    assert_eq!(response.status, Status::BadRequest);
    assert_eq!(error_code(&response), "invalid_request");
}

#[test]
fn missing_grant_type() {
    let mut handler = example_handler();
    let endpoint = TokenEndpoint::standard();

    let response = endpoint.handle(
        &mut handler,
        &credentialed_request(vec![("scope", "example")]),
    );

    assert_eq!(response.status, Status::BadRequest);
    assert_eq!(error_code(&response), "invalid_request");
}

#[test]
fn unknown_grant_type() {
    let mut handler = example_handler();
    let endpoint = TokenEndpoint::standard();

    let response = endpoint.handle(
        &mut handler,
        &credentialed_request(vec![("grant_type", "sorcery")]),
    );

    assert_eq!(response.status, Status::BadRequest);
    assert_eq!(error_code(&response), "unsupported_grant_type");
}

#[test]
fn only_post_is_served() {
    let mut handler = example_handler();
    let endpoint = TokenEndpoint::standard();

    let request = Request::new(Method::Get).with_query(vec![
        ("grant_type", "client_credentials"),
        ("client_id", EXAMPLE_CLIENT_ID),
        ("client_secret", EXAMPLE_PASSPHRASE),
    ]);
    let response = endpoint.handle(&mut handler, &request);

    assert_eq!(response.status, Status::MethodNotAllowed);
}

#[test]
fn grant_type_restriction_enforced() {
    let mut handler = example_handler();
    handler.register_client(
        Client::new("PasswordOnly").with_allowed_grants(["password"]),
        "secret",
        None,
    );
    let endpoint = TokenEndpoint::standard();

    let request = token_request(vec![
        ("grant_type", "client_credentials"),
        ("client_id", "PasswordOnly"),
        ("client_secret", "secret"),
    ]);
    let response = endpoint.handle(&mut handler, &request);

    assert_eq!(response.status, Status::BadRequest);
    assert_eq!(error_code(&response), "unauthorized_client");
}

#[test]
fn excessive_scope_rejected() {
    let mut handler = example_handler();
    let endpoint = TokenEndpoint::standard();

    let request = credentialed_request(vec![
        ("grant_type", "client_credentials"),
        ("scope", "example admin"),
    ]);
    let response = endpoint.handle(&mut handler, &request);

    assert_eq!(response.status, Status::BadRequest);
    assert_eq!(error_code(&response), "invalid_scope");
}

#[test]
fn malformed_scope_rejected() {
    let mut handler = example_handler();
    let endpoint = TokenEndpoint::standard();

    let request = credentialed_request(vec![
        ("grant_type", "client_credentials"),
        ("scope", "\"no quotes (0x22) allowed\""),
    ]);
    let response = endpoint.handle(&mut handler, &request);

    assert_eq!(response.status, Status::BadRequest);
    assert_eq!(error_code(&response), "invalid_scope");
}

#[test]
fn password_grant_success() {
    let mut handler = example_handler();
    let endpoint = TokenEndpoint::standard();

    let request = credentialed_request(vec![
        ("grant_type", "password"),
        ("username", EXAMPLE_OWNER_ID),
        ("password", EXAMPLE_OWNER_PASSWORD),
        ("scope", "example default"),
    ]);
    let response = endpoint.handle(&mut handler, &request);

    assert_eq!(response.status, Status::Ok);
    let body = json_body(&response);
    assert_eq!(body["token_type"], "Bearer");
    // Owner-bound grants come with a refresh token.
    assert!(!body["refresh_token"].as_str().unwrap().is_empty());
}

#[test]
fn password_grant_wrong_password() {
    let mut handler = example_handler();
    let endpoint = TokenEndpoint::standard();

    let request = credentialed_request(vec![
        ("grant_type", "password"),
        ("username", EXAMPLE_OWNER_ID),
        ("password", "not the password"),
    ]);
    let response = endpoint.handle(&mut handler, &request);

    assert_eq!(response.status, Status::BadRequest);
    assert_eq!(error_code(&response), "invalid_grant");
}

#[test]
fn password_grant_missing_username() {
    let mut handler = example_handler();
    let endpoint = TokenEndpoint::standard();

    let request = credentialed_request(vec![
        ("grant_type", "password"),
        ("password", EXAMPLE_OWNER_PASSWORD),
    ]);
    let response = endpoint.handle(&mut handler, &request);

    assert_eq!(response.status, Status::BadRequest);
    assert_eq!(error_code(&response), "invalid_request");
}

fn minted_code(handler: &mut impl DataHandler) -> String {
    handler
        .create_or_update_auth_info(
            EXAMPLE_CLIENT_ID,
            Some(EXAMPLE_OWNER_ID),
            Some(&"example".parse().unwrap()),
            Some(EXAMPLE_REDIRECT_URI),
        )
        .unwrap()
        .code
        .unwrap()
}

#[test]
fn authorization_code_exchange_and_replay() {
    let mut handler = example_handler();
    let endpoint = TokenEndpoint::standard();
    let code = minted_code(&mut handler);

    let request = credentialed_request(vec![
        ("grant_type", "authorization_code"),
        ("code", &code),
        ("redirect_uri", EXAMPLE_REDIRECT_URI),
    ]);

    let first = endpoint.handle(&mut handler, &request);
    assert_eq!(first.status, Status::Ok);
    assert_eq!(json_body(&first)["scope"], "example");

    // A code is consumed at most once.
    let second = endpoint.handle(&mut handler, &request);
    assert_eq!(second.status, Status::BadRequest);
    assert_eq!(error_code(&second), "invalid_grant");
}

#[test]
fn authorization_code_redirect_mismatch() {
    let mut handler = example_handler();
    let endpoint = TokenEndpoint::standard();
    let code = minted_code(&mut handler);

    let request = credentialed_request(vec![
        ("grant_type", "authorization_code"),
        ("code", &code),
        ("redirect_uri", "https://attacker.example/endpoint"),
    ]);
    let response = endpoint.handle(&mut handler, &request);

    assert_eq!(response.status, Status::BadRequest);
    assert_eq!(error_code(&response), "invalid_grant");
}

#[test]
fn authorization_code_foreign_client() {
    let mut handler = example_handler();
    handler.register_client(Client::new("OtherClient"), "other secret", None);
    let endpoint = TokenEndpoint::standard();
    let code = minted_code(&mut handler);

    let request = token_request(vec![
        ("grant_type", "authorization_code"),
        ("code", &code),
        ("redirect_uri", EXAMPLE_REDIRECT_URI),
        ("client_id", "OtherClient"),
        ("client_secret", "other secret"),
    ]);
    let response = endpoint.handle(&mut handler, &request);

    assert_eq!(response.status, Status::BadRequest);
    assert_eq!(error_code(&response), "invalid_grant");
}

#[test]
fn authorization_code_expired() {
    let mut handler = example_handler();
    handler.code_valid_for(0);
    let endpoint = TokenEndpoint::standard();
    let code = minted_code(&mut handler);

    let request = credentialed_request(vec![
        ("grant_type", "authorization_code"),
        ("code", &code),
        ("redirect_uri", EXAMPLE_REDIRECT_URI),
    ]);
    let response = endpoint.handle(&mut handler, &request);

    assert_eq!(response.status, Status::BadRequest);
    assert_eq!(error_code(&response), "invalid_grant");
}

fn minted_refresh_token(handler: &mut MemoryHandler, endpoint: &TokenEndpoint) -> String {
    let request = credentialed_request(vec![
        ("grant_type", "password"),
        ("username", EXAMPLE_OWNER_ID),
        ("password", EXAMPLE_OWNER_PASSWORD),
        ("scope", "example default"),
    ]);
    let response = endpoint.handle(handler, &request);
    assert_eq!(response.status, Status::Ok);
    json_body(&response)["refresh_token"]
        .as_str()
        .unwrap()
        .to_string()
}

#[test]
fn refresh_narrows_scope() {
    let mut handler = example_handler();
    let endpoint = TokenEndpoint::standard();
    let refresh = minted_refresh_token(&mut handler, &endpoint);

    let request = credentialed_request(vec![
        ("grant_type", "refresh_token"),
        ("refresh_token", &refresh),
        ("scope", "example"),
    ]);
    let response = endpoint.handle(&mut handler, &request);

    assert_eq!(response.status, Status::Ok);
    let body = json_body(&response);
    assert_eq!(body["scope"], "example");
    assert!(!body["access_token"].as_str().unwrap().is_empty());
}

#[test]
fn refresh_must_not_widen_scope() {
    let mut handler = example_handler();
    let endpoint = TokenEndpoint::standard();
    let refresh = minted_refresh_token(&mut handler, &endpoint);

    let request = credentialed_request(vec![
        ("grant_type", "refresh_token"),
        ("refresh_token", &refresh),
        ("scope", "example admin"),
    ]);
    let response = endpoint.handle(&mut handler, &request);

    assert_eq!(response.status, Status::BadRequest);
    assert_eq!(error_code(&response), "invalid_scope");
}

#[test]
fn refresh_owned_by_other_client() {
    let mut handler = example_handler();
    handler.register_client(Client::new("OtherClient"), "other secret", None);
    let endpoint = TokenEndpoint::standard();
    let refresh = minted_refresh_token(&mut handler, &endpoint);

    let request = token_request(vec![
        ("grant_type", "refresh_token"),
        ("refresh_token", &refresh),
        ("client_id", "OtherClient"),
        ("client_secret", "other secret"),
    ]);
    let response = endpoint.handle(&mut handler, &request);

    assert_eq!(response.status, Status::BadRequest);
    assert_eq!(error_code(&response), "invalid_grant");
}

#[test]
fn refresh_rotation_invalidates_old_token() {
    let mut handler = example_handler();
    handler.rotate_refresh_tokens(true);
    let endpoint = TokenEndpoint::standard();
    let refresh = minted_refresh_token(&mut handler, &endpoint);

    let request = credentialed_request(vec![
        ("grant_type", "refresh_token"),
        ("refresh_token", &refresh),
    ]);
    let response = endpoint.handle(&mut handler, &request);
    assert_eq!(response.status, Status::Ok);
    let rotated = json_body(&response)["refresh_token"]
        .as_str()
        .unwrap()
        .to_string();
    assert_ne!(rotated, refresh);

    // The replaced token no longer exchanges.
    let stale = credentialed_request(vec![
        ("grant_type", "refresh_token"),
        ("refresh_token", &refresh),
    ]);
    let response = endpoint.handle(&mut handler, &stale);
    assert_eq!(response.status, Status::BadRequest);
    assert_eq!(error_code(&response), "invalid_grant");
}

#[test]
fn xml_format_negotiated() {
    let mut handler = example_handler();
    let endpoint = TokenEndpoint::standard();

    let request = credentialed_request(vec![
        ("grant_type", "client_credentials"),
        ("format", "xml"),
    ]);
    let response = endpoint.handle(&mut handler, &request);

    assert_eq!(response.status, Status::Ok);
    assert_eq!(response.content_type.as_deref(), Some("application/xml"));
    let body = response.body.unwrap();
    assert!(body.contains("<access_token>"));
    assert!(body.contains("<token_type>Bearer</token_type>"));
}

#[test]
fn form_format_negotiated() {
    let mut handler = example_handler();
    let endpoint = TokenEndpoint::standard();

    let request = credentialed_request(vec![
        ("grant_type", "client_credentials"),
        ("format", "form_urlencoded"),
    ]);
    let response = endpoint.handle(&mut handler, &request);

    assert_eq!(response.status, Status::Ok);
    assert_eq!(
        response.content_type.as_deref(),
        Some("application/x-www-form-urlencoded")
    );
    assert!(response.body.unwrap().contains("token_type=Bearer"));
}

#[test]
fn unknown_format_rejected() {
    let mut handler = example_handler();
    let endpoint = TokenEndpoint::standard();

    let request = credentialed_request(vec![
        ("grant_type", "client_credentials"),
        ("format", "yaml"),
    ]);
    let response = endpoint.handle(&mut handler, &request);

    assert_eq!(response.status, Status::BadRequest);
    assert_eq!(error_code(&response), "invalid_request");
}
