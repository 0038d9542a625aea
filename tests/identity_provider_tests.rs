use serde_json::json;
use sessionmart::{
    models::Role,
    repositories::{SqliteSocialAccountRepository, SqliteUserRepository},
    services::{
        HttpIdentityProvider, IdentityProvider, IdentityProviderError, ProviderConfig, UserService,
    },
    test_utils::test_helpers,
};
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pointed_at(mut config: ProviderConfig, server: &MockServer) -> HttpIdentityProvider {
    config.token_url = format!("{}/token", server.uri());
    config.userinfo_url = format!("{}/user", server.uri());
    config.emails_url = config
        .emails_url
        .map(|_| format!("{}/user/emails", server.uri()));
    HttpIdentityProvider::new(config).unwrap()
}

fn github(server: &MockServer) -> HttpIdentityProvider {
    pointed_at(
        ProviderConfig::github(
            "gh-client".to_string(),
            "gh-secret".to_string(),
            "http://api.test/accounts/github/login/callback/".to_string(),
        ),
        server,
    )
}

#[tokio::test]
async fn test_github_code_exchange_yields_identity() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=abc123"))
        .and(body_string_contains("client_id=gh-client"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "gho_token", "token_type": "bearer"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header("authorization", "Bearer gho_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 583231,
            "login": "octocat",
            "email": "octocat@github.com"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let identity = github(&server).exchange_code("abc123").await.unwrap();

    assert_eq!(identity.provider, "github");
    assert_eq!(identity.subject, "583231");
    assert_eq!(identity.username.as_deref(), Some("octocat"));
    assert_eq!(identity.email.as_deref(), Some("octocat@github.com"));
    // No email list was served, so the profile address stays unverified
    assert!(!identity.email_verified);
}

#[tokio::test]
async fn test_github_private_email_comes_from_verified_primary() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "gho_t"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 9001,
            "login": "quiet",
            "email": null
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user/emails"))
        .and(header("authorization", "Bearer gho_t"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"email": "old@example.com", "primary": false, "verified": true},
            {"email": "quiet@users.noreply.github.com", "primary": true, "verified": true}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let identity = github(&server).exchange_code("abc").await.unwrap();

    assert_eq!(identity.email.as_deref(), Some("quiet@users.noreply.github.com"));
    assert!(identity.email_verified);
}

#[tokio::test]
async fn test_github_unverified_primary_is_not_trusted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "gho_t"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 9002,
            "login": "fresh",
            "email": "fresh@example.com"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user/emails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"email": "fresh@example.com", "primary": true, "verified": false}
        ])))
        .mount(&server)
        .await;

    let identity = github(&server).exchange_code("abc").await.unwrap();

    assert_eq!(identity.email.as_deref(), Some("fresh@example.com"));
    assert!(!identity.email_verified);
}

#[tokio::test]
async fn test_github_error_payload_is_rejected() {
    let server = MockServer::start().await;

    // GitHub reports a bad code with 200 and an error body
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "bad_verification_code",
            "error_description": "The code passed is incorrect or expired."
        })))
        .mount(&server)
        .await;

    let result = github(&server).exchange_code("stale").await;

    match result {
        Err(IdentityProviderError::Rejected(msg)) => {
            assert!(msg.starts_with("bad_verification_code"), "{}", msg)
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_userinfo_failure_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "t"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = github(&server).exchange_code("abc").await;
    assert!(matches!(result, Err(IdentityProviderError::Rejected(_))));
}

#[tokio::test]
async fn test_google_identity_uses_sub_and_email() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.token",
            "id_token": "ignored"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": "10769150350006150715113082367",
            "email": "jane.doe@gmail.com",
            "name": "Jane Doe"
        })))
        .mount(&server)
        .await;

    let provider = pointed_at(
        ProviderConfig::google(
            "g-client".to_string(),
            "g-secret".to_string(),
            "http://api.test/accounts/google/login/callback/".to_string(),
        ),
        &server,
    );
    let identity = provider.exchange_code("4/0Ab").await.unwrap();

    assert_eq!(identity.provider, "google");
    assert_eq!(identity.subject, "10769150350006150715113082367");
    assert_eq!(identity.username.as_deref(), Some("jane.doe"));
    assert!(!identity.email_verified);
}

#[tokio::test]
async fn test_google_unverified_email_does_not_take_over_account() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "ya29.t"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": "attacker-sub",
            "email": "victim@corp.example",
            "email_verified": false
        })))
        .mount(&server)
        .await;

    let pool = test_helpers::create_test_db().await.unwrap();
    let users = UserService::new(
        Arc::new(SqliteUserRepository::new(pool.clone())),
        Arc::new(SqliteSocialAccountRepository::new(pool.clone())),
    );
    let victim_id = test_helpers::insert_test_user(
        &pool,
        "victim",
        Some("victim@corp.example"),
        "password123",
        Some(Role::Creator),
    )
    .await
    .unwrap();

    let provider = pointed_at(
        ProviderConfig::google(
            "g-client".to_string(),
            "g-secret".to_string(),
            "http://api.test/accounts/google/login/callback/".to_string(),
        ),
        &server,
    );
    let identity = provider.exchange_code("4/0Ab").await.unwrap();
    assert!(!identity.email_verified);

    let linked = users.link_external_identity(&identity).await.unwrap();
    assert_ne!(linked.id, victim_id);
}

#[tokio::test]
async fn test_google_verified_email_links_existing_account() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "ya29.t"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": "owner-sub",
            "email": "owner@corp.example",
            "email_verified": true
        })))
        .mount(&server)
        .await;

    let pool = test_helpers::create_test_db().await.unwrap();
    let users = UserService::new(
        Arc::new(SqliteUserRepository::new(pool.clone())),
        Arc::new(SqliteSocialAccountRepository::new(pool.clone())),
    );
    let owner_id = test_helpers::insert_test_user(
        &pool,
        "owner",
        Some("owner@corp.example"),
        "password123",
        None,
    )
    .await
    .unwrap();

    let provider = pointed_at(
        ProviderConfig::google(
            "g-client".to_string(),
            "g-secret".to_string(),
            "http://api.test/accounts/google/login/callback/".to_string(),
        ),
        &server,
    );
    let identity = provider.exchange_code("4/0Ab").await.unwrap();
    let linked = users.link_external_identity(&identity).await.unwrap();
    assert_eq!(linked.id, owner_id);
}
