use sessionmart::{
    models::{Role, UpdateProfileRequest},
    repositories::{SqliteSocialAccountRepository, SqliteUserRepository},
    services::{
        CreateUserRequest, ExternalIdentity, UpdatePasswordRequest, UserService, UserServiceError,
    },
    test_utils::test_helpers,
};
use sqlx::SqlitePool;
use std::sync::Arc;

fn service(pool: &SqlitePool) -> UserService {
    UserService::new(
        Arc::new(SqliteUserRepository::new(pool.clone())),
        Arc::new(SqliteSocialAccountRepository::new(pool.clone())),
    )
}

fn request(username: &str, email: Option<&str>) -> CreateUserRequest {
    CreateUserRequest {
        username: username.to_string(),
        email: email.map(str::to_string),
        password: "password123".to_string(),
        password_confirm: Some("password123".to_string()),
        role: Some(Role::User),
    }
}

fn github_identity(subject: &str, email: Option<&str>, login: &str) -> ExternalIdentity {
    ExternalIdentity {
        provider: "github".to_string(),
        subject: subject.to_string(),
        email: email.map(str::to_string),
        email_verified: email.is_some(),
        username: Some(login.to_string()),
    }
}

#[tokio::test]
async fn test_create_user_success() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let service = service(&pool);

    let user = service
        .create_user(request("alice", Some("alice@example.com")))
        .await
        .unwrap();

    assert_eq!(user.username, "alice");
    assert_eq!(user.email.as_deref(), Some("alice@example.com"));
    assert_eq!(user.role, Some(Role::User));
    assert!(service.verify_password("password123", &user.password_hash));
}

#[tokio::test]
async fn test_create_user_duplicate_username() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let service = service(&pool);

    service.create_user(request("bob", None)).await.unwrap();
    let result = service.create_user(request("bob", None)).await;

    assert!(matches!(result, Err(UserServiceError::UsernameTaken)));
}

#[tokio::test]
async fn test_create_user_duplicate_email() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let service = service(&pool);

    service
        .create_user(request("carol", Some("shared@example.com")))
        .await
        .unwrap();
    let result = service
        .create_user(request("carol2", Some("shared@example.com")))
        .await;

    assert!(matches!(result, Err(UserServiceError::EmailTaken)));
}

#[tokio::test]
async fn test_password_confirmation_must_match() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let service = service(&pool);

    let mut req = request("dave", None);
    req.password_confirm = Some("different123".to_string());

    let result = service.create_user(req).await;
    assert!(matches!(result, Err(UserServiceError::PasswordMismatch)));
}

#[tokio::test]
async fn test_update_password() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let service = service(&pool);

    let user = service.create_user(request("erin", None)).await.unwrap();

    service
        .update_password(UpdatePasswordRequest {
            user_id: user.id,
            new_password: "newpassword456".to_string(),
            new_password_confirm: Some("newpassword456".to_string()),
        })
        .await
        .unwrap();

    let reloaded = service.find_user_by_id(user.id).await.unwrap().unwrap();
    assert!(service.verify_password("newpassword456", &reloaded.password_hash));
    assert!(!service.verify_password("password123", &reloaded.password_hash));
}

#[tokio::test]
async fn test_update_profile_changes_only_given_fields() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let service = service(&pool);

    let user = service
        .create_user(request("frank", Some("frank@example.com")))
        .await
        .unwrap();

    let updated = service
        .update_profile(
            user.id,
            UpdateProfileRequest {
                role: Some(Role::Creator),
                avatar: Some("avatars/frank.png".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.username, "frank");
    assert_eq!(updated.email.as_deref(), Some("frank@example.com"));
    assert_eq!(updated.role, Some(Role::Creator));
    assert_eq!(updated.avatar.as_deref(), Some("avatars/frank.png"));
}

#[tokio::test]
async fn test_update_profile_rejects_taken_email() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let service = service(&pool);

    service
        .create_user(request("gina", Some("gina@example.com")))
        .await
        .unwrap();
    let other = service.create_user(request("hank", None)).await.unwrap();

    let result = service
        .update_profile(
            other.id,
            UpdateProfileRequest {
                email: Some("gina@example.com".to_string()),
                ..Default::default()
            },
        )
        .await;

    assert!(matches!(result, Err(UserServiceError::EmailTaken)));
}

#[tokio::test]
async fn test_link_external_identity_creates_account_without_role() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let service = service(&pool);

    let identity = github_identity("1001", Some("octo@example.com"), "octo");
    let user = service.link_external_identity(&identity).await.unwrap();

    assert_eq!(user.username, "octo");
    assert_eq!(user.role, None);

    // Signing in again resolves to the same account
    let again = service.link_external_identity(&identity).await.unwrap();
    assert_eq!(again.id, user.id);
}

#[tokio::test]
async fn test_link_external_identity_reuses_account_with_same_email() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let service = service(&pool);

    let existing = service
        .create_user(request("ivy", Some("ivy@example.com")))
        .await
        .unwrap();

    let identity = github_identity("2002", Some("ivy@example.com"), "ivy-gh");
    let linked = service.link_external_identity(&identity).await.unwrap();

    assert_eq!(linked.id, existing.id);
    assert_eq!(linked.role, Some(Role::User));
}

#[tokio::test]
async fn test_link_external_identity_ignores_unverified_email() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let service = service(&pool);

    let victim = service
        .create_user(request("victim", Some("victim@corp.example")))
        .await
        .unwrap();

    let mut identity = github_identity("attacker-sub", Some("victim@corp.example"), "mallory");
    identity.provider = "google".to_string();
    identity.email_verified = false;
    let linked = service.link_external_identity(&identity).await.unwrap();

    assert_ne!(linked.id, victim.id);
    assert_eq!(linked.email, None);

    // Later sign-ins resolve through the provider link
    let again = service.link_external_identity(&identity).await.unwrap();
    assert_eq!(again.id, linked.id);
}

#[tokio::test]
async fn test_link_external_identity_avoids_username_collision() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let service = service(&pool);

    service.create_user(request("jules", None)).await.unwrap();

    let identity = github_identity("3003", None, "jules");
    let user = service.link_external_identity(&identity).await.unwrap();

    assert_ne!(user.username, "jules");
    assert!(user.username.starts_with("jules_"));
}
