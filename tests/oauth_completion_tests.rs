use sessionmart::{
    models::Role,
    repositories::{SqliteUserRepository, UserRepository},
    services::{
        CompletionOutcome, CredentialService, OAuthCompletion, RoleHandoffStore,
        SqliteRoleHandoffStore,
    },
    test_utils::test_helpers::{self, TEST_LOGIN_URL},
};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    completion: OAuthCompletion,
    handoff: Arc<SqliteRoleHandoffStore>,
    users: Arc<SqliteUserRepository>,
    credentials: Arc<CredentialService>,
}

fn harness(pool: &SqlitePool) -> Harness {
    let handoff = Arc::new(SqliteRoleHandoffStore::new(
        pool.clone(),
        Duration::from_secs(600),
    ));
    let users = Arc::new(SqliteUserRepository::new(pool.clone()));
    let credentials = Arc::new(CredentialService::new(
        pool.clone(),
        Duration::from_secs(3600),
        Duration::from_secs(86400),
    ));
    let completion = OAuthCompletion::new(
        handoff.clone(),
        users.clone(),
        credentials.clone(),
        TEST_LOGIN_URL.to_string(),
    );
    Harness {
        completion,
        handoff,
        users,
        credentials,
    }
}

fn query_params(url: &str) -> HashMap<String, String> {
    reqwest::Url::parse(url)
        .unwrap()
        .query_pairs()
        .into_owned()
        .collect()
}

#[tokio::test]
async fn test_creator_intent_survives_the_redirect() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let h = harness(&pool);
    let user_id = test_helpers::insert_test_user(&pool, "newcomer", None, "password123", None)
        .await
        .unwrap();

    let state = h.handoff.put(Role::Creator).await.unwrap();
    let account = h.users.find_by_id(user_id).await.unwrap();
    let outcome = h.completion.complete(account, Some(&state)).await;

    let CompletionOutcome::SignedIn {
        role, redirect_url, ..
    } = outcome.clone()
    else {
        panic!("expected a signed-in outcome, got {:?}", outcome);
    };
    assert_eq!(role, Role::Creator);
    assert!(redirect_url.starts_with(TEST_LOGIN_URL));

    let params = query_params(&redirect_url);
    let access = params.get("access").expect("access credential");
    let refresh = params.get("refresh").expect("refresh credential");

    let validated = h.credentials.validate_access_token(access).await.unwrap();
    assert_eq!(validated.user_id, user_id);
    assert!(h.credentials.refresh_access_token(refresh).await.is_ok());

    let stored = h.users.find_by_id(user_id).await.unwrap().unwrap();
    assert_eq!(stored.role, Some(Role::Creator));
}

#[tokio::test]
async fn test_creator_is_not_downgraded_by_user_intent() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let h = harness(&pool);
    let user_id =
        test_helpers::insert_test_user(&pool, "veteran", None, "password123", Some(Role::Creator))
            .await
            .unwrap();

    let state = h.handoff.put(Role::User).await.unwrap();
    let account = h.users.find_by_id(user_id).await.unwrap();
    let outcome = h.completion.complete(account, Some(&state)).await;

    assert!(matches!(
        outcome,
        CompletionOutcome::SignedIn {
            role: Role::Creator,
            ..
        }
    ));
    let stored = h.users.find_by_id(user_id).await.unwrap().unwrap();
    assert_eq!(stored.role, Some(Role::Creator));
}

#[tokio::test]
async fn test_user_is_upgraded_by_creator_intent() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let h = harness(&pool);
    let user_id =
        test_helpers::insert_test_user(&pool, "learner", None, "password123", Some(Role::User))
            .await
            .unwrap();

    let state = h.handoff.put(Role::Creator).await.unwrap();
    let account = h.users.find_by_id(user_id).await.unwrap();
    h.completion.complete(account, Some(&state)).await;

    let stored = h.users.find_by_id(user_id).await.unwrap().unwrap();
    assert_eq!(stored.role, Some(Role::Creator));
}

#[tokio::test]
async fn test_replayed_state_falls_back_to_default_role() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let h = harness(&pool);
    let first_id = test_helpers::insert_test_user(&pool, "first", None, "password123", None)
        .await
        .unwrap();
    let second_id = test_helpers::insert_test_user(&pool, "second", None, "password123", None)
        .await
        .unwrap();

    let state = h.handoff.put(Role::Creator).await.unwrap();

    let first = h.users.find_by_id(first_id).await.unwrap();
    h.completion.complete(first, Some(&state)).await;
    let second = h.users.find_by_id(second_id).await.unwrap();
    let outcome = h.completion.complete(second, Some(&state)).await;

    assert!(matches!(
        outcome,
        CompletionOutcome::SignedIn {
            role: Role::User,
            ..
        }
    ));
}

#[tokio::test]
async fn test_missing_or_garbage_state_means_user() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let h = harness(&pool);
    let user_id = test_helpers::insert_test_user(&pool, "plain", None, "password123", None)
        .await
        .unwrap();

    let account = h.users.find_by_id(user_id).await.unwrap();
    let outcome = h.completion.complete(account, Some("%%%not-a-token")).await;

    assert!(matches!(
        outcome,
        CompletionOutcome::SignedIn {
            role: Role::User,
            ..
        }
    ));
}

#[tokio::test]
async fn test_unauthenticated_flow_redirects_to_bare_login() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let h = harness(&pool);

    let state = h.handoff.put(Role::Creator).await.unwrap();
    let outcome = h.completion.complete(None, Some(&state)).await;

    assert_eq!(
        outcome,
        CompletionOutcome::LoginRequired {
            redirect_url: TEST_LOGIN_URL.to_string()
        }
    );
    // The abandoned intent cannot be picked up later
    assert_eq!(h.handoff.take_role(&state).await, Role::User);
}
