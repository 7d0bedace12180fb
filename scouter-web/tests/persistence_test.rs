//! Two server instances sharing one SQLite database

#![cfg(feature = "sqlite")]

mod helpers;

use helpers::{serve_state, test_config, Seed, TestApp, RECRUITER_PASSWORD};
use reqwest::StatusCode;
use scouter_web::AppState;
use serde_json::json;
use std::path::Path;

async fn instance(db: &Path, seed: &Seed, apply_seed: bool) -> TestApp {
    let mut config = test_config();
    config.database.url = Some(format!("sqlite://{}?mode=rwc", db.display()));

    let state = AppState::new(config).await.expect("Failed to build state");
    if apply_seed {
        seed.apply(&state.employees).await;
    }
    serve_state(state, seed.clone()).await
}

#[tokio::test]
async fn rate_limit_counters_are_shared_between_instances() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("scouter.db");
    let seed = Seed::build();

    let first = instance(&db, &seed, true).await;
    let second = instance(&db, &seed, false).await;

    for _ in 0..5 {
        let response = first
            .post_login(&json!({"username": "rob", "password": "wrong-password"}))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = second
        .post_login(&json!({"username": "rob", "password": RECRUITER_PASSWORD}))
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn onboarding_on_one_instance_is_visible_on_another() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("scouter.db");
    let seed = Seed::build();

    let first = instance(&db, &seed, true).await;
    let second = instance(&db, &seed, false).await;

    let idp_token = first
        .state
        .tokens
        .issue_access("auth0|nia", Some(&seed.invitee.email), &[])
        .unwrap();
    let response = first.post_access_gate(&idp_token, "ACME-REC-2024").await;
    assert_eq!(response.status(), StatusCode::OK);

    // both instances share the signing secret
    let response = second.get_with_token("/api/auth/me", &idp_token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let purged = second.state.purge_expired_windows().await.unwrap();
    assert_eq!(purged, 0);
}
