//! Company data is only visible inside its own tenant

mod helpers;

use helpers::spawn_app;
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn cross_tenant_company_read_is_forbidden() {
    let app = spawn_app().await;
    let token = app.access_token(&app.seed.recruiter);

    let own = app
        .get_with_token(&format!("/api/companies/{}", app.seed.acme.public_id), &token)
        .await;
    assert_eq!(own.status(), StatusCode::OK);

    let other = app
        .get_with_token(&format!("/api/companies/{}", app.seed.globex.public_id), &token)
        .await;
    assert_eq!(other.status(), StatusCode::FORBIDDEN);
    let body = other.text().await.unwrap();
    assert!(!body.contains("Globex"), "response leaked company data: {}", body);
}

#[tokio::test]
async fn admin_of_one_tenant_cannot_list_another() {
    let app = spawn_app().await;
    let rival_admin = app.access_token(&app.seed.rival);

    let response = app
        .get_with_token(
            &format!("/api/companies/{}/employees", app.seed.acme.public_id),
            &rival_admin,
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Unauthorized access to company data");

    let own = app
        .get_with_token(
            &format!("/api/companies/{}/employees", app.seed.globex.public_id),
            &rival_admin,
        )
        .await;
    assert_eq!(own.status(), StatusCode::OK);
    let employees: Vec<Value> = own.json().await.unwrap();
    assert_eq!(employees.len(), 1);
    assert_eq!(employees[0]["email"], "gus@globex.com");
}

#[tokio::test]
async fn interviewers_cannot_list_staff() {
    let app = spawn_app().await;
    let response = app
        .get_with_token(
            &format!("/api/companies/{}/employees", app.seed.acme.public_id),
            &app.access_token(&app.seed.interviewer),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn missing_company_is_not_found_for_everyone() {
    let app = spawn_app().await;
    let response = app
        .get_with_token("/api/companies/no-such-company", &app.access_token(&app.seed.admin))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_subject_is_forbidden_on_company_routes() {
    let app = spawn_app().await;
    let stranger = app
        .state
        .tokens
        .issue_access("auth0|stranger", Some("stranger@nowhere.io"), &[])
        .unwrap();

    let response = app
        .get_with_token(&format!("/api/companies/{}", app.seed.acme.public_id), &stranger)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
