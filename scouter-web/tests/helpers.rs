//! Integration test helpers
//!
//! Spawns the full application on an ephemeral port and drives it over HTTP.

#![allow(dead_code)]

use scouter_applications::{MemoryCounterStore, Role};
use scouter_core::ScouterConfig;
use scouter_web::{
    auth::employees::{AccessCodeData, CompanyData, EmployeeData, EmployeeStore},
    AppState,
};
use std::sync::{Arc, LazyLock};
use tokio::net::TcpListener;

// Ensure tracing is only initialized once
static TRACING: LazyLock<()> = LazyLock::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(std::io::sink)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }
});

pub const TEST_SECRET: &str = "integration-test-secret";

/// Directory contents every test app starts with
#[derive(Clone)]
pub struct Seed {
    pub acme: CompanyData,
    pub globex: CompanyData,
    pub admin: EmployeeData,
    pub recruiter: EmployeeData,
    pub interviewer: EmployeeData,
    /// Invited, not yet linked to any identity
    pub invitee: EmployeeData,
    pub rival: EmployeeData,
}

pub const ADMIN_PASSWORD: &str = "admin-password";
pub const RECRUITER_PASSWORD: &str = "recruiter-password";

impl Seed {
    pub fn build() -> Self {
        let acme = CompanyData::new("Acme Corp");
        let globex = CompanyData::new("Globex");

        Self {
            admin: EmployeeData::new("ada@acme.io", "Ada", "Admin", Role::Admin, &acme.public_id)
                .with_credentials("ada", ADMIN_PASSWORD)
                .unwrap(),
            recruiter: EmployeeData::new("rob@acme.io", "Rob", "Reed", Role::Recruiter, &acme.public_id)
                .with_credentials("rob", RECRUITER_PASSWORD)
                .unwrap(),
            interviewer: EmployeeData::new("ian@acme.io", "Ian", "Ives", Role::Interviewer, &acme.public_id),
            invitee: EmployeeData::new("nia@acme.io", "Nia", "Nash", Role::Recruiter, &acme.public_id),
            rival: EmployeeData::new("gus@globex.com", "Gus", "Grant", Role::Admin, &globex.public_id),
            acme,
            globex,
        }
    }

    pub async fn apply(&self, store: &EmployeeStore) {
        store.insert_company(self.acme.clone()).await.unwrap();
        store.insert_company(self.globex.clone()).await.unwrap();
        for employee in [&self.admin, &self.recruiter, &self.interviewer, &self.invitee, &self.rival] {
            store.insert_employee(employee.clone()).await.unwrap();
        }
        for (code, role, company) in [
            ("ACME-REC-2024", Role::Recruiter, &self.acme),
            ("ACME-INT-2024", Role::Interviewer, &self.acme),
            ("GLOBEX-REC-2024", Role::Recruiter, &self.globex),
        ] {
            store
                .insert_access_code(AccessCodeData {
                    code: code.to_string(),
                    role,
                    company_id: company.public_id.clone(),
                    is_active: true,
                })
                .await
                .unwrap();
        }
    }
}

/// Running test application
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub api_client: reqwest::Client,
    pub state: AppState,
    pub seed: Seed,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Locally issued access token for a seeded employee
    pub fn access_token(&self, employee: &EmployeeData) -> String {
        self.state
            .tokens
            .issue_access(&employee.public_id, Some(&employee.email), &[employee.role])
            .unwrap()
    }

    pub async fn get_health(&self) -> reqwest::Response {
        self.api_client
            .get(self.url("/api/health"))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_with_token(&self, path: &str, token: &str) -> reqwest::Response {
        self.api_client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_login<Body>(&self, body: &Body) -> reqwest::Response
    where
        Body: serde::Serialize,
    {
        self.api_client
            .post(self.url("/api/auth/login"))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_refresh(&self, cookie: Option<&str>) -> reqwest::Response {
        let mut request = self.api_client.post(self.url("/api/auth/refresh"));
        if let Some(cookie) = cookie {
            request = request.header(reqwest::header::COOKIE, cookie);
        }
        request.send().await.expect("Failed to execute request.")
    }

    pub async fn post_access_gate(&self, token: &str, code: &str) -> reqwest::Response {
        self.api_client
            .post(self.url("/api/auth/access-gate/verify"))
            .bearer_auth(token)
            .json(&serde_json::json!({ "access_code": code }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_onboarding<Body>(&self, onboarding_token: &str, body: &Body) -> reqwest::Response
    where
        Body: serde::Serialize,
    {
        self.api_client
            .post(self.url("/api/auth/onboarding/complete"))
            .header("X-Onboarding-Token", onboarding_token)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }
}

/// `name=value` part of the first `Set-Cookie` header
pub fn cookie_pair(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::SET_COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .next()
        .map(str::to_string)
}

pub fn test_config() -> ScouterConfig {
    let mut config = ScouterConfig::default();
    config.server.port = 0;
    config.auth.secret_key = TEST_SECRET.to_string();
    config
}

/// Spawn the app with default test configuration
pub async fn spawn_app() -> TestApp {
    spawn_app_with_config(test_config()).await
}

/// Spawn the app over in-memory stores seeded with two companies
pub async fn spawn_app_with_config(config: ScouterConfig) -> TestApp {
    LazyLock::force(&TRACING);

    let store = EmployeeStore::memory();
    let seed = Seed::build();
    seed.apply(&store).await;

    let state = AppState::with_stores(config, store, Arc::new(MemoryCounterStore::new()))
        .expect("Failed to build application state");
    serve_state(state, seed).await
}

/// Serve an already built state; the seed must already be applied to its store
pub async fn serve_state(state: AppState, seed: Seed) -> TestApp {
    LazyLock::force(&TRACING);
    let app = scouter_web::create_app(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        port,
        api_client: client,
        state,
        seed,
    }
}
