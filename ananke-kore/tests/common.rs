#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use axum::http::{HeaderValue, header::AUTHORIZATION};
use axum_test::TestServer;
use serde_json::{Value, json};
use tempfile::TempDir;

use ananke_config::{ConfigLoader, EnvConfig};
use ananke_core::{
    Layout,
    hub::MockHubApi,
    lti::claim,
    os::testing::RecordingRunner,
};
use ananke_kore::{AppState, routes};

pub const HOOK_TOKEN: &str = "hook-secret";
pub const LEARNER_ROLE: &str =
    "http://purl.imsglobal.org/vocab/lis/v2/membership#Learner";

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub runner: Arc<RecordingRunner>,
    pub layout: Layout,
    _dir: TempDir,
}

pub fn build_test_app(hub: MockHubApi) -> TestApp {
    build_test_app_with(hub, "")
}

/// `extra` is appended to the generated `ananke.toml`.
pub fn build_test_app_with(hub: MockHubApi, extra: &str) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::rooted_at(dir.path());
    let config_path = dir.path().join("ananke.toml");
    std::fs::write(&config_path, config_toml(&layout, extra)).unwrap();

    let config = ConfigLoader::new()
        .with_config_path(&config_path)
        .load_from_env(EnvConfig::default())
        .unwrap()
        .config;
    assert_eq!(config.layout(), layout);

    let runner =
        Arc::new(RecordingRunner::new().with_home_root(&layout.home_root));
    let state = AppState::build(config, runner.clone(), Arc::new(hub)).unwrap();
    let server =
        TestServer::new(routes::create_api_router(state.clone())).unwrap();

    TestApp {
        server,
        state,
        runner,
        layout,
        _dir: dir,
    }
}

fn config_toml(layout: &Layout, extra: &str) -> String {
    let path = |p: &Path| p.display().to_string();
    format!(
        r#"
[paths]
home_root = "{home}"
private_root = "{private}"
runtime_dir = "{runtime}"
instructors_file = "{instructors}"
registry_file = "{registry}"
nbgrader_config_file = "{nbgrader}"
exchange_root = "{exchange}"
keys_dir = "{keys}"

[hub]
api_token = "{HOOK_TOKEN}"
enrollment_delay_secs = 0

{extra}
"#,
        home = path(&layout.home_root),
        private = path(&layout.private_root),
        runtime = path(&layout.runtime_dir),
        instructors = path(&layout.instructors_file),
        registry = path(&layout.registry_file),
        nbgrader = path(&layout.nbgrader_config_file),
        exchange = path(&layout.exchange_root),
        keys = path(&layout.keys_dir),
    )
}

pub fn launch_claims(role: &str, link: &str) -> Value {
    json!({
        "sub": "lms-42",
        "given_name": "Ada",
        "family_name": "Lovelace",
        "aud": "client-1",
        claim::ROLES: [role],
        claim::DEPLOYMENT_ID: "d1",
        claim::RESOURCE_LINK: { "id": link, "title": "HW1" },
        claim::CONTEXT: { "title": "CS101" },
        claim::TARGET_LINK_URI: "https://hub.example.org/jhub/",
    })
}

pub fn hook_auth() -> HeaderValue {
    HeaderValue::from_static("token hook-secret")
}

/// Runs the post-auth hook and returns its JSON body.
pub async fn login(app: &TestApp, user: &str, claims: Value) -> Value {
    let response = app
        .server
        .post(routes::POST_AUTH_HOOK)
        .add_header(AUTHORIZATION, hook_auth())
        .json(&json!({ "user": user, "auth_state": claims }))
        .await;
    response.assert_status_ok();
    response.json::<Value>()
}

/// Instructor login for resource link `link`; returns the course id.
pub async fn login_instructor(app: &TestApp, user: &str, link: &str) -> String {
    let body =
        login(app, user, launch_claims(claim::INSTRUCTOR_ROLE, link)).await;
    body["course_id"].as_str().unwrap().to_string()
}

pub fn add_notebook(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join("task.ipynb"), "{}").unwrap();
}
