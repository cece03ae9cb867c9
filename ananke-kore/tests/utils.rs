use std::path::Path;

use axum::http::StatusCode;
use serde_json::Value;

use ananke_core::hub::MockHubApi;
use ananke_kore::routes;

mod common;
use common::{HOOK_TOKEN, build_test_app, build_test_app_with};

#[tokio::test]
async fn jwks_serves_the_public_key() {
    let app = build_test_app(MockHubApi::new());
    let testdata =
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../ananke-core/testdata/keys");
    std::fs::create_dir_all(&app.layout.keys_dir).unwrap();
    std::fs::copy(
        testdata.join("lti_key.json"),
        app.layout.public_jwk_path(),
    )
    .unwrap();

    let response = app.server.get(routes::JWKS).await;

    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["keys"][0]["kid"], "ananke-test-key");
    assert_eq!(body["keys"][0]["kty"], "RSA");
}

#[tokio::test]
async fn jwks_without_keys_is_a_server_error() {
    let app = build_test_app(MockHubApi::new());

    app.server
        .get(routes::JWKS)
        .await
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn config_exposes_public_settings_only() {
    let app = build_test_app_with(
        MockHubApi::new(),
        "[lti]\nclient_id = \"client-1\"\n\
         issuer = \"https://lms.example.org\"\n\
         access_token_url = \"https://lms.example.org/token\"\n",
    );

    let response = app.server.get(routes::CONFIG).await;

    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["lti"]["client_id"], "client-1");
    assert_eq!(body["lti"]["grade_push"], true);
    assert!(body["backup"]["timestamp_format"].is_string());
    assert!(!response.text().contains(HOOK_TOKEN));
}
