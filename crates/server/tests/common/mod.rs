#![allow(dead_code)]

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use deployment::LocalDeployment;
use serde_json::Value;
use services::services::config::Config;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "test-secret";
pub const WEBHOOK_SECRET: &str = "whsec_test";

pub struct TestContext {
    pub deployment: LocalDeployment,
    pub app: axum::Router,
    pub user_id: Uuid,
    pub token: String,
}

pub async fn build_test_context() -> TestContext {
    let deployment = LocalDeployment::new(Config::for_tests())
        .await
        .expect("test deployment should build");
    let app = server::router(&deployment);
    let user_id = Uuid::new_v4();
    let token = utils::jwt::sign(user_id, TEST_SECRET, 3600).expect("token should sign");

    TestContext {
        deployment,
        app,
        user_id,
        token,
    }
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }

    let req = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should complete");

    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, value)
}

pub async fn create_project(ctx: &TestContext, body: Value) -> Value {
    let (status, value) =
        request_json(&ctx.app, "POST", "/api/projects", Some(&ctx.token), Some(body)).await;
    assert_eq!(status, StatusCode::OK, "project create failed: {value}");
    value["data"].clone()
}

pub fn project_id(project: &Value) -> Uuid {
    project["id"]
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .expect("project id")
}
