mod common;

use axum::http::StatusCode;
use common::{WEBHOOK_SECRET, build_test_context, create_project, project_id, request_json};
use db::models::{
    artifact::{Artifact, ArtifactType},
    lead::{CreateLead, Lead},
    published_website::PublishedWebsite,
};
use deployment::Deployment;
use hmac::{Hmac, Mac};
use serde_json::{Value, json};
use sha2::Sha256;
use uuid::Uuid;

fn website_artifact_payload() -> Value {
    json!({
        "design": {
            "template": "minimal",
            "primary_color": "#111827",
            "secondary_color": "#6B7280",
            "heading_font": "Inter",
            "body_font": "Inter"
        },
        "files": [
            {"path": "index.html", "content": "<!doctype html><title>hi</title>"}
        ]
    })
}

fn sign_webhook(payload: &[u8], timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

#[tokio::test]
async fn health_returns_ok_envelope() {
    let ctx = build_test_context().await;
    let (status, body) = request_json(&ctx.app, "GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert!(body["data"]["version"].is_string());
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let ctx = build_test_context().await;
    let (status, body) = request_json(&ctx.app, "GET", "/api/projects", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn garbage_token_is_unauthorized() {
    let ctx = build_test_context().await;
    let (status, _) =
        request_json(&ctx.app, "GET", "/api/projects", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn agency_project_without_name_derives_one() {
    let ctx = build_test_context().await;
    let project = create_project(
        &ctx,
        json!({"mode": "agency", "agency_type": "web-design", "idea": "sites for plumbers"}),
    )
    .await;
    assert_eq!(project["name"], json!("Web Design Agency"));

    let (status, body) = request_json(&ctx.app, "GET", "/api/projects", Some(&ctx.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn projects_are_scoped_to_their_owner() {
    let ctx = build_test_context().await;
    let project = create_project(&ctx, json!({"mode": "playground"})).await;
    let id = project_id(&project);

    // Another user cannot see it
    let other = utils::jwt::sign(Uuid::new_v4(), common::TEST_SECRET, 3600).unwrap();
    let (status, _) = request_json(
        &ctx.app,
        "GET",
        &format!("/api/projects/{id}"),
        Some(&other),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_client_under_valid_project_is_404() {
    let ctx = build_test_context().await;
    let project = create_project(&ctx, json!({"mode": "commerce"})).await;
    let id = project_id(&project);

    let (status, body) = request_json(
        &ctx.app,
        "GET",
        &format!("/api/projects/{id}/clients/{}", Uuid::new_v4()),
        Some(&ctx.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], json!("Client not found"));
}

#[tokio::test]
async fn client_crud_and_activities() {
    let ctx = build_test_context().await;
    let project = create_project(&ctx, json!({"mode": "agency", "agency_type": "seo"})).await;
    let id = project_id(&project);

    let (status, body) = request_json(
        &ctx.app,
        "POST",
        &format!("/api/projects/{id}/clients"),
        Some(&ctx.token),
        Some(json!({"name": "Acme Corp", "email": "ceo@acme.test"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let client_id = body["data"]["id"].as_str().unwrap().to_string();

    // Status update appends an activity
    let (status, _) = request_json(
        &ctx.app,
        "PUT",
        &format!("/api/projects/{id}/clients/{client_id}"),
        Some(&ctx.token),
        Some(json!({"status": "active"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = request_json(
        &ctx.app,
        "GET",
        &format!("/api/projects/{id}/clients/{client_id}/activities"),
        Some(&ctx.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let activities = body["data"].as_array().unwrap();
    assert!(activities.len() >= 2, "creation + status change activities");
}

#[tokio::test]
async fn lead_delete_is_idempotent_and_cleans_artifacts() {
    let ctx = build_test_context().await;
    let project = create_project(&ctx, json!({"mode": "agency", "agency_type": "marketing"})).await;
    let id = project_id(&project);
    let pool = &ctx.deployment.db().pool;

    let lead = Lead::upsert(
        pool,
        id,
        &CreateLead {
            place_id: "place-9".to_string(),
            name: "Target Biz".to_string(),
            category: None,
            address: None,
            phone: None,
            website: None,
            rating: Some(4.1),
            review_count: 7,
            score: 95,
        },
    )
    .await
    .unwrap();

    // Seed artifact projections referencing the lead
    Artifact::upsert(pool, id, ArtifactType::Leads, &json!({"count": 1}))
        .await
        .unwrap();
    Artifact::upsert(
        pool,
        id,
        ArtifactType::LeadWebsite,
        &json!({"lead_id": lead.id.to_string(), "files": []}),
    )
    .await
    .unwrap();

    let uri = format!("/api/projects/{id}/leads/{}", lead.id);
    let (status, _) = request_json(&ctx.app, "DELETE", &uri, Some(&ctx.token), None).await;
    assert_eq!(status, StatusCode::OK);

    // Canonical row gone, projection rebuilt empty, per-lead artifact dropped
    assert!(Lead::find_by_id(pool, lead.id).await.unwrap().is_none());
    let leads_artifact = Artifact::find_by_project_and_type(pool, id, ArtifactType::Leads)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(leads_artifact.parsed_value().unwrap()["count"], json!(0));
    assert!(
        Artifact::find_by_project_and_type(pool, id, ArtifactType::LeadWebsite)
            .await
            .unwrap()
            .is_none()
    );

    // Second delete is a no-op success
    let (status, _) = request_json(&ctx.app, "DELETE", &uri, Some(&ctx.token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn lead_conversion_creates_a_client() {
    let ctx = build_test_context().await;
    let project = create_project(&ctx, json!({"mode": "agency", "agency_type": "seo"})).await;
    let id = project_id(&project);
    let pool = &ctx.deployment.db().pool;

    let lead = Lead::upsert(
        pool,
        id,
        &CreateLead {
            place_id: "place-7".to_string(),
            name: "Corner Bakery".to_string(),
            category: Some("Bakery".to_string()),
            address: None,
            phone: Some("+1 555 0100".to_string()),
            website: None,
            rating: Some(4.6),
            review_count: 12,
            score: 90,
        },
    )
    .await
    .unwrap();

    let (status, body) = request_json(
        &ctx.app,
        "POST",
        &format!("/api/projects/{id}/leads/{}/convert", lead.id),
        Some(&ctx.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], json!("Corner Bakery"));

    let lead = Lead::find_by_id(pool, lead.id).await.unwrap().unwrap();
    assert_eq!(lead.status.to_string(), "converted");
}

#[tokio::test]
async fn subdomain_collision_returns_409_without_duplicate() {
    let ctx = build_test_context().await;
    let first = create_project(&ctx, json!({"mode": "commerce"})).await;
    let second = create_project(&ctx, json!({"mode": "commerce"})).await;
    let first_id = project_id(&first);
    let second_id = project_id(&second);
    let pool = &ctx.deployment.db().pool;

    // First project already claimed the subdomain
    PublishedWebsite::create(pool, first_id, "taken").await.unwrap();

    // Second project has a website ready to publish
    Artifact::upsert(pool, second_id, ArtifactType::Website, &website_artifact_payload())
        .await
        .unwrap();

    let (status, body) = request_json(
        &ctx.app,
        "POST",
        &format!("/api/projects/{second_id}/publish"),
        Some(&ctx.token),
        Some(json!({"subdomain": "Taken"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], json!("Subdomain is already taken"));

    let record = PublishedWebsite::find_by_subdomain(pool, "taken")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.project_id, first_id);
    assert!(
        PublishedWebsite::find_by_project_id(pool, second_id)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn publish_without_website_is_rejected() {
    let ctx = build_test_context().await;
    let project = create_project(&ctx, json!({"mode": "commerce"})).await;
    let id = project_id(&project);

    let (status, body) = request_json(
        &ctx.app,
        "POST",
        &format!("/api/projects/{id}/publish"),
        Some(&ctx.token),
        Some(json!({"subdomain": "nosite"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Generate a website before publishing"));
}

#[tokio::test]
async fn publication_status_404_when_nothing_published() {
    let ctx = build_test_context().await;
    let project = create_project(&ctx, json!({"mode": "commerce"})).await;
    let id = project_id(&project);

    let (status, _) = request_json(
        &ctx.app,
        "GET",
        &format!("/api/projects/{id}/publish"),
        Some(&ctx.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn preview_token_grants_unauthenticated_access() {
    let ctx = build_test_context().await;
    let project = create_project(&ctx, json!({"mode": "commerce"})).await;
    let id = project_id(&project);
    let pool = &ctx.deployment.db().pool;

    Artifact::upsert(pool, id, ArtifactType::Website, &website_artifact_payload())
        .await
        .unwrap();

    let (status, body) = request_json(
        &ctx.app,
        "POST",
        &format!("/api/projects/{id}/preview-token"),
        Some(&ctx.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    // No Authorization header on the preview fetch
    let (status, body) =
        request_json(&ctx.app, "GET", &format!("/api/preview/{token}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["artifact_type"], json!("website"));
    assert!(body["data"]["data"]["files"].is_array());

    let (status, _) =
        request_json(&ctx.app, "GET", "/api/preview/bogus-token", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn credits_profile_and_ledger_flow() {
    let ctx = build_test_context().await;

    // First touch creates the profile with the signup grant
    let (status, body) = request_json(&ctx.app, "GET", "/api/credits", Some(&ctx.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["credits"], json!(50));

    let (status, body) = request_json(
        &ctx.app,
        "GET",
        "/api/credits/transactions",
        Some(&ctx.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let transactions = body["data"].as_array().unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0]["transaction_type"], json!("grant"));
    assert_eq!(transactions[0]["balance_after"], json!(50));
}

#[tokio::test]
async fn checkout_webhook_grants_credits() {
    let ctx = build_test_context().await;

    // Ensure the profile exists with the signup grant
    let (_, body) = request_json(&ctx.app, "GET", "/api/credits", Some(&ctx.token), None).await;
    assert_eq!(body["data"]["credits"], json!(50));

    let event = json!({
        "type": "checkout.session.completed",
        "data": {"object": {
            "id": "cs_test_1",
            "customer": "cus_123",
            "metadata": {"user_id": ctx.user_id.to_string(), "credits": "100"}
        }}
    })
    .to_string();
    let signature = sign_webhook(event.as_bytes(), chrono::Utc::now().timestamp());

    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/api/billing/webhook")
        .header("Content-Type", "application/json")
        .header("stripe-signature", signature)
        .body(axum::body::Body::from(event))
        .unwrap();
    let resp = tower::util::ServiceExt::oneshot(ctx.app.clone(), req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let (_, body) = request_json(&ctx.app, "GET", "/api/credits", Some(&ctx.token), None).await;
    assert_eq!(body["data"]["credits"], json!(150));

    let (_, body) = request_json(
        &ctx.app,
        "GET",
        "/api/credits/transactions",
        Some(&ctx.token),
        None,
    )
    .await;
    let transactions = body["data"].as_array().unwrap();
    let purchase = transactions
        .iter()
        .find(|t| t["transaction_type"] == json!("purchase"))
        .expect("purchase row");
    assert_eq!(purchase["balance_after"], json!(150));
}

#[tokio::test]
async fn webhook_with_bad_signature_is_rejected() {
    let ctx = build_test_context().await;

    let event = json!({"type": "checkout.session.completed", "data": {"object": {}}}).to_string();

    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/api/billing/webhook")
        .header("Content-Type", "application/json")
        .header("stripe-signature", "t=1,v1=deadbeef")
        .body(axum::body::Body::from(event))
        .unwrap();
    let resp = tower::util::ServiceExt::oneshot(ctx.app.clone(), req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_artifact_type_is_400_and_missing_artifact_404() {
    let ctx = build_test_context().await;
    let project = create_project(&ctx, json!({"mode": "playground"})).await;
    let id = project_id(&project);

    let (status, _) = request_json(
        &ctx.app,
        "GET",
        &format!("/api/projects/{id}/artifacts/hologram"),
        Some(&ctx.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = request_json(
        &ctx.app,
        "GET",
        &format!("/api/projects/{id}/artifacts/website"),
        Some(&ctx.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn messages_roundtrip() {
    let ctx = build_test_context().await;
    let project = create_project(&ctx, json!({"mode": "playground"})).await;
    let id = project_id(&project);

    let (status, _) = request_json(
        &ctx.app,
        "POST",
        &format!("/api/projects/{id}/messages"),
        Some(&ctx.token),
        Some(json!({"role": "user", "content": "build me a brand", "tool": null})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = request_json(
        &ctx.app,
        "GET",
        &format!("/api/projects/{id}/messages"),
        Some(&ctx.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = request_json(
        &ctx.app,
        "POST",
        &format!("/api/projects/{id}/messages"),
        Some(&ctx.token),
        Some(json!({"role": "user", "content": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
