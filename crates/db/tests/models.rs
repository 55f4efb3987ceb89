use db::DBService;
use db::models::{
    artifact::{Artifact, ArtifactType},
    client::Client,
    lead::{CreateLead, Lead},
    preview_token::PreviewToken,
    project::{CreateProject, Project, ProjectMode},
    published_website::{PublishStatus, PublishedWebsite},
    user_profile::{CreditTransaction, TransactionType, UserProfile},
};
use serde_json::json;
use uuid::Uuid;

async fn setup() -> DBService {
    DBService::new_in_memory().await.expect("in-memory db")
}

async fn make_project(db: &DBService, owner: Uuid) -> Project {
    Project::create(
        &db.pool,
        owner,
        &CreateProject {
            name: None,
            mode: ProjectMode::Agency,
            agency_type: Some("web-design".to_string()),
            idea: Some("websites for plumbers".to_string()),
        },
        Uuid::new_v4(),
    )
    .await
    .expect("create project")
}

#[tokio::test]
async fn agency_project_gets_derived_name() {
    let db = setup().await;
    let project = make_project(&db, Uuid::new_v4()).await;
    assert_eq!(project.name, "Web Design Agency");
}

#[tokio::test]
async fn artifact_upsert_bumps_version_and_snapshots_previous() {
    let db = setup().await;
    let project = make_project(&db, Uuid::new_v4()).await;

    let first = Artifact::upsert(
        &db.pool,
        project.id,
        ArtifactType::BrandIdentity,
        &json!({"brand_name": "v1"}),
    )
    .await
    .unwrap();
    assert_eq!(first.version, 1);
    assert!(first.previous_data.is_none());

    let second = Artifact::upsert(
        &db.pool,
        project.id,
        ArtifactType::BrandIdentity,
        &json!({"brand_name": "v2"}),
    )
    .await
    .unwrap();
    assert_eq!(second.version, 2);
    assert_eq!(second.id, first.id, "one row per (project, type)");
    assert_eq!(
        second.previous_data.as_deref(),
        Some(r#"{"brand_name":"v1"}"#)
    );
    assert_eq!(
        second.parsed_value().unwrap()["brand_name"],
        json!("v2")
    );

    let all = Artifact::find_by_project_id(&db.pool, project.id).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn lead_upsert_is_keyed_by_place_id() {
    let db = setup().await;
    let project = make_project(&db, Uuid::new_v4()).await;

    let lead = |score| CreateLead {
        place_id: "place-1".to_string(),
        name: "Joe's Plumbing".to_string(),
        category: None,
        address: None,
        phone: None,
        website: None,
        rating: Some(4.0),
        review_count: 12,
        score,
    };

    let first = Lead::upsert(&db.pool, project.id, &lead(80)).await.unwrap();
    let second = Lead::upsert(&db.pool, project.id, &lead(90)).await.unwrap();

    assert_eq!(first.id, second.id, "re-running generation must not duplicate");
    assert_eq!(second.score, 90);

    let all = Lead::find_by_project_id(&db.pool, project.id).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn lead_delete_is_idempotent() {
    let db = setup().await;
    let project = make_project(&db, Uuid::new_v4()).await;

    let lead = Lead::upsert(
        &db.pool,
        project.id,
        &CreateLead {
            place_id: "p".to_string(),
            name: "Biz".to_string(),
            category: None,
            address: None,
            phone: None,
            website: None,
            rating: None,
            review_count: 0,
            score: 50,
        },
    )
    .await
    .unwrap();

    assert_eq!(Lead::delete(&db.pool, lead.id, project.id).await.unwrap(), 1);
    assert_eq!(Lead::delete(&db.pool, lead.id, project.id).await.unwrap(), 0);
}

#[tokio::test]
async fn credit_add_and_deduct_keep_ledger_consistent() {
    let db = setup().await;
    let user = Uuid::new_v4();

    let profile = UserProfile::ensure(&db.pool, user, 50).await.unwrap();
    assert_eq!(profile.credits, 50);

    // Second touch must not re-grant
    let profile = UserProfile::ensure(&db.pool, user, 50).await.unwrap();
    assert_eq!(profile.credits, 50);

    let balance = UserProfile::add_credits(&db.pool, user, 100).await.unwrap();
    assert_eq!(balance, 150);
    CreditTransaction::create(
        &db.pool,
        user,
        100,
        TransactionType::Purchase,
        "Credit purchase",
        balance,
    )
    .await
    .unwrap();

    let deducted = UserProfile::try_deduct(&db.pool, user, 25).await.unwrap();
    assert_eq!(deducted, Some(125));

    // Over-deduction leaves the balance untouched
    let refused = UserProfile::try_deduct(&db.pool, user, 1000).await.unwrap();
    assert_eq!(refused, None);
    let profile = UserProfile::find_by_id(&db.pool, user).await.unwrap().unwrap();
    assert_eq!(profile.credits, 125);

    let transactions = CreditTransaction::find_by_user_id(&db.pool, user, 10)
        .await
        .unwrap();
    // signup grant + purchase (deduction row is written by the service layer)
    assert_eq!(transactions.len(), 2);
    let purchase = transactions
        .iter()
        .find(|t| t.transaction_type == TransactionType::Purchase)
        .unwrap();
    assert_eq!(purchase.balance_after, 150);
}

#[tokio::test]
async fn subdomain_collision_is_a_unique_violation() {
    let db = setup().await;
    let owner = Uuid::new_v4();
    let a = make_project(&db, owner).await;
    let b = make_project(&db, owner).await;

    PublishedWebsite::create(&db.pool, a.id, "acme").await.unwrap();
    let err = PublishedWebsite::create(&db.pool, b.id, "acme")
        .await
        .expect_err("duplicate subdomain must fail");

    assert!(
        err.as_database_error()
            .map(|d| d.is_unique_violation())
            .unwrap_or(false)
    );

    // and no second row exists
    let found = PublishedWebsite::find_by_subdomain(&db.pool, "acme")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.project_id, a.id);
}

#[tokio::test]
async fn publication_lifecycle_transitions() {
    let db = setup().await;
    let project = make_project(&db, Uuid::new_v4()).await;

    let record = PublishedWebsite::create(&db.pool, project.id, "mysite").await.unwrap();
    assert_eq!(record.status, PublishStatus::Deploying);

    PublishedWebsite::set_deployment(&db.pool, record.id, "dpl_1").await.unwrap();
    PublishedWebsite::update_status(
        &db.pool,
        record.id,
        PublishStatus::Published,
        Some("https://mysite.anything.site"),
        None,
    )
    .await
    .unwrap();

    let record = PublishedWebsite::find_by_project_id(&db.pool, project.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, PublishStatus::Published);
    assert_eq!(record.deployment_id.as_deref(), Some("dpl_1"));
    assert_eq!(record.url.as_deref(), Some("https://mysite.anything.site"));
}

#[tokio::test]
async fn missing_client_is_none_not_error() {
    let db = setup().await;
    let project = make_project(&db, Uuid::new_v4()).await;

    let found = Client::find_for_project(&db.pool, Uuid::new_v4(), project.id)
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn preview_tokens_expire() {
    let db = setup().await;
    let project = make_project(&db, Uuid::new_v4()).await;

    PreviewToken::create(&db.pool, "live-token", project.id, 1).await.unwrap();
    PreviewToken::create(&db.pool, "dead-token", project.id, -1).await.unwrap();

    assert!(
        PreviewToken::find_valid(&db.pool, "live-token")
            .await
            .unwrap()
            .is_some()
    );
    assert!(
        PreviewToken::find_valid(&db.pool, "dead-token")
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        PreviewToken::find_valid(&db.pool, "unknown")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn deleting_a_project_cascades() {
    let db = setup().await;
    let owner = Uuid::new_v4();
    let project = make_project(&db, owner).await;

    Artifact::upsert(&db.pool, project.id, ArtifactType::Leads, &json!({"leads": []}))
        .await
        .unwrap();
    Lead::upsert(
        &db.pool,
        project.id,
        &CreateLead {
            place_id: "p".to_string(),
            name: "Biz".to_string(),
            category: None,
            address: None,
            phone: None,
            website: None,
            rating: None,
            review_count: 0,
            score: 50,
        },
    )
    .await
    .unwrap();

    assert_eq!(Project::delete(&db.pool, project.id, owner).await.unwrap(), 1);

    assert!(
        Artifact::find_by_project_id(&db.pool, project.id)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(
        Lead::find_by_project_id(&db.pool, project.id)
            .await
            .unwrap()
            .is_empty()
    );
}
