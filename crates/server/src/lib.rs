pub mod auth;
pub mod error;
pub mod routes;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub type DeploymentImpl = deployment::LocalDeployment;

pub fn router(deployment: &DeploymentImpl) -> Router {
    let api = Router::new()
        .merge(routes::health::router(deployment))
        .merge(routes::projects::router(deployment))
        .merge(routes::artifacts::router(deployment))
        .merge(routes::messages::router(deployment))
        .merge(routes::leads::router(deployment))
        .merge(routes::clients::router(deployment))
        .merge(routes::tools::router(deployment))
        .merge(routes::credits::router(deployment))
        .merge(routes::billing::router(deployment))
        .merge(routes::publish::router(deployment));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(deployment.clone())
}
