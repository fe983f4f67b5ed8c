use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::Request,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::services::Services;
use crate::storage::DbPool;

use super::handlers::{
    create_certificate_handler, create_configuration_handler, create_loadbalancer_handler,
    create_route_handler, delete_certificate_handler, get_certificate_handler,
    get_configuration_handler, get_loadbalancer_handler, get_route_handler, health_handler,
    update_loadbalancer_handler, validate_loadbalancer_handler,
};

#[derive(Clone)]
pub struct ApiState {
    pub services: Services,
    /// Present when backed by SQLite; reported by `/health`
    pub pool: Option<DbPool>,
}

pub fn build_router(state: ApiState, config: &ServerConfig) -> Router {
    let api = Router::new()
        .route("/v4beta/aglb", post(create_loadbalancer_handler))
        .route("/v4beta/aglb/validate", post(validate_loadbalancer_handler))
        .route(
            "/v4beta/aglb/{id}",
            get(get_loadbalancer_handler).put(update_loadbalancer_handler),
        )
        .route("/v4beta/aglb/configurations", post(create_configuration_handler))
        .route("/v4beta/aglb/configurations/{id}", get(get_configuration_handler))
        .route("/v4beta/aglb/routes", post(create_route_handler))
        .route("/v4beta/aglb/routes/{id}", get(get_route_handler))
        .route("/v4beta/aglb/certificates", post(create_certificate_handler))
        .route(
            "/v4beta/aglb/certificates/{id}",
            get(get_certificate_handler).delete(delete_certificate_handler),
        );

    let router = Router::new()
        .route("/health", get(health_handler))
        .merge(api)
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(TimeoutLayer::new(config.timeout()))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            crate::request_span!(request.method(), request.uri().path())
        }));

    if config.enable_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
