//! HTTP handlers for the AGLB API.
//!
//! Handlers only translate between HTTP and the service layer; every
//! decision about validity is made in `validation` and `services`.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::domain::{
    Certificate, CertificateId, Configuration, ConfigurationId, Loadbalancer, LoadbalancerId,
    ResourceGraph, Route, RouteId,
};
use crate::storage::{get_pool_stats, PoolStats};
use crate::validation::{
    ConfigurationPayload, CreateCertificatePayload, CreateLoadbalancerPayload, RoutePayload,
    UpdateLoadbalancerPayload,
};

use super::{error::ApiError, routes::ApiState};

type ApiResult<T> = Result<T, ApiError>;

/// Unwrap a JSON body, reporting malformed input in the API error format
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload.map(|Json(payload)| payload).map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "Rejected request body");
        ApiError::bad_request(rejection.body_text())
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PoolStats>,
}

pub async fn health_handler(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", database: state.pool.as_ref().map(get_pool_stats) })
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub graph: ResourceGraph,
}

pub async fn validate_loadbalancer_handler(
    State(state): State<ApiState>,
    payload: Result<Json<CreateLoadbalancerPayload>, JsonRejection>,
) -> ApiResult<Json<ValidateResponse>> {
    let payload = body(payload)?;
    let graph = state.services.loadbalancers.validate_create(payload).await?;
    Ok(Json(ValidateResponse { valid: true, graph }))
}

pub async fn create_loadbalancer_handler(
    State(state): State<ApiState>,
    payload: Result<Json<CreateLoadbalancerPayload>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Loadbalancer>)> {
    let payload = body(payload)?;
    let created = state.services.loadbalancers.create_loadbalancer(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_loadbalancer_handler(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Loadbalancer>> {
    let loadbalancer = state.services.loadbalancers.get_loadbalancer(LoadbalancerId::new(id)).await?;
    Ok(Json(loadbalancer))
}

pub async fn update_loadbalancer_handler(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    payload: Result<Json<UpdateLoadbalancerPayload>, JsonRejection>,
) -> ApiResult<Json<Loadbalancer>> {
    let payload = body(payload)?;
    let updated = state
        .services
        .loadbalancers
        .update_loadbalancer(LoadbalancerId::new(id), payload)
        .await?;
    Ok(Json(updated))
}

pub async fn create_configuration_handler(
    State(state): State<ApiState>,
    payload: Result<Json<ConfigurationPayload>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Configuration>)> {
    let payload = body(payload)?;
    let created = state.services.loadbalancers.create_configuration(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_configuration_handler(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Configuration>> {
    let configuration =
        state.services.loadbalancers.get_configuration(ConfigurationId::new(id)).await?;
    Ok(Json(configuration))
}

pub async fn create_route_handler(
    State(state): State<ApiState>,
    payload: Result<Json<RoutePayload>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Route>)> {
    let payload = body(payload)?;
    let created = state.services.loadbalancers.create_route(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_route_handler(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Route>> {
    let route = state.services.loadbalancers.get_route(RouteId::new(id)).await?;
    Ok(Json(route))
}

pub async fn create_certificate_handler(
    State(state): State<ApiState>,
    payload: Result<Json<CreateCertificatePayload>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Certificate>)> {
    let payload = body(payload)?;
    let created = state.services.certificates.create_certificate(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_certificate_handler(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Certificate>> {
    let certificate = state.services.certificates.get_certificate(CertificateId::new(id)).await?;
    Ok(Json(certificate))
}

pub async fn delete_certificate_handler(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.services.certificates.delete_certificate(CertificateId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
