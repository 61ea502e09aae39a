use super::error::{AppError, AppResult};
use crate::model::{EnqueueReceipt, LogEntry, StoreSummary};
use crate::service::StoreService;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStoreRequest {
    pub store_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LinkDomainRequest {
    pub domain: String,
}

/// Body of the synchronous store operations.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl StatusResponse {
    fn new(status: &'static str) -> Self {
        Self {
            status,
            store_id: None,
            domain: None,
        }
    }

    fn for_store(status: &'static str, store_id: String) -> Self {
        Self {
            store_id: Some(store_id),
            ..Self::new(status)
        }
    }
}

pub async fn get_logs(State(service): State<StoreService>) -> Json<Vec<LogEntry>> {
    Json(service.logs())
}

pub async fn list_stores(State(service): State<StoreService>) -> Json<Vec<StoreSummary>> {
    Json(service.list_stores().await)
}

pub async fn create_store(
    State(service): State<StoreService>,
    Json(request): Json<CreateStoreRequest>,
) -> AppResult<Json<EnqueueReceipt>> {
    Ok(Json(service.create_store(&request.store_name).await?))
}

pub async fn delete_store(
    State(service): State<StoreService>,
    Path(store_id): Path<String>,
) -> AppResult<Json<StatusResponse>> {
    service.delete_store(&store_id).await?;
    Ok(Json(StatusResponse::new("success")))
}

pub async fn upgrade_store(
    State(service): State<StoreService>,
    Path(store_id): Path<String>,
) -> AppResult<Json<StatusResponse>> {
    service.upgrade_store(&store_id).await?;
    Ok(Json(StatusResponse::for_store("upgraded", store_id)))
}

pub async fn rollback_store(
    State(service): State<StoreService>,
    Path(store_id): Path<String>,
) -> AppResult<Json<StatusResponse>> {
    service.rollback_store(&store_id).await?;
    Ok(Json(StatusResponse::for_store("rolled_back", store_id)))
}

pub async fn link_domain(
    State(service): State<StoreService>,
    Path(store_id): Path<String>,
    Json(request): Json<LinkDomainRequest>,
) -> AppResult<Json<StatusResponse>> {
    service.link_domain(&store_id, &request.domain).await?;
    Ok(Json(StatusResponse {
        domain: Some(request.domain),
        ..StatusResponse::new("linked")
    }))
}

pub async fn api_not_found() -> AppError {
    AppError::new(axum::http::StatusCode::NOT_FOUND, "no such endpoint")
}
