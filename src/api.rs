//! HTTP management API for attitude records.
//!
//! Mounted under `/api` by `serve-http` when `[api] enabled = true`.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;

use crate::attitude::error::AttitudeError;
use crate::attitude::manage::{AttitudeService, GroupPatch, UserPatch};
use crate::attitude::store::DeleteOutcome;
use crate::attitude::types::{GroupAttitude, UserAttitude};

pub type ApiState = Arc<AttitudeService>;

pub fn router(service: ApiState) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route(
            "/users/{user_id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/groups", get(list_groups))
        .route(
            "/groups/{group_id}",
            get(get_group).put(update_group).delete(delete_group),
        )
        .with_state(service)
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl From<AttitudeError> for ApiError {
    fn from(e: AttitudeError) -> Self {
        match e {
            AttitudeError::InvalidInput(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "api request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

async fn list_users(State(service): State<ApiState>) -> Result<Json<Vec<UserAttitude>>, ApiError> {
    Ok(Json(service.list_users().await?))
}

async fn get_user(
    State(service): State<ApiState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserAttitude>, ApiError> {
    service
        .get_user(&user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("user {user_id} not found")))
}

async fn update_user(
    State(service): State<ApiState>,
    Path(user_id): Path<String>,
    payload: Result<Json<UserPatch>, JsonRejection>,
) -> Result<Json<UserAttitude>, ApiError> {
    let Json(patch) = payload?;
    Ok(Json(service.update_user(&user_id, &patch).await?))
}

async fn delete_user(
    State(service): State<ApiState>,
    Path(user_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    match service.delete_user(&user_id).await? {
        DeleteOutcome::Deleted => Ok(Json(DeleteResponse {
            success: true,
            message: format!("user {user_id} deleted"),
        })),
        DeleteOutcome::NotFound => Err(ApiError::NotFound(format!("user {user_id} not found"))),
    }
}

async fn list_groups(State(service): State<ApiState>) -> Result<Json<Vec<GroupAttitude>>, ApiError> {
    Ok(Json(service.list_groups().await?))
}

async fn get_group(
    State(service): State<ApiState>,
    Path(group_id): Path<String>,
) -> Result<Json<GroupAttitude>, ApiError> {
    service
        .get_group(&group_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("group {group_id} not found")))
}

async fn update_group(
    State(service): State<ApiState>,
    Path(group_id): Path<String>,
    payload: Result<Json<GroupPatch>, JsonRejection>,
) -> Result<Json<GroupAttitude>, ApiError> {
    let Json(patch) = payload?;
    Ok(Json(service.update_group(&group_id, &patch).await?))
}

async fn delete_group(
    State(service): State<ApiState>,
    Path(group_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    match service.delete_group(&group_id).await? {
        DeleteOutcome::Deleted => Ok(Json(DeleteResponse {
            success: true,
            message: format!("group {group_id} deleted"),
        })),
        DeleteOutcome::NotFound => Err(ApiError::NotFound(format!("group {group_id} not found"))),
    }
}
