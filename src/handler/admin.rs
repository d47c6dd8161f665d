use std::sync::Arc;

use axum::{
    extract::Path,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use uuid::Uuid;

use crate::{
    db::{
        marketdb::{JobQuery, MarketExt},
        userdb::UserExt,
    },
    dtos::marketdtos::ApiResponse,
    error::HttpError,
    middleware::{role_check, AuthenticatedUser},
    models::usermodel::UserRole,
    AppState,
};

pub fn admin_handler() -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:user_id", delete(delete_user))
        .route("/jobs", get(list_jobs))
        .route("/jobs/:job_id", delete(delete_job))
        .route("/jobs/:job_id/cancel", post(cancel_job))
        .route("/bookings", get(list_bookings))
        .layer(middleware::from_fn(|req, next| {
            role_check(req, next, vec![UserRole::Admin])
        }))
}

pub async fn list_users(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let users = app_state.db_client.list_users().await?;

    Ok(Json(ApiResponse::success("Users retrieved successfully", users)))
}

pub async fn delete_user(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    if user_id == auth.user.id {
        return Err(HttpError::bad_request("Admins cannot delete themselves"));
    }

    if !app_state.db_client.delete_user(user_id).await? {
        return Err(HttpError::not_found("User not found"));
    }

    tracing::info!("User {} deleted by admin {}", user_id, auth.user.id);

    Ok(Json(ApiResponse::success("User deleted successfully", user_id)))
}

pub async fn list_jobs(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let jobs = app_state.db_client.search_jobs(&JobQuery::default()).await?;

    Ok(Json(ApiResponse::success("Jobs retrieved successfully", jobs)))
}

pub async fn delete_job(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    if !app_state.db_client.delete_job(job_id).await? {
        return Err(HttpError::not_found("Job not found"));
    }

    tracing::info!("Job {} deleted by admin {}", job_id, auth.user.id);

    Ok(Json(ApiResponse::success("Job deleted successfully", job_id)))
}

pub async fn cancel_job(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let job = app_state
        .lifecycle_service
        .cancel_job(job_id, auth.user.id)
        .await?;

    Ok(Json(ApiResponse::success("Job cancelled", job)))
}

pub async fn list_bookings(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let bookings = app_state.db_client.list_bookings().await?;

    Ok(Json(ApiResponse::success(
        "Bookings retrieved successfully",
        bookings,
    )))
}
