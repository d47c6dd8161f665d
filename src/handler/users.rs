use std::sync::Arc;

use axum::{
    extract::Path,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{marketdb::MarketExt, userdb::UserExt},
    dtos::{marketdtos::ApiResponse, userdtos::*},
    error::HttpError,
    middleware::{identify, AuthenticatedUser},
    models::usermodel::UserRole,
    AppState,
};

const PROVIDER_REVIEW_LIMIT: i64 = 50;

pub fn users_handler() -> Router {
    let protected = Router::new()
        .route("/me", get(get_me).put(update_me))
        .layer(middleware::from_fn(identify));

    Router::new()
        .route("/register", post(register_user))
        .route("/providers/:provider_id", get(get_provider_profile))
        .route("/providers/:provider_id/reviews", get(get_provider_reviews))
        .merge(protected)
}

pub async fn register_user(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<CreateUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let user = body.into_user().map_err(HttpError::bad_request)?;

    let user = app_state.db_client.save_user(user).await?;

    tracing::info!("User {} registered as {}", user.id, user.role.to_str());

    Ok(Json(ApiResponse::success("User registered successfully", user)))
}

pub async fn get_me(
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, HttpError> {
    Ok(Json(ApiResponse::success(
        "Profile retrieved successfully",
        auth.user,
    )))
}

pub async fn update_me(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(body): Json<UpdateProfileDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let update = body.into_update().map_err(HttpError::bad_request)?;

    let user = app_state
        .db_client
        .update_user_profile(auth.user.id, update)
        .await?
        .ok_or_else(|| HttpError::not_found("User not found"))?;

    Ok(Json(ApiResponse::success("Profile updated successfully", user)))
}

pub async fn get_provider_profile(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(provider_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let provider = app_state
        .db_client
        .get_user(provider_id)
        .await?
        .filter(|user| user.role == UserRole::Provider)
        .ok_or_else(|| HttpError::not_found("Provider not found"))?;

    Ok(Json(ApiResponse::success(
        "Provider retrieved successfully",
        PublicProfileDto::from_user(&provider),
    )))
}

pub async fn get_provider_reviews(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(provider_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let reviews = app_state
        .db_client
        .get_provider_reviews(provider_id, PROVIDER_REVIEW_LIMIT)
        .await?;

    Ok(Json(ApiResponse::success(
        "Reviews retrieved successfully",
        ReviewListDto {
            provider_id,
            results: reviews.len(),
            reviews,
        },
    )))
}
