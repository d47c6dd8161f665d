use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::marketdtos::*,
    error::HttpError,
    middleware::{identify, role_check, AuthenticatedUser},
    models::usermodel::UserRole,
    service::listing_service::ListingQuery,
    AppState,
};

pub fn jobs_handler() -> Router {
    // browsing and job detail are public, everything else needs an identity
    Router::new()
        .route(
            "/",
            get(browse_jobs).merge(
                post(post_job)
                    .layer(middleware::from_fn(|req, next| {
                        role_check(req, next, vec![UserRole::Requester])
                    }))
                    .layer(middleware::from_fn(identify)),
            ),
        )
        .route("/:job_id", get(get_job))
        .route(
            "/:job_id/offers",
            get(get_job_offers)
                .layer(middleware::from_fn(identify))
                .merge(
                    post(submit_offer)
                        .layer(middleware::from_fn(|req, next| {
                            role_check(req, next, vec![UserRole::Provider])
                        }))
                        .layer(middleware::from_fn(identify)),
                ),
        )
        .route(
            "/:job_id/offers/:offer_id/accept",
            post(accept_offer)
                .layer(middleware::from_fn(|req, next| {
                    role_check(req, next, vec![UserRole::Requester])
                }))
                .layer(middleware::from_fn(identify)),
        )
}

pub async fn browse_jobs(
    Extension(app_state): Extension<Arc<AppState>>,
    Query(params): Query<SearchJobsDto>,
) -> Result<impl IntoResponse, HttpError> {
    params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let query = ListingQuery::from(params);
    let listings = app_state.listing_service.browse(&query).await?;

    Ok(Json(ApiResponse::success(
        "Jobs retrieved successfully",
        listings,
    )))
}

pub async fn post_job(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(body): Json<PostJobDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let job = app_state
        .lifecycle_service
        .post_job(auth.user.id, body.into())
        .await?;

    Ok(Json(ApiResponse::success("Job posted successfully", job)))
}

pub async fn get_job(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let job = app_state.listing_service.get_job(job_id).await?;

    Ok(Json(ApiResponse::success("Job retrieved successfully", job)))
}

pub async fn get_job_offers(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let offers = app_state
        .listing_service
        .job_offers_for(job_id, &auth.user)
        .await?;

    Ok(Json(ApiResponse::success(
        "Offers retrieved successfully",
        offers,
    )))
}

pub async fn submit_offer(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(job_id): Path<Uuid>,
    Json(body): Json<SubmitOfferDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let offer = app_state
        .lifecycle_service
        .submit_offer(job_id, auth.user.id, body.into())
        .await?;

    Ok(Json(ApiResponse::success(
        "Offer submitted successfully",
        offer,
    )))
}

pub async fn accept_offer(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path((job_id, offer_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, HttpError> {
    let accepted = app_state
        .lifecycle_service
        .accept_offer(job_id, offer_id, auth.user.id)
        .await?;

    Ok(Json(ApiResponse::success(
        "Offer accepted and booking created",
        accepted,
    )))
}
