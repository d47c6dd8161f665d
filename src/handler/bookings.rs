use std::sync::Arc;

use axum::{
    extract::Path,
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::marketdtos::*,
    error::HttpError,
    middleware::{role_check, AuthenticatedUser},
    models::usermodel::UserRole,
    AppState,
};

pub fn bookings_handler() -> Router {
    Router::new()
        .route("/", get(list_bookings))
        .route("/:booking_id", get(get_booking))
        .route(
            "/:booking_id/start",
            post(start_booking).layer(middleware::from_fn(|req, next| {
                role_check(req, next, vec![UserRole::Provider])
            })),
        )
        .route(
            "/:booking_id/complete",
            post(complete_booking).layer(middleware::from_fn(|req, next| {
                role_check(req, next, vec![UserRole::Provider])
            })),
        )
        .route(
            "/:booking_id/pay",
            post(pay_booking).layer(middleware::from_fn(|req, next| {
                role_check(req, next, vec![UserRole::Requester])
            })),
        )
        .route(
            "/:booking_id/review",
            post(review_booking).layer(middleware::from_fn(|req, next| {
                role_check(req, next, vec![UserRole::Requester])
            })),
        )
        .route(
            "/:booking_id/messages",
            get(list_messages).post(send_message),
        )
        .route("/:booking_id/messages/read", patch(mark_messages_read))
}

pub async fn list_bookings(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, HttpError> {
    let bookings = app_state
        .lifecycle_service
        .list_bookings_for(&auth.user)
        .await?;

    Ok(Json(ApiResponse::success(
        "Bookings retrieved successfully",
        bookings,
    )))
}

pub async fn get_booking(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let booking = app_state
        .lifecycle_service
        .get_booking_for(booking_id, &auth.user)
        .await?;

    Ok(Json(ApiResponse::success(
        "Booking retrieved successfully",
        booking,
    )))
}

pub async fn start_booking(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let booking = app_state
        .lifecycle_service
        .start_booking(booking_id, auth.user.id)
        .await?;

    Ok(Json(ApiResponse::success("Booking started", booking)))
}

pub async fn complete_booking(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let booking = app_state
        .lifecycle_service
        .complete_booking(booking_id, auth.user.id)
        .await?;

    Ok(Json(ApiResponse::success("Booking completed", booking)))
}

pub async fn pay_booking(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(booking_id): Path<Uuid>,
    Json(body): Json<PayBookingDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let paid = app_state
        .lifecycle_service
        .pay_booking(booking_id, auth.user.id, body.amount)
        .await?;

    Ok(Json(ApiResponse::success("Payment recorded", paid)))
}

pub async fn review_booking(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(booking_id): Path<Uuid>,
    Json(body): Json<ReviewDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let review = app_state
        .lifecycle_service
        .submit_review(booking_id, auth.user.id, body.rating, body.comment)
        .await?;

    Ok(Json(ApiResponse::success(
        "Review submitted successfully",
        review,
    )))
}

pub async fn list_messages(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let messages = app_state
        .chat_service
        .list_messages(booking_id, &auth.user)
        .await?;

    Ok(Json(ApiResponse::success(
        "Messages retrieved successfully",
        messages,
    )))
}

pub async fn send_message(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(booking_id): Path<Uuid>,
    Json(body): Json<SendMessageDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let message = app_state
        .chat_service
        .record_message(booking_id, &auth.user, &body.text)
        .await?;

    Ok(Json(ApiResponse::success("Message sent", message)))
}

pub async fn mark_messages_read(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let updated = app_state
        .chat_service
        .mark_read(booking_id, &auth.user)
        .await?;

    Ok(Json(ApiResponse::success(
        "Messages marked as read",
        json!({ "updated": updated }),
    )))
}
