use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::{
    models::marketmodel::{JobCategory, NewJob},
    service::{
        lifecycle_service::OfferTerms,
        listing_service::ListingQuery,
    },
    utils::{geo::GeoPoint, schedule::parse_start_time},
};

fn validate_start_time(value: &str) -> Result<(), ValidationError> {
    parse_start_time(value)
        .map(|_| ())
        .map_err(|_| ValidationError::new("start_time must be HH:mm"))
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: &'static str,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success",
            message: message.into(),
            data,
        }
    }
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct PostJobDto {
    #[validate(length(min = 1, max = 120, message = "Title must be between 1-120 characters"))]
    pub title: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    #[serde(default)]
    pub description: String,

    pub category: JobCategory,

    pub date: NaiveDate,

    #[validate(custom = "validate_start_time")]
    #[serde(alias = "startTime")]
    pub start_time: String,

    #[validate(range(min = 0.5, max = 24.0, message = "Duration must be between 0.5 and 24 hours"))]
    #[serde(alias = "durationHours")]
    pub duration_hours: f64,

    #[validate(length(min = 1, max = 100, message = "City is required"))]
    pub city: String,

    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub lat: f64,

    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub lng: f64,
}

impl From<PostJobDto> for NewJob {
    fn from(dto: PostJobDto) -> Self {
        NewJob {
            title: dto.title.trim().to_string(),
            description: dto.description.trim().to_string(),
            category: dto.category,
            date: dto.date,
            start_time: dto.start_time,
            duration_hours: dto.duration_hours,
            city: dto.city.trim().to_string(),
            location: GeoPoint::new(dto.lat, dto.lng),
        }
    }
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOfferDto {
    #[validate(range(min = 0.0, message = "Hourly rate cannot be negative"))]
    #[serde(alias = "hourlyRate")]
    pub hourly_rate: f64,

    #[validate(length(max = 1000, message = "Message must be at most 1000 characters"))]
    pub message: Option<String>,

    #[serde(alias = "availabilityStart")]
    pub availability_start: DateTime<Utc>,

    #[serde(alias = "availabilityEnd")]
    pub availability_end: DateTime<Utc>,
}

impl From<SubmitOfferDto> for OfferTerms {
    fn from(dto: SubmitOfferDto) -> Self {
        OfferTerms {
            hourly_rate: dto.hourly_rate,
            message: dto.message.unwrap_or_default(),
            availability_start: dto.availability_start,
            availability_end: dto.availability_end,
        }
    }
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct PayBookingDto {
    #[validate(range(min = 0.0, message = "Amount cannot be negative"))]
    pub amount: f64,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDto {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,

    #[validate(length(max = 1000, message = "Comment must be at most 1000 characters"))]
    pub comment: Option<String>,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageDto {
    #[validate(length(min = 1, max = 2000, message = "Message must be between 1-2000 characters"))]
    pub text: String,
}

#[derive(Validate, Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchJobsDto {
    pub category: Option<JobCategory>,

    #[validate(length(max = 100))]
    pub city: Option<String>,

    pub date: Option<NaiveDate>,

    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: Option<f64>,

    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: Option<f64>,

    #[validate(range(min = 0.0, message = "Radius cannot be negative"))]
    #[serde(alias = "radius", alias = "radiusKm")]
    pub radius_km: Option<f64>,

    #[validate(range(min = 0.0, message = "Max price cannot be negative"))]
    #[serde(alias = "maxPrice")]
    pub max_price: Option<f64>,

    /// Unknown keys fall back to the default order.
    pub sort: Option<String>,
}

impl From<SearchJobsDto> for ListingQuery {
    fn from(dto: SearchJobsDto) -> Self {
        ListingQuery {
            category: dto.category,
            city: dto.city,
            date: dto.date,
            lat: dto.lat,
            lng: dto.lng,
            radius_km: dto.radius_km,
            max_price: dto.max_price,
            sort: dto
                .sort
                .as_deref()
                .and_then(|key| key.parse().ok())
                .unwrap_or_default(),
        }
    }
}
