use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    db::userdb::ProfileUpdate,
    models::{
        marketmodel::Review,
        usermodel::{Rating, User, UserRole},
    },
    utils::geo::GeoPoint,
};

fn validate_self_service_role(role: &UserRole) -> Result<(), ValidationError> {
    match role {
        UserRole::Requester | UserRole::Provider => Ok(()),
        UserRole::Admin => Err(ValidationError::new("admin_role_not_allowed")),
    }
}

fn location_from(lat: Option<f64>, lng: Option<f64>) -> Result<Option<GeoPoint>, String> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => Ok(Some(GeoPoint::new(lat, lng))),
        (None, None) => Ok(None),
        _ => Err("lat and lng must be provided together".to_string()),
    }
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserDto {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,

    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,

    #[validate(custom = "validate_self_service_role")]
    pub role: UserRole,

    #[validate(length(min = 1, max = 100, message = "City is required"))]
    pub city: String,

    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: Option<f64>,

    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: Option<f64>,
}

impl CreateUserDto {
    pub fn into_user(self) -> Result<User, String> {
        let location = location_from(self.lat, self.lng)?;
        Ok(User::new(
            self.name.trim().to_string(),
            self.email,
            self.role,
            self.city.trim().to_string(),
            location,
        ))
    }
}

#[derive(Validate, Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileDto {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 100, message = "City must be between 1-100 characters"))]
    pub city: Option<String>,

    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: Option<f64>,

    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: Option<f64>,
}

impl UpdateProfileDto {
    pub fn into_update(self) -> Result<ProfileUpdate, String> {
        Ok(ProfileUpdate {
            location: location_from(self.lat, self.lng)?,
            name: self.name.map(|n| n.trim().to_string()),
            city: self.city.map(|c| c.trim().to_string()),
        })
    }
}

/// What other users may see of a provider
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicProfileDto {
    pub id: Uuid,
    pub name: String,
    pub role: UserRole,
    pub city: String,
    pub rating: Rating,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl PublicProfileDto {
    pub fn from_user(user: &User) -> Self {
        PublicProfileDto {
            id: user.id,
            name: user.name.to_owned(),
            role: user.role,
            city: user.city.to_owned(),
            rating: user.rating,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewListDto {
    pub provider_id: Uuid,
    pub reviews: Vec<Review>,
    pub results: usize,
}
