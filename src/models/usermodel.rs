use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::geo::GeoPoint;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Requester,
    Provider,
    Admin,
}

impl UserRole {
    pub fn to_str(&self) -> &'static str {
        match self {
            UserRole::Requester => "requester",
            UserRole::Provider => "provider",
            UserRole::Admin => "admin",
        }
    }
}

/// Running reputation of a user. Only the rating aggregator changes it.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, sqlx::FromRow)]
pub struct Rating {
    #[sqlx(rename = "rating_avg")]
    pub avg: f64,
    #[sqlx(rename = "rating_count")]
    pub count: i32,
}

impl Default for Rating {
    fn default() -> Self {
        Self { avg: 0.0, count: 0 }
    }
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub city: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    #[sqlx(flatten)]
    pub rating: Rating,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        name: String,
        email: String,
        role: UserRole,
        city: String,
        location: Option<GeoPoint>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email: email.trim().to_lowercase(),
            role,
            city,
            lat: location.map(|p| p.lat()),
            lng: location.map(|p| p.lng()),
            rating: Rating::default(),
            created_at: Utc::now(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}
