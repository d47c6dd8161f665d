use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::{geo::GeoPoint, schedule::booking_window};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "job_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobCategory {
    Cleaning,
    Cooking,
    Tutoring,
}

impl JobCategory {
    pub fn to_str(&self) -> &'static str {
        match self {
            JobCategory::Cleaning => "cleaning",
            JobCategory::Cooking => "cooking",
            JobCategory::Tutoring => "tutoring",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Open,
    Booked,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "offer_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    /// Bookings that still hold the provider's time slot
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Accepted | BookingStatus::InProgress)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: JobCategory,
    pub date: NaiveDate,
    pub start_time: String,
    pub duration_hours: f64,
    pub city: String,
    pub lat: f64,
    pub lng: f64,
    pub status: JobStatus,
    pub accepted_offer_id: Option<Uuid>,
    pub posted_at: DateTime<Utc>,
}

/// Everything a requester supplies when posting a job
#[derive(Debug, Clone)]
pub struct NewJob {
    pub title: String,
    pub description: String,
    pub category: JobCategory,
    pub date: NaiveDate,
    pub start_time: String,
    pub duration_hours: f64,
    pub city: String,
    pub location: GeoPoint,
}

impl Job {
    pub fn new(requester_id: Uuid, new_job: NewJob) -> Self {
        Self {
            id: Uuid::new_v4(),
            requester_id,
            title: new_job.title,
            description: new_job.description,
            category: new_job.category,
            date: new_job.date,
            start_time: new_job.start_time,
            duration_hours: new_job.duration_hours,
            city: new_job.city,
            lat: new_job.location.lat(),
            lng: new_job.location.lng(),
            status: JobStatus::Open,
            accepted_offer_id: None,
            posted_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Offer {
    pub id: Uuid,
    pub job_id: Uuid,
    pub provider_id: Uuid,
    pub hourly_rate: f64,
    pub message: String,
    pub availability_start: DateTime<Utc>,
    pub availability_end: DateTime<Utc>,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
}

impl Offer {
    pub fn new(
        job_id: Uuid,
        provider_id: Uuid,
        hourly_rate: f64,
        message: String,
        availability_start: DateTime<Utc>,
        availability_end: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            provider_id,
            hourly_rate,
            message,
            availability_start,
            availability_end,
            status: OfferStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub job_id: Uuid,
    pub offer_id: Uuid,
    pub requester_id: Uuid,
    pub provider_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// Materialise the engagement for an accepted offer. The window is
    /// derived once from the job's date, start time and duration.
    pub fn for_acceptance(job: &Job, offer: &Offer) -> Result<Self, String> {
        let (start_time, end_time) =
            booking_window(job.date, &job.start_time, job.duration_hours)?;

        Ok(Self {
            id: Uuid::new_v4(),
            job_id: job.id,
            offer_id: offer.id,
            requester_id: job.requester_id,
            provider_id: offer.provider_id,
            start_time,
            end_time,
            status: BookingStatus::Accepted,
            payment_status: PaymentStatus::Unpaid,
            created_at: Utc::now(),
        })
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.requester_id == user_id || self.provider_id == user_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub amount: f64,
    pub status: PaymentStatus,
    pub paid_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn paid(booking_id: Uuid, amount: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            amount,
            status: PaymentStatus::Paid,
            paid_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Review {
    pub id: Uuid,
    pub job_id: Uuid,
    pub booking_id: Uuid,
    pub provider_id: Uuid,
    pub requester_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Review {
    pub fn for_booking(booking: &Booking, rating: i32, comment: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id: booking.job_id,
            booking_id: booking.id,
            provider_id: booking.provider_id,
            requester_id: booking.requester_id,
            rating,
            comment,
            created_at: Utc::now(),
        }
    }
}
