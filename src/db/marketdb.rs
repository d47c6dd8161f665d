// db/marketdb.rs
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::{db::DBClient, query_timeout::QueryTimeout, StoreError};
use crate::{
    models::{marketmodel::*, usermodel::Rating},
    service::rating_aggregator,
};

/// Row filter for job selection. Every field that is set must match.
#[derive(Debug, Clone, Default)]
pub struct JobQuery {
    pub status: Option<JobStatus>,
    pub category: Option<JobCategory>,
    /// Case-insensitive substring of the job's city
    pub city_contains: Option<String>,
    /// Exact calendar day
    pub date: Option<NaiveDate>,
}

impl JobQuery {
    pub fn matches(&self, job: &Job) -> bool {
        self.status.map_or(true, |s| job.status == s)
            && self.category.map_or(true, |c| job.category == c)
            && self.date.map_or(true, |d| job.date == d)
            && self.city_contains.as_ref().map_or(true, |needle| {
                job.city.to_lowercase().contains(&needle.to_lowercase())
            })
    }
}

/// Which side of a booking a participant is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingParty {
    Requester,
    Provider,
}

/// One staged write. Status changes carry the status they expect to replace;
/// if the stored row has moved on, the whole change set is refused.
#[derive(Debug, Clone)]
pub enum Mutation {
    InsertJob(Job),
    InsertOffer(Offer),
    InsertBooking(Booking),
    InsertPayment(PaymentRecord),
    InsertReview(Review),
    SetJobStatus {
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },
    /// open -> booked, recording the accepted offer
    BookJob {
        job_id: Uuid,
        offer_id: Uuid,
    },
    SetOfferStatus {
        offer_id: Uuid,
        from: OfferStatus,
        to: OfferStatus,
    },
    /// Every still-pending offer on the job except `except` becomes rejected
    RejectPendingOffers {
        job_id: Uuid,
        except: Option<Uuid>,
    },
    SetBookingStatus {
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    },
    /// unpaid -> paid on a completed booking
    MarkBookingPaid {
        booking_id: Uuid,
    },
    /// Fold one review score into the user's running rating
    ApplyRating {
        user_id: Uuid,
        rating: i32,
    },
}

/// The staged transaction script of one lifecycle operation
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    mutations: Vec<Mutation>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mutation: Mutation) -> &mut Self {
        self.mutations.push(mutation);
        self
    }

    pub fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }
}

#[async_trait]
pub trait MarketExt {
    // Jobs
    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, StoreError>;

    /// Matching jobs, newest posting first
    async fn search_jobs(&self, query: &JobQuery) -> Result<Vec<Job>, StoreError>;

    async fn delete_job(&self, job_id: Uuid) -> Result<bool, StoreError>;

    // Offers
    async fn get_offer(&self, offer_id: Uuid) -> Result<Option<Offer>, StoreError>;

    /// All offers on a job, newest first
    async fn get_job_offers(&self, job_id: Uuid) -> Result<Vec<Offer>, StoreError>;

    async fn get_pending_offer(
        &self,
        job_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<Offer>, StoreError>;

    /// Lowest hourly rate among pending offers, per job. Jobs without pending
    /// offers are absent from the map.
    async fn get_min_pending_rates(
        &self,
        job_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, f64>, StoreError>;

    // Bookings
    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, StoreError>;

    /// The live (accepted or in-progress) booking of a job, if any
    async fn get_active_job_booking(&self, job_id: Uuid) -> Result<Option<Booking>, StoreError>;

    async fn get_user_bookings(
        &self,
        user_id: Uuid,
        party: BookingParty,
    ) -> Result<Vec<Booking>, StoreError>;

    async fn list_bookings(&self) -> Result<Vec<Booking>, StoreError>;

    /// Active bookings of the provider whose window overlaps `[start, end)`
    async fn find_overlapping_bookings(
        &self,
        provider_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Booking>, StoreError>;

    // Payments and reviews
    async fn get_booking_payments(&self, booking_id: Uuid) -> Result<Vec<PaymentRecord>, StoreError>;

    async fn get_booking_review(&self, booking_id: Uuid) -> Result<Option<Review>, StoreError>;

    async fn get_provider_reviews(
        &self,
        provider_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Review>, StoreError>;

    /// Apply every mutation or none of them
    async fn commit(&self, changes: ChangeSet) -> Result<(), StoreError>;
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn guard(rows_affected: u64, what: impl FnOnce() -> String) -> Result<(), StoreError> {
    if rows_affected == 0 {
        Err(StoreError::Conflict(what()))
    } else {
        Ok(())
    }
}

impl DBClient {
    async fn apply_mutation(
        tx: &mut Transaction<'_, Postgres>,
        mutation: Mutation,
    ) -> Result<(), StoreError> {
        match mutation {
            Mutation::InsertJob(job) => {
                sqlx::query(
                    r#"
                    INSERT INTO jobs
                    (id, requester_id, title, description, category, date, start_time, duration_hours,
                     city, lat, lng, status, accepted_offer_id, posted_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                    "#,
                )
                .bind(job.id)
                .bind(job.requester_id)
                .bind(job.title)
                .bind(job.description)
                .bind(job.category)
                .bind(job.date)
                .bind(job.start_time)
                .bind(job.duration_hours)
                .bind(job.city)
                .bind(job.lat)
                .bind(job.lng)
                .bind(job.status)
                .bind(job.accepted_offer_id)
                .bind(job.posted_at)
                .execute(&mut **tx)
                .await?;
            }
            Mutation::InsertOffer(offer) => {
                sqlx::query(
                    r#"
                    INSERT INTO offers
                    (id, job_id, provider_id, hourly_rate, message, availability_start, availability_end, status, created_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    "#,
                )
                .bind(offer.id)
                .bind(offer.job_id)
                .bind(offer.provider_id)
                .bind(offer.hourly_rate)
                .bind(offer.message)
                .bind(offer.availability_start)
                .bind(offer.availability_end)
                .bind(offer.status)
                .bind(offer.created_at)
                .execute(&mut **tx)
                .await?;
            }
            Mutation::InsertBooking(booking) => {
                // serialise bookings per provider for the overlap check below
                sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
                    .bind(booking.provider_id)
                    .fetch_optional(&mut **tx)
                    .await?;

                let clashing: i64 = sqlx::query_scalar(
                    r#"
                    SELECT COUNT(*) FROM bookings
                    WHERE provider_id = $1
                      AND status IN ('accepted'::booking_status, 'in_progress'::booking_status)
                      AND start_time < $3 AND end_time > $2
                    "#,
                )
                .bind(booking.provider_id)
                .bind(booking.start_time)
                .bind(booking.end_time)
                .fetch_one(&mut **tx)
                .await?;

                if booking.status.is_active() && clashing > 0 {
                    return Err(StoreError::Conflict(format!(
                        "Provider {} already has an active booking in that window",
                        booking.provider_id
                    )));
                }

                sqlx::query(
                    r#"
                    INSERT INTO bookings
                    (id, job_id, offer_id, requester_id, provider_id, start_time, end_time, status, payment_status, created_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                    "#,
                )
                .bind(booking.id)
                .bind(booking.job_id)
                .bind(booking.offer_id)
                .bind(booking.requester_id)
                .bind(booking.provider_id)
                .bind(booking.start_time)
                .bind(booking.end_time)
                .bind(booking.status)
                .bind(booking.payment_status)
                .bind(booking.created_at)
                .execute(&mut **tx)
                .await?;
            }
            Mutation::InsertPayment(payment) => {
                sqlx::query(
                    r#"
                    INSERT INTO payment_records (id, booking_id, amount, status, paid_at)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(payment.id)
                .bind(payment.booking_id)
                .bind(payment.amount)
                .bind(payment.status)
                .bind(payment.paid_at)
                .execute(&mut **tx)
                .await?;
            }
            Mutation::InsertReview(review) => {
                sqlx::query(
                    r#"
                    INSERT INTO reviews
                    (id, job_id, booking_id, provider_id, requester_id, rating, comment, created_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    "#,
                )
                .bind(review.id)
                .bind(review.job_id)
                .bind(review.booking_id)
                .bind(review.provider_id)
                .bind(review.requester_id)
                .bind(review.rating)
                .bind(review.comment)
                .bind(review.created_at)
                .execute(&mut **tx)
                .await?;
            }
            Mutation::SetJobStatus { job_id, from, to } => {
                let result = sqlx::query("UPDATE jobs SET status = $3 WHERE id = $1 AND status = $2")
                    .bind(job_id)
                    .bind(from)
                    .bind(to)
                    .execute(&mut **tx)
                    .await?;
                guard(result.rows_affected(), || {
                    format!("Job {} is no longer {:?}", job_id, from)
                })?;
            }
            Mutation::BookJob { job_id, offer_id } => {
                let result = sqlx::query(
                    r#"
                    UPDATE jobs
                    SET status = 'booked'::job_status, accepted_offer_id = $2
                    WHERE id = $1 AND status = 'open'::job_status
                    "#,
                )
                .bind(job_id)
                .bind(offer_id)
                .execute(&mut **tx)
                .await?;
                guard(result.rows_affected(), || {
                    format!("Job {} is no longer open", job_id)
                })?;
            }
            Mutation::SetOfferStatus { offer_id, from, to } => {
                let result =
                    sqlx::query("UPDATE offers SET status = $3 WHERE id = $1 AND status = $2")
                        .bind(offer_id)
                        .bind(from)
                        .bind(to)
                        .execute(&mut **tx)
                        .await?;
                guard(result.rows_affected(), || {
                    format!("Offer {} is no longer {:?}", offer_id, from)
                })?;
            }
            Mutation::RejectPendingOffers { job_id, except } => {
                sqlx::query(
                    r#"
                    UPDATE offers
                    SET status = 'rejected'::offer_status
                    WHERE job_id = $1
                      AND status = 'pending'::offer_status
                      AND ($2::uuid IS NULL OR id <> $2)
                    "#,
                )
                .bind(job_id)
                .bind(except)
                .execute(&mut **tx)
                .await?;
            }
            Mutation::SetBookingStatus { booking_id, from, to } => {
                let result =
                    sqlx::query("UPDATE bookings SET status = $3 WHERE id = $1 AND status = $2")
                        .bind(booking_id)
                        .bind(from)
                        .bind(to)
                        .execute(&mut **tx)
                        .await?;
                guard(result.rows_affected(), || {
                    format!("Booking {} is no longer {:?}", booking_id, from)
                })?;
            }
            Mutation::MarkBookingPaid { booking_id } => {
                let result = sqlx::query(
                    r#"
                    UPDATE bookings
                    SET payment_status = 'paid'::payment_status
                    WHERE id = $1
                      AND payment_status = 'unpaid'::payment_status
                      AND status = 'completed'::booking_status
                    "#,
                )
                .bind(booking_id)
                .execute(&mut **tx)
                .await?;
                guard(result.rows_affected(), || {
                    format!("Booking {} is already paid", booking_id)
                })?;
            }
            Mutation::ApplyRating { user_id, rating } => {
                let current = sqlx::query_as::<_, Rating>(
                    "SELECT rating_avg, rating_count FROM users WHERE id = $1 FOR UPDATE",
                )
                .bind(user_id)
                .fetch_optional(&mut **tx)
                .await?
                .ok_or_else(|| StoreError::Conflict(format!("User {} no longer exists", user_id)))?;

                let updated = rating_aggregator::update_rating(current, rating);

                sqlx::query("UPDATE users SET rating_avg = $2, rating_count = $3 WHERE id = $1")
                    .bind(user_id)
                    .bind(updated.avg)
                    .bind(updated.count)
                    .execute(&mut **tx)
                    .await?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl MarketExt for DBClient {
    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, StoreError> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(job)
    }

    async fn search_jobs(&self, query: &JobQuery) -> Result<Vec<Job>, StoreError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM jobs WHERE TRUE");

        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status);
        }
        if let Some(category) = query.category {
            builder.push(" AND category = ").push_bind(category);
        }
        if let Some(city) = &query.city_contains {
            builder
                .push(" AND city ILIKE ")
                .push_bind(format!("%{}%", escape_like(city)));
        }
        if let Some(date) = query.date {
            builder.push(" AND date = ").push_bind(date);
        }
        builder.push(" ORDER BY posted_at DESC, id");

        let jobs = QueryTimeout::execute_with_timeout(
            async {
                builder
                    .build_query_as::<Job>()
                    .fetch_all(&self.pool)
                    .await
                    .map_err(StoreError::from)
            },
            QueryTimeout::DEFAULT_TIMEOUT,
        )
        .await?;

        Ok(jobs)
    }

    async fn delete_job(&self, job_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_offer(&self, offer_id: Uuid) -> Result<Option<Offer>, StoreError> {
        let offer = sqlx::query_as::<_, Offer>("SELECT * FROM offers WHERE id = $1")
            .bind(offer_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(offer)
    }

    async fn get_job_offers(&self, job_id: Uuid) -> Result<Vec<Offer>, StoreError> {
        let offers = sqlx::query_as::<_, Offer>(
            "SELECT * FROM offers WHERE job_id = $1 ORDER BY created_at DESC",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(offers)
    }

    async fn get_pending_offer(
        &self,
        job_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<Offer>, StoreError> {
        let offer = sqlx::query_as::<_, Offer>(
            r#"
            SELECT * FROM offers
            WHERE job_id = $1 AND provider_id = $2 AND status = 'pending'::offer_status
            LIMIT 1
            "#,
        )
        .bind(job_id)
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(offer)
    }

    async fn get_min_pending_rates(
        &self,
        job_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, f64>, StoreError> {
        if job_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, (Uuid, f64)>(
            r#"
            SELECT job_id, MIN(hourly_rate) AS min_rate
            FROM offers
            WHERE status = 'pending'::offer_status AND job_id = ANY($1)
            GROUP BY job_id
            "#,
        )
        .bind(job_ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, StoreError> {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(booking)
    }

    async fn get_active_job_booking(&self, job_id: Uuid) -> Result<Option<Booking>, StoreError> {
        let booking = sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE job_id = $1
              AND status IN ('accepted'::booking_status, 'in_progress'::booking_status)
            LIMIT 1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(booking)
    }

    async fn get_user_bookings(
        &self,
        user_id: Uuid,
        party: BookingParty,
    ) -> Result<Vec<Booking>, StoreError> {
        let sql = match party {
            BookingParty::Requester => {
                "SELECT * FROM bookings WHERE requester_id = $1 ORDER BY created_at DESC"
            }
            BookingParty::Provider => {
                "SELECT * FROM bookings WHERE provider_id = $1 ORDER BY created_at DESC"
            }
        };

        let bookings = sqlx::query_as::<_, Booking>(sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(bookings)
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, StoreError> {
        let bookings =
            sqlx::query_as::<_, Booking>("SELECT * FROM bookings ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;

        Ok(bookings)
    }

    async fn find_overlapping_bookings(
        &self,
        provider_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Booking>, StoreError> {
        let bookings = sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE provider_id = $1
              AND status IN ('accepted'::booking_status, 'in_progress'::booking_status)
              AND start_time < $3
              AND end_time > $2
            "#,
        )
        .bind(provider_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(bookings)
    }

    async fn get_booking_payments(&self, booking_id: Uuid) -> Result<Vec<PaymentRecord>, StoreError> {
        let payments = sqlx::query_as::<_, PaymentRecord>(
            "SELECT * FROM payment_records WHERE booking_id = $1 ORDER BY paid_at",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    async fn get_booking_review(&self, booking_id: Uuid) -> Result<Option<Review>, StoreError> {
        let review = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE booking_id = $1")
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(review)
    }

    async fn get_provider_reviews(
        &self,
        provider_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Review>, StoreError> {
        let reviews = sqlx::query_as::<_, Review>(
            r#"
            SELECT * FROM reviews
            WHERE provider_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(provider_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(reviews)
    }

    async fn commit(&self, changes: ChangeSet) -> Result<(), StoreError> {
        QueryTimeout::execute_with_timeout(
            async {
                let mut tx = self.pool.begin().await?;

                for mutation in changes.into_mutations() {
                    // an early return drops `tx`, which rolls it back
                    Self::apply_mutation(&mut tx, mutation).await?;
                }

                tx.commit().await?;
                Ok(())
            },
            QueryTimeout::COMMIT_TIMEOUT,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::geo::GeoPoint;

    fn job_in(city: &str, category: JobCategory, date: NaiveDate) -> Job {
        Job::new(
            Uuid::new_v4(),
            NewJob {
                title: "Deep clean".to_string(),
                description: "Two bedroom flat".to_string(),
                category,
                date,
                start_time: "09:00".to_string(),
                duration_hours: 2.0,
                city: city.to_string(),
                location: GeoPoint::new(0.0, 0.0),
            },
        )
    }

    #[test]
    fn test_job_query_city_is_case_insensitive_substring() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let job = job_in("San Francisco", JobCategory::Cleaning, date);

        let query = JobQuery {
            city_contains: Some("francis".to_string()),
            ..Default::default()
        };
        assert!(query.matches(&job));

        let query = JobQuery {
            city_contains: Some("Oakland".to_string()),
            ..Default::default()
        };
        assert!(!query.matches(&job));
    }

    #[test]
    fn test_job_query_all_fields_must_match() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let job = job_in("Austin", JobCategory::Tutoring, date);

        let query = JobQuery {
            status: Some(JobStatus::Open),
            category: Some(JobCategory::Tutoring),
            city_contains: None,
            date: Some(date),
        };
        assert!(query.matches(&job));

        let other_day = JobQuery {
            date: NaiveDate::from_ymd_opt(2024, 1, 11),
            ..query.clone()
        };
        assert!(!other_day.matches(&job));

        let other_category = JobQuery {
            category: Some(JobCategory::Cooking),
            ..query
        };
        assert!(!other_category.matches(&job));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
