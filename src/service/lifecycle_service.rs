// service/lifecycle_service.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    db::{
        marketdb::{BookingParty, ChangeSet, MarketExt, Mutation},
        userdb::UserExt,
        EntityStore,
    },
    models::{lifecycle::Lifecycle, marketmodel::*, usermodel::*},
    service::{
        error::ServiceError,
        locks::AggregateLocks,
        notification_service::{DomainEvent, EventKind, NotificationService},
    },
    utils::{currency, schedule, text::clean_user_text},
};

/// What a provider proposes when bidding on a job
#[derive(Debug, Clone)]
pub struct OfferTerms {
    pub hourly_rate: f64,
    pub message: String,
    pub availability_start: DateTime<Utc>,
    pub availability_end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AcceptedOffer {
    pub job: Job,
    pub offer: Offer,
    pub booking: Booking,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaidBooking {
    pub booking: Booking,
    pub payment: PaymentRecord,
}

/// Drives jobs, offers, bookings, payments and reviews through their
/// lifecycles. Every operation stages its writes in one [`ChangeSet`].
#[derive(Debug, Clone)]
pub struct LifecycleService {
    db_client: Arc<dyn EntityStore>,
    locks: Arc<AggregateLocks>,
    notifications: NotificationService,
    enforce_quoted_price: bool,
}

impl LifecycleService {
    pub fn new(
        db_client: Arc<dyn EntityStore>,
        locks: Arc<AggregateLocks>,
        notifications: NotificationService,
        enforce_quoted_price: bool,
    ) -> Self {
        Self {
            db_client,
            locks,
            notifications,
            enforce_quoted_price,
        }
    }

    async fn require_role(&self, user_id: Uuid, role: UserRole) -> Result<User, ServiceError> {
        let user = self
            .db_client
            .get_user(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound(user_id))?;

        if user.role != role {
            return Err(ServiceError::WrongRole(user_id, role.to_str()));
        }

        Ok(user)
    }

    async fn load_job(&self, job_id: Uuid) -> Result<Job, ServiceError> {
        self.db_client
            .get_job(job_id)
            .await?
            .ok_or(ServiceError::JobNotFound(job_id))
    }

    async fn load_booking(&self, booking_id: Uuid) -> Result<Booking, ServiceError> {
        self.db_client
            .get_booking(booking_id)
            .await?
            .ok_or(ServiceError::BookingNotFound(booking_id))
    }

    pub async fn post_job(&self, requester_id: Uuid, new_job: NewJob) -> Result<Job, ServiceError> {
        self.require_role(requester_id, UserRole::Requester).await?;

        // the booking window must be derivable before anyone can bid
        schedule::booking_window(new_job.date, &new_job.start_time, new_job.duration_hours)
            .map_err(ServiceError::Validation)?;

        let job = Job::new(requester_id, new_job);

        let mut changes = ChangeSet::new();
        changes.push(Mutation::InsertJob(job.clone()));
        self.db_client.commit(changes).await?;

        tracing::info!(
            "Job {} posted by requester {} ({} in {})",
            job.id,
            requester_id,
            job.category.to_str(),
            job.city
        );

        Ok(job)
    }

    pub async fn submit_offer(
        &self,
        job_id: Uuid,
        provider_id: Uuid,
        terms: OfferTerms,
    ) -> Result<Offer, ServiceError> {
        if !terms.hourly_rate.is_finite() || terms.hourly_rate < 0.0 {
            return Err(ServiceError::Validation(
                "Hourly rate must be a non-negative amount".to_string(),
            ));
        }

        let provider = self.require_role(provider_id, UserRole::Provider).await?;

        let _job_guard = self.locks.acquire_job(job_id).await;
        let _provider_guard = self.locks.acquire_provider(provider_id).await;

        let job = self.load_job(job_id).await?;
        if job.status != JobStatus::Open {
            return Err(ServiceError::InvalidState(format!(
                "Job {} is not open for offers",
                job_id
            )));
        }

        if terms.availability_end <= terms.availability_start {
            return Err(ServiceError::Validation(
                "Availability end must be after availability start".to_string(),
            ));
        }

        let clashes = self
            .db_client
            .find_overlapping_bookings(provider_id, terms.availability_start, terms.availability_end)
            .await?;
        if let Some(clash) = clashes.first() {
            return Err(ServiceError::Conflict(format!(
                "Availability overlaps booking {} ({} - {})",
                clash.id, clash.start_time, clash.end_time
            )));
        }

        if self
            .db_client
            .get_pending_offer(job_id, provider_id)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict(
                "You already have a pending offer on this job".to_string(),
            ));
        }

        let offer = Offer::new(
            job_id,
            provider_id,
            terms.hourly_rate,
            clean_user_text(&terms.message).unwrap_or_default(),
            terms.availability_start,
            terms.availability_end,
        );

        let mut changes = ChangeSet::new();
        changes.push(Mutation::InsertOffer(offer.clone()));
        self.db_client.commit(changes).await?;

        tracing::info!(
            "Offer {} submitted by provider {} on job {} at {}/h",
            offer.id,
            provider_id,
            job_id,
            offer.hourly_rate
        );

        self.notifications.publish(DomainEvent::new(
            EventKind::OfferReceived,
            job.requester_id,
            job.id,
            json!({
                "job_title": job.title,
                "provider_name": provider.name,
                "hourly_rate": offer.hourly_rate,
                "offer_id": offer.id,
            }),
        ));

        Ok(offer)
    }

    pub async fn accept_offer(
        &self,
        job_id: Uuid,
        offer_id: Uuid,
        requester_id: Uuid,
    ) -> Result<AcceptedOffer, ServiceError> {
        let _job_guard = self.locks.acquire_job(job_id).await;

        let mut job = self.load_job(job_id).await?;
        if job.requester_id != requester_id {
            return Err(ServiceError::UnauthorizedJobAccess(requester_id, job_id));
        }
        let job_next = job.status.transition(JobStatus::Booked)?;

        let mut offer = self
            .db_client
            .get_offer(offer_id)
            .await?
            .filter(|o| o.job_id == job_id)
            .ok_or(ServiceError::OfferNotFound(offer_id))?;
        let offer_next = offer.status.transition(OfferStatus::Accepted)?;

        let booking = Booking::for_acceptance(&job, &offer).map_err(ServiceError::Validation)?;

        let _provider_guard = self.locks.acquire_provider(offer.provider_id).await;
        let clashes = self
            .db_client
            .find_overlapping_bookings(offer.provider_id, booking.start_time, booking.end_time)
            .await?;
        if !clashes.is_empty() {
            return Err(ServiceError::Conflict(format!(
                "Provider {} is already booked between {} and {}",
                offer.provider_id, booking.start_time, booking.end_time
            )));
        }

        let mut changes = ChangeSet::new();
        changes
            .push(Mutation::RejectPendingOffers {
                job_id,
                except: Some(offer_id),
            })
            .push(Mutation::SetOfferStatus {
                offer_id,
                from: offer.status,
                to: offer_next,
            })
            .push(Mutation::BookJob { job_id, offer_id })
            .push(Mutation::InsertBooking(booking.clone()));
        self.db_client.commit(changes).await?;

        job.status = job_next;
        job.accepted_offer_id = Some(offer_id);
        offer.status = offer_next;

        tracing::info!(
            "Offer {} accepted on job {}, booking {} for provider {}",
            offer_id,
            job_id,
            booking.id,
            offer.provider_id
        );

        self.notifications.publish(DomainEvent::new(
            EventKind::OfferAccepted,
            offer.provider_id,
            job.id,
            json!({
                "job_title": job.title,
                "booking_id": booking.id,
                "start_time": booking.start_time.to_rfc3339(),
                "end_time": booking.end_time.to_rfc3339(),
            }),
        ));

        Ok(AcceptedOffer {
            job,
            offer,
            booking,
        })
    }

    /// Shared body of start and complete: both move the booking and its job
    /// one step forward and tell the requester.
    async fn advance_booking(
        &self,
        booking_id: Uuid,
        provider_id: Uuid,
        booking_to: BookingStatus,
        job_to: JobStatus,
        event: EventKind,
    ) -> Result<Booking, ServiceError> {
        let job_id = self.load_booking(booking_id).await?.job_id;
        let _job_guard = self.locks.acquire_job(job_id).await;

        let mut booking = self.load_booking(booking_id).await?;
        if booking.provider_id != provider_id {
            return Err(ServiceError::UnauthorizedBookingAccess(provider_id, booking_id));
        }
        let booking_next = booking.status.transition(booking_to)?;

        let job = self.load_job(booking.job_id).await?;
        let job_next = job.status.transition(job_to)?;

        let mut changes = ChangeSet::new();
        changes
            .push(Mutation::SetBookingStatus {
                booking_id,
                from: booking.status,
                to: booking_next,
            })
            .push(Mutation::SetJobStatus {
                job_id: job.id,
                from: job.status,
                to: job_next,
            });
        self.db_client.commit(changes).await?;

        booking.status = booking_next;

        tracing::info!(
            "Booking {} moved to {:?}, job {} moved to {:?}",
            booking_id,
            booking_next,
            job.id,
            job_next
        );

        self.notifications.publish(DomainEvent::new(
            event,
            booking.requester_id,
            job.id,
            json!({ "job_title": job.title, "booking_id": booking.id }),
        ));

        Ok(booking)
    }

    pub async fn start_booking(
        &self,
        booking_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Booking, ServiceError> {
        self.advance_booking(
            booking_id,
            provider_id,
            BookingStatus::InProgress,
            JobStatus::InProgress,
            EventKind::BookingStarted,
        )
        .await
    }

    pub async fn complete_booking(
        &self,
        booking_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Booking, ServiceError> {
        self.advance_booking(
            booking_id,
            provider_id,
            BookingStatus::Completed,
            JobStatus::Completed,
            EventKind::BookingCompleted,
        )
        .await
    }

    pub async fn pay_booking(
        &self,
        booking_id: Uuid,
        requester_id: Uuid,
        amount: f64,
    ) -> Result<PaidBooking, ServiceError> {
        let amount = currency::validate_amount(amount).map_err(ServiceError::Validation)?;

        let job_id = self.load_booking(booking_id).await?.job_id;
        let _job_guard = self.locks.acquire_job(job_id).await;

        let mut booking = self.load_booking(booking_id).await?;
        if booking.requester_id != requester_id {
            return Err(ServiceError::UnauthorizedBookingAccess(requester_id, booking_id));
        }
        if booking.status != BookingStatus::Completed {
            return Err(ServiceError::InvalidState(
                "Booking must be completed before it can be paid".to_string(),
            ));
        }
        let paid = booking.payment_status.transition(PaymentStatus::Paid)?;

        let job = self.load_job(booking.job_id).await?;
        if self.enforce_quoted_price {
            let offer = self
                .db_client
                .get_offer(booking.offer_id)
                .await?
                .ok_or(ServiceError::OfferNotFound(booking.offer_id))?;

            let quoted = currency::quoted_price_cents(offer.hourly_rate, job.duration_hours);
            if currency::dollars_to_cents(amount) != quoted {
                return Err(ServiceError::Validation(format!(
                    "Payment must equal the quoted price of {}",
                    currency::format_dollars(currency::cents_to_dollars(quoted))
                )));
            }
        }

        let payment = PaymentRecord::paid(booking_id, amount);

        let mut changes = ChangeSet::new();
        changes
            .push(Mutation::InsertPayment(payment.clone()))
            .push(Mutation::MarkBookingPaid { booking_id });
        self.db_client.commit(changes).await?;

        booking.payment_status = paid;

        tracing::info!(
            "Booking {} paid by requester {}: {}",
            booking_id,
            requester_id,
            currency::format_dollars(amount)
        );

        self.notifications.publish(DomainEvent::new(
            EventKind::PaymentReceived,
            booking.provider_id,
            job.id,
            json!({
                "job_title": job.title,
                "booking_id": booking.id,
                "amount": amount,
            }),
        ));

        Ok(PaidBooking { booking, payment })
    }

    pub async fn submit_review(
        &self,
        booking_id: Uuid,
        requester_id: Uuid,
        rating: i32,
        comment: Option<String>,
    ) -> Result<Review, ServiceError> {
        if !(1..=5).contains(&rating) {
            return Err(ServiceError::Validation(
                "Rating must be between 1 and 5".to_string(),
            ));
        }

        let snapshot = self.load_booking(booking_id).await?;
        let _job_guard = self.locks.acquire_job(snapshot.job_id).await;
        let _provider_guard = self.locks.acquire_provider(snapshot.provider_id).await;

        let booking = self.load_booking(booking_id).await?;
        if booking.requester_id != requester_id {
            return Err(ServiceError::UnauthorizedBookingAccess(requester_id, booking_id));
        }
        if booking.status != BookingStatus::Completed
            || booking.payment_status != PaymentStatus::Paid
        {
            return Err(ServiceError::InvalidState(
                "Only completed and paid bookings can be reviewed".to_string(),
            ));
        }
        if self.db_client.get_booking_review(booking_id).await?.is_some() {
            return Err(ServiceError::Conflict(
                "This booking has already been reviewed".to_string(),
            ));
        }

        let comment = comment.as_deref().and_then(clean_user_text);
        let review = Review::for_booking(&booking, rating, comment);

        let mut changes = ChangeSet::new();
        changes
            .push(Mutation::InsertReview(review.clone()))
            .push(Mutation::ApplyRating {
                user_id: booking.provider_id,
                rating,
            });
        self.db_client.commit(changes).await?;

        tracing::info!(
            "Review {} ({} stars) recorded for provider {} on booking {}",
            review.id,
            rating,
            booking.provider_id,
            booking_id
        );

        Ok(review)
    }

    /// Admin path: force a job to cancelled, release its live booking and
    /// reject whatever offers are still pending.
    pub async fn cancel_job(&self, job_id: Uuid, admin_id: Uuid) -> Result<Job, ServiceError> {
        self.require_role(admin_id, UserRole::Admin).await?;

        let _job_guard = self.locks.acquire_job(job_id).await;

        let mut job = self.load_job(job_id).await?;
        let job_next = job.status.transition(JobStatus::Cancelled)?;

        let mut changes = ChangeSet::new();
        changes
            .push(Mutation::SetJobStatus {
                job_id,
                from: job.status,
                to: job_next,
            })
            .push(Mutation::RejectPendingOffers {
                job_id,
                except: None,
            });

        if let Some(booking) = self.db_client.get_active_job_booking(job_id).await? {
            changes.push(Mutation::SetBookingStatus {
                booking_id: booking.id,
                from: booking.status,
                to: booking.status.transition(BookingStatus::Cancelled)?,
            });
        }

        self.db_client.commit(changes).await?;
        job.status = job_next;

        tracing::info!("Job {} cancelled by admin {}", job_id, admin_id);

        Ok(job)
    }

    /// Bookings visible to `user`: their own side of the market, or all of
    /// them for an admin
    pub async fn list_bookings_for(&self, user: &User) -> Result<Vec<Booking>, ServiceError> {
        let bookings = match user.role {
            UserRole::Requester => {
                self.db_client
                    .get_user_bookings(user.id, BookingParty::Requester)
                    .await?
            }
            UserRole::Provider => {
                self.db_client
                    .get_user_bookings(user.id, BookingParty::Provider)
                    .await?
            }
            UserRole::Admin => self.db_client.list_bookings().await?,
        };

        Ok(bookings)
    }

    pub async fn get_booking_for(
        &self,
        booking_id: Uuid,
        user: &User,
    ) -> Result<Booking, ServiceError> {
        let booking = self.load_booking(booking_id).await?;

        if !booking.is_participant(user.id) && !user.is_admin() {
            return Err(ServiceError::UnauthorizedBookingAccess(user.id, booking_id));
        }

        Ok(booking)
    }
}
