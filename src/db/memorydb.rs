// db/memorydb.rs
//! In-process entity store. Used when no `DATABASE_URL` is configured and as
//! the store behind every service test.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    chatdb::ChatExt,
    marketdb::{BookingParty, ChangeSet, JobQuery, MarketExt, Mutation},
    userdb::{ProfileUpdate, UserExt},
    StoreError,
};
use crate::{
    models::{chatmodel::Message, marketmodel::*, usermodel::User},
    service::rating_aggregator,
    utils::schedule::overlaps,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    jobs: HashMap<Uuid, Job>,
    offers: HashMap<Uuid, Offer>,
    bookings: HashMap<Uuid, Booking>,
    payments: Vec<PaymentRecord>,
    reviews: HashMap<Uuid, Review>,
    messages: Vec<Message>,
}

impl Tables {
    fn apply(&mut self, mutation: Mutation) -> Result<(), StoreError> {
        match mutation {
            Mutation::InsertJob(job) => {
                self.jobs.insert(job.id, job);
            }
            Mutation::InsertOffer(offer) => {
                if offer.status == OfferStatus::Pending
                    && self.offers.values().any(|o| {
                        o.job_id == offer.job_id
                            && o.provider_id == offer.provider_id
                            && o.status == OfferStatus::Pending
                    })
                {
                    return Err(StoreError::Conflict(format!(
                        "Provider {} already has a pending offer on job {}",
                        offer.provider_id, offer.job_id
                    )));
                }
                self.offers.insert(offer.id, offer);
            }
            Mutation::InsertBooking(booking) => {
                if self.bookings.contains_key(&booking.id)
                    || self.bookings.values().any(|b| b.offer_id == booking.offer_id)
                {
                    return Err(StoreError::Conflict(format!(
                        "Offer {} already has a booking",
                        booking.offer_id
                    )));
                }
                if booking.status.is_active()
                    && self.bookings.values().any(|b| {
                        b.provider_id == booking.provider_id
                            && b.status.is_active()
                            && overlaps(b.start_time, b.end_time, booking.start_time, booking.end_time)
                    })
                {
                    return Err(StoreError::Conflict(format!(
                        "Provider {} already has an active booking in that window",
                        booking.provider_id
                    )));
                }
                self.bookings.insert(booking.id, booking);
            }
            Mutation::InsertPayment(payment) => {
                if self.payments.iter().any(|p| p.booking_id == payment.booking_id) {
                    return Err(StoreError::Conflict(format!(
                        "Booking {} already has a payment",
                        payment.booking_id
                    )));
                }
                self.payments.push(payment);
            }
            Mutation::InsertReview(review) => {
                if self.reviews.values().any(|r| r.booking_id == review.booking_id) {
                    return Err(StoreError::Conflict(format!(
                        "Booking {} already has a review",
                        review.booking_id
                    )));
                }
                self.reviews.insert(review.id, review);
            }
            Mutation::SetJobStatus { job_id, from, to } => {
                let job = self
                    .jobs
                    .get_mut(&job_id)
                    .filter(|j| j.status == from)
                    .ok_or_else(|| {
                        StoreError::Conflict(format!("Job {} is no longer {:?}", job_id, from))
                    })?;
                job.status = to;
            }
            Mutation::BookJob { job_id, offer_id } => {
                let job = self
                    .jobs
                    .get_mut(&job_id)
                    .filter(|j| j.status == JobStatus::Open)
                    .ok_or_else(|| {
                        StoreError::Conflict(format!("Job {} is no longer open", job_id))
                    })?;
                job.status = JobStatus::Booked;
                job.accepted_offer_id = Some(offer_id);
            }
            Mutation::SetOfferStatus { offer_id, from, to } => {
                let offer = self
                    .offers
                    .get_mut(&offer_id)
                    .filter(|o| o.status == from)
                    .ok_or_else(|| {
                        StoreError::Conflict(format!("Offer {} is no longer {:?}", offer_id, from))
                    })?;
                offer.status = to;
            }
            Mutation::RejectPendingOffers { job_id, except } => {
                self.offers
                    .values_mut()
                    .filter(|o| {
                        o.job_id == job_id
                            && o.status == OfferStatus::Pending
                            && Some(o.id) != except
                    })
                    .for_each(|o| o.status = OfferStatus::Rejected);
            }
            Mutation::SetBookingStatus { booking_id, from, to } => {
                let booking = self
                    .bookings
                    .get_mut(&booking_id)
                    .filter(|b| b.status == from)
                    .ok_or_else(|| {
                        StoreError::Conflict(format!(
                            "Booking {} is no longer {:?}",
                            booking_id, from
                        ))
                    })?;
                booking.status = to;
            }
            Mutation::MarkBookingPaid { booking_id } => {
                let booking = self
                    .bookings
                    .get_mut(&booking_id)
                    .filter(|b| {
                        b.payment_status == PaymentStatus::Unpaid
                            && b.status == BookingStatus::Completed
                    })
                    .ok_or_else(|| {
                        StoreError::Conflict(format!("Booking {} is already paid", booking_id))
                    })?;
                booking.payment_status = PaymentStatus::Paid;
            }
            Mutation::ApplyRating { user_id, rating } => {
                let user = self.users.get_mut(&user_id).ok_or_else(|| {
                    StoreError::Conflict(format!("User {} no longer exists", user_id))
                })?;
                user.rating = rating_aggregator::update_rating(user.rating, rating);
            }
        }

        Ok(())
    }

    /// Drops a job together with everything hanging off it
    fn purge_job(&mut self, job_id: Uuid) -> bool {
        let existed = self.jobs.remove(&job_id).is_some();

        self.offers.retain(|_, o| o.job_id != job_id);
        let bookings: HashSet<Uuid> = self
            .bookings
            .values()
            .filter(|b| b.job_id == job_id)
            .map(|b| b.id)
            .collect();
        self.purge_bookings(&bookings);

        existed
    }

    fn purge_bookings(&mut self, booking_ids: &HashSet<Uuid>) {
        self.bookings.retain(|id, _| !booking_ids.contains(id));
        self.payments.retain(|p| !booking_ids.contains(&p.booking_id));
        self.reviews.retain(|_, r| !booking_ids.contains(&r.booking_id));
        self.messages.retain(|m| !booking_ids.contains(&m.booking_id));
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> DateTime<Utc>) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl UserExt for MemoryStore {
    async fn save_user(&self, user: User) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;

        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!(
                "A user with email {} already exists",
                user.email
            )));
        }
        tables.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn get_users_by_ids(&self, user_ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
        let tables = self.tables.read().await;

        Ok(user_ids
            .iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .filter_map(|id| tables.users.get(id).cloned())
            .collect())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.tables.read().await.users.values().cloned().collect();
        newest_first(&mut users, |u| u.created_at);
        Ok(users)
    }

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<User>, StoreError> {
        let mut tables = self.tables.write().await;

        let Some(user) = tables.users.get_mut(&user_id) else {
            return Ok(None);
        };
        if let Some(name) = update.name {
            user.name = name;
        }
        if let Some(city) = update.city {
            user.city = city;
        }
        if let Some(location) = update.location {
            user.lat = Some(location.lat());
            user.lng = Some(location.lng());
        }

        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;

        if tables.users.remove(&user_id).is_none() {
            return Ok(false);
        }

        let owned_jobs: Vec<Uuid> = tables
            .jobs
            .values()
            .filter(|j| j.requester_id == user_id)
            .map(|j| j.id)
            .collect();
        for job_id in owned_jobs {
            tables.purge_job(job_id);
        }

        tables.offers.retain(|_, o| o.provider_id != user_id);
        let bookings: HashSet<Uuid> = tables
            .bookings
            .values()
            .filter(|b| b.provider_id == user_id)
            .map(|b| b.id)
            .collect();
        tables.purge_bookings(&bookings);
        tables.messages.retain(|m| m.sender_id != user_id);

        Ok(true)
    }
}

#[async_trait]
impl MarketExt for MemoryStore {
    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, StoreError> {
        Ok(self.tables.read().await.jobs.get(&job_id).cloned())
    }

    async fn search_jobs(&self, query: &JobQuery) -> Result<Vec<Job>, StoreError> {
        let mut jobs: Vec<Job> = self
            .tables
            .read()
            .await
            .jobs
            .values()
            .filter(|j| query.matches(j))
            .cloned()
            .collect();

        jobs.sort_by(|a, b| b.posted_at.cmp(&a.posted_at).then(a.id.cmp(&b.id)));
        Ok(jobs)
    }

    async fn delete_job(&self, job_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.tables.write().await.purge_job(job_id))
    }

    async fn get_offer(&self, offer_id: Uuid) -> Result<Option<Offer>, StoreError> {
        Ok(self.tables.read().await.offers.get(&offer_id).cloned())
    }

    async fn get_job_offers(&self, job_id: Uuid) -> Result<Vec<Offer>, StoreError> {
        let mut offers: Vec<Offer> = self
            .tables
            .read()
            .await
            .offers
            .values()
            .filter(|o| o.job_id == job_id)
            .cloned()
            .collect();

        newest_first(&mut offers, |o| o.created_at);
        Ok(offers)
    }

    async fn get_pending_offer(
        &self,
        job_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<Offer>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .offers
            .values()
            .find(|o| {
                o.job_id == job_id
                    && o.provider_id == provider_id
                    && o.status == OfferStatus::Pending
            })
            .cloned())
    }

    async fn get_min_pending_rates(
        &self,
        job_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, f64>, StoreError> {
        let wanted: HashSet<&Uuid> = job_ids.iter().collect();
        let tables = self.tables.read().await;

        let mut rates: HashMap<Uuid, f64> = HashMap::new();
        for offer in tables
            .offers
            .values()
            .filter(|o| o.status == OfferStatus::Pending && wanted.contains(&o.job_id))
        {
            rates
                .entry(offer.job_id)
                .and_modify(|min| *min = min.min(offer.hourly_rate))
                .or_insert(offer.hourly_rate);
        }

        Ok(rates)
    }

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(self.tables.read().await.bookings.get(&booking_id).cloned())
    }

    async fn get_active_job_booking(&self, job_id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .bookings
            .values()
            .find(|b| b.job_id == job_id && b.status.is_active())
            .cloned())
    }

    async fn get_user_bookings(
        &self,
        user_id: Uuid,
        party: BookingParty,
    ) -> Result<Vec<Booking>, StoreError> {
        let mut bookings: Vec<Booking> = self
            .tables
            .read()
            .await
            .bookings
            .values()
            .filter(|b| match party {
                BookingParty::Requester => b.requester_id == user_id,
                BookingParty::Provider => b.provider_id == user_id,
            })
            .cloned()
            .collect();

        newest_first(&mut bookings, |b| b.created_at);
        Ok(bookings)
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, StoreError> {
        let mut bookings: Vec<Booking> =
            self.tables.read().await.bookings.values().cloned().collect();
        newest_first(&mut bookings, |b| b.created_at);
        Ok(bookings)
    }

    async fn find_overlapping_bookings(
        &self,
        provider_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Booking>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .bookings
            .values()
            .filter(|b| {
                b.provider_id == provider_id
                    && b.status.is_active()
                    && overlaps(b.start_time, b.end_time, start, end)
            })
            .cloned()
            .collect())
    }

    async fn get_booking_payments(&self, booking_id: Uuid) -> Result<Vec<PaymentRecord>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .payments
            .iter()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn get_booking_review(&self, booking_id: Uuid) -> Result<Option<Review>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .reviews
            .values()
            .find(|r| r.booking_id == booking_id)
            .cloned())
    }

    async fn get_provider_reviews(
        &self,
        provider_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Review>, StoreError> {
        let mut reviews: Vec<Review> = self
            .tables
            .read()
            .await
            .reviews
            .values()
            .filter(|r| r.provider_id == provider_id)
            .cloned()
            .collect();

        newest_first(&mut reviews, |r| r.created_at);
        reviews.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(reviews)
    }

    async fn commit(&self, changes: ChangeSet) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;

        let mut staged = (*tables).clone();
        for mutation in changes.into_mutations() {
            staged.apply(mutation)?;
        }
        *tables = staged;

        Ok(())
    }
}

#[async_trait]
impl ChatExt for MemoryStore {
    async fn insert_message(&self, message: Message) -> Result<Message, StoreError> {
        self.tables.write().await.messages.push(message.clone());
        Ok(message)
    }

    async fn get_booking_messages(&self, booking_id: Uuid) -> Result<Vec<Message>, StoreError> {
        let mut messages: Vec<Message> = self
            .tables
            .read()
            .await
            .messages
            .iter()
            .filter(|m| m.booking_id == booking_id)
            .cloned()
            .collect();

        // stable, so messages sharing a timestamp keep insertion order
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn mark_messages_read(
        &self,
        booking_id: Uuid,
        reader_id: Uuid,
    ) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut changed = 0;

        for message in self.tables.write().await.messages.iter_mut().filter(|m| {
            m.booking_id == booking_id && m.sender_id != reader_id && !m.is_read
        }) {
            message.is_read = true;
            message.read_at = Some(now);
            changed += 1;
        }

        Ok(changed)
    }
}
