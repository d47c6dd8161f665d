//! Transition tables for every status-bearing entity.
//!
//! Each status enum answers one question, "may I move from here to there",
//! through an exhaustive match. Operations never assign a status directly;
//! they ask for the next one through [`Lifecycle::transition`].

use std::fmt::Debug;

use super::marketmodel::{BookingStatus, JobStatus, OfferStatus, PaymentStatus};
use crate::service::error::ServiceError;

pub trait Lifecycle: Copy + Debug + PartialEq + Sized {
    /// Human readable entity name for error messages
    const ENTITY: &'static str;

    fn can_transition_to(&self, next: Self) -> bool;

    fn transition(self, next: Self) -> Result<Self, ServiceError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(ServiceError::InvalidState(format!(
                "Cannot move {} from {:?} to {:?}",
                Self::ENTITY,
                self,
                next
            )))
        }
    }
}

impl Lifecycle for JobStatus {
    const ENTITY: &'static str = "job";

    fn can_transition_to(&self, next: Self) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Open, Booked) => true,
            (Booked, InProgress) => true,
            (InProgress, Completed) => true,
            (Open | Booked | InProgress, Cancelled) => true,
            (Open | Booked | InProgress | Completed | Cancelled, _) => false,
        }
    }
}

impl Lifecycle for OfferStatus {
    const ENTITY: &'static str = "offer";

    fn can_transition_to(&self, next: Self) -> bool {
        use OfferStatus::*;
        match (self, next) {
            (Pending, Accepted | Rejected) => true,
            (Pending | Accepted | Rejected, _) => false,
        }
    }
}

impl Lifecycle for BookingStatus {
    const ENTITY: &'static str = "booking";

    fn can_transition_to(&self, next: Self) -> bool {
        use BookingStatus::*;
        match (self, next) {
            (Accepted, InProgress) => true,
            (InProgress, Completed) => true,
            (Accepted | InProgress, Cancelled) => true,
            (Accepted | InProgress | Completed | Cancelled, _) => false,
        }
    }
}

impl Lifecycle for PaymentStatus {
    const ENTITY: &'static str = "payment";

    fn can_transition_to(&self, next: Self) -> bool {
        matches!((self, next), (PaymentStatus::Unpaid, PaymentStatus::Paid))
    }
}
