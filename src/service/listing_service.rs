// service/listing_service.rs
use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::{
        marketdb::{JobQuery, MarketExt},
        userdb::UserExt,
        EntityStore,
    },
    models::{
        marketmodel::{Job, JobCategory, JobStatus, Offer},
        usermodel::{Rating, User},
    },
    service::error::ServiceError,
    utils::geo::distance_km,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Distance,
    Rating,
    Price,
    Availability,
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "distance" => Ok(SortKey::Distance),
            "rating" => Ok(SortKey::Rating),
            "price" => Ok(SortKey::Price),
            "availability" => Ok(SortKey::Availability),
            other => Err(format!("Unknown sort key {}", other)),
        }
    }
}

/// Browse filters. Distance is only computed when `lat`, `lng` and
/// `radius_km` are all present.
#[derive(Debug, Clone, Default)]
pub struct ListingQuery {
    pub category: Option<JobCategory>,
    pub city: Option<String>,
    pub date: Option<NaiveDate>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_km: Option<f64>,
    pub max_price: Option<f64>,
    pub sort: SortKey,
}

impl ListingQuery {
    fn search_point(&self) -> Option<(f64, f64, f64)> {
        match (self.lat, self.lng, self.radius_km) {
            (Some(lat), Some(lng), Some(radius)) => Some((lat, lng, radius)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RequesterSummary {
    pub id: Uuid,
    pub name: String,
    pub rating: Rating,
}

impl From<&User> for RequesterSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            rating: user.rating,
        }
    }
}

/// A job as shown in the browse list, with its read-time annotations
#[derive(Debug, Clone, Serialize)]
pub struct JobListing {
    #[serde(flatten)]
    pub job: Job,
    pub distance_km: Option<f64>,
    pub min_rate: Option<f64>,
    pub requester: Option<RequesterSummary>,
}

fn nulls_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Filter and order already-selected open jobs. `jobs` arrive newest first and
/// ties keep that order.
pub fn rank_jobs(
    jobs: Vec<Job>,
    query: &ListingQuery,
    min_rates: &HashMap<Uuid, f64>,
    requesters: &HashMap<Uuid, User>,
) -> Vec<JobListing> {
    let search_point = query.search_point();

    let mut listings: Vec<JobListing> = jobs
        .into_iter()
        .filter_map(|job| {
            let distance = search_point.map(|(lat, lng, _)| distance_km(lat, lng, job.lat, job.lng));
            if let (Some(distance), Some((_, _, radius))) = (distance, search_point) {
                if distance > radius {
                    return None;
                }
            }

            let min_rate = min_rates.get(&job.id).copied();
            // jobs without offers pass the price cap
            if let (Some(rate), Some(cap)) = (min_rate, query.max_price) {
                if rate > cap {
                    return None;
                }
            }

            let requester = requesters.get(&job.requester_id).map(RequesterSummary::from);

            Some(JobListing {
                job,
                distance_km: distance,
                min_rate,
                requester,
            })
        })
        .collect();

    match query.sort {
        SortKey::Distance => listings.sort_by(|a, b| nulls_last(a.distance_km, b.distance_km)),
        SortKey::Rating => {
            let avg = |l: &JobListing| l.requester.as_ref().map_or(0.0, |r| r.rating.avg);
            listings.sort_by(|a, b| avg(b).total_cmp(&avg(a)));
        }
        SortKey::Price => listings.sort_by(|a, b| nulls_last(a.min_rate, b.min_rate)),
        SortKey::Availability => listings.sort_by_key(|l| l.job.date),
    }

    listings
}

#[derive(Debug, Clone)]
pub struct ListingService {
    db_client: Arc<dyn EntityStore>,
}

impl ListingService {
    pub fn new(db_client: Arc<dyn EntityStore>) -> Self {
        Self { db_client }
    }

    pub async fn browse(&self, query: &ListingQuery) -> Result<Vec<JobListing>, ServiceError> {
        let jobs = self
            .db_client
            .search_jobs(&JobQuery {
                status: Some(JobStatus::Open),
                category: query.category,
                city_contains: query.city.clone().filter(|c| !c.trim().is_empty()),
                date: query.date,
            })
            .await?;

        let job_ids: Vec<Uuid> = jobs.iter().map(|j| j.id).collect();
        let min_rates = self.db_client.get_min_pending_rates(&job_ids).await?;

        let requester_ids: Vec<Uuid> = jobs.iter().map(|j| j.requester_id).collect();
        let requesters: HashMap<Uuid, User> = self
            .db_client
            .get_users_by_ids(&requester_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let listings = rank_jobs(jobs, query, &min_rates, &requesters);

        tracing::debug!("Browse returned {} open jobs (sort {:?})", listings.len(), query.sort);

        Ok(listings)
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<Job, ServiceError> {
        self.db_client
            .get_job(job_id)
            .await?
            .ok_or(ServiceError::JobNotFound(job_id))
    }

    /// Offers on a job, newest first. Only the job's requester or an admin
    /// may see them.
    pub async fn job_offers_for(&self, job_id: Uuid, user: &User) -> Result<Vec<Offer>, ServiceError> {
        let job = self.get_job(job_id).await?;

        if job.requester_id != user.id && !user.is_admin() {
            return Err(ServiceError::UnauthorizedJobAccess(user.id, job_id));
        }

        Ok(self.db_client.get_job_offers(job_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{
            marketdb::{ChangeSet, MarketExt, Mutation},
            memorydb::MemoryStore,
            userdb::UserExt,
        },
        models::{marketmodel::NewJob, usermodel::UserRole},
        utils::geo::GeoPoint,
    };
    use chrono::{Duration, Utc};

    const KM_PER_DEGREE: f64 = 6371.0 * std::f64::consts::PI / 180.0;

    fn job_at(lat: f64, lng: f64, date: NaiveDate) -> Job {
        let mut job = Job::new(
            Uuid::new_v4(),
            NewJob {
                title: "Meal prep".to_string(),
                description: "Cook for the week".to_string(),
                category: JobCategory::Cooking,
                date,
                start_time: "18:00".to_string(),
                duration_hours: 3.0,
                city: "Oakland".to_string(),
                location: GeoPoint::new(0.0, 0.0),
            },
        );
        // exact coordinates, bypassing rounding, so distances are precise
        job.lat = lat;
        job.lng = lng;
        job
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn near_origin() -> ListingQuery {
        ListingQuery {
            lat: Some(0.0),
            lng: Some(0.0),
            radius_km: Some(5.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_radius_boundary() {
        let inside = job_at(4.9 / KM_PER_DEGREE, 0.0, day(10));
        let outside = job_at(5.1 / KM_PER_DEGREE, 0.0, day(10));
        let inside_id = inside.id;

        let ranked = rank_jobs(
            vec![inside, outside],
            &near_origin(),
            &HashMap::new(),
            &HashMap::new(),
        );

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].job.id, inside_id);
        assert!((ranked[0].distance_km.unwrap() - 4.9).abs() < 1e-6);
    }

    #[test]
    fn test_no_search_point_means_no_distance() {
        let query = ListingQuery {
            lat: Some(0.0),
            lng: Some(0.0),
            ..Default::default()
        };
        let far = job_at(40.0, 40.0, day(10));

        let ranked = rank_jobs(vec![far], &query, &HashMap::new(), &HashMap::new());
        assert_eq!(ranked.len(), 1);
        assert!(ranked[0].distance_km.is_none());
    }

    #[test]
    fn test_price_cap_keeps_jobs_without_offers() {
        let cheap = job_at(0.0, 0.0, day(10));
        let pricey = job_at(0.0, 0.0, day(10));
        let no_offers = job_at(0.0, 0.0, day(10));
        let rates = HashMap::from([(cheap.id, 18.0), (pricey.id, 40.0)]);
        let (cheap_id, no_offers_id) = (cheap.id, no_offers.id);

        let query = ListingQuery {
            max_price: Some(25.0),
            ..Default::default()
        };
        let ranked = rank_jobs(vec![cheap, pricey, no_offers], &query, &rates, &HashMap::new());

        let ids: Vec<Uuid> = ranked.iter().map(|l| l.job.id).collect();
        assert_eq!(ids, vec![cheap_id, no_offers_id]);
    }

    #[test]
    fn test_sort_by_distance_then_price() {
        let far = job_at(0.03, 0.0, day(10));
        let near = job_at(0.01, 0.0, day(11));
        let mid = job_at(0.02, 0.0, day(12));
        let rates = HashMap::from([(far.id, 10.0), (mid.id, 30.0)]);
        let ids = [near.id, mid.id, far.id];
        let jobs = vec![far, near, mid];

        let ranked = rank_jobs(jobs.clone(), &near_origin(), &rates, &HashMap::new());
        let order: Vec<Uuid> = ranked.iter().map(|l| l.job.id).collect();
        assert_eq!(order, ids.to_vec());

        let by_price = ListingQuery {
            sort: SortKey::Price,
            ..near_origin()
        };
        let ranked = rank_jobs(jobs, &by_price, &rates, &HashMap::new());
        let order: Vec<Uuid> = ranked.iter().map(|l| l.job.id).collect();
        // no offers sorts last
        assert_eq!(order, vec![ids[2], ids[1], ids[0]]);
    }

    #[test]
    fn test_sort_by_rating_and_availability() {
        let mut loved = User::new(
            "Lou".to_string(),
            "lou@example.com".to_string(),
            UserRole::Requester,
            "Oakland".to_string(),
            None,
        );
        loved.rating = Rating { avg: 4.8, count: 12 };
        let mut okay = loved.clone();
        okay.id = Uuid::new_v4();
        okay.rating = Rating { avg: 3.1, count: 4 };

        let mut a = job_at(0.0, 0.0, day(20));
        a.requester_id = okay.id;
        let mut b = job_at(0.0, 0.0, day(15));
        b.requester_id = loved.id;
        // unknown requester counts as 0
        let c = job_at(0.0, 0.0, day(12));
        let ids = (a.id, b.id, c.id);

        let requesters = HashMap::from([(loved.id, loved), (okay.id, okay)]);
        let jobs = vec![a, b, c];

        let by_rating = ListingQuery {
            sort: SortKey::Rating,
            ..Default::default()
        };
        let order: Vec<Uuid> = rank_jobs(jobs.clone(), &by_rating, &HashMap::new(), &requesters)
            .iter()
            .map(|l| l.job.id)
            .collect();
        assert_eq!(order, vec![ids.1, ids.0, ids.2]);

        let by_date = ListingQuery {
            sort: SortKey::Availability,
            ..Default::default()
        };
        let order: Vec<Uuid> = rank_jobs(jobs, &by_date, &HashMap::new(), &requesters)
            .iter()
            .map(|l| l.job.id)
            .collect();
        assert_eq!(order, vec![ids.2, ids.1, ids.0]);
    }

    #[tokio::test]
    async fn test_browse_only_lists_open_jobs_matching_filters() {
        let store = Arc::new(MemoryStore::new());
        let requester = store
            .save_user(User::new(
                "Rita".to_string(),
                "rita@example.com".to_string(),
                UserRole::Requester,
                "Oakland".to_string(),
                None,
            ))
            .await
            .unwrap();

        let mut open = job_at(37.804, -122.271, day(10));
        open.requester_id = requester.id;
        let mut booked = job_at(37.804, -122.271, day(10));
        booked.status = JobStatus::Booked;
        let mut elsewhere = job_at(37.804, -122.271, day(10));
        elsewhere.city = "Berkeley".to_string();

        let offer = Offer::new(
            open.id,
            Uuid::new_v4(),
            21.0,
            String::new(),
            Utc::now(),
            Utc::now() + Duration::hours(2),
        );

        let mut changes = ChangeSet::new();
        changes
            .push(Mutation::InsertJob(open.clone()))
            .push(Mutation::InsertJob(booked))
            .push(Mutation::InsertJob(elsewhere))
            .push(Mutation::InsertOffer(offer));
        store.commit(changes).await.unwrap();

        let service = ListingService::new(store.clone());
        let listings = service
            .browse(&ListingQuery {
                city: Some("oak".to_string()),
                category: Some(JobCategory::Cooking),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].job.id, open.id);
        assert_eq!(listings[0].min_rate, Some(21.0));
        assert_eq!(
            listings[0].requester.as_ref().map(|r| r.name.as_str()),
            Some("Rita")
        );
        assert!(store.get_job(open.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_job_offers_visible_to_owner_only() {
        let store = Arc::new(MemoryStore::new());
        let owner = store
            .save_user(User::new(
                "Owner".to_string(),
                "owner@example.com".to_string(),
                UserRole::Requester,
                "Oakland".to_string(),
                None,
            ))
            .await
            .unwrap();
        let other = store
            .save_user(User::new(
                "Other".to_string(),
                "other@example.com".to_string(),
                UserRole::Requester,
                "Oakland".to_string(),
                None,
            ))
            .await
            .unwrap();

        let mut job = job_at(0.0, 0.0, day(10));
        job.requester_id = owner.id;
        let mut changes = ChangeSet::new();
        changes.push(Mutation::InsertJob(job.clone()));
        store.commit(changes).await.unwrap();

        let service = ListingService::new(store);
        assert!(service.job_offers_for(job.id, &owner).await.unwrap().is_empty());
        let err = service.job_offers_for(job.id, &other).await.unwrap_err();
        assert_eq!(err.kind(), crate::service::error::ErrorKind::Forbidden);
    }
}
