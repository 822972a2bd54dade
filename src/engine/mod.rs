mod availability;
mod cart;
mod conflict;
mod error;
mod history;
mod mutations;
mod pricing;
mod queries;
mod schedule;

pub use availability::{compute_slots, day_of_week, occupied_spans};
pub use conflict::{conflicts_with, parse_date, parse_time};
pub use error::{EngineError, ErrorKind};

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::warn;

use crate::auth::Authorizer;
use crate::config::EngineConfig;
use crate::model::*;
use crate::notify::{JobKind, JobQueue};
use crate::payment::PaymentGateway;
use crate::store::Repositories;

use error::StoreResultExt;

/// The booking and scheduling engine. Cheap to share behind an `Arc`; every
/// operation is an independent async call.
pub struct Engine {
    pub(super) repos: Repositories,
    pub(super) auth: Arc<dyn Authorizer>,
    pub(super) jobs: Arc<dyn JobQueue>,
    pub(super) payments: Arc<dyn PaymentGateway>,
    pub(super) config: EngineConfig,
    /// Checkout holds the lock for its date across the conflict check and insert.
    /// Entries live only while some checkout for the date is in flight.
    pub(super) day_locks: DashMap<NaiveDate, Arc<Mutex<()>>>,
}

impl Engine {
    pub fn new(
        repos: Repositories,
        auth: Arc<dyn Authorizer>,
        jobs: Arc<dyn JobQueue>,
        payments: Arc<dyn PaymentGateway>,
        config: EngineConfig,
    ) -> Self {
        Self {
            repos,
            auth,
            jobs,
            payments,
            config: config.clamped(),
            day_locks: DashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(super) fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }

    pub(super) fn day_lock(&self, date: NaiveDate) -> Arc<Mutex<()>> {
        self.day_locks.entry(date).or_default().value().clone()
    }

    /// Hand back a lock from `day_lock`. The entry goes once no other checkout holds or waits on it.
    pub(super) fn release_day_lock(&self, date: NaiveDate, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.day_locks.remove_if(&date, |_, l| Arc::strong_count(l) == 1);
    }

    pub(super) async fn require_admin(&self, user_id: Id) -> Result<(), EngineError> {
        let is_admin = self
            .auth
            .is_system_admin(user_id)
            .await
            .context("check admin role")?;
        if !is_admin {
            return Err(EngineError::unauthorized("administrator role required").with_detail("user_id", user_id));
        }
        Ok(())
    }

    pub(super) async fn is_admin(&self, user_id: Id) -> Result<bool, EngineError> {
        self.auth.is_system_admin(user_id).await.context("check admin role")
    }

    pub(super) async fn load_booking(&self, booking_id: Id) -> Result<Booking, EngineError> {
        self.repos
            .bookings
            .get_booking(booking_id)
            .await
            .context("load booking")?
            .ok_or_else(|| EngineError::not_exist("booking not found").with_detail("booking_id", booking_id))
    }

    /// Load a booking on behalf of its customer. Someone else's booking reads as missing.
    pub(super) async fn load_owned_booking(&self, user_id: Id, booking_id: Id) -> Result<Booking, EngineError> {
        let booking = self.load_booking(booking_id).await?;
        if booking.customer_user_id != user_id {
            return Err(EngineError::not_exist("booking not found").with_detail("booking_id", booking_id));
        }
        Ok(booking)
    }

    pub(super) async fn load_profile(&self, user_id: Id) -> Result<CustomerProfile, EngineError> {
        self.repos
            .catalog
            .get_customer_profile_by_user(user_id)
            .await
            .context("load customer profile")?
            .ok_or_else(|| EngineError::not_exist("customer profile not found").with_detail("user_id", user_id))
    }

    /// A vehicle the profile owns. Another customer's vehicle is refused outright.
    pub(super) async fn load_vehicle_for(
        &self,
        profile: &CustomerProfile,
        vehicle_id: Id,
    ) -> Result<Vehicle, EngineError> {
        let vehicle = self
            .repos
            .catalog
            .get_vehicle(vehicle_id)
            .await
            .context("load vehicle")?
            .ok_or_else(|| EngineError::not_exist("vehicle not found").with_detail("vehicle_id", vehicle_id))?;
        if vehicle.customer_id != profile.id {
            return Err(EngineError::unauthorized("vehicle belongs to another customer")
                .with_detail("vehicle_id", vehicle_id));
        }
        Ok(vehicle)
    }

    /// Best-effort notification. Failures are logged and counted, never returned.
    pub(super) async fn notify(&self, kind: JobKind, payload: serde_json::Value) {
        match self.jobs.enqueue(kind, payload).await {
            Ok(()) => {
                metrics::counter!(crate::observability::JOBS_ENQUEUED_TOTAL, "kind" => kind.as_str()).increment(1);
            }
            Err(e) => {
                warn!("enqueue {} failed: {e}", kind.as_str());
                metrics::counter!(crate::observability::JOBS_FAILED_TOTAL, "kind" => kind.as_str()).increment(1);
            }
        }
    }
}
