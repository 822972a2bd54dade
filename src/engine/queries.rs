use chrono::NaiveDate;
use tracing::debug;

use crate::limits::*;
use crate::model::*;

use super::availability::{compute_slots, day_of_week};
use super::error::StoreResultExt;
use super::{Engine, EngineError};

impl Engine {
    /// Bookable start times on `date` for a job of `requested_minutes`.
    ///
    /// Blackout dates and closed or unconfigured weekdays yield no slots.
    /// A non-positive duration falls back to the configured default.
    pub async fn available_slots(&self, date: NaiveDate, requested_minutes: Minutes) -> Result<Vec<Slot>, EngineError> {
        metrics::counter!(crate::observability::SLOT_QUERIES_TOTAL).increment(1);
        let schedule = &self.repos.schedule;

        if schedule.get_blackout(date).await.context("load blackout")?.is_some() {
            debug!("slots {date}: blackout");
            return Ok(Vec::new());
        }
        let config = match schedule
            .get_schedule_config(day_of_week(date))
            .await
            .context("load schedule config")?
        {
            Some(c) if c.is_open => c,
            _ => {
                debug!("slots {date}: closed");
                return Ok(Vec::new());
            }
        };

        let duration = if requested_minutes <= 0 {
            self.config.default_duration_minutes
        } else {
            requested_minutes
        };
        let bookings = self
            .repos
            .bookings
            .list_active_bookings_on(date)
            .await
            .context("load bookings for date")?;
        let slots = compute_slots(date, &config, &bookings, duration, self.config.slot_stride_minutes);
        metrics::histogram!(crate::observability::SLOTS_RETURNED).record(slots.len() as f64);
        debug!("slots {date}: {} free for {duration} min", slots.len());
        Ok(slots)
    }

    /// The caller's bookings, newest first.
    pub async fn list_my_bookings(&self, user_id: Id) -> Result<Vec<Booking>, EngineError> {
        self.repos
            .bookings
            .list_bookings_by_customer(user_id)
            .await
            .context("list customer bookings")
    }

    /// Every booking scheduled in `[from, to]`, for staff.
    pub async fn list_all_bookings(
        &self,
        admin_user_id: Id,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Booking>, EngineError> {
        self.require_admin(admin_user_id).await?;
        if from > to {
            return Err(EngineError::invalid("range start is after range end")
                .with_detail("from", from)
                .with_detail("to", to));
        }
        if (to - from).num_days() > MAX_LISTING_RANGE_DAYS {
            return Err(EngineError::invalid("date range too wide").with_detail("max_days", MAX_LISTING_RANGE_DAYS));
        }
        self.repos
            .bookings
            .list_bookings_between(from, to)
            .await
            .context("list bookings in range")
    }

    async fn booking_detail(&self, booking: Booking) -> Result<BookingDetail, EngineError> {
        let services = self
            .repos
            .bookings
            .list_booking_services(booking.id)
            .await
            .context("list booking services")?;
        Ok(BookingDetail { booking, services })
    }

    /// A booking with its price snapshot. Other customers' bookings read as missing.
    pub async fn get_my_booking(&self, user_id: Id, booking_id: Id) -> Result<BookingDetail, EngineError> {
        let booking = self.load_owned_booking(user_id, booking_id).await?;
        self.booking_detail(booking).await
    }

    pub async fn get_booking(&self, admin_user_id: Id, booking_id: Id) -> Result<BookingDetail, EngineError> {
        self.require_admin(admin_user_id).await?;
        let booking = self.load_booking(booking_id).await?;
        self.booking_detail(booking).await
    }
}
