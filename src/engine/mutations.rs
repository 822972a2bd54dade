use std::time::Instant;

use chrono::{Duration, NaiveTime};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::limits::*;
use crate::model::*;
use crate::notify::JobKind;
use crate::payment::CheckoutSessionRequest;

use super::availability::day_of_week;
use super::conflict::{check_len, check_no_conflict, parse_date, parse_time};
use super::error::StoreResultExt;
use super::{Engine, EngineError};

fn reject(reason: &'static str, err: EngineError) -> EngineError {
    metrics::counter!(crate::observability::CHECKOUTS_REJECTED_TOTAL, "reason" => reason).increment(1);
    err
}

impl Engine {
    /// Convert the user's cart into a priced booking.
    ///
    /// Prices are resolved now and frozen into one line row per booked unit.
    /// The booking, its lines and their options are written in a single
    /// repository call. Clearing the cart afterwards is best-effort.
    pub async fn create_booking_from_cart(
        &self,
        user_id: Id,
        vehicle_id: Option<Id>,
        scheduled_date: &str,
        scheduled_time: &str,
        notes: Option<String>,
    ) -> Result<Booking, EngineError> {
        let started = Instant::now();
        let profile = self.load_profile(user_id).await?;

        let date = parse_date(scheduled_date)?;
        let earliest = self.now() + Duration::hours(self.config.min_notice_hours);
        if date.and_time(NaiveTime::MIN) < earliest {
            return Err(reject(
                "notice",
                EngineError::invalid(format!(
                    "bookings need at least {} hours notice",
                    self.config.min_notice_hours
                ))
                .with_detail("scheduled_date", date),
            ));
        }
        let time = parse_time(scheduled_time)?;
        if let Some(n) = &notes {
            check_len("notes", n, MAX_NOTES_LEN)?;
        }

        let session = self
            .find_cart(Some(user_id), None)
            .await?
            .ok_or_else(|| EngineError::not_exist("cart not found").with_detail("user_id", user_id))?;
        let items = self
            .repos
            .carts
            .list_items(session.id)
            .await
            .context("list cart items")?;
        if items.is_empty() {
            return Err(reject("empty_cart", EngineError::invalid("cart is empty")));
        }

        let category = match vehicle_id {
            Some(vid) => self.load_vehicle_for(&profile, vid).await?.category_id,
            None => None,
        };

        let mut subtotal: Money = 0;
        let mut total_duration: Minutes = 0;
        let mut lines = Vec::new();
        for item in &items {
            let option_ids: Vec<Id> = item.options.iter().map(|o| o.option_id).collect();
            let priced = self.price_line(item.service_id, &option_ids, category).await?;
            let quantity = item.quantity as i64;
            subtotal += priced.unit_price() * quantity;
            total_duration += priced.unit_duration() * quantity;
            let options: Vec<BookingServiceOption> = priced
                .options
                .iter()
                .map(|o| BookingServiceOption {
                    option_id: o.id,
                    price_at_booking: o.base_price,
                })
                .collect();
            for _ in 0..item.quantity {
                lines.push(NewBookingLine {
                    service_id: item.service_id,
                    price_at_booking: priced.service_price,
                    options: options.clone(),
                });
            }
        }
        let total_amount = subtotal;
        let deposit_amount = self.config.deposit_for(total_amount);

        let new_booking = NewBooking {
            customer_id: profile.id,
            customer_user_id: user_id,
            vehicle_id,
            scheduled_date: date,
            scheduled_time: time,
            estimated_duration_minutes: total_duration,
            subtotal,
            deposit_amount,
            total_amount,
            notes,
        };

        let lock = self.day_lock(date);
        let inserted = async {
            let _guard = lock.lock().await;
            let buffer = self
                .repos
                .schedule
                .get_schedule_config(day_of_week(date))
                .await
                .context("load schedule config")?
                .map_or(0, |c| c.buffer_minutes);
            let existing = self
                .repos
                .bookings
                .list_active_bookings_on(date)
                .await
                .context("load bookings for date")?;
            check_no_conflict(&existing, minutes_of(time), total_duration, buffer)
                .map_err(|e| reject("slot_taken", e))?;
            self.repos
                .bookings
                .insert_booking(new_booking, lines, self.now())
                .await
                .context("create booking")
        }
        .await;
        self.release_day_lock(date, lock);
        let booking = inserted?;

        if let Err(e) = self.repos.carts.clear_items(session.id).await {
            warn!("booking {}: cart {} not cleared: {e}", booking.id, session.id);
        }

        metrics::counter!(crate::observability::BOOKINGS_CREATED_TOTAL).increment(1);
        metrics::histogram!(crate::observability::CHECKOUT_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        info!(
            "booking {} created for user {user_id} on {} {} ({} min, total {}, deposit {})",
            booking.id, booking.scheduled_date, booking.scheduled_time, total_duration, total_amount, deposit_amount
        );
        self.notify(
            JobKind::BookingCreated,
            json!({ "booking_id": booking.id, "user_id": user_id }),
        )
        .await;
        Ok(booking)
    }

    /// Customer cancellation. Late cancellations succeed but carry a deposit warning.
    pub async fn cancel_booking(&self, user_id: Id, booking_id: Id) -> Result<CancelOutcome, EngineError> {
        let booking = self.load_owned_booking(user_id, booking_id).await?;
        if booking.status.is_terminal() {
            return Err(EngineError::invalid(format!("booking is already {}", booking.status))
                .with_detail("booking_id", booking_id));
        }
        let now = self.now();
        let booking = self
            .repos
            .bookings
            .update_status(booking_id, BookingStatus::Cancelled, now)
            .await
            .context("cancel booking")?;

        let advisory = (booking.scheduled_at() - now < Duration::hours(self.config.cancellation_notice_hours))
            .then(|| {
                format!(
                    "cancelled less than {} hours before the appointment; the deposit may be forfeited",
                    self.config.cancellation_notice_hours
                )
            });
        metrics::counter!(crate::observability::BOOKING_TRANSITIONS_TOTAL, "status" => "cancelled").increment(1);
        info!("booking {booking_id} cancelled by user {user_id}");
        self.notify(
            JobKind::BookingCancelled,
            json!({ "booking_id": booking_id, "late": advisory.is_some() }),
        )
        .await;
        Ok(CancelOutcome { booking, advisory })
    }

    /// Admin status change along the lifecycle. Payment status is raised to
    /// match where the new status implies it.
    pub async fn update_booking_status(
        &self,
        admin_user_id: Id,
        booking_id: Id,
        status: BookingStatus,
    ) -> Result<Booking, EngineError> {
        self.require_admin(admin_user_id).await?;
        let booking = self.load_booking(booking_id).await?;
        if booking.status.is_terminal() {
            return Err(EngineError::invalid(format!("booking is already {}", booking.status))
                .with_detail("booking_id", booking_id));
        }
        if !booking.status.can_transition_to(status) {
            return Err(EngineError::invalid(format!("cannot move booking from {} to {status}", booking.status))
                .with_detail("booking_id", booking_id));
        }
        let implied_payment = match status {
            BookingStatus::DepositPaid => Some(PaymentStatus::DepositPaid),
            BookingStatus::Completed => Some(PaymentStatus::FullyPaid),
            BookingStatus::PendingPayment | BookingStatus::Cancelled => None,
        };
        let now = self.now();
        let bookings = &self.repos.bookings;
        let updated = match implied_payment {
            Some(payment) if booking.payment_status.can_transition_to(payment) => bookings
                .update_status_and_payment(booking_id, status, payment, now)
                .await
                .context("update booking status")?,
            _ => bookings
                .update_status(booking_id, status, now)
                .await
                .context("update booking status")?,
        };
        metrics::counter!(crate::observability::BOOKING_TRANSITIONS_TOTAL, "status" => status.as_str()).increment(1);
        info!("booking {booking_id}: {} -> {status} by admin {admin_user_id}", booking.status);
        if status == BookingStatus::Completed {
            self.notify(JobKind::BookingCompleted, json!({ "booking_id": booking_id })).await;
        }
        Ok(updated)
    }

    /// Mark a booking done and fully paid. Both statuses land in one write.
    pub async fn complete_booking(&self, admin_user_id: Id, booking_id: Id) -> Result<Booking, EngineError> {
        self.require_admin(admin_user_id).await?;
        let booking = self.load_booking(booking_id).await?;
        if booking.status.is_terminal() {
            return Err(EngineError::invalid(format!("booking is already {}", booking.status))
                .with_detail("booking_id", booking_id));
        }
        let updated = self
            .repos
            .bookings
            .update_status_and_payment(booking_id, BookingStatus::Completed, PaymentStatus::FullyPaid, self.now())
            .await
            .context("complete booking")?;
        metrics::counter!(crate::observability::BOOKING_TRANSITIONS_TOTAL, "status" => "completed").increment(1);
        info!("booking {booking_id} completed by admin {admin_user_id}");
        self.notify(JobKind::BookingCompleted, json!({ "booking_id": booking_id })).await;
        Ok(updated)
    }

    /// Admin payment correction. Payment only moves forward and never on a cancelled booking.
    pub async fn update_payment_status(
        &self,
        admin_user_id: Id,
        booking_id: Id,
        payment_status: PaymentStatus,
    ) -> Result<Booking, EngineError> {
        self.require_admin(admin_user_id).await?;
        let booking = self.load_booking(booking_id).await?;
        if booking.status == BookingStatus::Cancelled {
            return Err(EngineError::invalid("booking is cancelled").with_detail("booking_id", booking_id));
        }
        if !booking.payment_status.can_transition_to(payment_status) {
            return Err(EngineError::invalid(format!(
                "cannot move payment from {} to {payment_status}",
                booking.payment_status
            ))
            .with_detail("booking_id", booking_id));
        }
        let updated = self
            .repos
            .bookings
            .update_payment_status(booking_id, payment_status, self.now())
            .await
            .context("update payment status")?;
        info!("booking {booking_id}: payment {} -> {payment_status}", booking.payment_status);
        Ok(updated)
    }

    /// Payment-provider callback once the deposit clears. Payment status is
    /// written first, then booking status, as two separate writes. A callback
    /// for a booking already at `deposit_paid` is a no-op; one whose payment
    /// was recorded without the status change only gets the status write.
    pub async fn on_deposit_paid(&self, booking_id: Id) -> Result<Booking, EngineError> {
        let booking = self.load_booking(booking_id).await?;
        if booking.status.is_terminal() {
            return Err(EngineError::invalid(format!("booking is already {}", booking.status))
                .with_detail("booking_id", booking_id));
        }
        if booking.status == BookingStatus::DepositPaid {
            debug!("booking {booking_id}: deposit already recorded");
            return Ok(booking);
        }
        let now = self.now();
        if booking.payment_status < PaymentStatus::DepositPaid {
            self.repos
                .bookings
                .update_payment_status(booking_id, PaymentStatus::DepositPaid, now)
                .await
                .context("record deposit payment")?;
        }
        let updated = self
            .repos
            .bookings
            .update_status(booking_id, BookingStatus::DepositPaid, now)
            .await
            .context("mark booking deposit paid")?;
        metrics::counter!(crate::observability::BOOKING_TRANSITIONS_TOTAL, "status" => "deposit_paid").increment(1);
        info!("booking {booking_id}: deposit received");
        self.notify(
            JobKind::DepositReceived,
            json!({ "booking_id": booking_id, "amount": booking.deposit_amount }),
        )
        .await;
        Ok(updated)
    }

    /// Open a provider checkout session for the deposit. Returns the client secret.
    pub async fn create_payment_session(
        &self,
        user_id: Id,
        booking_id: Id,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<String, EngineError> {
        check_len("success_url", success_url, MAX_URL_LEN)?;
        check_len("cancel_url", cancel_url, MAX_URL_LEN)?;
        let booking = self.load_owned_booking(user_id, booking_id).await?;
        if booking.status != BookingStatus::PendingPayment {
            return Err(EngineError::invalid(format!("booking is {}, not awaiting payment", booking.status))
                .with_detail("booking_id", booking_id));
        }
        let request = CheckoutSessionRequest {
            amount: booking.deposit_amount,
            currency: self.config.currency.clone(),
            booking_id,
            success_url: success_url.to_string(),
            cancel_url: cancel_url.to_string(),
        };
        let secret = self
            .payments
            .create_checkout_session(request)
            .await
            .map_err(|e| {
                EngineError::internal("create payment session")
                    .with_detail("booking_id", booking_id)
                    .with_source(e)
            })?;
        metrics::counter!(crate::observability::PAYMENT_SESSIONS_TOTAL).increment(1);
        info!("booking {booking_id}: payment session opened for {}", booking.deposit_amount);
        Ok(secret)
    }
}
