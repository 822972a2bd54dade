use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use dashmap::DashMap;

use crate::model::*;

use super::*;

/// DashMap-backed implementation of every repository trait.
///
/// Catalogue rows are seeded directly through the `insert_*` methods; the
/// engine never writes them. `set_unavailable(true)` makes every call fail,
/// which is how dependency outages are simulated.
pub struct InMemoryStore {
    next_id: AtomicI64,
    unavailable: AtomicBool,

    services: DashMap<Id, Service>,
    options: DashMap<Id, ServiceOption>,
    price_tiers: DashMap<(Id, Id), PriceTier>,
    vehicles: DashMap<Id, Vehicle>,
    /// Keyed by user id.
    profiles: DashMap<Id, CustomerProfile>,

    schedule: DashMap<u8, ScheduleConfig>,
    blackouts: DashMap<NaiveDate, ScheduleBlackout>,

    sessions: DashMap<Id, CartSession>,
    cart_items: DashMap<Id, CartItem>,

    bookings: DashMap<Id, Booking>,
    booking_services: DashMap<Id, Vec<BookingService>>,

    records: DashMap<Id, ServiceRecord>,
    notes: DashMap<Id, ServiceNote>,
    products: DashMap<Id, ServiceProductUsed>,
    photos: DashMap<Id, ServicePhoto>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            unavailable: AtomicBool::new(false),
            services: DashMap::new(),
            options: DashMap::new(),
            price_tiers: DashMap::new(),
            vehicles: DashMap::new(),
            profiles: DashMap::new(),
            schedule: DashMap::new(),
            blackouts: DashMap::new(),
            sessions: DashMap::new(),
            cart_items: DashMap::new(),
            bookings: DashMap::new(),
            booking_services: DashMap::new(),
            records: DashMap::new(),
            notes: DashMap::new(),
            products: DashMap::new(),
            photos: DashMap::new(),
        }
    }

    fn next_id(&self) -> Id {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn check(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("in-memory store switched off".into()));
        }
        Ok(())
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    // ── Catalogue seeding ────────────────────────────────────

    pub fn insert_service(&self, name: &str, base_price: Money, duration_minutes: Minutes) -> Service {
        let service = Service {
            id: self.next_id(),
            name: name.to_string(),
            base_price,
            duration_minutes,
            is_active: true,
        };
        self.services.insert(service.id, service.clone());
        service
    }

    /// Reprice a service in place. Existing booking snapshots are unaffected.
    pub fn set_service_price(&self, service_id: Id, base_price: Money) {
        if let Some(mut service) = self.services.get_mut(&service_id) {
            service.base_price = base_price;
        }
    }

    pub fn set_service_active(&self, service_id: Id, is_active: bool) {
        if let Some(mut service) = self.services.get_mut(&service_id) {
            service.is_active = is_active;
        }
    }

    pub fn insert_service_option(
        &self,
        service_id: Id,
        name: &str,
        base_price: Money,
        duration_minutes: Minutes,
    ) -> ServiceOption {
        let option = ServiceOption {
            id: self.next_id(),
            service_id,
            name: name.to_string(),
            base_price,
            duration_minutes,
        };
        self.options.insert(option.id, option.clone());
        option
    }

    pub fn insert_price_tier(&self, service_id: Id, vehicle_category_id: Id, price: Money) {
        self.price_tiers.insert(
            (service_id, vehicle_category_id),
            PriceTier { service_id, vehicle_category_id, price },
        );
    }

    pub fn insert_vehicle(&self, customer_id: Id, category_id: Option<Id>, make: &str, model: &str) -> Vehicle {
        let vehicle = Vehicle {
            id: self.next_id(),
            customer_id,
            category_id,
            make: make.to_string(),
            model: model.to_string(),
        };
        self.vehicles.insert(vehicle.id, vehicle.clone());
        vehicle
    }

    pub fn insert_customer_profile(&self, user_id: Id, full_name: &str) -> CustomerProfile {
        let profile = CustomerProfile {
            id: self.next_id(),
            user_id,
            full_name: full_name.to_string(),
        };
        self.profiles.insert(user_id, profile.clone());
        profile
    }

    /// Write a booking row as-is, bypassing checkout. Used to seed history.
    pub fn insert_booking_row(&self, mut booking: Booking) -> Booking {
        booking.id = self.next_id();
        self.bookings.insert(booking.id, booking.clone());
        self.booking_services.insert(booking.id, Vec::new());
        booking
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }
}

fn sorted_by_id<T, F: Fn(&T) -> Id>(mut rows: Vec<T>, key: F) -> Vec<T> {
    rows.sort_by_key(|r| key(r));
    rows
}

#[async_trait]
impl CatalogRepository for InMemoryStore {
    async fn get_service(&self, id: Id) -> StoreResult<Option<Service>> {
        self.check()?;
        Ok(self.services.get(&id).map(|e| e.value().clone()))
    }

    async fn get_service_option(&self, id: Id) -> StoreResult<Option<ServiceOption>> {
        self.check()?;
        Ok(self.options.get(&id).map(|e| e.value().clone()))
    }

    async fn get_price_tier(
        &self,
        service_id: Id,
        vehicle_category_id: Id,
    ) -> StoreResult<Option<PriceTier>> {
        self.check()?;
        Ok(self
            .price_tiers
            .get(&(service_id, vehicle_category_id))
            .map(|e| e.value().clone()))
    }

    async fn get_vehicle(&self, id: Id) -> StoreResult<Option<Vehicle>> {
        self.check()?;
        Ok(self.vehicles.get(&id).map(|e| e.value().clone()))
    }

    async fn get_customer_profile_by_user(&self, user_id: Id) -> StoreResult<Option<CustomerProfile>> {
        self.check()?;
        Ok(self.profiles.get(&user_id).map(|e| e.value().clone()))
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryStore {
    async fn get_schedule_config(&self, day_of_week: u8) -> StoreResult<Option<ScheduleConfig>> {
        self.check()?;
        Ok(self.schedule.get(&day_of_week).map(|e| e.value().clone()))
    }

    async fn list_schedule_configs(&self) -> StoreResult<Vec<ScheduleConfig>> {
        self.check()?;
        let mut rows: Vec<ScheduleConfig> = self.schedule.iter().map(|e| e.value().clone()).collect();
        rows.sort_by_key(|c| c.day_of_week);
        Ok(rows)
    }

    async fn upsert_schedule_config(&self, config: ScheduleConfig) -> StoreResult<ScheduleConfig> {
        self.check()?;
        self.schedule.insert(config.day_of_week, config.clone());
        Ok(config)
    }

    async fn get_blackout(&self, date: NaiveDate) -> StoreResult<Option<ScheduleBlackout>> {
        self.check()?;
        Ok(self.blackouts.get(&date).map(|e| e.value().clone()))
    }

    async fn list_blackouts(&self, from: NaiveDate, to: NaiveDate) -> StoreResult<Vec<ScheduleBlackout>> {
        self.check()?;
        let mut rows: Vec<ScheduleBlackout> = self
            .blackouts
            .iter()
            .filter(|e| *e.key() >= from && *e.key() <= to)
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by_key(|b| b.date);
        Ok(rows)
    }

    async fn add_blackout(&self, date: NaiveDate, reason: Option<String>) -> StoreResult<ScheduleBlackout> {
        self.check()?;
        let mut blackout = self.blackouts.entry(date).or_insert_with(|| ScheduleBlackout {
            id: self.next_id(),
            date,
            reason: None,
        });
        blackout.reason = reason;
        Ok(blackout.value().clone())
    }

    async fn remove_blackout(&self, date: NaiveDate) -> StoreResult<bool> {
        self.check()?;
        Ok(self.blackouts.remove(&date).is_some())
    }
}

#[async_trait]
impl CartRepository for InMemoryStore {
    async fn find_session_by_user(&self, user_id: Id) -> StoreResult<Option<CartSession>> {
        self.check()?;
        Ok(self
            .sessions
            .iter()
            .find(|e| e.value().owner == CartOwner::User(user_id))
            .map(|e| e.value().clone()))
    }

    async fn find_session_by_token(&self, token: &str) -> StoreResult<Option<CartSession>> {
        self.check()?;
        Ok(self
            .sessions
            .iter()
            .find(|e| e.value().session_token() == Some(token))
            .map(|e| e.value().clone()))
    }

    async fn create_session(&self, owner: CartOwner, expires_at: NaiveDateTime) -> StoreResult<CartSession> {
        self.check()?;
        let session = CartSession {
            id: self.next_id(),
            owner,
            expires_at,
            created_at: chrono::Local::now().naive_local(),
        };
        self.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn delete_session(&self, session_id: Id) -> StoreResult<()> {
        self.check()?;
        self.cart_items.retain(|_, item| item.session_id != session_id);
        self.sessions.remove(&session_id);
        Ok(())
    }

    async fn list_items(&self, session_id: Id) -> StoreResult<Vec<CartItem>> {
        self.check()?;
        let rows: Vec<CartItem> = self
            .cart_items
            .iter()
            .filter(|e| e.value().session_id == session_id)
            .map(|e| e.value().clone())
            .collect();
        Ok(sorted_by_id(rows, |i| i.id))
    }

    async fn get_item(&self, item_id: Id) -> StoreResult<Option<CartItem>> {
        self.check()?;
        Ok(self.cart_items.get(&item_id).map(|e| e.value().clone()))
    }

    async fn add_item(
        &self,
        session_id: Id,
        service_id: Id,
        vehicle_id: Option<Id>,
        quantity: u32,
        unit_price: Money,
        options: Vec<CartItemOption>,
    ) -> StoreResult<CartItem> {
        self.check()?;
        if !self.sessions.contains_key(&session_id) {
            return Err(StoreError::Constraint(format!("cart session {session_id} missing")));
        }
        let item = CartItem {
            id: self.next_id(),
            session_id,
            service_id,
            vehicle_id,
            quantity,
            unit_price,
            options,
        };
        self.cart_items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn update_item_quantity(&self, item_id: Id, quantity: u32) -> StoreResult<()> {
        self.check()?;
        match self.cart_items.get_mut(&item_id) {
            Some(mut item) => {
                item.quantity = quantity;
                Ok(())
            }
            None => Err(StoreError::Constraint(format!("cart item {item_id} missing"))),
        }
    }

    async fn delete_item(&self, item_id: Id) -> StoreResult<()> {
        self.check()?;
        self.cart_items.remove(&item_id);
        Ok(())
    }

    async fn clear_items(&self, session_id: Id) -> StoreResult<()> {
        self.check()?;
        self.cart_items.retain(|_, item| item.session_id != session_id);
        Ok(())
    }

    async fn delete_expired_sessions(&self, now: NaiveDateTime) -> StoreResult<usize> {
        self.check()?;
        let expired: Vec<Id> = self
            .sessions
            .iter()
            .filter(|e| e.value().is_expired(now))
            .map(|e| *e.key())
            .collect();
        for id in &expired {
            self.cart_items.retain(|_, item| item.session_id != *id);
            self.sessions.remove(id);
        }
        Ok(expired.len())
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn insert_booking(
        &self,
        booking: NewBooking,
        lines: Vec<NewBookingLine>,
        now: NaiveDateTime,
    ) -> StoreResult<Booking> {
        self.check()?;
        let row = Booking {
            id: self.next_id(),
            customer_id: booking.customer_id,
            customer_user_id: booking.customer_user_id,
            vehicle_id: booking.vehicle_id,
            scheduled_date: booking.scheduled_date,
            scheduled_time: booking.scheduled_time,
            estimated_duration_minutes: booking.estimated_duration_minutes,
            status: BookingStatus::PendingPayment,
            payment_status: PaymentStatus::Pending,
            subtotal: booking.subtotal,
            deposit_amount: booking.deposit_amount,
            total_amount: booking.total_amount,
            notes: booking.notes,
            created_at: now,
            updated_at: now,
        };
        let services = lines
            .into_iter()
            .map(|line| BookingService {
                id: self.next_id(),
                booking_id: row.id,
                service_id: line.service_id,
                price_at_booking: line.price_at_booking,
                options: line.options,
            })
            .collect();
        self.booking_services.insert(row.id, services);
        self.bookings.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_booking(&self, id: Id) -> StoreResult<Option<Booking>> {
        self.check()?;
        Ok(self.bookings.get(&id).map(|e| e.value().clone()))
    }

    async fn list_booking_services(&self, booking_id: Id) -> StoreResult<Vec<BookingService>> {
        self.check()?;
        Ok(self
            .booking_services
            .get(&booking_id)
            .map(|e| e.value().clone())
            .unwrap_or_default())
    }

    async fn list_active_bookings_on(&self, date: NaiveDate) -> StoreResult<Vec<Booking>> {
        self.check()?;
        let mut rows: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|e| e.value().scheduled_date == date && e.value().status != BookingStatus::Cancelled)
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by_key(|b| (b.scheduled_time, b.id));
        Ok(rows)
    }

    async fn list_bookings_by_customer(&self, customer_user_id: Id) -> StoreResult<Vec<Booking>> {
        self.check()?;
        let mut rows: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|e| e.value().customer_user_id == customer_user_id)
            .map(|e| e.value().clone())
            .collect();
        // Newest appointment first.
        rows.sort_by(|a, b| b.scheduled_at().cmp(&a.scheduled_at()).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn list_bookings_between(&self, from: NaiveDate, to: NaiveDate) -> StoreResult<Vec<Booking>> {
        self.check()?;
        let mut rows: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|e| e.value().scheduled_date >= from && e.value().scheduled_date <= to)
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by_key(|b| (b.scheduled_at(), b.id));
        Ok(rows)
    }

    async fn update_status(&self, id: Id, status: BookingStatus, now: NaiveDateTime) -> StoreResult<Booking> {
        self.check()?;
        let mut row = self
            .bookings
            .get_mut(&id)
            .ok_or_else(|| StoreError::Constraint(format!("booking {id} missing")))?;
        row.status = status;
        row.updated_at = now;
        Ok(row.value().clone())
    }

    async fn update_payment_status(
        &self,
        id: Id,
        payment_status: PaymentStatus,
        now: NaiveDateTime,
    ) -> StoreResult<Booking> {
        self.check()?;
        let mut row = self
            .bookings
            .get_mut(&id)
            .ok_or_else(|| StoreError::Constraint(format!("booking {id} missing")))?;
        row.payment_status = payment_status;
        row.updated_at = now;
        Ok(row.value().clone())
    }

    async fn update_status_and_payment(
        &self,
        id: Id,
        status: BookingStatus,
        payment_status: PaymentStatus,
        now: NaiveDateTime,
    ) -> StoreResult<Booking> {
        self.check()?;
        let mut row = self
            .bookings
            .get_mut(&id)
            .ok_or_else(|| StoreError::Constraint(format!("booking {id} missing")))?;
        row.status = status;
        row.payment_status = payment_status;
        row.updated_at = now;
        Ok(row.value().clone())
    }
}

#[async_trait]
impl HistoryRepository for InMemoryStore {
    async fn create_service_record(
        &self,
        record: NewServiceRecord,
        now: NaiveDateTime,
    ) -> StoreResult<ServiceRecord> {
        self.check()?;
        if self.records.iter().any(|e| e.value().booking_id == record.booking_id) {
            return Err(StoreError::Constraint(format!(
                "booking {} already has a service record",
                record.booking_id
            )));
        }
        let row = ServiceRecord {
            id: self.next_id(),
            booking_id: record.booking_id,
            customer_id: record.customer_id,
            vehicle_id: record.vehicle_id,
            summary: record.summary,
            performed_at: now,
        };
        self.records.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_service_record(&self, id: Id) -> StoreResult<Option<ServiceRecord>> {
        self.check()?;
        Ok(self.records.get(&id).map(|e| e.value().clone()))
    }

    async fn get_service_record_by_booking(&self, booking_id: Id) -> StoreResult<Option<ServiceRecord>> {
        self.check()?;
        Ok(self
            .records
            .iter()
            .find(|e| e.value().booking_id == booking_id)
            .map(|e| e.value().clone()))
    }

    async fn list_service_records_by_customer(&self, customer_id: Id) -> StoreResult<Vec<ServiceRecord>> {
        self.check()?;
        let mut rows: Vec<ServiceRecord> = self
            .records
            .iter()
            .filter(|e| e.value().customer_id == customer_id)
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by(|a, b| b.performed_at.cmp(&a.performed_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn add_note(
        &self,
        record_id: Id,
        note_type: NoteType,
        body: String,
        is_visible_to_customer: bool,
        now: NaiveDateTime,
    ) -> StoreResult<ServiceNote> {
        self.check()?;
        let note = ServiceNote {
            id: self.next_id(),
            record_id,
            note_type,
            body,
            is_visible_to_customer,
            created_at: now,
        };
        self.notes.insert(note.id, note.clone());
        Ok(note)
    }

    async fn list_notes(&self, record_id: Id) -> StoreResult<Vec<ServiceNote>> {
        self.check()?;
        let rows: Vec<ServiceNote> = self
            .notes
            .iter()
            .filter(|e| e.value().record_id == record_id)
            .map(|e| e.value().clone())
            .collect();
        Ok(sorted_by_id(rows, |n| n.id))
    }

    async fn add_product_used(
        &self,
        record_id: Id,
        product_name: String,
        quantity: Option<String>,
    ) -> StoreResult<ServiceProductUsed> {
        self.check()?;
        let row = ServiceProductUsed {
            id: self.next_id(),
            record_id,
            product_name,
            quantity,
        };
        self.products.insert(row.id, row.clone());
        Ok(row)
    }

    async fn list_products_used(&self, record_id: Id) -> StoreResult<Vec<ServiceProductUsed>> {
        self.check()?;
        let rows: Vec<ServiceProductUsed> = self
            .products
            .iter()
            .filter(|e| e.value().record_id == record_id)
            .map(|e| e.value().clone())
            .collect();
        Ok(sorted_by_id(rows, |p| p.id))
    }

    async fn add_photo(&self, record_id: Id, url: String, caption: Option<String>) -> StoreResult<ServicePhoto> {
        self.check()?;
        let row = ServicePhoto {
            id: self.next_id(),
            record_id,
            url,
            caption,
        };
        self.photos.insert(row.id, row.clone());
        Ok(row)
    }

    async fn list_photos(&self, record_id: Id) -> StoreResult<Vec<ServicePhoto>> {
        self.check()?;
        let rows: Vec<ServicePhoto> = self
            .photos
            .iter()
            .filter(|e| e.value().record_id == record_id)
            .map(|e| e.value().clone())
            .collect();
        Ok(sorted_by_id(rows, |p| p.id))
    }
}
