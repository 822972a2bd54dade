//! Repository boundary. Every lookup returns `Ok(None)` for a missing row;
//! errors are reserved for the backend itself failing.

mod memory;

pub use memory::InMemoryStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("constraint violated: {0}")]
    Constraint(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn get_service(&self, id: Id) -> StoreResult<Option<Service>>;
    async fn get_service_option(&self, id: Id) -> StoreResult<Option<ServiceOption>>;
    async fn get_price_tier(
        &self,
        service_id: Id,
        vehicle_category_id: Id,
    ) -> StoreResult<Option<PriceTier>>;
    async fn get_vehicle(&self, id: Id) -> StoreResult<Option<Vehicle>>;
    async fn get_customer_profile_by_user(&self, user_id: Id) -> StoreResult<Option<CustomerProfile>>;
}

#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn get_schedule_config(&self, day_of_week: u8) -> StoreResult<Option<ScheduleConfig>>;
    async fn list_schedule_configs(&self) -> StoreResult<Vec<ScheduleConfig>>;
    async fn upsert_schedule_config(&self, config: ScheduleConfig) -> StoreResult<ScheduleConfig>;
    async fn get_blackout(&self, date: NaiveDate) -> StoreResult<Option<ScheduleBlackout>>;
    async fn list_blackouts(&self, from: NaiveDate, to: NaiveDate) -> StoreResult<Vec<ScheduleBlackout>>;
    async fn add_blackout(&self, date: NaiveDate, reason: Option<String>) -> StoreResult<ScheduleBlackout>;
    /// Returns whether a row was removed.
    async fn remove_blackout(&self, date: NaiveDate) -> StoreResult<bool>;
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn find_session_by_user(&self, user_id: Id) -> StoreResult<Option<CartSession>>;
    async fn find_session_by_token(&self, token: &str) -> StoreResult<Option<CartSession>>;
    async fn create_session(&self, owner: CartOwner, expires_at: NaiveDateTime) -> StoreResult<CartSession>;
    async fn delete_session(&self, session_id: Id) -> StoreResult<()>;
    /// Items ordered by insertion.
    async fn list_items(&self, session_id: Id) -> StoreResult<Vec<CartItem>>;
    async fn get_item(&self, item_id: Id) -> StoreResult<Option<CartItem>>;
    async fn add_item(
        &self,
        session_id: Id,
        service_id: Id,
        vehicle_id: Option<Id>,
        quantity: u32,
        unit_price: Money,
        options: Vec<CartItemOption>,
    ) -> StoreResult<CartItem>;
    async fn update_item_quantity(&self, item_id: Id, quantity: u32) -> StoreResult<()>;
    async fn delete_item(&self, item_id: Id) -> StoreResult<()>;
    async fn clear_items(&self, session_id: Id) -> StoreResult<()>;
    /// Removes expired sessions and their items; returns how many sessions went.
    async fn delete_expired_sessions(&self, now: NaiveDateTime) -> StoreResult<usize>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Writes the booking and every line row as one unit; nothing is stored on error.
    async fn insert_booking(
        &self,
        booking: NewBooking,
        lines: Vec<NewBookingLine>,
        now: NaiveDateTime,
    ) -> StoreResult<Booking>;
    async fn get_booking(&self, id: Id) -> StoreResult<Option<Booking>>;
    async fn list_booking_services(&self, booking_id: Id) -> StoreResult<Vec<BookingService>>;
    /// All bookings on `date` that still hold their slot (not cancelled).
    async fn list_active_bookings_on(&self, date: NaiveDate) -> StoreResult<Vec<Booking>>;
    async fn list_bookings_by_customer(&self, customer_user_id: Id) -> StoreResult<Vec<Booking>>;
    async fn list_bookings_between(&self, from: NaiveDate, to: NaiveDate) -> StoreResult<Vec<Booking>>;
    async fn update_status(&self, id: Id, status: BookingStatus, now: NaiveDateTime) -> StoreResult<Booking>;
    async fn update_payment_status(
        &self,
        id: Id,
        payment_status: PaymentStatus,
        now: NaiveDateTime,
    ) -> StoreResult<Booking>;
    /// Sets both statuses in one write; neither changes on error.
    async fn update_status_and_payment(
        &self,
        id: Id,
        status: BookingStatus,
        payment_status: PaymentStatus,
        now: NaiveDateTime,
    ) -> StoreResult<Booking>;
}

#[async_trait]
pub trait HistoryRepository: Send + Sync {
    async fn create_service_record(
        &self,
        record: NewServiceRecord,
        now: NaiveDateTime,
    ) -> StoreResult<ServiceRecord>;
    async fn get_service_record(&self, id: Id) -> StoreResult<Option<ServiceRecord>>;
    async fn get_service_record_by_booking(&self, booking_id: Id) -> StoreResult<Option<ServiceRecord>>;
    async fn list_service_records_by_customer(&self, customer_id: Id) -> StoreResult<Vec<ServiceRecord>>;
    async fn add_note(
        &self,
        record_id: Id,
        note_type: NoteType,
        body: String,
        is_visible_to_customer: bool,
        now: NaiveDateTime,
    ) -> StoreResult<ServiceNote>;
    async fn list_notes(&self, record_id: Id) -> StoreResult<Vec<ServiceNote>>;
    async fn add_product_used(
        &self,
        record_id: Id,
        product_name: String,
        quantity: Option<String>,
    ) -> StoreResult<ServiceProductUsed>;
    async fn list_products_used(&self, record_id: Id) -> StoreResult<Vec<ServiceProductUsed>>;
    async fn add_photo(&self, record_id: Id, url: String, caption: Option<String>) -> StoreResult<ServicePhoto>;
    async fn list_photos(&self, record_id: Id) -> StoreResult<Vec<ServicePhoto>>;
}

/// The repositories the engine talks to, one per concern.
#[derive(Clone)]
pub struct Repositories {
    pub catalog: Arc<dyn CatalogRepository>,
    pub schedule: Arc<dyn ScheduleRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub history: Arc<dyn HistoryRepository>,
}

impl Repositories {
    /// Point every repository at the same in-memory store.
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            catalog: store.clone(),
            schedule: store.clone(),
            carts: store.clone(),
            bookings: store.clone(),
            history: store,
        }
    }
}
