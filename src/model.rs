use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Minutes since midnight, or a duration in minutes.
pub type Minutes = i64;

/// Integer minor-currency units (cents).
pub type Money = i64;

pub type Id = i64;

/// Half-open interval `[start, end)` in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Minutes,
    pub end: Minutes,
}

impl Span {
    pub fn new(start: Minutes, end: Minutes) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration(&self) -> Minutes {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

pub fn minutes_of(time: NaiveTime) -> Minutes {
    (time.hour() * 60 + time.minute()) as Minutes
}

/// Inverse of [`minutes_of`]. Values outside a day wrap to `None`.
pub fn time_of(minutes: Minutes) -> Option<NaiveTime> {
    if !(0..24 * 60).contains(&minutes) {
        return None;
    }
    NaiveTime::from_hms_opt((minutes / 60) as u32, (minutes % 60) as u32, 0)
}

// ── Schedule ─────────────────────────────────────────────────────

/// Weekly opening hours for one day. `day_of_week` counts from Sunday = 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub day_of_week: u8,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub is_open: bool,
    pub buffer_minutes: Minutes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleBlackout {
    pub id: Id,
    pub date: NaiveDate,
    pub reason: Option<String>,
}

/// A bookable start time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub available_minutes_until_close: Minutes,
}

// ── Catalogue ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: Id,
    pub name: String,
    pub base_price: Money,
    pub duration_minutes: Minutes,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceOption {
    pub id: Id,
    pub service_id: Id,
    pub name: String,
    pub base_price: Money,
    pub duration_minutes: Minutes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTier {
    pub service_id: Id,
    pub vehicle_category_id: Id,
    pub price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Id,
    pub customer_id: Id,
    pub category_id: Option<Id>,
    pub make: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub id: Id,
    pub user_id: Id,
    pub full_name: String,
}

// ── Cart ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartOwner {
    User(Id),
    Guest(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSession {
    pub id: Id,
    pub owner: CartOwner,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

impl CartSession {
    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        self.expires_at <= now
    }

    pub fn session_token(&self) -> Option<&str> {
        match &self.owner {
            CartOwner::Guest(token) => Some(token),
            CartOwner::User(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItemOption {
    pub option_id: Id,
    pub price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: Id,
    pub session_id: Id,
    pub service_id: Id,
    pub vehicle_id: Option<Id>,
    pub quantity: u32,
    /// Service price plus attached option prices, per unit.
    pub unit_price: Money,
    pub options: Vec<CartItemOption>,
}

impl CartItem {
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity as Money
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartResult {
    pub session: CartSession,
    pub items: Vec<CartItem>,
    pub subtotal: Money,
}

// ── Booking ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    PendingPayment,
    DepositPaid,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (PendingPayment, DepositPaid)
                | (PendingPayment, Completed)
                | (PendingPayment, Cancelled)
                | (DepositPaid, Completed)
                | (DepositPaid, Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::PendingPayment => "pending_payment",
            BookingStatus::DepositPaid => "deposit_paid",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    DepositPaid,
    FullyPaid,
}

impl PaymentStatus {
    /// Payment only moves forward.
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        next > self
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::DepositPaid => "deposit_paid",
            PaymentStatus::FullyPaid => "fully_paid",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Id,
    pub customer_id: Id,
    pub customer_user_id: Id,
    pub vehicle_id: Option<Id>,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub estimated_duration_minutes: Minutes,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub subtotal: Money,
    pub deposit_amount: Money,
    pub total_amount: Money,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Booking {
    pub fn scheduled_at(&self) -> NaiveDateTime {
        self.scheduled_date.and_time(self.scheduled_time)
    }

    /// Occupied interval on its date, including the trailing buffer.
    /// `None` for a zero-length booking with no buffer.
    pub fn occupied_span(&self, buffer: Minutes) -> Option<Span> {
        let start = minutes_of(self.scheduled_time);
        let end = start + self.estimated_duration_minutes + buffer;
        (end > start).then(|| Span::new(start, end))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBooking {
    pub customer_id: Id,
    pub customer_user_id: Id,
    pub vehicle_id: Option<Id>,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub estimated_duration_minutes: Minutes,
    pub subtotal: Money,
    pub deposit_amount: Money,
    pub total_amount: Money,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingServiceOption {
    pub option_id: Id,
    pub price_at_booking: Money,
}

/// One booked unit of a service. Quantity is expanded into one row per unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingService {
    pub id: Id,
    pub booking_id: Id,
    pub service_id: Id,
    pub price_at_booking: Money,
    pub options: Vec<BookingServiceOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBookingLine {
    pub service_id: Id,
    pub price_at_booking: Money,
    pub options: Vec<BookingServiceOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingDetail {
    pub booking: Booking,
    pub services: Vec<BookingService>,
}

/// Result of a customer cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOutcome {
    pub booking: Booking,
    pub advisory: Option<String>,
}

// ── Service history ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteType {
    Condition,
    Treatment,
    Recommendation,
    FollowUp,
}

impl std::str::FromStr for NoteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "condition" => Ok(NoteType::Condition),
            "treatment" => Ok(NoteType::Treatment),
            "recommendation" => Ok(NoteType::Recommendation),
            "follow_up" => Ok(NoteType::FollowUp),
            other => Err(format!("unknown note type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub id: Id,
    pub booking_id: Id,
    pub customer_id: Id,
    pub vehicle_id: Option<Id>,
    pub summary: Option<String>,
    pub performed_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewServiceRecord {
    pub booking_id: Id,
    pub customer_id: Id,
    pub vehicle_id: Option<Id>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceNote {
    pub id: Id,
    pub record_id: Id,
    pub note_type: NoteType,
    pub body: String,
    pub is_visible_to_customer: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceProductUsed {
    pub id: Id,
    pub record_id: Id,
    pub product_name: String,
    pub quantity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePhoto {
    pub id: Id,
    pub record_id: Id,
    pub url: String,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecordDetail {
    pub record: ServiceRecord,
    pub notes: Vec<ServiceNote>,
    pub products: Vec<ServiceProductUsed>,
    pub photos: Vec<ServicePhoto>,
}
