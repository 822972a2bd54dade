use std::str::FromStr;

use crate::model::Minutes;

/// Business rules injected into the engine at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Share of the total charged up front, in percent. Truncating division.
    pub deposit_percent: i64,
    /// Distance between candidate start times.
    pub slot_stride_minutes: Minutes,
    /// Bookings must start at least this far in the future.
    pub min_notice_hours: i64,
    /// Used when a slot query asks for a non-positive duration.
    pub default_duration_minutes: Minutes,
    /// Cancelling closer than this to the appointment warns about the deposit.
    pub cancellation_notice_hours: i64,
    pub cart_ttl_days: i64,
    pub currency: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            deposit_percent: 30,
            slot_stride_minutes: 30,
            min_notice_hours: 24,
            default_duration_minutes: 60,
            cancellation_notice_hours: 24,
            cart_ttl_days: 7,
            currency: "usd".into(),
        }
    }
}

/// Upper bound for notice windows, ten years in hours.
pub const MAX_NOTICE_HOURS: i64 = 10 * 366 * 24;
/// Upper bound for cart lifetime, ten years in days.
pub const MAX_CART_TTL_DAYS: i64 = 10 * 366;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl EngineConfig {
    /// Read `DETAILBOOK_*` variables, keeping the default for anything unset or unparsable.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            deposit_percent: env_or("DETAILBOOK_DEPOSIT_PERCENT", d.deposit_percent),
            slot_stride_minutes: env_or("DETAILBOOK_SLOT_STRIDE_MINUTES", d.slot_stride_minutes),
            min_notice_hours: env_or("DETAILBOOK_MIN_NOTICE_HOURS", d.min_notice_hours),
            default_duration_minutes: env_or("DETAILBOOK_DEFAULT_DURATION_MINUTES", d.default_duration_minutes),
            cancellation_notice_hours: env_or("DETAILBOOK_CANCELLATION_NOTICE_HOURS", d.cancellation_notice_hours),
            cart_ttl_days: env_or("DETAILBOOK_CART_TTL_DAYS", d.cart_ttl_days),
            currency: std::env::var("DETAILBOOK_CURRENCY").unwrap_or(d.currency),
        }
        .clamped()
    }

    /// Pull every numeric setting into the range the engine's date arithmetic accepts.
    pub fn clamped(self) -> Self {
        Self {
            deposit_percent: self.deposit_percent.clamp(0, 100),
            slot_stride_minutes: self.slot_stride_minutes.max(1),
            min_notice_hours: self.min_notice_hours.clamp(0, MAX_NOTICE_HOURS),
            default_duration_minutes: self.default_duration_minutes.max(1),
            cancellation_notice_hours: self.cancellation_notice_hours.clamp(0, MAX_NOTICE_HOURS),
            cart_ttl_days: self.cart_ttl_days.clamp(1, MAX_CART_TTL_DAYS),
            currency: self.currency,
        }
    }

    pub fn deposit_for(&self, total: i64) -> i64 {
        total * self.deposit_percent / 100
    }
}
