use chrono::{Datelike, NaiveDate};

use crate::model::*;

use super::conflict::conflicts_with;

/// Sunday = 0 through Saturday = 6, matching `ScheduleConfig::day_of_week`.
pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

// ── Slot Algorithm ────────────────────────────────────────────────

/// Occupied intervals for a day's bookings, each extended by `buffer` on the
/// tail, sorted by start.
pub fn occupied_spans(bookings: &[Booking], buffer: Minutes) -> Vec<Span> {
    let mut spans: Vec<Span> = bookings
        .iter()
        .filter_map(|b| b.occupied_span(buffer))
        .collect();
    spans.sort_by_key(|s| s.start);
    spans
}

/// Enumerate bookable start times on an open day.
///
/// Candidates step by `stride` from opening time while the requested duration
/// still fits before close. A candidate survives if it conflicts with no
/// occupied span (see [`conflicts_with`]). Output is in ascending time order.
pub fn compute_slots(
    date: NaiveDate,
    config: &ScheduleConfig,
    bookings: &[Booking],
    duration: Minutes,
    stride: Minutes,
) -> Vec<Slot> {
    if !config.is_open || stride <= 0 || duration <= 0 {
        return Vec::new();
    }
    let open = minutes_of(config.open_time);
    let close = minutes_of(config.close_time);
    let buffer = config.buffer_minutes;
    let occupied = occupied_spans(bookings, buffer);

    let mut slots = Vec::new();
    let mut start = open;
    while start + duration <= close {
        let candidate = Span::new(start, start + duration);
        // Occupied spans are sorted; anything starting past the candidate's
        // buffered tail cannot conflict.
        let blocked = occupied
            .iter()
            .take_while(|o| o.start < candidate.end + buffer)
            .any(|o| conflicts_with(&candidate, o, buffer));
        if !blocked && let Some(start_time) = time_of(start) {
            slots.push(Slot {
                date,
                start_time,
                available_minutes_until_close: close - start,
            });
        }
        start += stride;
    }
    slots
}
