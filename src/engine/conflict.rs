use chrono::{NaiveDate, NaiveTime};

use crate::model::*;

use super::EngineError;

pub fn parse_date(raw: &str) -> Result<NaiveDate, EngineError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| EngineError::invalid("scheduled date must be YYYY-MM-DD").with_detail("date", raw).with_source(e))
}

/// Accepts `HH:MM` or `HH:MM:SS`.
pub fn parse_time(raw: &str) -> Result<NaiveTime, EngineError> {
    let raw_trimmed = raw.trim();
    NaiveTime::parse_from_str(raw_trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw_trimmed, "%H:%M:%S"))
        .map_err(|e| EngineError::invalid("scheduled time must be HH:MM").with_detail("time", raw).with_source(e))
}

/// A candidate `[start, end)` conflicts with an occupied span when it starts
/// before the span ends and its own end plus `buffer` reaches past the span's
/// start. Occupied spans already carry their buffer on the tail, so the two
/// together keep `buffer` minutes between any pair of bookings.
pub fn conflicts_with(candidate: &Span, occupied: &Span, buffer: Minutes) -> bool {
    candidate.start < occupied.end && candidate.end + buffer > occupied.start
}

/// Reject a new booking at `start` for `duration` if it collides with any of `existing`.
pub(crate) fn check_no_conflict(
    existing: &[Booking],
    start: Minutes,
    duration: Minutes,
    buffer: Minutes,
) -> Result<(), EngineError> {
    let candidate = Span {
        start,
        end: start + duration.max(0),
    };
    for booking in existing {
        let Some(occupied) = booking.occupied_span(buffer) else {
            continue;
        };
        if conflicts_with(&candidate, &occupied, buffer) {
            return Err(EngineError::invalid("requested time is no longer available")
                .with_detail("conflicting_booking_id", booking.id));
        }
    }
    Ok(())
}

pub(crate) fn check_len(field: &'static str, value: &str, max: usize) -> Result<(), EngineError> {
    if value.len() > max {
        return Err(EngineError::invalid(format!("{field} too long")).with_detail("max_len", max));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_rule_applies_buffer_to_new_tail() {
        // Existing 09:00 for 90 minutes with 30 buffer occupies [540, 720).
        let occupied = Span::new(540, 720);
        assert!(conflicts_with(&Span::new(510, 570), &occupied, 30));
        // Ends at 08:00 + 30 buffer = 08:30 < 09:00.
        assert!(!conflicts_with(&Span::new(420, 480), &occupied, 30));
        // Ends exactly 30 before: touching is fine.
        assert!(!conflicts_with(&Span::new(450, 510), &occupied, 30));
        // Starts when the occupied span (with buffer) ends.
        assert!(!conflicts_with(&Span::new(720, 780), &occupied, 30));
        assert!(conflicts_with(&Span::new(690, 750), &occupied, 30));
    }

    #[test]
    fn parse_accepts_both_time_shapes() {
        assert_eq!(parse_time("07:30").unwrap(), NaiveTime::from_hms_opt(7, 30, 0).unwrap());
        assert_eq!(parse_time("07:30:00").unwrap(), NaiveTime::from_hms_opt(7, 30, 0).unwrap());
        assert!(parse_time("7.30am").is_err());
    }

    #[test]
    fn parse_date_rejects_garbage() {
        let err = parse_date("03/02/2026").unwrap_err();
        assert_eq!(err.kind(), super::super::ErrorKind::InvalidRequest);
        assert_eq!(err.detail("date"), Some("03/02/2026"));
        assert!(parse_date("2026-03-02").is_ok());
    }

    #[test]
    fn length_check() {
        assert!(check_len("notes", "abc", 3).is_ok());
        assert!(check_len("notes", "abcd", 3).is_err());
    }
}
