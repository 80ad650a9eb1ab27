//! Time helpers for governd
//!
//! Wall-clock time is used for start-attempt stamps and crash-file names;
//! stop-timeout enforcement uses `std::time::Instant` directly at the call
//! site so it is immune to wall-clock changes.

use chrono::{DateTime, Timelike, Utc};

/// Get the current UTC time.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp for crash-file names: `yyyyMMdd-HHmmssff`, where
/// `ff` is hundredths of a second. The format is fixed; crash files sort
/// lexicographically by time.
pub fn crash_stamp(at: &DateTime<Utc>) -> String {
    let centis = at.nanosecond() / 10_000_000;
    format!("{}{:02}", at.format("%Y%m%d-%H%M%S"), centis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn crash_stamp_is_reproducible() {
        let at = Utc
            .with_ymd_and_hms(2024, 3, 7, 14, 5, 9)
            .unwrap()
            .with_nanosecond(420_000_000)
            .unwrap();
        assert_eq!(crash_stamp(&at), "20240307-14050942");
    }

    #[test]
    fn crash_stamp_pads_centiseconds() {
        let at = Utc
            .with_ymd_and_hms(2024, 12, 31, 23, 59, 59)
            .unwrap()
            .with_nanosecond(10_000_000)
            .unwrap();
        assert_eq!(crash_stamp(&at), "20241231-23595901");
    }

    #[test]
    fn crash_stamps_sort_by_time() {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 6).unwrap();
        assert!(crash_stamp(&earlier) < crash_stamp(&later));
    }
}
