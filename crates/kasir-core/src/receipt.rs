//! # Receipt Numbers
//!
//! Human-readable receipt numbers with a per-terminal daily counter.
//!
//! ## Format
//! ```text
//! 20261019-K1-0007
//! ───┬──── ─┬ ──┬─
//!    │      │   └── sequence, restarts at 0001 every day
//!    │      └────── terminal code (last 2 chars, "00" if too short)
//!    └───────────── local date of the sale
//! ```

use chrono::{DateTime, NaiveDate, Utc};

/// Daily receipt sequence of one terminal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiptCounter {
    day: Option<NaiveDate>,
    last: u32,
}

impl ReceiptCounter {
    pub fn new() -> Self {
        ReceiptCounter::default()
    }

    /// Resumes from the last number issued on `day` (loaded from storage).
    pub fn resume(day: NaiveDate, last: u32) -> Self {
        ReceiptCounter {
            day: Some(day),
            last,
        }
    }

    /// Issues the next receipt number for `now`.
    pub fn next(&mut self, terminal_code: &str, now: DateTime<Utc>) -> String {
        let today = now.date_naive();
        if self.day != Some(today) {
            self.day = Some(today);
            self.last = 0;
        }
        self.last += 1;
        format!(
            "{}-{}-{:04}",
            today.format("%Y%m%d"),
            normalize_code(terminal_code),
            self.last
        )
    }

    /// Number of receipts issued on the current day.
    pub fn issued_today(&self) -> u32 {
        self.last
    }
}

/// Sequence part of a receipt number issued on `day`, if it is one.
pub fn parse_sequence(receipt_number: &str, day: NaiveDate) -> Option<u32> {
    let mut parts = receipt_number.splitn(3, '-');
    let date = parts.next()?;
    let _code = parts.next()?;
    let seq = parts.next()?;
    if date != day.format("%Y%m%d").to_string() {
        return None;
    }
    seq.parse().ok()
}

fn normalize_code(code: &str) -> String {
    let tail: Vec<char> = code.trim().chars().rev().take(2).collect();
    if tail.len() < 2 {
        return "00".to_string();
    }
    tail.into_iter().rev().collect::<String>().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_daily_sequence() {
        let mut counter = ReceiptCounter::new();
        let morning = Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2026, 10, 19, 20, 0, 0).unwrap();
        let next_day = Utc.with_ymd_and_hms(2026, 10, 20, 8, 0, 0).unwrap();

        assert_eq!(counter.next("k1", morning), "20261019-K1-0001");
        assert_eq!(counter.next("k1", evening), "20261019-K1-0002");
        assert_eq!(counter.next("k1", next_day), "20261020-K1-0001");
    }

    #[test]
    fn test_short_code_padded() {
        let mut counter = ReceiptCounter::new();
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 9, 0, 0).unwrap();
        assert_eq!(counter.next("", now), "20260102-00-0001");
        assert_eq!(counter.next("kasir-07", now), "20260102-07-0002");
    }

    #[test]
    fn test_resume_and_parse() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(parse_sequence("20261019-K1-0042", day), Some(42));
        assert_eq!(parse_sequence("20261018-K1-0042", day), None);

        let mut counter = ReceiptCounter::resume(day, 42);
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        assert_eq!(counter.next("K1", now), "20261019-K1-0043");
    }
}
