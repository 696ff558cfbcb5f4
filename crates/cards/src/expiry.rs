//! Card expiry (month/year) value.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use cardissue_core::{DomainError, DomainResult};

/// Expiry month/year printed on a card.
///
/// A card is usable through the last day of its expiry month and lapses at
/// 00:00 UTC on the first day of the following month.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Expiry {
    month: u32,
    year: i32,
}

impl Expiry {
    pub fn new(month: u32, year: i32) -> DomainResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(DomainError::invalid_argument(format!(
                "expiry month must be 1-12, got {month}"
            )));
        }
        if !(2000..=9999).contains(&year) {
            return Err(DomainError::invalid_argument(format!(
                "expiry year out of range: {year}"
            )));
        }
        Ok(Self { month, year })
    }

    /// Same month as `now`, `years` years later.
    pub fn years_from(now: DateTime<Utc>, years: u32) -> DomainResult<Self> {
        let years = i32::try_from(years)
            .map_err(|_| DomainError::invalid_argument("validity years out of range"))?;
        Self::new(now.month(), now.year() + years)
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// First instant at which the card is no longer usable.
    pub fn lapses_at(&self) -> DateTime<Utc> {
        let (year, month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };

        NaiveDate::from_ymd_opt(year, month, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_passed(&self, now: DateTime<Utc>) -> bool {
        now >= self.lapses_at()
    }
}

impl core::fmt::Display for Expiry {
    /// "MM/YY"
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:02}/{:02}", self.month, self.year.rem_euclid(100))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_as_month_slash_two_digit_year() {
        assert_eq!(Expiry::new(3, 2029).unwrap().to_string(), "03/29");
        assert_eq!(Expiry::new(12, 2100).unwrap().to_string(), "12/00");
    }

    #[test]
    fn rejects_month_out_of_range() {
        assert!(matches!(Expiry::new(0, 2030), Err(DomainError::InvalidArgument(_))));
        assert!(matches!(Expiry::new(13, 2030), Err(DomainError::InvalidArgument(_))));
    }

    #[test]
    fn lapses_on_first_day_of_following_month() {
        let expiry = Expiry::new(12, 2027).unwrap();
        let last_moment = Utc.with_ymd_and_hms(2027, 12, 31, 23, 59, 59).unwrap();
        let lapse = Utc.with_ymd_and_hms(2028, 1, 1, 0, 0, 0).unwrap();

        assert_eq!(expiry.lapses_at(), lapse);
        assert!(!expiry.is_passed(last_moment));
        assert!(expiry.is_passed(lapse));
    }

    #[test]
    fn years_from_keeps_current_month() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let expiry = Expiry::years_from(now, 3).unwrap();
        assert_eq!((expiry.month(), expiry.year()), (10, 2029));
        assert!(!expiry.is_passed(now));
    }
}
