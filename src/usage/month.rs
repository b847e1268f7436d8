use std::fmt;

use chrono::{Datelike, Local};

/// Calendar month a provider's quota is counted against, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BillingMonth {
    year: i32,
    month: u32,
}

impl BillingMonth {
    #[cfg(test)]
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Month of the process's local wall clock.
    pub fn current() -> Self {
        Self::of(&Local::now())
    }

    pub fn of(date: &impl Datelike) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for BillingMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn renders_zero_padded() {
        assert_eq!(BillingMonth::new(2025, 3).unwrap().to_string(), "2025-03");
        assert_eq!(BillingMonth::new(2025, 12).unwrap().to_string(), "2025-12");
    }

    #[test]
    fn rejects_out_of_range_month() {
        assert!(BillingMonth::new(2025, 0).is_none());
        assert!(BillingMonth::new(2025, 13).is_none());
    }

    #[test]
    fn ignores_day_of_month() {
        let first = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let last = NaiveDate::from_ymd_opt(2026, 2, 28).unwrap();
        assert_eq!(BillingMonth::of(&first), BillingMonth::of(&last));
    }

    #[test]
    fn year_boundary_is_a_new_month() {
        let dec = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        let jan = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert_ne!(BillingMonth::of(&dec), BillingMonth::of(&jan));
    }
}
