//! # Age Derivation
//!
//! A child's age is derived from their date of birth relative to a caller-
//! supplied "today". It feeds app-catalog filtering only; the date of birth
//! remains the stored source of truth.

use chrono::{Datelike, NaiveDate};

use crate::error::ValidationError;

/// Whole years between `dob` and `today`.
///
/// One year is subtracted when this year's birthday (by month and day) has
/// not happened yet. A child born on 29 February has their birthday on
/// 1 March in non-leap years.
///
/// # Errors
///
/// Returns [`ValidationError::DateOfBirthInFuture`] when `dob > today`.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> Result<u32, ValidationError> {
    if dob > today {
        return Err(ValidationError::DateOfBirthInFuture { dob, today });
    }
    let mut years = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        years -= 1;
    }
    // dob <= today, so years is never negative here.
    Ok(years.max(0) as u32)
}

/// Parse a `YYYY-MM-DD` date of birth.
///
/// # Errors
///
/// Returns [`ValidationError::MissingDateOfBirth`] for blank input and
/// [`ValidationError::InvalidDateOfBirth`] for anything unparseable.
pub fn parse_dob(raw: &str) -> Result<NaiveDate, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::MissingDateOfBirth);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDateOfBirth(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn day_before_birthday_is_one_year_younger() {
        assert_eq!(age_on(date(2015, 6, 15), date(2024, 6, 14)).unwrap(), 8);
    }

    #[test]
    fn birthday_and_later_in_year_counts_full_year() {
        assert_eq!(age_on(date(2015, 6, 15), date(2024, 6, 15)).unwrap(), 9);
        assert_eq!(age_on(date(2015, 6, 15), date(2024, 12, 31)).unwrap(), 9);
    }

    #[test]
    fn earlier_month_same_year_is_not_birthday_yet() {
        assert_eq!(age_on(date(2015, 6, 15), date(2024, 5, 30)).unwrap(), 8);
    }

    #[test]
    fn born_today_is_zero() {
        assert_eq!(age_on(date(2024, 3, 1), date(2024, 3, 1)).unwrap(), 0);
    }

    #[test]
    fn leap_day_birthday_in_non_leap_year() {
        assert_eq!(age_on(date(2016, 2, 29), date(2023, 2, 28)).unwrap(), 6);
        assert_eq!(age_on(date(2016, 2, 29), date(2023, 3, 1)).unwrap(), 7);
    }

    #[test]
    fn future_dob_is_rejected() {
        let err = age_on(date(2030, 1, 1), date(2024, 1, 1)).unwrap_err();
        assert!(matches!(err, ValidationError::DateOfBirthInFuture { .. }));
    }

    #[test]
    fn parse_dob_accepts_iso_dates() {
        assert_eq!(parse_dob("2015-06-15").unwrap(), date(2015, 6, 15));
        assert_eq!(parse_dob(" 2015-06-15 ").unwrap(), date(2015, 6, 15));
    }

    #[test]
    fn parse_dob_rejects_blank_and_garbage() {
        assert_eq!(parse_dob(""), Err(ValidationError::MissingDateOfBirth));
        assert_eq!(
            parse_dob("15/06/2015"),
            Err(ValidationError::InvalidDateOfBirth("15/06/2015".into()))
        );
    }

    proptest! {
        /// Age never decreases as "today" moves forward.
        #[test]
        fn age_is_monotonic_in_today(offset_a in 0i64..20_000, extra in 0i64..2_000) {
            let dob = date(2000, 1, 1);
            let a = dob + chrono::Duration::days(offset_a);
            let b = a + chrono::Duration::days(extra);
            prop_assert!(age_on(dob, a).unwrap() <= age_on(dob, b).unwrap());
        }

        /// Age is always within one of the naive year difference.
        #[test]
        fn age_is_year_difference_or_one_less(days in 0i64..30_000) {
            let dob = date(1990, 7, 20);
            let today = dob + chrono::Duration::days(days);
            let naive = (today.year() - dob.year()) as u32;
            let age = age_on(dob, today).unwrap();
            prop_assert!(age == naive || age + 1 == naive);
        }
    }
}
