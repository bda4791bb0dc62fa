//! Request field validators shared by the API handlers.

use chrono::NaiveDate;

use crate::schedule::parse_minutes;

/// Validate and parse a "YYYY-MM-DD" calendar date
pub fn validate_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| "Session date must be formatted as YYYY-MM-DD".to_string())
}

/// Validate and parse an "HH:MM" time of day into minutes since midnight
pub fn validate_time(value: &str) -> Result<u16, String> {
    parse_minutes(value).ok_or_else(|| "Session time must be formatted as HH:MM".to_string())
}

/// Validate a review rating (integer 1-5)
pub fn validate_rating(rating: i64) -> Result<(), String> {
    if !(1..=5).contains(&rating) {
        return Err("Rating must be an integer between 1 and 5".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_date() {
        assert_eq!(
            validate_date("2025-06-02").unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
        );
        assert!(validate_date("06/02/2025").is_err());
        assert!(validate_date("2025-13-01").is_err());
    }

    #[test]
    fn test_validate_time() {
        assert_eq!(validate_time("09:00").unwrap(), 540);
        assert!(validate_time("9am").is_err());
        assert!(validate_time("25:00").is_err());
    }

    #[test]
    fn test_validate_rating() {
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
    }
}
