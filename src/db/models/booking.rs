//! Booking models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Booking lifecycle. Stored as uppercase TEXT; CANCELLED rows are excluded
/// from slot-conflict checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BookingStatus {
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "CONFIRMED" => Some(BookingStatus::Confirmed),
            "COMPLETED" => Some(BookingStatus::Completed),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: String,
    pub student_id: String,
    /// The tutor's user id, not their tutor_profiles id.
    pub tutor_id: String,
    /// Naive calendar date, "YYYY-MM-DD".
    pub session_date: String,
    /// Minute-granularity start time, "HH:MM". No timezone.
    pub session_time: String,
    pub duration_minutes: i64,
    pub subject: String,
    pub price: f64,
    pub status: String,
    pub notes: Option<String>,
    pub meeting_link: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Booking {
    pub fn status(&self) -> Option<BookingStatus> {
        BookingStatus::from_str(&self.status)
    }
}

// DTOs for API

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    /// Tutor profile id (resolved to the tutor's user id on creation).
    pub tutor_id: String,
    pub session_date: String,
    pub session_time: String,
    pub duration_minutes: i64,
    pub subject: String,
    pub price: f64,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookingStatusRequest {
    pub status: String,
}

/// Admin listing filters. All optional; page/limit default to 1/10.
#[derive(Debug, Default, Deserialize)]
pub struct BookingListQuery {
    pub status: Option<String>,
    pub tutor_id: Option<String>,
    pub student_id: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_status_roundtrip() {
        for status in [
            BookingStatus::Confirmed,
            BookingStatus::Completed,
            BookingStatus::Cancelled,
        ] {
            assert_eq!(BookingStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::from_str("confirmed"), None);
        assert_eq!(BookingStatus::from_str("PENDING"), None);
    }
}
