//! Tutor profile models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::schedule::WeeklyAvailability;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TutorProfile {
    pub id: String,
    pub user_id: String,
    pub bio: Option<String>,
    pub hourly_rate: f64,
    pub is_approved: i64,
    /// Running arithmetic mean of all review ratings. Written only by the
    /// review aggregation path.
    pub rating: f64,
    pub total_reviews: i64,
    pub total_sessions: i64,
    /// JSON object: weekday name -> array of "HH:MM-HH:MM" windows
    pub availability: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TutorProfile {
    pub fn is_approved(&self) -> bool {
        self.is_approved != 0
    }

    /// Parse the stored availability column into a typed schedule.
    pub fn weekly_availability(&self) -> WeeklyAvailability {
        WeeklyAvailability::from_json(self.availability.as_deref())
    }
}

/// Public listing entry: profile plus the owning user's display fields.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TutorListing {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub bio: Option<String>,
    pub hourly_rate: f64,
    pub rating: f64,
    pub total_reviews: i64,
    pub total_sessions: i64,
    pub availability: Option<String>,
}

// DTOs for API

#[derive(Debug, Deserialize)]
pub struct UpsertTutorProfileRequest {
    pub bio: Option<String>,
    pub hourly_rate: f64,
    #[serde(default)]
    pub availability: Option<WeeklyAvailability>,
    /// Replaces the tutor's category assignments when present.
    #[serde(default)]
    pub category_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ApproveTutorRequest {
    pub is_approved: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct TutorListQuery {
    pub search: Option<String>,
    pub category_id: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_rating: Option<f64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}
