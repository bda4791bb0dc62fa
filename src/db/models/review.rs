//! Review models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Review {
    pub id: String,
    /// Unique per booking: a session is reviewed at most once.
    pub booking_id: String,
    pub student_id: String,
    pub tutor_id: String,
    pub rating: i64,
    pub comment: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub booking_id: String,
    pub rating: i64,
    pub comment: String,
}
