//! Review endpoints: one review per completed booking, with the tutor's
//! running average rating maintained transactionally.
//!
//! The rating recompute runs as a single in-store UPDATE expression inside
//! the same transaction as the review insert, so concurrent reviews for one
//! tutor cannot interleave a read with a stale write.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{Booking, BookingStatus, CreateReviewRequest, DbPool, Review, Role};
use crate::AppState;

use super::auth::AuthUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::response::ApiResponse;
use super::validation::validate_rating;

fn validate_create_request(req: &CreateReviewRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if req.booking_id.is_empty() {
        errors.add("booking_id", "Booking ID is required");
    }
    if let Err(e) = validate_rating(req.rating) {
        errors.add("rating", e);
    }
    if req.comment.trim().is_empty() {
        errors.add("comment", "Comment is required");
    }

    errors.finish()
}

/// Create a review for a completed booking and fold its rating into the
/// tutor's aggregate.
pub async fn create_review_for_student(
    db: &DbPool,
    student_id: &str,
    req: &CreateReviewRequest,
) -> Result<Review, ApiError> {
    validate_create_request(req)?;

    let mut tx = db.begin().await?;

    // 1. The booking must exist
    let booking: Option<Booking> = sqlx::query_as("SELECT * FROM bookings WHERE id = ?")
        .bind(&req.booking_id)
        .fetch_optional(&mut *tx)
        .await?;
    let booking = booking.ok_or_else(|| ApiError::not_found("Booking not found"))?;

    // 2. Only the student who had the booking can leave a review
    if booking.student_id != student_id {
        return Err(ApiError::forbidden(
            "You do not have permission to review this booking",
        ));
    }

    // 3. The session must be completed
    if booking.status() != Some(BookingStatus::Completed) {
        return Err(ApiError::invalid_state(
            "You can only review a completed session",
        ));
    }

    // 4. At most one review per booking. Advisory check; the UNIQUE index
    // on booking_id is the guarantee.
    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM reviews WHERE booking_id = ?")
        .bind(&req.booking_id)
        .fetch_optional(&mut *tx)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict(
            "A review for this booking already exists",
        ));
    }

    // 5. Insert the review
    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO reviews (id, booking_id, student_id, tutor_id, rating, comment, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&req.booking_id)
    .bind(student_id)
    .bind(&booking.tutor_id)
    .bind(req.rating)
    .bind(&req.comment)
    .bind(&now)
    .execute(&mut *tx)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db_err)
            if db_err.message().contains("UNIQUE constraint failed") =>
        {
            ApiError::conflict("A review for this booking already exists")
        }
        _ => e.into(),
    })?;

    // 6. Fold the rating into the tutor's running mean. The arithmetic runs
    // in-store against the current row, so there is no read-modify-write
    // window. The profile may be gone (deleted tutor); the review still
    // stands on its own in that case.
    sqlx::query(
        "UPDATE tutor_profiles
         SET rating = (rating * total_reviews + ?) / (total_reviews + 1.0),
             total_reviews = total_reviews + 1,
             updated_at = ?
         WHERE user_id = ?",
    )
    .bind(req.rating as f64)
    .bind(&now)
    .bind(&booking.tutor_id)
    .execute(&mut *tx)
    .await?;

    let review = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = ?")
        .bind(&id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        review_id = %review.id,
        booking_id = %req.booking_id,
        tutor_id = %booking.tutor_id,
        rating = req.rating,
        "Review created"
    );

    Ok(review)
}

/// All reviews for a tutor's user id.
pub async fn reviews_for_tutor(db: &DbPool, tutor_id: &str) -> Result<Vec<Review>, ApiError> {
    let reviews = sqlx::query_as::<_, Review>(
        "SELECT * FROM reviews WHERE tutor_id = ? ORDER BY created_at",
    )
    .bind(tutor_id)
    .fetch_all(db)
    .await?;
    Ok(reviews)
}

// -------------------------------------------------------------------------
// Handlers
// -------------------------------------------------------------------------

/// POST /api/reviews (student)
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Review>>), ApiError> {
    user.require_role(&[Role::Student])?;
    let review = create_review_for_student(&state.db, user.id(), &req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Review created successfully", review)),
    ))
}

/// GET /api/tutors/:id/reviews (public). `:id` is the tutor's user id.
pub async fn get_tutor_reviews(
    State(state): State<Arc<AppState>>,
    Path(tutor_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Review>>>, ApiError> {
    let reviews = reviews_for_tutor(&state.db, &tutor_id).await?;
    Ok(Json(ApiResponse::ok("Reviews fetched successfully", reviews)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorCode;
    use crate::db::testing;

    fn request(booking_id: &str, rating: i64) -> CreateReviewRequest {
        CreateReviewRequest {
            booking_id: booking_id.to_string(),
            rating,
            comment: "Great session".to_string(),
        }
    }

    async fn insert_booking(
        pool: &DbPool,
        student_id: &str,
        tutor_user_id: &str,
        time: &str,
        status: &str,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO bookings (id, student_id, tutor_id, session_date, session_time,
                 duration_minutes, subject, price, status, meeting_link, created_at, updated_at)
             VALUES (?, ?, ?, '2025-06-02', ?, 60, 'Math', 25.0, ?, 'link', ?, ?)",
        )
        .bind(&id)
        .bind(student_id)
        .bind(tutor_user_id)
        .bind(time)
        .bind(status)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await
        .unwrap();
        id
    }

    async fn tutor_aggregate(pool: &DbPool, tutor_user_id: &str) -> (f64, i64) {
        sqlx::query_as("SELECT rating, total_reviews FROM tutor_profiles WHERE user_id = ?")
            .bind(tutor_user_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_review_updates_aggregate() {
        let pool = testing::pool().await;
        let tutor = testing::insert_user(&pool, "TUTOR").await;
        testing::insert_tutor_profile(&pool, &tutor, true, None).await;
        let student = testing::insert_user(&pool, "STUDENT").await;
        let booking = insert_booking(&pool, &student, &tutor, "09:00", "COMPLETED").await;

        let review = create_review_for_student(&pool, &student, &request(&booking, 5))
            .await
            .unwrap();
        assert_eq!(review.rating, 5);
        assert_eq!(review.tutor_id, tutor);

        let (rating, total) = tutor_aggregate(&pool, &tutor).await;
        assert_eq!(total, 1);
        assert!((rating - 5.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_rating_is_arithmetic_mean() {
        let pool = testing::pool().await;
        let tutor = testing::insert_user(&pool, "TUTOR").await;
        testing::insert_tutor_profile(&pool, &tutor, true, None).await;

        let ratings = [5, 3, 4, 1, 2, 5, 4];
        for (i, rating) in ratings.iter().enumerate() {
            let student = testing::insert_user(&pool, "STUDENT").await;
            let booking =
                insert_booking(&pool, &student, &tutor, &format!("09:{:02}", i), "COMPLETED")
                    .await;
            create_review_for_student(&pool, &student, &request(&booking, *rating))
                .await
                .unwrap();
        }

        let (rating, total) = tutor_aggregate(&pool, &tutor).await;
        assert_eq!(total, ratings.len() as i64);
        let mean = ratings.iter().sum::<i64>() as f64 / ratings.len() as f64;
        assert!((rating - mean).abs() < 1e-9, "got {rating}, want {mean}");
    }

    #[tokio::test]
    async fn test_duplicate_review_conflict() {
        let pool = testing::pool().await;
        let tutor = testing::insert_user(&pool, "TUTOR").await;
        testing::insert_tutor_profile(&pool, &tutor, true, None).await;
        let student = testing::insert_user(&pool, "STUDENT").await;
        let booking = insert_booking(&pool, &student, &tutor, "09:00", "COMPLETED").await;

        create_review_for_student(&pool, &student, &request(&booking, 5))
            .await
            .unwrap();
        let err = create_review_for_student(&pool, &student, &request(&booking, 4))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Conflict);

        // The failed attempt must not touch the aggregate
        let (rating, total) = tutor_aggregate(&pool, &tutor).await;
        assert_eq!(total, 1);
        assert!((rating - 5.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_review_requires_completed_booking() {
        let pool = testing::pool().await;
        let tutor = testing::insert_user(&pool, "TUTOR").await;
        testing::insert_tutor_profile(&pool, &tutor, true, None).await;
        let student = testing::insert_user(&pool, "STUDENT").await;
        let booking = insert_booking(&pool, &student, &tutor, "09:00", "CONFIRMED").await;

        let err = create_review_for_student(&pool, &student, &request(&booking, 5))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidState);
    }

    #[tokio::test]
    async fn test_review_requires_owning_student() {
        let pool = testing::pool().await;
        let tutor = testing::insert_user(&pool, "TUTOR").await;
        testing::insert_tutor_profile(&pool, &tutor, true, None).await;
        let student = testing::insert_user(&pool, "STUDENT").await;
        let other = testing::insert_user(&pool, "STUDENT").await;
        let booking = insert_booking(&pool, &student, &tutor, "09:00", "COMPLETED").await;

        let err = create_review_for_student(&pool, &other, &request(&booking, 5))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn test_review_missing_booking() {
        let pool = testing::pool().await;
        let student = testing::insert_user(&pool, "STUDENT").await;
        let err = create_review_for_student(&pool, &student, &request("missing", 5))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_review_rating_bounds() {
        let pool = testing::pool().await;
        let student = testing::insert_user(&pool, "STUDENT").await;
        for rating in [0, 6, -1] {
            let err = create_review_for_student(&pool, &student, &request("whatever", rating))
                .await
                .unwrap_err();
            assert_eq!(err.code(), ErrorCode::ValidationError);
        }
    }

    #[tokio::test]
    async fn test_review_without_profile_still_created() {
        let pool = testing::pool().await;
        // Tutor user exists but the profile was deleted
        let tutor = testing::insert_user(&pool, "TUTOR").await;
        let student = testing::insert_user(&pool, "STUDENT").await;
        let booking = insert_booking(&pool, &student, &tutor, "09:00", "COMPLETED").await;

        let review = create_review_for_student(&pool, &student, &request(&booking, 4))
            .await
            .unwrap();
        assert_eq!(review.rating, 4);
    }

    #[tokio::test]
    async fn test_reviews_for_tutor_listing() {
        let pool = testing::pool().await;
        let tutor = testing::insert_user(&pool, "TUTOR").await;
        testing::insert_tutor_profile(&pool, &tutor, true, None).await;
        let other_tutor = testing::insert_user(&pool, "TUTOR").await;
        testing::insert_tutor_profile(&pool, &other_tutor, true, None).await;

        for (i, target) in [&tutor, &tutor, &other_tutor].iter().enumerate() {
            let student = testing::insert_user(&pool, "STUDENT").await;
            let booking =
                insert_booking(&pool, &student, target, &format!("09:{:02}", i), "COMPLETED")
                    .await;
            create_review_for_student(&pool, &student, &request(&booking, 5))
                .await
                .unwrap();
        }

        let reviews = reviews_for_tutor(&pool, &tutor).await.unwrap();
        assert_eq!(reviews.len(), 2);
        assert!(reviews.iter().all(|r| r.tutor_id == tutor));
    }
}
