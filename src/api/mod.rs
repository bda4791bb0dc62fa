pub mod auth;
mod bookings;
mod categories;
pub mod error;
pub mod response;
mod reviews;
mod tutors;
mod users;
mod validation;

use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Bookings
        .route("/bookings", post(bookings::create_booking))
        .route("/bookings", get(bookings::list_bookings))
        .route("/bookings/:id", get(bookings::get_booking))
        .route("/bookings/:id/status", patch(bookings::update_booking_status))
        // Reviews
        .route("/reviews", post(reviews::create_review))
        // Tutors
        .route("/tutors", get(tutors::list_tutors))
        .route("/tutors/pending", get(tutors::list_pending_tutors))
        .route("/tutors/me", get(tutors::get_own_profile))
        .route("/tutors/me", put(tutors::upsert_own_profile))
        .route("/tutors/:id", get(tutors::get_tutor))
        .route("/tutors/:id/reviews", get(reviews::get_tutor_reviews))
        .route("/tutors/:id/approval", patch(tutors::approve_tutor))
        // Users
        .route("/users", get(users::list_users))
        .route("/users/me", patch(users::update_me))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id/status", patch(users::update_user_status))
        .route("/users/:id/role", patch(users::update_user_role))
        // Categories
        .route("/categories", get(categories::list_categories))
        .route("/categories", post(categories::create_category))
        .route("/categories/:id", delete(categories::delete_category));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    //! Full lifecycle: profile approval gates booking, completion gates
    //! review, and the first review seeds the aggregate.

    use super::*;
    use crate::api::error::ErrorCode;
    use crate::db::testing;
    use crate::db::{BookingStatus, CreateBookingRequest, CreateReviewRequest};

    #[tokio::test]
    async fn test_booking_review_lifecycle() {
        let pool = testing::pool().await;

        let tutor_user = testing::insert_user(&pool, "TUTOR").await;
        let profile_id = testing::insert_tutor_profile(
            &pool,
            &tutor_user,
            false,
            Some(r#"{"Monday": ["09:00-10:00"]}"#),
        )
        .await;
        let student = testing::insert_user(&pool, "STUDENT").await;

        let booking_req = CreateBookingRequest {
            tutor_id: profile_id.clone(),
            session_date: "2025-06-02".to_string(), // a Monday
            session_time: "09:00".to_string(),
            duration_minutes: 60,
            subject: "Algebra".to_string(),
            price: 25.0,
            notes: Some("First session".to_string()),
        };

        // Unapproved tutor rejects the booking
        let err = bookings::create_booking_for_student(&pool, &student, &booking_req)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidState);

        // Approve, then the identical request goes through
        tutors::set_tutor_approval(&pool, &profile_id, true)
            .await
            .unwrap();
        let booking = bookings::create_booking_for_student(&pool, &student, &booking_req)
            .await
            .unwrap();
        assert_eq!(booking.status, "CONFIRMED");

        // Tutor completes the session
        bookings::transition_booking(&pool, &booking.id, &tutor_user, BookingStatus::Completed)
            .await
            .unwrap();

        // Student reviews it; the aggregate becomes 5.0 over one review
        let review_req = CreateReviewRequest {
            booking_id: booking.id.clone(),
            rating: 5,
            comment: "Excellent".to_string(),
        };
        reviews::create_review_for_student(&pool, &student, &review_req)
            .await
            .unwrap();

        let (rating, total): (f64, i64) =
            sqlx::query_as("SELECT rating, total_reviews FROM tutor_profiles WHERE id = ?")
                .bind(&profile_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(total, 1);
        assert!((rating - 5.0).abs() < 1e-9);

        // A second review for the same booking conflicts
        let err = reviews::create_review_for_student(&pool, &student, &review_req)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Conflict);
    }
}
