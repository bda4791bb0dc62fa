//! Booking endpoints: session scheduling, status transitions, role-scoped
//! listings.
//!
//! Slot conflicts are ultimately enforced by the partial unique indexes on
//! the bookings table; the existence checks here only produce friendlier
//! messages. A constraint violation on insert is mapped to the same
//! `Conflict` error, so concurrent requests for one slot cannot both win.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    Booking, BookingListQuery, BookingStatus, CreateBookingRequest, DbPool, Role, TutorProfile,
    UpdateBookingStatusRequest, User,
};
use crate::AppState;

use super::auth::AuthUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::response::{page_params, ApiResponse, PageMeta, Paginated};
use super::validation::{validate_date, validate_time};

fn validate_create_request(req: &CreateBookingRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if req.tutor_id.is_empty() {
        errors.add("tutor_id", "Tutor ID is required");
    }
    if let Err(e) = validate_date(&req.session_date) {
        errors.add("session_date", e);
    }
    if let Err(e) = validate_time(&req.session_time) {
        errors.add("session_time", e);
    }
    if req.duration_minutes <= 0 {
        errors.add("duration_minutes", "Duration must be a positive number of minutes");
    }
    if req.subject.trim().is_empty() {
        errors.add("subject", "Subject is required");
    }
    if req.price <= 0.0 {
        errors.add("price", "Price must be positive");
    }

    errors.finish()
}

/// Map a UNIQUE violation on one of the slot indexes to the user-facing
/// conflict error. Any other database error passes through unchanged.
fn map_slot_violation(err: sqlx::Error) -> ApiError {
    if let sqlx::Error::Database(db_err) = &err {
        let msg = db_err.message();
        if msg.contains("UNIQUE constraint failed") {
            if msg.contains("bookings.student_id") {
                return ApiError::conflict("You already have a booking at this time");
            }
            if msg.contains("bookings.tutor_id") {
                return ApiError::conflict("Tutor already has a booking at this time");
            }
        }
    }
    err.into()
}

/// Create a booking for a student against a tutor's declared availability.
pub async fn create_booking_for_student(
    db: &DbPool,
    student_id: &str,
    req: &CreateBookingRequest,
) -> Result<Booking, ApiError> {
    validate_create_request(req)?;

    // Already validated above, so these cannot fail
    let date = validate_date(&req.session_date)
        .map_err(|e| ApiError::validation_field("session_date", e))?;
    let minute = validate_time(&req.session_time)
        .map_err(|e| ApiError::validation_field("session_time", e))?;

    // 1. Resolve the tutor profile
    let tutor: Option<TutorProfile> = sqlx::query_as("SELECT * FROM tutor_profiles WHERE id = ?")
        .bind(&req.tutor_id)
        .fetch_optional(db)
        .await?;
    let tutor = tutor.ok_or_else(|| ApiError::not_found("Tutor not found"))?;

    if !tutor.is_approved() {
        return Err(ApiError::invalid_state("Tutor is not approved"));
    }

    // 2. The start time must fall inside a declared window on that weekday.
    // Only the start is checked; the duration may run past the window's
    // upper bound.
    if !tutor.weekly_availability().covers_date(date, minute) {
        return Err(ApiError::invalid_state(
            "Tutor is not available at the requested time",
        ));
    }

    // 3-4. Advisory double-booking checks. Bookings reference the tutor's
    // user id, not the profile id.
    let tutor_busy: Option<(String,)> = sqlx::query_as(
        "SELECT id FROM bookings
         WHERE tutor_id = ? AND session_date = ? AND session_time = ? AND status != 'CANCELLED'",
    )
    .bind(&tutor.user_id)
    .bind(&req.session_date)
    .bind(&req.session_time)
    .fetch_optional(db)
    .await?;
    if tutor_busy.is_some() {
        return Err(ApiError::conflict("Tutor already has a booking at this time"));
    }

    let student_busy: Option<(String,)> = sqlx::query_as(
        "SELECT id FROM bookings
         WHERE student_id = ? AND session_date = ? AND session_time = ? AND status != 'CANCELLED'",
    )
    .bind(student_id)
    .bind(&req.session_date)
    .bind(&req.session_time)
    .fetch_optional(db)
    .await?;
    if student_busy.is_some() {
        return Err(ApiError::conflict("You already have a booking at this time"));
    }

    // 5. Optimistic insert. The partial unique indexes close the
    // check-then-insert race; a violation maps back to Conflict.
    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now();
    let meeting_link = format!(
        "https://skillbridge.com/meet/{}-{}-{}",
        student_id,
        tutor.user_id,
        now.timestamp_millis()
    );

    sqlx::query(
        r#"
        INSERT INTO bookings
            (id, student_id, tutor_id, session_date, session_time, duration_minutes,
             subject, price, status, notes, meeting_link, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'CONFIRMED', ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(student_id)
    .bind(&tutor.user_id)
    .bind(&req.session_date)
    .bind(&req.session_time)
    .bind(req.duration_minutes)
    .bind(&req.subject)
    .bind(req.price)
    .bind(&req.notes)
    .bind(&meeting_link)
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .execute(db)
    .await
    .map_err(map_slot_violation)?;

    let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = ?")
        .bind(&id)
        .fetch_one(db)
        .await?;

    tracing::info!(
        booking_id = %booking.id,
        student_id = student_id,
        tutor_id = %tutor.user_id,
        "Booking created"
    );

    Ok(booking)
}

/// Apply a status transition requested by the booking's student or tutor.
/// The student may only cancel; the tutor may only complete.
pub async fn transition_booking(
    db: &DbPool,
    booking_id: &str,
    caller_id: &str,
    new_status: BookingStatus,
) -> Result<Booking, ApiError> {
    let booking: Option<Booking> = sqlx::query_as("SELECT * FROM bookings WHERE id = ?")
        .bind(booking_id)
        .fetch_optional(db)
        .await?;
    let booking = booking.ok_or_else(|| ApiError::not_found("Booking not found"))?;

    let allowed = (caller_id == booking.student_id && new_status == BookingStatus::Cancelled)
        || (caller_id == booking.tutor_id && new_status == BookingStatus::Completed);
    if !allowed {
        return Err(ApiError::forbidden(
            "You do not have permission to change this booking's status",
        ));
    }

    sqlx::query("UPDATE bookings SET status = ?, updated_at = ? WHERE id = ?")
        .bind(new_status.as_str())
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(booking_id)
        .execute(db)
        .await?;

    let updated = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = ?")
        .bind(booking_id)
        .fetch_one(db)
        .await?;

    tracing::info!(booking_id = booking_id, status = %new_status, "Booking status updated");

    Ok(updated)
}

/// Fetch a booking, enforcing role-scoped visibility: students and tutors
/// must be a party to it, admins see everything.
pub async fn booking_for_caller(
    db: &DbPool,
    booking_id: &str,
    caller: &User,
) -> Result<Booking, ApiError> {
    let booking: Option<Booking> = sqlx::query_as("SELECT * FROM bookings WHERE id = ?")
        .bind(booking_id)
        .fetch_optional(db)
        .await?;
    let booking = booking.ok_or_else(|| ApiError::not_found("Booking not found"))?;

    let is_party = caller.id == booking.student_id || caller.id == booking.tutor_id;
    if !caller.is_admin() && !is_party {
        return Err(ApiError::forbidden(
            "You do not have permission to view this booking",
        ));
    }

    Ok(booking)
}

/// All bookings the caller is a party to, newest session first.
pub async fn bookings_for_user(db: &DbPool, caller: &User) -> Result<Vec<Booking>, ApiError> {
    let column = match caller.role() {
        Some(Role::Student) => "student_id",
        Some(Role::Tutor) => "tutor_id",
        _ => {
            return Err(ApiError::forbidden(
                "Only students and tutors have personal booking lists",
            ))
        }
    };

    let sql = format!(
        "SELECT * FROM bookings WHERE {} = ? ORDER BY session_date DESC, session_time DESC",
        column
    );
    let bookings = sqlx::query_as::<_, Booking>(&sql)
        .bind(&caller.id)
        .fetch_all(db)
        .await?;

    Ok(bookings)
}

/// Admin listing with optional filters and pagination.
pub async fn list_bookings_admin(
    db: &DbPool,
    query: &BookingListQuery,
) -> Result<Paginated<Booking>, ApiError> {
    let (page, limit, offset) = page_params(query.page, query.limit);

    let mut conditions: Vec<&str> = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(status) = &query.status {
        let status = BookingStatus::from_str(status)
            .ok_or_else(|| ApiError::validation_field("status", "Invalid status value"))?;
        conditions.push("status = ?");
        bindings.push(status.as_str().to_string());
    }
    if let Some(tutor_id) = &query.tutor_id {
        conditions.push("tutor_id = ?");
        bindings.push(tutor_id.clone());
    }
    if let Some(student_id) = &query.student_id {
        conditions.push("student_id = ?");
        bindings.push(student_id.clone());
    }
    if let Some(date_from) = &query.date_from {
        conditions.push("session_date >= ?");
        bindings.push(date_from.clone());
    }
    if let Some(date_to) = &query.date_to {
        conditions.push("session_date <= ?");
        bindings.push(date_to.clone());
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM bookings {}", where_clause);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for binding in &bindings {
        count_query = count_query.bind(binding);
    }
    let total = count_query.fetch_one(db).await?;

    let sql = format!(
        "SELECT * FROM bookings {} ORDER BY session_date DESC, session_time DESC LIMIT ? OFFSET ?",
        where_clause
    );
    let mut list_query = sqlx::query_as::<_, Booking>(&sql);
    for binding in &bindings {
        list_query = list_query.bind(binding);
    }
    let items = list_query.bind(limit).bind(offset).fetch_all(db).await?;

    Ok(Paginated {
        meta: PageMeta::new(total, page, limit),
        items,
    })
}

// -------------------------------------------------------------------------
// Handlers
// -------------------------------------------------------------------------

/// POST /api/bookings (student)
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Booking>>), ApiError> {
    user.require_role(&[Role::Student])?;
    let booking = create_booking_for_student(&state.db, user.id(), &req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Booking created successfully", booking)),
    ))
}

/// GET /api/bookings. Students and tutors get their own bookings; admins
/// get the filtered, paginated list.
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<BookingListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if user.0.is_admin() {
        let page = list_bookings_admin(&state.db, &query).await?;
        return Ok(Json(serde_json::json!({
            "success": true,
            "message": "Bookings fetched successfully",
            "meta": page.meta,
            "data": page.items,
        })));
    }

    let bookings = bookings_for_user(&state.db, &user.0).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "User bookings fetched successfully",
        "data": bookings,
    })))
}

/// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let booking = booking_for_caller(&state.db, &id, &user.0).await?;
    Ok(Json(ApiResponse::ok("Booking fetched successfully", booking)))
}

/// PATCH /api/bookings/:id/status
pub async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateBookingStatusRequest>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let new_status = BookingStatus::from_str(&req.status)
        .filter(|s| matches!(s, BookingStatus::Completed | BookingStatus::Cancelled))
        .ok_or_else(|| {
            ApiError::validation_field("status", "Status must be COMPLETED or CANCELLED")
        })?;

    let booking = transition_booking(&state.db, &id, user.id(), new_status).await?;
    Ok(Json(ApiResponse::ok(
        "Booking status updated successfully",
        booking,
    )))
}
