//! Tutor profile endpoints: public discovery, profile self-management, and
//! admin approval.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    ApproveTutorRequest, DbPool, Role, TutorListQuery, TutorListing, TutorProfile,
    UpsertTutorProfileRequest,
};
use crate::AppState;

use super::auth::AuthUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::response::{page_params, ApiResponse, PageMeta, Paginated};

/// Columns the public listing may sort by.
const SORTABLE: &[&str] = &["rating", "hourly_rate", "total_reviews", "created_at"];

fn validate_upsert_request(req: &UpsertTutorProfileRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if req.hourly_rate <= 0.0 {
        errors.add("hourly_rate", "Hourly rate must be positive");
    }
    if let Some(bio) = &req.bio {
        if bio.len() > 2000 {
            errors.add("bio", "Bio is too long (max 2000 characters)");
        }
    }
    // Window strings are parsed by the typed deserializer; an empty schedule
    // is allowed (the tutor is simply never bookable).

    errors.finish()
}

/// Public listing of approved tutors owned by active users.
pub async fn list_tutors_public(
    db: &DbPool,
    query: &TutorListQuery,
) -> Result<Paginated<TutorListing>, ApiError> {
    let (page, limit, offset) = page_params(query.page, query.limit);

    let mut conditions = vec![
        "t.is_approved = 1".to_string(),
        "u.status = 'ACTIVE'".to_string(),
    ];
    let mut bindings: Vec<String> = Vec::new();

    if let Some(search) = &query.search {
        conditions.push("(u.name LIKE ? OR t.bio LIKE ?)".to_string());
        let pattern = format!("%{}%", search);
        bindings.push(pattern.clone());
        bindings.push(pattern);
    }
    if let Some(category_id) = &query.category_id {
        conditions.push(
            "t.id IN (SELECT tutor_profile_id FROM tutor_categories WHERE category_id = ?)"
                .to_string(),
        );
        bindings.push(category_id.clone());
    }
    if let Some(min_price) = query.min_price {
        conditions.push("t.hourly_rate >= ?".to_string());
        bindings.push(min_price.to_string());
    }
    if let Some(max_price) = query.max_price {
        conditions.push("t.hourly_rate <= ?".to_string());
        bindings.push(max_price.to_string());
    }
    if let Some(min_rating) = query.min_rating {
        conditions.push("t.rating >= ?".to_string());
        bindings.push(min_rating.to_string());
    }

    let sort_by = match &query.sort_by {
        Some(s) if SORTABLE.contains(&s.as_str()) => s.as_str(),
        Some(_) => {
            return Err(ApiError::validation_field("sort_by", "Unsupported sort column"));
        }
        None => "rating",
    };
    let sort_order = match query.sort_order.as_deref() {
        Some("asc") => "ASC",
        Some("desc") | None => "DESC",
        Some(_) => {
            return Err(ApiError::validation_field("sort_order", "Must be asc or desc"));
        }
    };

    let where_clause = format!("WHERE {}", conditions.join(" AND "));

    let count_sql = format!(
        "SELECT COUNT(*) FROM tutor_profiles t JOIN users u ON u.id = t.user_id {}",
        where_clause
    );
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for binding in &bindings {
        count_query = count_query.bind(binding);
    }
    let total = count_query.fetch_one(db).await?;

    let sql = format!(
        "SELECT t.id, t.user_id, u.name, t.bio, t.hourly_rate, t.rating,
                t.total_reviews, t.total_sessions, t.availability
         FROM tutor_profiles t JOIN users u ON u.id = t.user_id
         {} ORDER BY t.{} {} LIMIT ? OFFSET ?",
        where_clause, sort_by, sort_order
    );
    let mut list_query = sqlx::query_as::<_, TutorListing>(&sql);
    for binding in &bindings {
        list_query = list_query.bind(binding);
    }
    let items = list_query.bind(limit).bind(offset).fetch_all(db).await?;

    Ok(Paginated {
        meta: PageMeta::new(total, page, limit),
        items,
    })
}

/// Profiles awaiting approval, oldest first. Admin moderation queue.
pub async fn list_pending_profiles(
    db: &DbPool,
    page: Option<i64>,
    limit: Option<i64>,
) -> Result<Paginated<TutorListing>, ApiError> {
    let (page, limit, offset) = page_params(page, limit);

    let total = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM tutor_profiles t JOIN users u ON u.id = t.user_id
         WHERE t.is_approved = 0",
    )
    .fetch_one(db)
    .await?;

    let items = sqlx::query_as::<_, TutorListing>(
        "SELECT t.id, t.user_id, u.name, t.bio, t.hourly_rate, t.rating,
                t.total_reviews, t.total_sessions, t.availability
         FROM tutor_profiles t JOIN users u ON u.id = t.user_id
         WHERE t.is_approved = 0
         ORDER BY t.created_at LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;

    Ok(Paginated {
        meta: PageMeta::new(total, page, limit),
        items,
    })
}

/// Create or update the calling tutor's own profile.
pub async fn upsert_profile_for_tutor(
    db: &DbPool,
    user_id: &str,
    req: &UpsertTutorProfileRequest,
) -> Result<TutorProfile, ApiError> {
    validate_upsert_request(req)?;

    let availability_json = req.availability.as_ref().and_then(|a| a.to_json());
    let now = chrono::Utc::now().to_rfc3339();

    // The profile write and the category replacement commit together; a bad
    // category id rolls everything back, keeping prior assignments intact.
    let mut tx = db.begin().await?;

    let existing: Option<TutorProfile> =
        sqlx::query_as("SELECT * FROM tutor_profiles WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

    let profile_id = match existing {
        Some(profile) => {
            sqlx::query(
                "UPDATE tutor_profiles
                 SET bio = ?, hourly_rate = ?, availability = ?, updated_at = ?
                 WHERE id = ?",
            )
            .bind(&req.bio)
            .bind(req.hourly_rate)
            .bind(&availability_json)
            .bind(&now)
            .bind(&profile.id)
            .execute(&mut *tx)
            .await?;
            profile.id
        }
        None => {
            let id = Uuid::new_v4().to_string();
            // New profiles start unapproved; an admin flips the flag.
            sqlx::query(
                "INSERT INTO tutor_profiles
                     (id, user_id, bio, hourly_rate, is_approved, availability,
                      created_at, updated_at)
                 VALUES (?, ?, ?, ?, 0, ?, ?, ?)",
            )
            .bind(&id)
            .bind(user_id)
            .bind(&req.bio)
            .bind(req.hourly_rate)
            .bind(&availability_json)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
            id
        }
    };

    if let Some(category_ids) = &req.category_ids {
        sqlx::query("DELETE FROM tutor_categories WHERE tutor_profile_id = ?")
            .bind(&profile_id)
            .execute(&mut *tx)
            .await?;
        for category_id in category_ids {
            sqlx::query(
                "INSERT INTO tutor_categories (tutor_profile_id, category_id) VALUES (?, ?)",
            )
            .bind(&profile_id)
            .bind(category_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db_err)
                    if db_err.message().contains("FOREIGN KEY constraint failed") =>
                {
                    ApiError::not_found("Category not found")
                }
                _ => e.into(),
            })?;
        }
    }

    let profile = sqlx::query_as::<_, TutorProfile>("SELECT * FROM tutor_profiles WHERE id = ?")
        .bind(&profile_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(profile)
}

/// Set a profile's approval flag. Admin only.
pub async fn set_tutor_approval(
    db: &DbPool,
    profile_id: &str,
    approved: bool,
) -> Result<TutorProfile, ApiError> {
    let result = sqlx::query(
        "UPDATE tutor_profiles SET is_approved = ?, updated_at = ? WHERE id = ?",
    )
    .bind(approved as i64)
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(profile_id)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Tutor not found"));
    }

    let profile = sqlx::query_as::<_, TutorProfile>("SELECT * FROM tutor_profiles WHERE id = ?")
        .bind(profile_id)
        .fetch_one(db)
        .await?;

    tracing::info!(profile_id = profile_id, approved = approved, "Tutor approval updated");

    Ok(profile)
}

// -------------------------------------------------------------------------
// Handlers
// -------------------------------------------------------------------------

/// GET /api/tutors (public)
pub async fn list_tutors(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TutorListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let page = list_tutors_public(&state.db, &query).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Tutors fetched successfully",
        "meta": page.meta,
        "data": page.items,
    })))
}

/// GET /api/tutors/:id (public). `:id` is the tutor profile id.
pub async fn get_tutor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<TutorProfile>>, ApiError> {
    let profile: Option<TutorProfile> =
        sqlx::query_as("SELECT * FROM tutor_profiles WHERE id = ?")
            .bind(&id)
            .fetch_optional(&state.db)
            .await?;
    let profile = profile.ok_or_else(|| ApiError::not_found("Tutor not found"))?;
    Ok(Json(ApiResponse::ok("Tutor fetched successfully", profile)))
}

/// GET /api/tutors/pending (admin)
pub async fn list_pending_tutors(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<TutorListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require_role(&[Role::Admin])?;
    let page = list_pending_profiles(&state.db, query.page, query.limit).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Pending tutors fetched successfully",
        "meta": page.meta,
        "data": page.items,
    })))
}

/// GET /api/tutors/me (tutor)
pub async fn get_own_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<ApiResponse<TutorProfile>>, ApiError> {
    user.require_role(&[Role::Tutor])?;
    let profile: Option<TutorProfile> =
        sqlx::query_as("SELECT * FROM tutor_profiles WHERE user_id = ?")
            .bind(user.id())
            .fetch_optional(&state.db)
            .await?;
    let profile = profile.ok_or_else(|| ApiError::not_found("Tutor profile not found"))?;
    Ok(Json(ApiResponse::ok("Tutor profile fetched successfully", profile)))
}

/// PUT /api/tutors/me (tutor)
pub async fn upsert_own_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<UpsertTutorProfileRequest>,
) -> Result<Json<ApiResponse<TutorProfile>>, ApiError> {
    user.require_role(&[Role::Tutor])?;
    let profile = upsert_profile_for_tutor(&state.db, user.id(), &req).await?;
    Ok(Json(ApiResponse::ok("Tutor profile saved successfully", profile)))
}

/// PATCH /api/tutors/:id/approval (admin)
pub async fn approve_tutor(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<ApproveTutorRequest>,
) -> Result<Json<ApiResponse<TutorProfile>>, ApiError> {
    user.require_role(&[Role::Admin])?;
    let profile = set_tutor_approval(&state.db, &id, req.is_approved).await?;
    Ok(Json(ApiResponse::ok("Tutor approval updated", profile)))
}
