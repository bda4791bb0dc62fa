//! User administration and self-service profile endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use crate::db::{
    DbPool, Role, UpdateProfileRequest, UpdateUserRoleRequest, UpdateUserStatusRequest, User,
    UserListQuery, UserStatus,
};
use crate::AppState;

use super::auth::AuthUser;
use super::error::ApiError;
use super::response::{page_params, ApiResponse, PageMeta, Paginated};

/// Admin listing with role/status/search filters.
pub async fn list_users_admin(
    db: &DbPool,
    query: &UserListQuery,
) -> Result<Paginated<User>, ApiError> {
    let (page, limit, offset) = page_params(query.page, query.limit);

    let mut conditions: Vec<&str> = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(role) = &query.role {
        let role = Role::from_str(role)
            .ok_or_else(|| ApiError::validation_field("role", "Invalid role value"))?;
        conditions.push("role = ?");
        bindings.push(role.as_str().to_string());
    }
    if let Some(status) = &query.status {
        let status = UserStatus::from_str(status)
            .ok_or_else(|| ApiError::validation_field("status", "Invalid status value"))?;
        conditions.push("status = ?");
        bindings.push(status.as_str().to_string());
    }
    if let Some(search) = &query.search {
        conditions.push("(name LIKE ? OR email LIKE ?)");
        let pattern = format!("%{}%", search);
        bindings.push(pattern.clone());
        bindings.push(pattern);
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM users {}", where_clause);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for binding in &bindings {
        count_query = count_query.bind(binding);
    }
    let total = count_query.fetch_one(db).await?;

    let sql = format!(
        "SELECT * FROM users {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
        where_clause
    );
    let mut list_query = sqlx::query_as::<_, User>(&sql);
    for binding in &bindings {
        list_query = list_query.bind(binding);
    }
    let items = list_query.bind(limit).bind(offset).fetch_all(db).await?;

    Ok(Paginated {
        meta: PageMeta::new(total, page, limit),
        items,
    })
}

async fn fetch_user(db: &DbPool, id: &str) -> Result<User, ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?;
    user.ok_or_else(|| ApiError::not_found("User not found"))
}

/// Set a user's account status. Admin only.
pub async fn set_user_status(db: &DbPool, id: &str, status: &str) -> Result<User, ApiError> {
    let status = UserStatus::from_str(status)
        .ok_or_else(|| ApiError::validation_field("status", "Invalid status value"))?;

    fetch_user(db, id).await?;

    sqlx::query("UPDATE users SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(id)
        .execute(db)
        .await?;

    tracing::info!(user_id = id, status = %status, "User status updated");
    fetch_user(db, id).await
}

/// Set a user's role. Admin only.
pub async fn set_user_role(db: &DbPool, id: &str, role: &str) -> Result<User, ApiError> {
    let role = Role::from_str(role)
        .ok_or_else(|| ApiError::validation_field("role", "Invalid role value"))?;

    fetch_user(db, id).await?;

    sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
        .bind(role.as_str())
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(id)
        .execute(db)
        .await?;

    tracing::info!(user_id = id, role = %role, "User role updated");
    fetch_user(db, id).await
}

/// Partial update of the caller's own name/phone.
pub async fn update_own_profile(
    db: &DbPool,
    id: &str,
    req: &UpdateProfileRequest,
) -> Result<User, ApiError> {
    fetch_user(db, id).await?;

    sqlx::query(
        "UPDATE users SET
             name = COALESCE(?, name),
             phone = COALESCE(?, phone),
             updated_at = ?
         WHERE id = ?",
    )
    .bind(&req.name)
    .bind(&req.phone)
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(id)
    .execute(db)
    .await?;

    fetch_user(db, id).await
}

// -------------------------------------------------------------------------
// Handlers
// -------------------------------------------------------------------------

/// GET /api/users (admin)
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<UserListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require_role(&[Role::Admin])?;
    let page = list_users_admin(&state.db, &query).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Users fetched successfully",
        "meta": page.meta,
        "data": page.items,
    })))
}

/// GET /api/users/:id (admin)
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    user.require_role(&[Role::Admin])?;
    let found = fetch_user(&state.db, &id).await?;
    Ok(Json(ApiResponse::ok("User fetched successfully", found)))
}

/// PATCH /api/users/:id/status (admin)
pub async fn update_user_status(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserStatusRequest>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    user.require_role(&[Role::Admin])?;
    let updated = set_user_status(&state.db, &id, &req.status).await?;
    Ok(Json(ApiResponse::ok("User status updated successfully", updated)))
}

/// PATCH /api/users/:id/role (admin)
pub async fn update_user_role(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRoleRequest>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    user.require_role(&[Role::Admin])?;
    let updated = set_user_role(&state.db, &id, &req.role).await?;
    Ok(Json(ApiResponse::ok("User role updated successfully", updated)))
}

/// PATCH /api/users/me
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let updated = update_own_profile(&state.db, user.id(), &req).await?;
    Ok(Json(ApiResponse::ok("Profile updated successfully", updated)))
}
