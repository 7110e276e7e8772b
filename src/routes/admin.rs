//! `/admin` routes — administrative principal management.
//! All routes in this module require the `Admin` role (enforced via the
//! `require_admin` role-guard applied on this router).
//!
//! Listing with `?role=customer` doubles as the customer directory.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    errors::{AppError, AppResult},
    middleware::{auth_guard::AuthUser, role_guard::require_admin},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    use axum::middleware;
    // require_admin reads Extension<AuthUser> (injected by require_auth in mod.rs);
    // it does not need AppState, so plain from_fn is sufficient.
    let admin_guard = middleware::from_fn(require_admin);
    Router::new()
        .route("/admin/users",      get(list_users))
        .route("/admin/users/{id}", get(get_user).put(update_user).delete(delete_user))
        .route_layer(admin_guard)
}

// ── Row types ────────────────────────────────────────────────

#[derive(sqlx::FromRow, Serialize)]
struct UserRow {
    id:        String,
    username:  String,
    email:     Option<String>,
    role:      String,
    is_active: bool,
}

// ── Request bodies ───────────────────────────────────────────

#[derive(Deserialize)]
struct ListUsersQuery {
    role: Option<String>,
}

#[derive(Deserialize)]
struct UpdateUserBody {
    is_active: Option<bool>,
    role:      Option<String>,
}

// ── Handlers ─────────────────────────────────────────────────

async fn list_users(
    State(state): State<AppState>,
    Extension(_admin): Extension<AuthUser>,
    Query(query): Query<ListUsersQuery>,
) -> AppResult<Json<Vec<UserRow>>> {
    let pool = &state.pool;
    let rows: Vec<UserRow> = match &query.role {
        Some(role) => {
            if !matches!(role.as_str(), "admin" | "staff" | "customer") {
                return Err(AppError::Validation("Invalid role filter".into()));
            }
            sqlx::query_as::<_, UserRow>(
                "SELECT id, username, email, role, is_active
                 FROM users
                 WHERE deleted_at IS NULL AND role = ?
                 ORDER BY username",
            )
            .bind(role)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, UserRow>(
                "SELECT id, username, email, role, is_active
                 FROM users
                 WHERE deleted_at IS NULL
                 ORDER BY role, username",
            )
            .fetch_all(pool)
            .await?
        }
    };
    Ok(Json(rows))
}

async fn get_user(
    State(state): State<AppState>,
    Extension(_admin): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<Json<UserRow>> {
    let row: UserRow = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, email, role, is_active
         FROM users WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(&id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::NotFound)?;
    Ok(Json(row))
}

async fn update_user(
    State(state): State<AppState>,
    Extension(_admin): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<UpdateUserBody>,
) -> AppResult<Json<UserRow>> {
    let pool = &state.pool;

    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ? AND deleted_at IS NULL)",
    )
    .bind(&id)
    .fetch_one(pool)
    .await?;
    if !exists {
        return Err(AppError::NotFound);
    }

    if let Some(v) = body.is_active {
        sqlx::query("UPDATE users SET is_active = ?, updated_at = UTC_TIMESTAMP() WHERE id = ?")
            .bind(v).bind(&id).execute(pool).await?;
    }
    if let Some(ref role) = body.role {
        if !matches!(role.as_str(), "admin" | "staff" | "customer") {
            return Err(AppError::Validation("Invalid role".into()));
        }
        sqlx::query("UPDATE users SET role = ?, updated_at = UTC_TIMESTAMP() WHERE id = ?")
            .bind(role).bind(&id).execute(pool).await?;
    }

    let row: UserRow = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, email, role, is_active FROM users WHERE id = ?",
    )
    .bind(&id)
    .fetch_one(pool)
    .await?;
    Ok(Json(row))
}

async fn delete_user(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    if id == admin.user_id {
        return Err(AppError::Validation("Cannot delete your own account".into()));
    }
    let affected = sqlx::query(
        "UPDATE users SET deleted_at = UTC_TIMESTAMP(), is_active = 0
         WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(&id)
    .execute(&state.pool)
    .await?
    .rows_affected();
    if affected == 0 {
        return Err(AppError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}
