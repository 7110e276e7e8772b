//! `/services` routes — the bookable service catalog.
//!
//! * `POST   /services`       — add a service (staff/admin)
//! * `GET    /services`       — list services
//! * `GET    /services/{id}`  — fetch one service
//! * `PUT    /services/{id}`  — update (staff/admin)
//! * `DELETE /services/{id}`  — deactivate; history keeps referencing it (staff/admin)

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    errors::{AppError, AppResult},
    middleware::auth_guard::AuthUser,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/services",      get(list_services).post(create_service))
        .route("/services/{id}", get(get_service).put(update_service).delete(deactivate_service))
}

// ── Row types ────────────────────────────────────────────────

#[derive(sqlx::FromRow, Serialize)]
struct ServiceRow {
    id:               String,
    name:             String,
    duration_minutes: i32,
    price:            f64,
    is_active:        bool,
    created_at:       NaiveDateTime,
}

// ── Request bodies ───────────────────────────────────────────

#[derive(Deserialize, Validate)]
struct CreateServiceBody {
    #[validate(length(min = 1, max = 150))]
    name:             String,
    #[validate(range(min = 1))]
    duration_minutes: i32,
    #[validate(range(min = 0.0))]
    price:            f64,
}

#[derive(Deserialize, Validate)]
struct UpdateServiceBody {
    #[validate(length(min = 1, max = 150))]
    name:             Option<String>,
    #[validate(range(min = 1))]
    duration_minutes: Option<i32>,
    #[validate(range(min = 0.0))]
    price:            Option<f64>,
    is_active:        Option<bool>,
}

async fn fetch_service(pool: &crate::db::Db, id: &str) -> AppResult<ServiceRow> {
    sqlx::query_as::<_, ServiceRow>(
        "SELECT id, name, duration_minutes, price, is_active, created_at
         FROM services WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound)
}

// ── Handlers ─────────────────────────────────────────────────

async fn create_service(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateServiceBody>,
) -> AppResult<(StatusCode, Json<ServiceRow>)> {
    if !user.is_privileged() {
        return Err(AppError::Forbidden);
    }
    body.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let pool = &state.pool;
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO services (id, name, duration_minutes, price, is_active, created_at)
         VALUES (?, ?, ?, ?, 1, UTC_TIMESTAMP())",
    )
    .bind(&id)
    .bind(&body.name)
    .bind(body.duration_minutes)
    .bind(body.price)
    .execute(pool)
    .await?;

    let row = fetch_service(pool, &id).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

async fn list_services(
    State(state): State<AppState>,
    Extension(_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<ServiceRow>>> {
    let rows: Vec<ServiceRow> = sqlx::query_as::<_, ServiceRow>(
        "SELECT id, name, duration_minutes, price, is_active, created_at
         FROM services ORDER BY name",
    )
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows))
}

async fn get_service(
    State(state): State<AppState>,
    Extension(_user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<Json<ServiceRow>> {
    let row = fetch_service(&state.pool, &id).await?;
    Ok(Json(row))
}

async fn update_service(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<UpdateServiceBody>,
) -> AppResult<Json<ServiceRow>> {
    if !user.is_privileged() {
        return Err(AppError::Forbidden);
    }
    body.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let pool = &state.pool;
    fetch_service(pool, &id).await?;

    if let Some(v) = &body.name {
        sqlx::query("UPDATE services SET name = ? WHERE id = ?")
            .bind(v).bind(&id).execute(pool).await?;
    }
    if let Some(v) = body.duration_minutes {
        sqlx::query("UPDATE services SET duration_minutes = ? WHERE id = ?")
            .bind(v).bind(&id).execute(pool).await?;
    }
    if let Some(v) = body.price {
        sqlx::query("UPDATE services SET price = ? WHERE id = ?")
            .bind(v).bind(&id).execute(pool).await?;
    }
    if let Some(v) = body.is_active {
        sqlx::query("UPDATE services SET is_active = ? WHERE id = ?")
            .bind(v).bind(&id).execute(pool).await?;
    }

    let row = fetch_service(pool, &id).await?;
    Ok(Json(row))
}

async fn deactivate_service(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    if !user.is_privileged() {
        return Err(AppError::Forbidden);
    }

    let affected = sqlx::query("UPDATE services SET is_active = 0 WHERE id = ?")
        .bind(&id)
        .execute(&state.pool)
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(AppError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}
