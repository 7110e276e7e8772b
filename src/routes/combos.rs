//! `/combos` routes — bundled service packages sold as one bookable unit.
//!
//! Combo totals are denormalized snapshots: recomputed from the member
//! services only when the combo itself is created or updated. A member
//! service changing price or going inactive later leaves the stored
//! totals untouched until the combo's own next update.
//!
//! * `POST   /combos`       — create (staff/admin)
//! * `GET    /combos`       — list
//! * `GET    /combos/{id}`  — fetch with ordered member services
//! * `PUT    /combos/{id}`  — update and recompute totals (staff/admin)
//! * `DELETE /combos/{id}`  — deactivate (staff/admin)

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
    catalog,
    errors::{AppError, AppResult},
    middleware::auth_guard::AuthUser,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/combos",      get(list_combos).post(create_combo))
        .route("/combos/{id}", get(get_combo).put(update_combo).delete(deactivate_combo))
}

// ── Row types ────────────────────────────────────────────────

#[derive(sqlx::FromRow, Serialize)]
struct ComboRow {
    id:               String,
    name:             String,
    discount_percent: f64,
    total_duration:   i32,
    total_price:      f64,
    is_active:        bool,
    created_at:       NaiveDateTime,
}

#[derive(Serialize)]
struct ComboWithServices {
    #[serde(flatten)]
    combo:       ComboRow,
    service_ids: Vec<String>,
}

// ── Request bodies ───────────────────────────────────────────

#[derive(Deserialize, Validate)]
struct CreateComboBody {
    #[validate(length(min = 1, max = 150))]
    name:             String,
    #[validate(range(min = 0.0, max = 100.0))]
    discount_percent: f64,
    /// Ordered member services; position is the list index.
    #[validate(length(min = 1))]
    service_ids:      Vec<String>,
}

#[derive(Deserialize, Validate)]
struct UpdateComboBody {
    #[validate(length(min = 1, max = 150))]
    name:             Option<String>,
    #[validate(range(min = 0.0, max = 100.0))]
    discount_percent: Option<f64>,
    #[validate(length(min = 1))]
    service_ids:      Option<Vec<String>>,
    is_active:        Option<bool>,
}

// ── Pricing ──────────────────────────────────────────────────

struct MemberService {
    duration_minutes: i32,
    price:            f64,
    is_active:        bool,
}

/// Denormalized combo totals: sums over the *active* members only, with
/// the percentage discount applied to the price and the result floored
/// at zero.
fn combo_totals(members: &[MemberService], discount_percent: f64) -> (i32, f64) {
    let total_duration: i32 = members
        .iter()
        .filter(|m| m.is_active)
        .map(|m| m.duration_minutes)
        .sum();
    let gross: f64 = members
        .iter()
        .filter(|m| m.is_active)
        .map(|m| m.price)
        .sum();

    let discounted = (gross * (100.0 - discount_percent)) / 100.0;
    let total_price = if discounted < 0.0 { 0.0 } else { discounted };
    (total_duration, (total_price * 100.0).round() / 100.0)
}

/// Resolve member services in list order. Every referenced id must exist;
/// inactive members stay on the list but contribute nothing to totals.
async fn resolve_members(
    pool: &crate::db::Db,
    service_ids: &[String],
) -> AppResult<Vec<MemberService>> {
    let mut members = Vec::with_capacity(service_ids.len());
    for id in service_ids {
        let info = catalog::lookup_service(pool, id)
            .await?
            .ok_or(AppError::NotFound)?;
        members.push(MemberService {
            duration_minutes: info.duration_minutes,
            price:            info.price,
            is_active:        info.is_active,
        });
    }
    Ok(members)
}

async fn fetch_combo(pool: &crate::db::Db, id: &str) -> AppResult<ComboRow> {
    sqlx::query_as::<_, ComboRow>(
        "SELECT id, name, discount_percent, total_duration, total_price, is_active, created_at
         FROM combos WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound)
}

async fn fetch_member_ids(pool: &crate::db::Db, combo_id: &str) -> AppResult<Vec<String>> {
    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT service_id FROM combo_services WHERE combo_id = ? ORDER BY position",
    )
    .bind(combo_id)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

// ── Handlers ─────────────────────────────────────────────────

async fn create_combo(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateComboBody>,
) -> AppResult<(StatusCode, Json<ComboWithServices>)> {
    if !user.is_privileged() {
        return Err(AppError::Forbidden);
    }
    body.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let pool = &state.pool;
    let members = resolve_members(pool, &body.service_ids).await?;
    let (total_duration, total_price) = combo_totals(&members, body.discount_percent);

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO combos
            (id, name, discount_percent, total_duration, total_price, is_active, created_at)
         VALUES (?, ?, ?, ?, ?, 1, UTC_TIMESTAMP())",
    )
    .bind(&id)
    .bind(&body.name)
    .bind(body.discount_percent)
    .bind(total_duration)
    .bind(total_price)
    .execute(pool)
    .await?;

    for (position, service_id) in body.service_ids.iter().enumerate() {
        sqlx::query(
            "INSERT INTO combo_services (combo_id, service_id, position) VALUES (?, ?, ?)",
        )
        .bind(&id)
        .bind(service_id)
        .bind(position as i32)
        .execute(pool)
        .await?;
    }

    let combo = fetch_combo(pool, &id).await?;
    Ok((
        StatusCode::CREATED,
        Json(ComboWithServices { combo, service_ids: body.service_ids }),
    ))
}

async fn list_combos(
    State(state): State<AppState>,
    Extension(_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<ComboRow>>> {
    let rows: Vec<ComboRow> = sqlx::query_as::<_, ComboRow>(
        "SELECT id, name, discount_percent, total_duration, total_price, is_active, created_at
         FROM combos ORDER BY name",
    )
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows))
}

async fn get_combo(
    State(state): State<AppState>,
    Extension(_user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<Json<ComboWithServices>> {
    let pool = &state.pool;
    let combo = fetch_combo(pool, &id).await?;
    let service_ids = fetch_member_ids(pool, &id).await?;
    Ok(Json(ComboWithServices { combo, service_ids }))
}

async fn update_combo(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<UpdateComboBody>,
) -> AppResult<Json<ComboWithServices>> {
    if !user.is_privileged() {
        return Err(AppError::Forbidden);
    }
    // Bounds are checked before any write — an out-of-range discount
    // leaves the stored combo untouched.
    body.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let pool = &state.pool;
    let current = fetch_combo(pool, &id).await?;

    if let Some(service_ids) = &body.service_ids {
        // Replacing the member list: validate the new one fully first.
        resolve_members(pool, service_ids).await?;
        sqlx::query("DELETE FROM combo_services WHERE combo_id = ?")
            .bind(&id)
            .execute(pool)
            .await?;
        for (position, service_id) in service_ids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO combo_services (combo_id, service_id, position) VALUES (?, ?, ?)",
            )
            .bind(&id)
            .bind(service_id)
            .bind(position as i32)
            .execute(pool)
            .await?;
        }
    }

    if let Some(v) = &body.name {
        sqlx::query("UPDATE combos SET name = ? WHERE id = ?")
            .bind(v).bind(&id).execute(pool).await?;
    }
    if let Some(v) = body.is_active {
        sqlx::query("UPDATE combos SET is_active = ? WHERE id = ?")
            .bind(v).bind(&id).execute(pool).await?;
    }

    // Any update recomputes the snapshot from the current member list and
    // discount — this is the only point where staleness is corrected.
    let discount = body.discount_percent.unwrap_or(current.discount_percent);
    let member_ids = fetch_member_ids(pool, &id).await?;
    let members = resolve_members(pool, &member_ids).await?;
    let (total_duration, total_price) = combo_totals(&members, discount);

    sqlx::query(
        "UPDATE combos SET discount_percent = ?, total_duration = ?, total_price = ? WHERE id = ?",
    )
    .bind(discount)
    .bind(total_duration)
    .bind(total_price)
    .bind(&id)
    .execute(pool)
    .await?;

    let combo = fetch_combo(pool, &id).await?;
    Ok(Json(ComboWithServices { combo, service_ids: member_ids }))
}

async fn deactivate_combo(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    if !user.is_privileged() {
        return Err(AppError::Forbidden);
    }

    let affected = sqlx::query("UPDATE combos SET is_active = 0 WHERE id = ?")
        .bind(&id)
        .execute(&state.pool)
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(AppError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(price: f64, duration: i32, is_active: bool) -> MemberService {
        MemberService { duration_minutes: duration, price, is_active }
    }

    #[test]
    fn discount_applies_to_the_sum() {
        let members = vec![
            member(100.0, 30, true),
            member(200.0, 45, true),
            member(300.0, 60, true),
        ];
        let (duration, price) = combo_totals(&members, 10.0);
        assert_eq!(duration, 135);
        assert_eq!(price, 540.0);
    }

    #[test]
    fn inactive_members_contribute_nothing() {
        let members = vec![
            member(100.0, 30, true),
            member(200.0, 45, false),
        ];
        let (duration, price) = combo_totals(&members, 0.0);
        assert_eq!(duration, 30);
        assert_eq!(price, 100.0);
    }

    #[test]
    fn total_price_floors_at_zero() {
        let members = vec![member(50.0, 30, true)];
        let (_, price) = combo_totals(&members, 100.0);
        assert_eq!(price, 0.0);

        let (_, price) = combo_totals(&[], 10.0);
        assert_eq!(price, 0.0);
    }
}
