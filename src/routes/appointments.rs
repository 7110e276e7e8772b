//! `/appointments` routes — the slot-booking ledger.
//!
//! * `POST  /appointments`                  — book a slot (customer, or staff on a customer's behalf)
//! * `GET   /appointments/today`            — today's active bookings with computed durations (staff)
//! * `GET   /appointments/{id}`             — fetch one booking (owner or staff)
//! * `PATCH /appointments/{id}/status`      — overwrite status (staff)
//! * `POST  /appointments/{id}/cancel`      — self-service cancel (owning customer)
//! * `PATCH /appointments/{id}/reschedule`  — move to a new date/slot (staff)

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    catalog,
    errors::{is_unique_violation, AppError, AppResult},
    middleware::auth_guard::AuthUser,
    models::{AppointmentStatus, TimeSlot, UserRole},
    state::AppState,
    timeutil,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments",                   post(create_appointment))
        .route("/appointments/today",             get(list_today))
        .route("/appointments/{id}",              get(get_appointment))
        .route("/appointments/{id}/status",       patch(update_status))
        .route("/appointments/{id}/cancel",       post(cancel_appointment))
        .route("/appointments/{id}/reschedule",   patch(reschedule_appointment))
}

// ── Row types ────────────────────────────────────────────────

#[derive(sqlx::FromRow, Serialize)]
struct AppointmentRow {
    id:               String,
    customer_id:      String,
    combo_id:         Option<String>,
    appointment_date: NaiveDate,
    time_slot:        TimeSlot,
    status:           AppointmentStatus,
    notes:            Option<String>,
    created_at:       NaiveDateTime,
}

#[derive(Serialize)]
struct AppointmentWithServices {
    #[serde(flatten)]
    appointment: AppointmentRow,
    service_ids: Vec<String>,
}

#[derive(sqlx::FromRow, Serialize)]
struct TodayRow {
    id:               String,
    customer_id:      String,
    combo_id:         Option<String>,
    appointment_date: NaiveDate,
    time_slot:        TimeSlot,
    status:           AppointmentStatus,
    notes:            Option<String>,
    total_duration:   i64,
}

// ── Request bodies ───────────────────────────────────────────

#[derive(Deserialize)]
struct CreateAppointmentBody {
    /// Required when a staff/admin books on a customer's behalf;
    /// customers book for themselves.
    customer_id: Option<String>,
    service_ids: Option<Vec<String>>,
    combo_id:    Option<String>,
    date:        String,
    time_slot:   String,
    notes:       Option<String>,
}

#[derive(Deserialize)]
struct UpdateStatusBody {
    status: String,
}

#[derive(Deserialize)]
struct RescheduleBody {
    date:      String,
    time_slot: String,
}

// ── Helpers ──────────────────────────────────────────────────

/// The derived uniqueness key behind the one-booking-per-slot invariant.
///
/// Non-NULL exactly while the appointment occupies its slot; the UNIQUE
/// index on this column is what actually rejects a concurrent double
/// booking, the pre-checks only produce the friendlier error first.
fn slot_key(date: NaiveDate, slot: TimeSlot, status: AppointmentStatus) -> Option<String> {
    status.holds_slot().then(|| format!("{date}#{slot}"))
}

/// True when a pending/confirmed appointment other than `exclude_id`
/// already occupies (date, slot).
async fn slot_taken(
    pool: &crate::db::Db,
    date: NaiveDate,
    slot: TimeSlot,
    exclude_id: Option<&str>,
) -> AppResult<bool> {
    let taken: bool = match exclude_id {
        Some(id) => {
            sqlx::query_scalar(
                "SELECT EXISTS(
                    SELECT 1 FROM appointments
                    WHERE appointment_date = ? AND time_slot = ?
                      AND status IN ('pending', 'confirmed')
                      AND id <> ?
                )",
            )
            .bind(date)
            .bind(slot)
            .bind(id)
            .fetch_one(pool)
            .await?
        }
        None => {
            sqlx::query_scalar(
                "SELECT EXISTS(
                    SELECT 1 FROM appointments
                    WHERE appointment_date = ? AND time_slot = ?
                      AND status IN ('pending', 'confirmed')
                )",
            )
            .bind(date)
            .bind(slot)
            .fetch_one(pool)
            .await?
        }
    };
    Ok(taken)
}

async fn fetch_appointment(pool: &crate::db::Db, id: &str) -> AppResult<AppointmentRow> {
    sqlx::query_as::<_, AppointmentRow>(
        "SELECT id, customer_id, combo_id, appointment_date, time_slot, status, notes, created_at
         FROM appointments WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound)
}

async fn fetch_service_ids(pool: &crate::db::Db, appointment_id: &str) -> AppResult<Vec<String>> {
    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT service_id FROM appointment_services WHERE appointment_id = ? ORDER BY position",
    )
    .bind(appointment_id)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

fn parse_slot(s: &str) -> AppResult<TimeSlot> {
    TimeSlot::parse(s)
        .ok_or_else(|| AppError::Validation(format!("'{s}' is not a bookable time slot")))
}

// ── Handlers ─────────────────────────────────────────────────

async fn create_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateAppointmentBody>,
) -> AppResult<(StatusCode, Json<AppointmentWithServices>)> {
    let pool = &state.pool;

    // Customers always book for themselves; staff must name a customer.
    let customer_id = match user.role {
        UserRole::Customer => {
            if body.customer_id.as_deref().is_some_and(|c| c != user.user_id) {
                return Err(AppError::Forbidden);
            }
            user.user_id.clone()
        }
        UserRole::Admin | UserRole::Staff => {
            let customer_id = body
                .customer_id
                .clone()
                .ok_or_else(|| AppError::Validation("customer_id is required".into()))?;
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM users WHERE id = ? AND role = 'customer' AND deleted_at IS NULL)",
            )
            .bind(&customer_id)
            .fetch_one(pool)
            .await?;
            if !exists {
                return Err(AppError::NotFound);
            }
            customer_id
        }
    };

    let service_ids = body.service_ids.unwrap_or_default();
    if service_ids.is_empty() == body.combo_id.is_none() {
        return Err(AppError::Validation(
            "Provide either a non-empty service_ids list or a combo_id, not both".into(),
        ));
    }

    let date = timeutil::parse_date(&body.date)?;
    let slot = parse_slot(&body.time_slot)?;

    // Conflict check runs before catalog validation so a taken slot is
    // always reported as CONFLICT, whatever else is wrong with the body.
    if slot_taken(pool, date, slot, None).await? {
        return Err(AppError::Conflict(format!(
            "Time slot {slot} on {date} is already booked"
        )));
    }

    let distinct_ids: Vec<String> = if let Some(combo_id) = &body.combo_id {
        let combo = catalog::lookup_combo(pool, combo_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !combo.is_active {
            return Err(AppError::NotFound);
        }
        Vec::new()
    } else {
        let mut distinct: Vec<String> = Vec::new();
        for id in &service_ids {
            if !distinct.contains(id) {
                distinct.push(id.clone());
            }
        }
        // One count catches both unknown and inactive ids.
        let matched = catalog::count_active_services(pool, &distinct).await?;
        if matched != distinct.len() as i64 {
            return Err(AppError::NotFound);
        }
        distinct
    };

    let id = Uuid::new_v4().to_string();
    let key = slot_key(date, slot, AppointmentStatus::Pending);
    let inserted = sqlx::query(
        "INSERT INTO appointments
            (id, customer_id, combo_id, appointment_date, time_slot, status, notes, slot_key, created_at)
         VALUES (?, ?, ?, ?, ?, 'pending', ?, ?, UTC_TIMESTAMP())",
    )
    .bind(&id)
    .bind(&customer_id)
    .bind(&body.combo_id)
    .bind(date)
    .bind(slot)
    .bind(&body.notes)
    .bind(&key)
    .execute(pool)
    .await;

    if let Err(err) = inserted {
        // Lost the race against a concurrent booking for the same slot.
        if is_unique_violation(&err) {
            return Err(AppError::Conflict(format!(
                "Time slot {slot} on {date} is already booked"
            )));
        }
        return Err(err.into());
    }

    for (position, service_id) in distinct_ids.iter().enumerate() {
        sqlx::query(
            "INSERT INTO appointment_services (appointment_id, service_id, position) VALUES (?, ?, ?)",
        )
        .bind(&id)
        .bind(service_id)
        .bind(position as i32)
        .execute(pool)
        .await?;
    }

    let appointment = fetch_appointment(pool, &id).await?;
    Ok((
        StatusCode::CREATED,
        Json(AppointmentWithServices { appointment, service_ids: distinct_ids }),
    ))
}

async fn get_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<Json<AppointmentWithServices>> {
    let pool = &state.pool;
    let appointment = fetch_appointment(pool, &id).await?;

    if !user.is_privileged() && appointment.customer_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    let service_ids = fetch_service_ids(pool, &id).await?;
    Ok(Json(AppointmentWithServices { appointment, service_ids }))
}

/// Unconditional status overwrite: any status may be set from any other.
/// The slot key is recomputed on every write, so the one transition that
/// can still fail is a flip into pending/confirmed on an occupied slot.
async fn update_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusBody>,
) -> AppResult<Json<AppointmentRow>> {
    if !user.is_privileged() {
        return Err(AppError::Forbidden);
    }

    let status = AppointmentStatus::parse(&body.status)
        .ok_or_else(|| AppError::Validation(format!("'{}' is not a valid status", body.status)))?;

    let pool = &state.pool;
    let current = fetch_appointment(pool, &id).await?;

    let key = slot_key(current.appointment_date, current.time_slot, status);
    let updated = sqlx::query("UPDATE appointments SET status = ?, slot_key = ? WHERE id = ?")
        .bind(status)
        .bind(&key)
        .bind(&id)
        .execute(pool)
        .await;

    if let Err(err) = updated {
        if is_unique_violation(&err) {
            return Err(AppError::Conflict(format!(
                "Another appointment already holds {} on {}",
                current.time_slot, current.appointment_date
            )));
        }
        return Err(err.into());
    }

    let row = fetch_appointment(pool, &id).await?;
    Ok(Json(row))
}

async fn cancel_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<Json<AppointmentRow>> {
    let pool = &state.pool;

    // Keyed by (id, customer) — cancelling someone else's booking is
    // indistinguishable from cancelling a booking that does not exist.
    let current: AppointmentRow = sqlx::query_as::<_, AppointmentRow>(
        "SELECT id, customer_id, combo_id, appointment_date, time_slot, status, notes, created_at
         FROM appointments WHERE id = ? AND customer_id = ?",
    )
    .bind(&id)
    .bind(&user.user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound)?;

    if matches!(
        current.status,
        AppointmentStatus::Completed | AppointmentStatus::Cancelled
    ) {
        return Err(AppError::InvalidState(format!(
            "Cannot cancel a {} appointment",
            current.status
        )));
    }

    sqlx::query("UPDATE appointments SET status = 'cancelled', slot_key = NULL WHERE id = ?")
        .bind(&id)
        .execute(pool)
        .await?;

    let row = fetch_appointment(pool, &id).await?;
    Ok(Json(row))
}

async fn reschedule_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<RescheduleBody>,
) -> AppResult<Json<AppointmentRow>> {
    if !user.is_privileged() {
        return Err(AppError::Forbidden);
    }

    let date = timeutil::parse_date(&body.date)?;
    let slot = parse_slot(&body.time_slot)?;

    let pool = &state.pool;
    let current = fetch_appointment(pool, &id).await?;

    if matches!(
        current.status,
        AppointmentStatus::Completed | AppointmentStatus::Cancelled
    ) {
        return Err(AppError::InvalidState(format!(
            "Cannot reschedule a {} appointment",
            current.status
        )));
    }

    if slot_taken(pool, date, slot, Some(&id)).await? {
        return Err(AppError::Conflict(format!(
            "Time slot {slot} on {date} is already booked"
        )));
    }

    // Status is forced to `rescheduled` whatever it was before, so the
    // appointment holds neither its old slot nor the new one.
    sqlx::query(
        "UPDATE appointments
         SET appointment_date = ?, time_slot = ?, status = 'rescheduled', slot_key = NULL
         WHERE id = ?",
    )
    .bind(date)
    .bind(slot)
    .bind(&id)
    .execute(pool)
    .await?;

    let row = fetch_appointment(pool, &id).await?;
    Ok(Json(row))
}

async fn list_today(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<Vec<TodayRow>>> {
    if !user.is_privileged() {
        return Err(AppError::Forbidden);
    }

    let pool = &state.pool;
    let today = timeutil::today();

    let mut rows: Vec<TodayRow> = sqlx::query_as::<_, TodayRow>(
        "SELECT
            a.id,
            a.customer_id,
            a.combo_id,
            a.appointment_date,
            a.time_slot,
            a.status,
            a.notes,
            CAST(
                CASE WHEN a.combo_id IS NOT NULL THEN COALESCE(c.total_duration, 0)
                     ELSE COALESCE((
                        SELECT SUM(s.duration_minutes)
                        FROM appointment_services aps
                        JOIN services s ON s.id = aps.service_id
                        WHERE aps.appointment_id = a.id
                     ), 0)
                END
            AS SIGNED) AS total_duration
         FROM appointments a
         LEFT JOIN combos c ON c.id = a.combo_id
         WHERE a.appointment_date = ?
           AND a.status IN ('pending', 'confirmed', 'rescheduled')",
    )
    .bind(today)
    .fetch_all(pool)
    .await?;

    // Slot order is enumeration order, not the lexical order SQL would give.
    rows.sort_by_key(|r| r.time_slot);

    Ok(Json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn slot_key_set_only_while_slot_is_held() {
        let key = slot_key(day(), TimeSlot::TenAm, AppointmentStatus::Pending);
        assert_eq!(key.as_deref(), Some("2024-06-01#10:00 AM"));
        assert!(slot_key(day(), TimeSlot::TenAm, AppointmentStatus::Confirmed).is_some());

        assert_eq!(slot_key(day(), TimeSlot::TenAm, AppointmentStatus::Cancelled), None);
        assert_eq!(slot_key(day(), TimeSlot::TenAm, AppointmentStatus::Completed), None);
        // A rescheduled appointment blocks neither its old nor its new slot.
        assert_eq!(slot_key(day(), TimeSlot::TenAm, AppointmentStatus::Rescheduled), None);
    }

    #[test]
    fn slot_keys_differ_across_dates_and_slots() {
        let a = slot_key(day(), TimeSlot::TenAm, AppointmentStatus::Pending).unwrap();
        let b = slot_key(day(), TimeSlot::ElevenAm, AppointmentStatus::Pending).unwrap();
        let c = slot_key(
            NaiveDate::from_ymd_opt(2024, 6, 2).unwrap(),
            TimeSlot::TenAm,
            AppointmentStatus::Pending,
        )
        .unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
