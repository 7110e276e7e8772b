//! `/staff` routes — the staff directory.
//!
//! * `POST   /staff`       — register a staff member (admin)
//! * `GET    /staff`       — list staff (staff/admin)
//! * `GET    /staff/{id}`  — fetch one staff member (staff/admin)
//! * `PUT    /staff/{id}`  — update mutable fields (admin); the joining
//!   date is immutable and not accepted here
//! * `DELETE /staff/{id}`  — hard delete; attendance rows cascade (admin)

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    errors::{is_unique_violation, AppError, AppResult},
    middleware::auth_guard::AuthUser,
    models::{Gender, StaffRole, UserRole},
    state::AppState,
    timeutil,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/staff",      get(list_staff).post(create_staff))
        .route("/staff/{id}", get(get_staff).put(update_staff).delete(delete_staff))
}

// ── Row types ────────────────────────────────────────────────

#[derive(sqlx::FromRow, Serialize)]
struct StaffRow {
    id:            String,
    name:          String,
    phone:         String,
    national_id:   String,
    date_of_birth: NaiveDate,
    gender:        Gender,
    address:       String,
    joined_on:     NaiveDate,
    salary:        f64,
    role:          StaffRole,
    is_active:     bool,
}

#[derive(Serialize)]
struct StaffResponse {
    #[serde(flatten)]
    staff: StaffRow,
    age:   i64,
}

impl From<StaffRow> for StaffResponse {
    fn from(staff: StaffRow) -> Self {
        let age = derived_age(staff.date_of_birth, timeutil::today());
        StaffResponse { staff, age }
    }
}

// ── Request bodies ───────────────────────────────────────────

#[derive(Deserialize, Validate)]
struct CreateStaffBody {
    #[validate(length(min = 1, max = 100))]
    name:          String,
    #[validate(custom(function = validate_phone))]
    phone:         String,
    #[validate(custom(function = validate_national_id))]
    national_id:   String,
    date_of_birth: String,
    gender:        String,
    #[validate(length(max = 255))]
    address:       String,
    /// Defaults to the creation day; immutable afterwards.
    joined_on:     Option<String>,
    #[validate(range(min = 0.0))]
    salary:        f64,
    role:          String,
}

#[derive(Deserialize, Validate)]
struct UpdateStaffBody {
    #[validate(length(min = 1, max = 100))]
    name:          Option<String>,
    #[validate(custom(function = validate_phone))]
    phone:         Option<String>,
    #[validate(custom(function = validate_national_id))]
    national_id:   Option<String>,
    date_of_birth: Option<String>,
    gender:        Option<String>,
    #[validate(length(max = 255))]
    address:       Option<String>,
    #[validate(range(min = 0.0))]
    salary:        Option<f64>,
    role:          Option<String>,
    is_active:     Option<bool>,
}

// ── Validation helpers ───────────────────────────────────────

fn all_digits(value: &str, expected_len: usize) -> bool {
    value.len() == expected_len && value.chars().all(|c| c.is_ascii_digit())
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if all_digits(phone, 10) {
        Ok(())
    } else {
        Err(ValidationError::new("phone must be exactly 10 digits"))
    }
}

fn validate_national_id(national_id: &str) -> Result<(), ValidationError> {
    if all_digits(national_id, 12) {
        Ok(())
    } else {
        Err(ValidationError::new("national_id must be exactly 12 digits"))
    }
}

fn parse_birth_date(raw: &str) -> AppResult<NaiveDate> {
    let dob = timeutil::parse_date(raw)?;
    if dob >= timeutil::today() {
        return Err(AppError::Validation("date_of_birth must be in the past".into()));
    }
    Ok(dob)
}

fn parse_gender(raw: &str) -> AppResult<Gender> {
    Gender::parse(raw).ok_or_else(|| AppError::Validation(format!("'{raw}' is not a valid gender")))
}

fn parse_role(raw: &str) -> AppResult<StaffRole> {
    StaffRole::parse(raw)
        .ok_or_else(|| AppError::Validation(format!("'{raw}' is not a valid staff role")))
}

/// Whole years since birth: floor(days / 365.25).
fn derived_age(date_of_birth: NaiveDate, on: NaiveDate) -> i64 {
    let days = (on - date_of_birth).num_days();
    (days as f64 / 365.25).floor() as i64
}

async fn fetch_staff(pool: &crate::db::Db, id: &str) -> AppResult<StaffRow> {
    sqlx::query_as::<_, StaffRow>(
        "SELECT id, name, phone, national_id, date_of_birth, gender, address,
                joined_on, salary, role, is_active
         FROM staff WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound)
}

// ── Handlers ─────────────────────────────────────────────────

async fn create_staff(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateStaffBody>,
) -> AppResult<(StatusCode, Json<StaffResponse>)> {
    if user.role != UserRole::Admin {
        return Err(AppError::Forbidden);
    }
    body.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let date_of_birth = parse_birth_date(&body.date_of_birth)?;
    let gender = parse_gender(&body.gender)?;
    let role = parse_role(&body.role)?;
    let joined_on = match &body.joined_on {
        Some(raw) => timeutil::parse_date(raw)?,
        None => timeutil::today(),
    };

    let pool = &state.pool;
    let id = Uuid::new_v4().to_string();
    let inserted = sqlx::query(
        "INSERT INTO staff
            (id, name, phone, national_id, date_of_birth, gender, address,
             joined_on, salary, role, is_active, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, UTC_TIMESTAMP())",
    )
    .bind(&id)
    .bind(&body.name)
    .bind(&body.phone)
    .bind(&body.national_id)
    .bind(date_of_birth)
    .bind(gender)
    .bind(&body.address)
    .bind(joined_on)
    .bind(body.salary)
    .bind(role)
    .execute(pool)
    .await;

    if let Err(err) = inserted {
        if is_unique_violation(&err) {
            return Err(AppError::Conflict(
                "Phone or national ID is already registered".into(),
            ));
        }
        return Err(err.into());
    }

    let row = fetch_staff(pool, &id).await?;
    Ok((StatusCode::CREATED, Json(row.into())))
}

async fn list_staff(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<Vec<StaffResponse>>> {
    if !user.is_privileged() {
        return Err(AppError::Forbidden);
    }

    let rows: Vec<StaffRow> = sqlx::query_as::<_, StaffRow>(
        "SELECT id, name, phone, national_id, date_of_birth, gender, address,
                joined_on, salary, role, is_active
         FROM staff ORDER BY name",
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(rows.into_iter().map(StaffResponse::from).collect()))
}

async fn get_staff(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<Json<StaffResponse>> {
    if !user.is_privileged() {
        return Err(AppError::Forbidden);
    }
    let row = fetch_staff(&state.pool, &id).await?;
    Ok(Json(row.into()))
}

async fn update_staff(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<UpdateStaffBody>,
) -> AppResult<Json<StaffResponse>> {
    if user.role != UserRole::Admin {
        return Err(AppError::Forbidden);
    }
    body.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let pool = &state.pool;
    // Existence first so updates on unknown ids report NOT_FOUND rather
    // than silently doing nothing.
    fetch_staff(pool, &id).await?;

    if let Some(v) = &body.name {
        sqlx::query("UPDATE staff SET name = ? WHERE id = ?")
            .bind(v).bind(&id).execute(pool).await?;
    }
    if let Some(v) = &body.phone {
        sqlx::query("UPDATE staff SET phone = ? WHERE id = ?")
            .bind(v).bind(&id).execute(pool).await?;
    }
    if let Some(v) = &body.national_id {
        sqlx::query("UPDATE staff SET national_id = ? WHERE id = ?")
            .bind(v).bind(&id).execute(pool).await?;
    }
    if let Some(raw) = &body.date_of_birth {
        let dob = parse_birth_date(raw)?;
        sqlx::query("UPDATE staff SET date_of_birth = ? WHERE id = ?")
            .bind(dob).bind(&id).execute(pool).await?;
    }
    if let Some(raw) = &body.gender {
        let gender = parse_gender(raw)?;
        sqlx::query("UPDATE staff SET gender = ? WHERE id = ?")
            .bind(gender).bind(&id).execute(pool).await?;
    }
    if let Some(v) = &body.address {
        sqlx::query("UPDATE staff SET address = ? WHERE id = ?")
            .bind(v).bind(&id).execute(pool).await?;
    }
    if let Some(v) = body.salary {
        sqlx::query("UPDATE staff SET salary = ? WHERE id = ?")
            .bind(v).bind(&id).execute(pool).await?;
    }
    if let Some(raw) = &body.role {
        let role = parse_role(raw)?;
        sqlx::query("UPDATE staff SET role = ? WHERE id = ?")
            .bind(role).bind(&id).execute(pool).await?;
    }
    if let Some(v) = body.is_active {
        sqlx::query("UPDATE staff SET is_active = ? WHERE id = ?")
            .bind(v).bind(&id).execute(pool).await?;
    }

    let row = fetch_staff(pool, &id).await?;
    Ok(Json(row.into()))
}

async fn delete_staff(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    if user.role != UserRole::Admin {
        return Err(AppError::Forbidden);
    }

    // Hard delete; the attendance FK cascades so no orphan records remain.
    let affected = sqlx::query("DELETE FROM staff WHERE id = ?")
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

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn age_is_floored_whole_years() {
        // The day before a 30th birthday is still 29.
        assert_eq!(derived_age(date(1994, 6, 15), date(2024, 6, 14)), 29);
        assert_eq!(derived_age(date(1994, 6, 15), date(2024, 6, 16)), 30);
        assert_eq!(derived_age(date(2024, 1, 1), date(2024, 6, 1)), 0);
    }

    #[test]
    fn phone_must_be_ten_digits() {
        assert!(validate_phone("0123456789").is_ok());
        assert!(validate_phone("012345678").is_err());
        assert!(validate_phone("01234567890").is_err());
        assert!(validate_phone("01234S6789").is_err());
        assert!(validate_phone("").is_err());
    }

    #[test]
    fn national_id_must_be_twelve_digits() {
        assert!(validate_national_id("012345678901").is_ok());
        assert!(validate_national_id("01234567890").is_err());
        assert!(validate_national_id("0123456789012").is_err());
        assert!(validate_national_id("01234567890x").is_err());
    }
}
