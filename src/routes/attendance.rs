//! `/attendance` routes — the per-(staff, day) attendance ledger.
//!
//! * `POST   /attendance`                         — check a staff member in or out
//! * `GET    /attendance/today`                   — present/absent/holiday partition of active staff
//! * `POST   /attendance/holidays`                — declare a holiday for all active staff (admin)
//! * `DELETE /attendance/holidays/{date}`         — remove a declared holiday (admin)
//! * `GET    /attendance/staff/{id}/summary`      — monthly counts and working hours

use axum::{
    extract::{Extension, Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    errors::{is_unique_violation, AppError, AppResult},
    middleware::auth_guard::AuthUser,
    models::{AttendanceStatus, UserRole},
    state::AppState,
    timeutil,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/attendance",                     post(record_attendance))
        .route("/attendance/today",               get(today_status))
        .route("/attendance/holidays",            post(declare_holiday))
        .route("/attendance/holidays/{date}",     delete(delete_holiday))
        .route("/attendance/staff/{id}/summary",  get(monthly_summary))
}

// ── Row types ────────────────────────────────────────────────

#[derive(sqlx::FromRow, Serialize)]
struct AttendanceRow {
    id:         String,
    staff_id:   String,
    work_date:  NaiveDate,
    check_in:   Option<NaiveDateTime>,
    check_out:  Option<NaiveDateTime>,
    status:     AttendanceStatus,
    is_holiday: bool,
    notes:      Option<String>,
}

#[derive(Serialize)]
struct AttendanceResponse {
    #[serde(flatten)]
    record:        AttendanceRow,
    working_hours: f64,
}

#[derive(sqlx::FromRow)]
struct TodayJoinRow {
    id:         String,
    name:       String,
    att_status: Option<AttendanceStatus>,
    is_holiday: Option<bool>,
}

#[derive(Serialize)]
struct TodayStaffEntry {
    staff_id: String,
    name:     String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status:   Option<AttendanceStatus>,
}

#[derive(Serialize)]
struct TodayStatusResponse {
    date:    NaiveDate,
    present: Vec<TodayStaffEntry>,
    absent:  Vec<TodayStaffEntry>,
    holiday: Vec<TodayStaffEntry>,
}

#[derive(Serialize, Default)]
struct MonthlySummary {
    present:       u32,
    absent:        u32,
    late:          u32,
    half_day:      u32,
    holidays:      u32,
    working_hours: f64,
}

// ── Request bodies ───────────────────────────────────────────

#[derive(Deserialize)]
struct RecordAttendanceBody {
    staff_id: String,
    /// `check_in` or `check_out`.
    action:   String,
    /// Defaults to the canonical current day.
    date:     Option<String>,
    /// Clock string (12h or 24h); defaults to the current time of day.
    time:     Option<String>,
    /// Optional check-in annotation: present (default), absent, late, half_day.
    status:   Option<String>,
}

#[derive(Deserialize)]
struct DeclareHolidayBody {
    date:  String,
    notes: Option<String>,
}

#[derive(Deserialize)]
struct SummaryQuery {
    month: u32,
    year:  i32,
}

// ── Helpers ──────────────────────────────────────────────────

async fn fetch_record(
    pool: &crate::db::Db,
    staff_id: &str,
    day: NaiveDate,
) -> AppResult<Option<AttendanceRow>> {
    let row = sqlx::query_as::<_, AttendanceRow>(
        "SELECT id, staff_id, work_date, check_in, check_out, status, is_holiday, notes
         FROM attendance WHERE staff_id = ? AND work_date = ?",
    )
    .bind(staff_id)
    .bind(day)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

async fn fetch_record_by_id(pool: &crate::db::Db, id: &str) -> AppResult<AttendanceRow> {
    sqlx::query_as::<_, AttendanceRow>(
        "SELECT id, staff_id, work_date, check_in, check_out, status, is_holiday, notes
         FROM attendance WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound)
}

fn respond(record: AttendanceRow) -> Json<AttendanceResponse> {
    let working_hours = timeutil::working_hours(record.check_in, record.check_out);
    Json(AttendanceResponse { record, working_hours })
}

// ── Handlers ─────────────────────────────────────────────────

async fn record_attendance(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<RecordAttendanceBody>,
) -> AppResult<Json<AttendanceResponse>> {
    if !user.is_privileged() {
        return Err(AppError::Forbidden);
    }

    let pool = &state.pool;
    let active: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM staff WHERE id = ? AND is_active = 1)",
    )
    .bind(&body.staff_id)
    .fetch_one(pool)
    .await?;
    if !active {
        return Err(AppError::NotFound);
    }

    let day = match &body.date {
        Some(raw) => timeutil::parse_date(raw)?,
        None => timeutil::today(),
    };
    let clock = match &body.time {
        Some(raw) => timeutil::parse_clock(raw)?,
        None => timeutil::now().time(),
    };
    let instant = timeutil::combine(day, clock);
    if instant > timeutil::now() {
        return Err(AppError::Validation(
            "Attendance cannot be recorded for a future instant".into(),
        ));
    }

    let existing = fetch_record(pool, &body.staff_id, day).await?;

    match body.action.trim() {
        "check_in" => {
            let status = match &body.status {
                Some(raw) => AttendanceStatus::parse_recordable(raw).ok_or_else(|| {
                    AppError::Validation(format!("'{raw}' is not a recordable attendance status"))
                })?,
                None => AttendanceStatus::Present,
            };

            match existing {
                None => {
                    let id = Uuid::new_v4().to_string();
                    let inserted = sqlx::query(
                        "INSERT INTO attendance
                            (id, staff_id, work_date, check_in, check_out, status, is_holiday, notes)
                         VALUES (?, ?, ?, ?, NULL, ?, 0, NULL)",
                    )
                    .bind(&id)
                    .bind(&body.staff_id)
                    .bind(day)
                    .bind(instant)
                    .bind(status)
                    .execute(pool)
                    .await;

                    if let Err(err) = inserted {
                        // A concurrent first check-in won the (staff, day) key.
                        if is_unique_violation(&err) {
                            return Err(AppError::AlreadyDone(
                                "Check-in already recorded for this day".into(),
                            ));
                        }
                        return Err(err.into());
                    }

                    Ok(respond(fetch_record_by_id(pool, &id).await?))
                }
                Some(record) => {
                    if record.is_holiday {
                        return Err(AppError::InvalidState(
                            format!("{day} is a declared holiday"),
                        ));
                    }
                    if record.check_in.is_some() {
                        return Err(AppError::AlreadyDone(
                            "Check-in already recorded for this day".into(),
                        ));
                    }
                    let affected = sqlx::query(
                        "UPDATE attendance SET check_in = ?, status = ?
                         WHERE id = ? AND check_in IS NULL",
                    )
                    .bind(instant)
                    .bind(status)
                    .bind(&record.id)
                    .execute(pool)
                    .await?
                    .rows_affected();
                    if affected == 0 {
                        return Err(AppError::AlreadyDone(
                            "Check-in already recorded for this day".into(),
                        ));
                    }
                    Ok(respond(fetch_record_by_id(pool, &record.id).await?))
                }
            }
        }
        "check_out" => {
            let record = existing.ok_or_else(|| {
                AppError::InvalidState("Cannot check out before checking in".into())
            })?;
            if record.is_holiday {
                return Err(AppError::InvalidState(format!("{day} is a declared holiday")));
            }
            let check_in = record.check_in.ok_or_else(|| {
                AppError::InvalidState("Cannot check out before checking in".into())
            })?;
            if record.check_out.is_some() {
                return Err(AppError::AlreadyDone(
                    "Check-out already recorded for this day".into(),
                ));
            }
            if instant < check_in {
                return Err(AppError::InvalidState(
                    "Check-out cannot be earlier than check-in".into(),
                ));
            }

            let affected = sqlx::query(
                "UPDATE attendance SET check_out = ? WHERE id = ? AND check_out IS NULL",
            )
            .bind(instant)
            .bind(&record.id)
            .execute(pool)
            .await?
            .rows_affected();
            if affected == 0 {
                return Err(AppError::AlreadyDone(
                    "Check-out already recorded for this day".into(),
                ));
            }
            Ok(respond(fetch_record_by_id(pool, &record.id).await?))
        }
        other => Err(AppError::Validation(format!(
            "'{other}' is not a valid action (expected check_in or check_out)"
        ))),
    }
}

#[derive(Serialize)]
struct HolidayUpsertResult {
    date:     NaiveDate,
    upserted: u32,
    failed:   u32,
}

/// Bulk idempotent upsert: one record per active staff member, each
/// written independently — one failure does not roll back the rest.
async fn declare_holiday(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<DeclareHolidayBody>,
) -> AppResult<Json<HolidayUpsertResult>> {
    if user.role != UserRole::Admin {
        return Err(AppError::Forbidden);
    }

    let day = timeutil::parse_date(&body.date)?;
    if day < timeutil::today() {
        return Err(AppError::Validation(
            "Holidays cannot be declared for past dates".into(),
        ));
    }

    let pool = &state.pool;
    let staff_ids: Vec<String> = sqlx::query_scalar("SELECT id FROM staff WHERE is_active = 1")
        .fetch_all(pool)
        .await?;

    let mut upserted = 0u32;
    let mut failed = 0u32;
    for staff_id in &staff_ids {
        let result = sqlx::query(
            "INSERT INTO attendance
                (id, staff_id, work_date, check_in, check_out, status, is_holiday, notes)
             VALUES (?, ?, ?, NULL, NULL, 'holiday', 1, ?)
             ON DUPLICATE KEY UPDATE
                status = 'holiday', is_holiday = 1, notes = VALUES(notes),
                check_in = NULL, check_out = NULL",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(staff_id)
        .bind(day)
        .bind(&body.notes)
        .execute(pool)
        .await;

        match result {
            Ok(_) => upserted += 1,
            Err(err) => {
                failed += 1;
                tracing::warn!(staff_id = %staff_id, date = %day, error = %err, "Holiday upsert failed");
            }
        }
    }

    tracing::info!(date = %day, upserted, failed, "Holiday declared");
    Ok(Json(HolidayUpsertResult { date: day, upserted, failed }))
}

async fn delete_holiday(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(date): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    if user.role != UserRole::Admin {
        return Err(AppError::Forbidden);
    }

    let day = timeutil::parse_date(&date)?;
    if day < timeutil::today() {
        return Err(AppError::Validation(
            "Holidays cannot be removed for past dates".into(),
        ));
    }

    let affected = sqlx::query("DELETE FROM attendance WHERE work_date = ? AND is_holiday = 1")
        .bind(day)
        .execute(&state.pool)
        .await?
        .rows_affected();

    if affected == 0 {
        return Err(AppError::NotFound);
    }

    Ok(Json(serde_json::json!({ "date": day, "deleted": affected })))
}

async fn monthly_summary(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(staff_id): Path<String>,
    Query(query): Query<SummaryQuery>,
) -> AppResult<Json<MonthlySummary>> {
    if !user.is_privileged() {
        return Err(AppError::Forbidden);
    }

    let (first, next_month) = month_bounds(query.year, query.month)
        .ok_or_else(|| AppError::Validation("month must be 1-12 and year a calendar year".into()))?;

    let pool = &state.pool;
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM staff WHERE id = ?)")
        .bind(&staff_id)
        .fetch_one(pool)
        .await?;
    if !exists {
        return Err(AppError::NotFound);
    }

    let records: Vec<AttendanceRow> = sqlx::query_as::<_, AttendanceRow>(
        "SELECT id, staff_id, work_date, check_in, check_out, status, is_holiday, notes
         FROM attendance
         WHERE staff_id = ? AND work_date >= ? AND work_date < ?
         ORDER BY work_date",
    )
    .bind(&staff_id)
    .bind(first)
    .bind(next_month)
    .fetch_all(pool)
    .await?;

    Ok(Json(summarize(&records)))
}

/// Half-open [first-of-month, first-of-next-month) range for a summary query.
fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next))
}

/// Days without a record contribute nothing — absences are only counted
/// when a record explicitly carries the `absent` status.
fn summarize(records: &[AttendanceRow]) -> MonthlySummary {
    let mut summary = MonthlySummary::default();
    for record in records {
        match record.status {
            AttendanceStatus::Present => summary.present += 1,
            AttendanceStatus::Absent  => summary.absent += 1,
            AttendanceStatus::Late    => summary.late += 1,
            AttendanceStatus::HalfDay => summary.half_day += 1,
            AttendanceStatus::Holiday => summary.holidays += 1,
        }
        summary.working_hours += timeutil::working_hours(record.check_in, record.check_out);
    }
    summary.working_hours = (summary.working_hours * 100.0).round() / 100.0;
    summary
}

async fn today_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<TodayStatusResponse>> {
    if !user.is_privileged() {
        return Err(AppError::Forbidden);
    }

    let today = timeutil::today();
    let rows: Vec<TodayJoinRow> = sqlx::query_as::<_, TodayJoinRow>(
        "SELECT st.id, st.name, a.status AS att_status, a.is_holiday
         FROM staff st
         LEFT JOIN attendance a ON a.staff_id = st.id AND a.work_date = ?
         WHERE st.is_active = 1
         ORDER BY st.name",
    )
    .bind(today)
    .fetch_all(&state.pool)
    .await?;

    let mut response = TodayStatusResponse {
        date:    today,
        present: Vec::new(),
        absent:  Vec::new(),
        holiday: Vec::new(),
    };

    for row in rows {
        let entry = TodayStaffEntry {
            staff_id: row.id,
            name:     row.name,
            status:   row.att_status,
        };
        if row.is_holiday.unwrap_or(false) {
            response.holiday.push(entry);
        } else if row.att_status.is_some() {
            response.present.push(entry);
        } else {
            response.absent.push(entry);
        }
    }

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: AttendanceStatus, hours: Option<(u32, u32)>) -> AttendanceRow {
        let day = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let (check_in, check_out) = match hours {
            Some((start, end)) => (
                Some(day.and_hms_opt(start, 0, 0).unwrap()),
                Some(day.and_hms_opt(end, 0, 0).unwrap()),
            ),
            None => (None, None),
        };
        AttendanceRow {
            id: "r".into(),
            staff_id: "s".into(),
            work_date: day,
            check_in,
            check_out,
            status,
            is_holiday: status == AttendanceStatus::Holiday,
            notes: None,
        }
    }

    #[test]
    fn summary_counts_each_status_and_sums_hours() {
        let records = vec![
            record(AttendanceStatus::Present, Some((9, 18))),
            record(AttendanceStatus::Present, Some((9, 17))),
            record(AttendanceStatus::Late, Some((11, 18))),
            record(AttendanceStatus::HalfDay, Some((9, 13))),
            record(AttendanceStatus::Absent, None),
            record(AttendanceStatus::Holiday, None),
        ];
        let summary = summarize(&records);
        assert_eq!(summary.present, 2);
        assert_eq!(summary.late, 1);
        assert_eq!(summary.half_day, 1);
        assert_eq!(summary.absent, 1);
        assert_eq!(summary.holidays, 1);
        assert_eq!(summary.working_hours, 9.0 + 8.0 + 7.0 + 4.0);
    }

    #[test]
    fn summary_of_no_records_is_all_zero() {
        // A month with no records reports zeros; unrecorded days are a
        // gap in the data, not implied absences.
        let summary = summarize(&[]);
        assert_eq!(summary.present, 0);
        assert_eq!(summary.absent, 0);
        assert_eq!(summary.working_hours, 0.0);
    }

    #[test]
    fn month_bounds_are_half_open_and_roll_the_year() {
        let (first, next) = month_bounds(2024, 6).unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(next, NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());

        let (first, next) = month_bounds(2024, 12).unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
        assert_eq!(next, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());

        assert!(month_bounds(2024, 0).is_none());
        assert!(month_bounds(2024, 13).is_none());
    }
}
