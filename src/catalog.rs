//! Read-only catalog lookups consumed by the appointment scheduler.

use crate::db::Db;
use crate::errors::AppResult;

#[derive(Debug, sqlx::FromRow)]
pub struct ServiceInfo {
    pub is_active:        bool,
    pub duration_minutes: i32,
    pub price:            f64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ComboInfo {
    pub is_active:      bool,
    pub total_duration: i32,
    pub total_price:    f64,
}

pub async fn lookup_service(pool: &Db, id: &str) -> AppResult<Option<ServiceInfo>> {
    let row = sqlx::query_as::<_, ServiceInfo>(
        "SELECT is_active, duration_minutes, price FROM services WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn lookup_combo(pool: &Db, id: &str) -> AppResult<Option<ComboInfo>> {
    let row = sqlx::query_as::<_, ComboInfo>(
        "SELECT is_active, total_duration, total_price FROM combos WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Count how many of `ids` reference an existing, active service.
///
/// Callers pass a de-duplicated id list and compare the count against its
/// length — a shortfall means "not found" or "inactive" without needing
/// to distinguish the two in a second query.
pub async fn count_active_services(pool: &Db, ids: &[String]) -> AppResult<i64> {
    if ids.is_empty() {
        return Ok(0);
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT COUNT(*) FROM services WHERE is_active = 1 AND id IN ({placeholders})"
    );

    let mut query = sqlx::query_scalar::<_, i64>(&sql);
    for id in ids {
        query = query.bind(id);
    }
    let count = query.fetch_one(pool).await?;
    Ok(count)
}
