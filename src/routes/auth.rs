//! `/auth` routes — session plumbing.
//!
//! * `POST /auth/register` — customer self-registration (public)
//! * `POST /auth/login`    — issue a session cookie (public)
//! * `POST /auth/logout`   — revoke the session
//! * `GET  /auth/me`       — current principal

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_cookies::{cookie::time::Duration as CookieDuration, Cookie, Cookies};
use uuid::Uuid;

use crate::{
    auth::{generate_token, hash_password, validate_password_strength, verify_password},
    errors::{is_unique_violation, AppError, AppResult},
    middleware::auth_guard::{AuthUser, SESSION_COOKIE},
    state::AppState,
};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login",    post(login))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/me",     get(me))
}

// ── Request / response types ─────────────────────────────────

#[derive(Deserialize)]
struct RegisterBody {
    username: String,
    email:    Option<String>,
    password: String,
}

#[derive(Deserialize)]
struct LoginBody {
    username: String,
    password: String,
}

#[derive(sqlx::FromRow, Serialize)]
struct MeRow {
    id:       String,
    username: String,
    email:    Option<String>,
    role:     String,
}

// ── Cookie helpers ───────────────────────────────────────────

fn session_cookie(token: String, ttl_hours: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .same_site(tower_cookies::cookie::SameSite::Strict)
        .secure(secure)
        .path("/")
        .max_age(CookieDuration::hours(ttl_hours))
        .build()
}

fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .same_site(tower_cookies::cookie::SameSite::Strict)
        .secure(secure)
        .path("/")
        .max_age(CookieDuration::ZERO)
        .build()
}

// ── Handlers ─────────────────────────────────────────────────

async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> AppResult<(StatusCode, Json<MeRow>)> {
    let username = body.username.trim();
    if username.is_empty() || username.len() > 100 {
        return Err(AppError::Validation("username must be 1-100 characters".into()));
    }
    validate_password_strength(&body.password)?;

    let pool = &state.pool;
    let id = Uuid::new_v4().to_string();
    let hash = hash_password(&body.password)?;

    let inserted = sqlx::query(
        "INSERT INTO users (id, username, email, password_hash, role, is_active, created_at, updated_at)
         VALUES (?, ?, ?, ?, 'customer', 1, UTC_TIMESTAMP(), UTC_TIMESTAMP())",
    )
    .bind(&id)
    .bind(username)
    .bind(&body.email)
    .bind(&hash)
    .execute(pool)
    .await;

    if let Err(err) = inserted {
        if is_unique_violation(&err) {
            return Err(AppError::Conflict("Username is already taken".into()));
        }
        return Err(err.into());
    }

    let row: MeRow = sqlx::query_as::<_, MeRow>(
        "SELECT id, username, email, role FROM users WHERE id = ?",
    )
    .bind(&id)
    .fetch_one(pool)
    .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(body): Json<LoginBody>,
) -> AppResult<Json<MeRow>> {
    #[derive(sqlx::FromRow)]
    struct LoginRow {
        id:            String,
        password_hash: String,
    }

    let pool = &state.pool;
    let row: LoginRow = sqlx::query_as::<_, LoginRow>(
        "SELECT id, password_hash
         FROM users
         WHERE username = ? AND is_active = 1 AND deleted_at IS NULL",
    )
    .bind(body.username.trim())
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::Unauthorized)?;

    verify_password(&body.password, &row.password_hash)?;

    let token = generate_token();
    sqlx::query(
        "INSERT INTO user_sessions (id, user_id, token, expires_at, created_at)
         VALUES (?, ?, ?, DATE_ADD(UTC_TIMESTAMP(), INTERVAL ? HOUR), UTC_TIMESTAMP())",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&row.id)
    .bind(&token)
    .bind(state.config.session_ttl_hours)
    .execute(pool)
    .await?;

    cookies.add(session_cookie(
        token,
        state.config.session_ttl_hours,
        !state.config.is_development(),
    ));

    let me: MeRow = sqlx::query_as::<_, MeRow>(
        "SELECT id, username, email, role FROM users WHERE id = ?",
    )
    .bind(&row.id)
    .fetch_one(pool)
    .await?;
    Ok(Json(me))
}

async fn logout(
    State(state): State<AppState>,
    cookies: Cookies,
    Extension(_user): Extension<AuthUser>,
) -> AppResult<StatusCode> {
    if let Some(cookie) = cookies.get(SESSION_COOKIE) {
        sqlx::query("DELETE FROM user_sessions WHERE token = ?")
            .bind(cookie.value())
            .execute(&state.pool)
            .await?;
    }
    cookies.add(clear_session_cookie(!state.config.is_development()));
    Ok(StatusCode::NO_CONTENT)
}

async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<MeRow>> {
    let row: MeRow = sqlx::query_as::<_, MeRow>(
        "SELECT id, username, email, role FROM users WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(&user.user_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::NotFound)?;
    Ok(Json(row))
}
