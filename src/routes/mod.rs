use axum::{middleware, Router};
use crate::{
    middleware::auth_guard::require_auth,
    state::AppState,
};

mod admin;
mod appointments;
mod attendance;
mod auth;
mod combos;
mod services;
mod staff;

/// Build the full `/api/v1` router.
///
/// Public auth routes are left unprotected; every other route is wrapped in
/// the session-based [`require_auth`] middleware.
pub fn all_routes(state: AppState) -> Router<AppState> {
    let auth_mw = middleware::from_fn_with_state(state, require_auth);
    Router::new()
        .merge(auth::public_router())
        .merge(
            Router::new()
                .merge(auth::router())
                .merge(appointments::router())
                .merge(attendance::router())
                .merge(staff::router())
                .merge(services::router())
                .merge(combos::router())
                .merge(admin::router())
                .route_layer(auth_mw),
        )
}
