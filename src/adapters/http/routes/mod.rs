pub mod notifications;
pub mod signup;
pub mod vhost;

use axum::Router;
use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;

use crate::adapters::http::app_state::AppState;
use crate::app_error::{AppError, AppResult};
use crate::application::jwt;
use crate::use_cases::signup::Actor;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/signups", signup::router())
        .nest("/vhosts", vhost::router())
        .nest("/notifications", notifications::router())
}

/// Resolve the authenticated caller from the access-token cookie or a
/// bearer header. Token issuance is the identity provider's concern; this
/// service only verifies.
pub fn current_actor(
    jar: &CookieJar,
    headers: &HeaderMap,
    app_state: &AppState,
) -> AppResult<Actor> {
    let token = jar
        .get("access_token")
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            headers
                .get(axum::http::header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(str::to_string)
        })
        .ok_or(AppError::InvalidCredentials)?;

    let claims = jwt::verify(&token, &app_state.config.jwt_secret)?;
    Ok(Actor {
        id: claims.user_id()?,
        admin: claims.admin,
    })
}
