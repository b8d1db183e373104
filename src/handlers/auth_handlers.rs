use actix_session::Session;
use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;
use sqlx::PgPool;
use std::net::{IpAddr, Ipv4Addr};

use crate::auth::rate_limit::RateLimiter;
use crate::auth::session::{require_identity, sign_in};
use crate::auth::password;
use crate::errors::AppError;
use crate::handlers::envelope::ApiResponse;
use crate::models::user;

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// POST /auth/login
pub async fn login(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    session: Session,
    limiter: web::Data<RateLimiter>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    // Rate-limit check BEFORE any database access
    let ip = req
        .peer_addr()
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if limiter.is_blocked(ip) {
        log::warn!("Login blocked for {ip}: too many failed attempts");
        return Ok(HttpResponse::TooManyRequests().json(ApiResponse::failure(
            "Too many failed login attempts. Please try again later.",
        )));
    }

    let found = user::find_by_username(&pool, body.username.trim()).await?;

    match found {
        Some(u) if password::verify_password(&body.password, &u.password) => {
            limiter.clear(ip);
            sign_in(&session, u.id, &u.username, u.role)?;
            log::info!("User '{}' (id {}) logged in", u.username, u.id);

            let profile = user::find_profile(&pool, u.id)
                .await?
                .ok_or(AppError::NotFound("User"))?;
            Ok(HttpResponse::Ok().json(ApiResponse::with_message("Logged in", profile)))
        }
        _ => {
            limiter.record_failure(ip);
            log::warn!("Failed login for '{}' from {ip}", body.username.trim());
            Ok(HttpResponse::Unauthorized().json(ApiResponse::failure("Invalid username or password")))
        }
    }
}

/// POST /auth/logout
pub async fn logout(session: Session) -> HttpResponse {
    session.purge();
    HttpResponse::Ok().json(ApiResponse::message("Logged out"))
}

/// GET /auth/me
pub async fn me(pool: web::Data<PgPool>, session: Session) -> Result<HttpResponse, AppError> {
    let identity = require_identity(&session)?;
    let profile = user::find_profile(&pool, identity.user_id)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    Ok(HttpResponse::Ok().json(ApiResponse::data(profile)))
}
