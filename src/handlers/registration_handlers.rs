use actix_session::Session;
use actix_web::{HttpResponse, web};
use sqlx::PgPool;

use crate::auth::session::require_identity;
use crate::errors::AppError;
use crate::handlers::envelope::ApiResponse;
use crate::models::committee_registration::{self, RegisterRequest, RegistrationStatus, StatusRequest};

/// POST /committee-forms/register
pub async fn register(
    pool: web::Data<PgPool>,
    session: Session,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    let identity = require_identity(&session)?;

    let registration = committee_registration::register(&pool, &body, &identity).await?;
    log::info!(
        "User {} registered for committee form {} (divisions {:?})",
        identity.user_id, registration.committee_form_id, registration.division_ids
    );

    Ok(HttpResponse::Created().json(ApiResponse::with_message("Registration submitted", registration)))
}

/// GET /committee-forms/{id}/registrations
pub async fn list_for_form(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let identity = require_identity(&session)?;
    let registrations = committee_registration::find_for_form(&pool, path.into_inner(), &identity).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::data(registrations)))
}

/// GET /committee-forms/my-registrations
pub async fn mine(pool: web::Data<PgPool>, session: Session) -> Result<HttpResponse, AppError> {
    let identity = require_identity(&session)?;
    let registrations = committee_registration::find_for_user(&pool, identity.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::data(registrations)))
}

/// PATCH /committee-forms/registrations/{id}/status
pub async fn update_status(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    body: web::Json<StatusRequest>,
) -> Result<HttpResponse, AppError> {
    let identity = require_identity(&session)?;
    let id = path.into_inner();
    let status: RegistrationStatus = body.status.parse().map_err(AppError::invalid)?;

    let updated = committee_registration::update_status(&pool, id, status, &identity).await?;
    log::info!("User {} set registration {id} to {}", identity.user_id, status.as_str());

    Ok(HttpResponse::Ok().json(ApiResponse::with_message("Registration status updated", updated)))
}

/// DELETE /committee-forms/registrations/{id}
pub async fn delete(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let identity = require_identity(&session)?;
    let id = path.into_inner();

    committee_registration::delete(&pool, id, &identity).await?;
    log::info!("User {} deleted registration {id}", identity.user_id);

    Ok(HttpResponse::Ok().json(ApiResponse::message("Registration deleted")))
}
