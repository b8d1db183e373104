use actix_session::Session;
use actix_web::{HttpResponse, web};
use sqlx::PgPool;

use crate::auth::session::{require_identity, require_officer};
use crate::errors::AppError;
use crate::handlers::envelope::ApiResponse;
use crate::models::committee_form::{self, CommitteeFormRequest};

/// GET /committee-forms
pub async fn list(pool: web::Data<PgPool>, session: Session) -> Result<HttpResponse, AppError> {
    require_identity(&session)?;
    let forms = committee_form::find_all(&pool).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::data(forms)))
}

/// GET /committee-forms/{id}
pub async fn show(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    require_identity(&session)?;
    let detail = committee_form::find_detail(&pool, path.into_inner())
        .await?
        .ok_or(AppError::NotFound("Committee form"))?;
    Ok(HttpResponse::Ok().json(ApiResponse::data(detail)))
}

/// POST /committee-forms
pub async fn create(
    pool: web::Data<PgPool>,
    session: Session,
    body: web::Json<CommitteeFormRequest>,
) -> Result<HttpResponse, AppError> {
    let identity = require_officer(&session)?;
    let input = body.validate()?;

    let created = committee_form::create(&pool, &identity, &input).await?;
    log::info!(
        "User {} created committee form {} with {} divisions",
        identity.user_id, created.form.id, created.divisions.len()
    );

    Ok(HttpResponse::Created().json(ApiResponse::with_message("Committee form created", created)))
}

/// PUT /committee-forms/{id}
pub async fn update(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    body: web::Json<CommitteeFormRequest>,
) -> Result<HttpResponse, AppError> {
    let identity = require_identity(&session)?;
    let id = path.into_inner();
    let input = body.validate()?;

    let updated = committee_form::update(&pool, id, &input, &identity).await?;
    log::info!("User {} updated committee form {id}", identity.user_id);

    Ok(HttpResponse::Ok().json(ApiResponse::with_message("Committee form updated", updated)))
}

/// DELETE /committee-forms/{id}
pub async fn delete(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let identity = require_identity(&session)?;
    let id = path.into_inner();

    let removed = committee_form::delete(&pool, id, &identity).await?;
    log::info!("User {} deleted committee form {id} and {removed} registrations", identity.user_id);

    Ok(HttpResponse::Ok().json(ApiResponse::message("Committee form deleted")))
}
