use actix_session::Session;
use actix_web::{HttpResponse, http::header, web};
use sqlx::PgPool;

use crate::auth::session::{require_identity, require_officer};
use crate::errors::AppError;
use crate::handlers::envelope::ApiResponse;
use crate::models::agenda::{self, AgendaCreateRequest, AgendaType, AgendaUpdateRequest};

/// GET /agendas
pub async fn list(pool: web::Data<PgPool>, session: Session) -> Result<HttpResponse, AppError> {
    let identity = require_identity(&session)?;
    let agendas = agenda::find_all(&pool, &identity).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::data(agendas)))
}

/// POST /agendas
pub async fn create(
    pool: web::Data<PgPool>,
    session: Session,
    body: web::Json<AgendaCreateRequest>,
) -> Result<HttpResponse, AppError> {
    let identity = require_officer(&session)?;
    let new = body.validate()?;

    let created = agenda::create(&pool, &identity, &new).await?;
    log::info!("User {} created agenda {} ({})", identity.user_id, created.id, created.qr_code);

    Ok(HttpResponse::Created().json(ApiResponse::with_message("Agenda created", created)))
}

/// GET /agendas/{id}
///
/// Officer-only agendas are hidden from members, as in the list view.
pub async fn show(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let identity = require_identity(&session)?;
    let detail = agenda::find_detail(&pool, path.into_inner())
        .await?
        .filter(|d| identity.is_officer() || d.agenda.agenda_type == AgendaType::Semua)
        .ok_or(AppError::NotFound("Agenda"))?;
    Ok(HttpResponse::Ok().json(ApiResponse::data(detail)))
}

/// PUT /agendas/{id}
pub async fn update(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    body: web::Json<AgendaUpdateRequest>,
) -> Result<HttpResponse, AppError> {
    let identity = require_identity(&session)?;
    let id = path.into_inner();
    let patch = body.validate()?;

    let updated = agenda::update(&pool, id, patch, &identity).await?;
    log::info!("User {} updated agenda {id}", identity.user_id);

    Ok(HttpResponse::Ok().json(ApiResponse::with_message("Agenda updated", updated)))
}

/// DELETE /agendas/{id}
pub async fn delete(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let identity = require_identity(&session)?;
    let id = path.into_inner();

    let removed = agenda::delete(&pool, id, &identity).await?;
    log::info!("User {} deleted agenda {id} and {removed} attendance records", identity.user_id);

    Ok(HttpResponse::Ok().json(ApiResponse::message("Agenda deleted")))
}

/// GET /agendas/{id}/export
pub async fn export(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    require_identity(&session)?;
    let (found, csv) = agenda::export_attendance_csv(&pool, path.into_inner()).await?;

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", agenda::export_filename(&found)),
        ))
        .body(csv))
}
