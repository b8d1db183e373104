use actix_session::Session;
use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDateTime};
use sqlx::PgPool;

use crate::auth::session::require_identity;
use crate::errors::AppError;
use crate::handlers::envelope::ApiResponse;
use crate::models::attendance::{self, ManualAttendanceRequest, ScanRequest};

/// Portal wall-clock time; agenda times are stored the same way.
fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// POST /attendance/scan
pub async fn scan(
    pool: web::Data<PgPool>,
    session: Session,
    body: web::Json<ScanRequest>,
) -> Result<HttpResponse, AppError> {
    let identity = require_identity(&session)?;

    let recorded = attendance::scan(&pool, &body.qr_code, &identity, now()).await?;
    log::info!("User {} checked in to agenda {}", identity.user_id, recorded.agenda_id);

    Ok(HttpResponse::Created().json(ApiResponse::with_message("Attendance recorded", recorded)))
}

/// POST /attendance/manual
pub async fn manual(
    pool: web::Data<PgPool>,
    session: Session,
    body: web::Json<ManualAttendanceRequest>,
) -> Result<HttpResponse, AppError> {
    let identity = require_identity(&session)?;

    let recorded = attendance::manual_input(&pool, body.agenda_id, body.user_id, &identity, now()).await?;
    log::info!(
        "User {} recorded attendance of user {} for agenda {}",
        identity.user_id, body.user_id, body.agenda_id
    );

    Ok(HttpResponse::Created().json(ApiResponse::with_message("Attendance recorded", recorded)))
}

/// DELETE /attendances/{id}
pub async fn delete(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let identity = require_identity(&session)?;
    let id = path.into_inner();

    attendance::delete(&pool, id, &identity).await?;
    log::info!("User {} deleted attendance {id}", identity.user_id);

    Ok(HttpResponse::Ok().json(ApiResponse::message("Attendance deleted")))
}

/// GET /attendance/mine
pub async fn mine(pool: web::Data<PgPool>, session: Session) -> Result<HttpResponse, AppError> {
    let identity = require_identity(&session)?;
    let history = attendance::find_for_user(&pool, identity.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::data(history)))
}
