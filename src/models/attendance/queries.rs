use chrono::NaiveDateTime;
use sqlx::{PgConnection, PgPool};

use crate::auth::ownership::ensure_owner;
use crate::auth::session::Identity;
use crate::errors::AppError;
use crate::models::agenda;
use super::types::*;
use super::window::is_within_window;

/// Record one attendance for (agenda, user), refusing duplicates. The unique
/// constraint on the pair turns a concurrent duplicate into the same error.
async fn insert_once(
    conn: &mut PgConnection,
    agenda_id: i64,
    user_id: i64,
    scanned_at: NaiveDateTime,
) -> Result<Attendance, AppError> {
    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM attendances WHERE agenda_id = $1 AND user_id = $2")
            .bind(agenda_id)
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;
    if existing.is_some() {
        return Err(AppError::AlreadyAttended);
    }

    sqlx::query_as::<_, Attendance>(
        "INSERT INTO attendances (agenda_id, user_id, scanned_at) VALUES ($1, $2, $3) \
         RETURNING id, agenda_id, user_id, scanned_at",
    )
    .bind(agenda_id)
    .bind(user_id)
    .bind(scanned_at)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| AppError::unique_or(e, AppError::AlreadyAttended))
}

/// Self-service check-in by scanning an agenda's QR token at `now`.
pub async fn scan(
    pool: &PgPool,
    qr_code: &str,
    attendee: &Identity,
    now: NaiveDateTime,
) -> Result<Attendance, AppError> {
    let qr_code = qr_code.trim();
    if qr_code.is_empty() {
        return Err(AppError::invalid("qr_code is required"));
    }

    let mut tx = pool.begin().await?;

    let agenda = agenda::find_by_qr_code(&mut tx, qr_code)
        .await?
        .ok_or(AppError::QrInvalid)?;
    if !is_within_window(agenda.start_time, agenda.end_time, now) {
        return Err(AppError::OutsideWindow);
    }
    let attendance = insert_once(&mut tx, agenda.id, attendee.user_id, now).await?;

    tx.commit().await?;
    Ok(attendance)
}

/// Reconciliation entry made by the agenda's creator on behalf of `target_user_id`.
/// No time window applies.
pub async fn manual_input(
    pool: &PgPool,
    agenda_id: i64,
    target_user_id: i64,
    requester: &Identity,
    now: NaiveDateTime,
) -> Result<Attendance, AppError> {
    let mut tx = pool.begin().await?;

    let agenda = agenda::lock_by_id(&mut tx, agenda_id)
        .await?
        .ok_or(AppError::NotFound("Agenda"))?;
    ensure_owner(agenda.user_id, requester, "agenda")?;

    let (user_exists,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
        .bind(target_user_id)
        .fetch_one(&mut *tx)
        .await?;
    if !user_exists {
        return Err(AppError::NotFound("User"));
    }

    let attendance = insert_once(&mut tx, agenda.id, target_user_id, now).await?;

    tx.commit().await?;
    Ok(attendance)
}

/// Remove an attendance. Only the parent agenda's creator may do this.
pub async fn delete(pool: &PgPool, attendance_id: i64, requester: &Identity) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let owner: Option<(i64,)> = sqlx::query_as(
        "SELECT g.user_id FROM attendances a JOIN agendas g ON g.id = a.agenda_id \
         WHERE a.id = $1 FOR UPDATE OF a",
    )
    .bind(attendance_id)
    .fetch_optional(&mut *tx)
    .await?;
    let (owner_id,) = owner.ok_or(AppError::NotFound("Attendance"))?;
    ensure_owner(owner_id, requester, "agenda")?;

    sqlx::query("DELETE FROM attendances WHERE id = $1")
        .bind(attendance_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Attendances of one agenda in insertion order, with attendee profiles.
pub async fn find_for_agenda(pool: &PgPool, agenda_id: i64) -> Result<Vec<AttendanceEntry>, AppError> {
    let rows = sqlx::query_as::<_, AttendanceEntry>(
        "SELECT a.id, a.user_id, COALESCE(u.name, '') AS name, u.nim, u.jabatan, a.scanned_at \
         FROM attendances a \
         LEFT JOIN users u ON u.id = a.user_id \
         WHERE a.agenda_id = $1 \
         ORDER BY a.id",
    )
    .bind(agenda_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// The caller's own check-ins, newest first.
pub async fn find_for_user(pool: &PgPool, user_id: i64) -> Result<Vec<MyAttendance>, AppError> {
    let rows = sqlx::query_as::<_, MyAttendance>(
        "SELECT a.id, a.agenda_id, g.title AS agenda_title, a.scanned_at \
         FROM attendances a \
         JOIN agendas g ON g.id = a.agenda_id \
         WHERE a.user_id = $1 \
         ORDER BY a.scanned_at DESC, a.id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
