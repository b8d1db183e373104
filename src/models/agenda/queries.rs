use chrono::NaiveDateTime;
use rand::SeedableRng;
use rand::rngs::StdRng;
use sqlx::{PgConnection, PgPool};

use crate::auth::ownership::ensure_owner;
use crate::auth::session::Identity;
use crate::errors::AppError;
use crate::models::attendance;
use super::qr::{self, PgQrLookup};
use super::types::*;

const AGENDA_COLUMNS: &str = "a.id, a.title, a.description, a.qr_code, a.start_time, a.end_time, \
                              a.user_id, a.agenda_type, a.created_at, a.updated_at";

#[derive(sqlx::FromRow)]
struct AgendaRow {
    id: i64,
    title: String,
    description: Option<String>,
    qr_code: String,
    start_time: NaiveDateTime,
    end_time: NaiveDateTime,
    user_id: i64,
    agenda_type: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl AgendaRow {
    fn into_agenda(self) -> Agenda {
        Agenda {
            id: self.id,
            title: self.title,
            description: self.description,
            qr_code: self.qr_code,
            start_time: self.start_time,
            end_time: self.end_time,
            user_id: self.user_id,
            agenda_type: self.agenda_type.parse().unwrap_or_default(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Insert a new agenda owned by `creator`, with a freshly generated QR token.
pub async fn create(pool: &PgPool, creator: &Identity, new: &NewAgenda) -> Result<Agenda, AppError> {
    let mut tx = pool.begin().await?;

    let mut rng = StdRng::from_os_rng();
    let qr_code = qr::generate_unique(&mut rng, &mut PgQrLookup(&mut tx)).await?;

    let row = sqlx::query_as::<_, AgendaRow>(&format!(
        "INSERT INTO agendas AS a (title, description, qr_code, start_time, end_time, user_id, agenda_type) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {AGENDA_COLUMNS}"
    ))
    .bind(&new.title)
    .bind(&new.description)
    .bind(&qr_code)
    .bind(new.start_time)
    .bind(new.end_time)
    .bind(creator.user_id)
    .bind(new.agenda_type.as_str())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| AppError::unique_or(e, AppError::Conflict("QR code already in use".to_string())))?;

    tx.commit().await?;
    Ok(row.into_agenda())
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Agenda>, AppError> {
    let row = sqlx::query_as::<_, AgendaRow>(&format!(
        "SELECT {AGENDA_COLUMNS} FROM agendas a WHERE a.id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(AgendaRow::into_agenda))
}

/// Row-locking lookup used by mutations inside a transaction.
pub(crate) async fn lock_by_id(conn: &mut PgConnection, id: i64) -> Result<Option<Agenda>, AppError> {
    let row = sqlx::query_as::<_, AgendaRow>(&format!(
        "SELECT {AGENDA_COLUMNS} FROM agendas a WHERE a.id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(AgendaRow::into_agenda))
}

pub(crate) async fn find_by_qr_code(conn: &mut PgConnection, qr_code: &str) -> Result<Option<Agenda>, AppError> {
    let row = sqlx::query_as::<_, AgendaRow>(&format!(
        "SELECT {AGENDA_COLUMNS} FROM agendas a WHERE a.qr_code = $1"
    ))
    .bind(qr_code)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(AgendaRow::into_agenda))
}

/// Agendas visible to `viewer`, newest first. Members only see agendas open
/// to everyone; officers see all of them.
pub async fn find_all(pool: &PgPool, viewer: &Identity) -> Result<Vec<AgendaListItem>, AppError> {
    #[derive(sqlx::FromRow)]
    struct Row {
        #[sqlx(flatten)]
        agenda: AgendaRow,
        creator_name: String,
        attendance_count: i64,
    }

    let rows = sqlx::query_as::<_, Row>(&format!(
        "SELECT {AGENDA_COLUMNS}, \
                COALESCE(u.name, '') AS creator_name, \
                (SELECT COUNT(*) FROM attendances t WHERE t.agenda_id = a.id) AS attendance_count \
         FROM agendas a \
         LEFT JOIN users u ON u.id = a.user_id \
         WHERE $1 OR a.agenda_type = 'semua' \
         ORDER BY a.start_time DESC, a.id DESC"
    ))
    .bind(viewer.is_officer())
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| AgendaListItem {
            agenda: r.agenda.into_agenda(),
            creator_name: r.creator_name,
            attendance_count: r.attendance_count,
        })
        .collect())
}

/// Agenda with creator name and attendances in scan order.
pub async fn find_detail(pool: &PgPool, id: i64) -> Result<Option<AgendaDetail>, AppError> {
    let Some(agenda) = find_by_id(pool, id).await? else {
        return Ok(None);
    };

    let (creator_name,): (String,) =
        sqlx::query_as("SELECT COALESCE((SELECT name FROM users WHERE id = $1), '')")
            .bind(agenda.user_id)
            .fetch_one(pool)
            .await?;
    let attendances = attendance::find_for_agenda(pool, id).await?;

    Ok(Some(AgendaDetail { agenda, creator_name, attendances }))
}

/// Apply a partial update. Only the creator may update; the QR token is kept.
pub async fn update(
    pool: &PgPool,
    id: i64,
    patch: AgendaPatch,
    requester: &Identity,
) -> Result<Agenda, AppError> {
    let mut tx = pool.begin().await?;

    let existing = lock_by_id(&mut tx, id).await?.ok_or(AppError::NotFound("Agenda"))?;
    ensure_owner(existing.user_id, requester, "agenda")?;
    let merged = patch.apply(existing)?;

    let row = sqlx::query_as::<_, AgendaRow>(&format!(
        "UPDATE agendas AS a SET title = $1, description = $2, start_time = $3, end_time = $4, \
                agenda_type = $5, updated_at = NOW() \
         WHERE a.id = $6 \
         RETURNING {AGENDA_COLUMNS}"
    ))
    .bind(&merged.title)
    .bind(&merged.description)
    .bind(merged.start_time)
    .bind(merged.end_time)
    .bind(merged.agenda_type.as_str())
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(row.into_agenda())
}

/// Delete an agenda and, through the foreign key, its attendances.
/// Returns how many attendances went with it.
pub async fn delete(pool: &PgPool, id: i64, requester: &Identity) -> Result<i64, AppError> {
    let mut tx = pool.begin().await?;

    let existing = lock_by_id(&mut tx, id).await?.ok_or(AppError::NotFound("Agenda"))?;
    ensure_owner(existing.user_id, requester, "agenda")?;

    let (attendance_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM attendances WHERE agenda_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

    sqlx::query("DELETE FROM agendas WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(attendance_count)
}
