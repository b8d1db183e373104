use chrono::NaiveDateTime;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use std::collections::{HashMap, HashSet};

use crate::auth::ownership::ensure_owner_or_admin;
use crate::auth::session::Identity;
use crate::errors::AppError;
use super::types::*;

const FORM_COLUMNS: &str = "f.id, f.user_id, f.name, f.description, f.status, f.created_at, f.updated_at";

#[derive(sqlx::FromRow)]
struct FormRow {
    id: i64,
    user_id: i64,
    name: String,
    description: Option<String>,
    status: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl FormRow {
    fn into_form(self) -> CommitteeForm {
        CommitteeForm {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            description: self.description,
            status: self.status.parse().unwrap_or_default(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct DivisionRow {
    id: i64,
    committee_form_id: i64,
    name: String,
    quota: i32,
    sort_order: i32,
    registrant_count: i64,
    approved_count: i64,
}

#[derive(sqlx::FromRow)]
struct QuestionRow {
    id: i64,
    committee_form_id: i64,
    question: String,
    question_type: String,
    options: Option<Json<Vec<String>>>,
    required: bool,
    sort_order: i32,
}

impl QuestionRow {
    fn into_question(self) -> Result<Question, AppError> {
        let question_type = self.question_type.parse().map_err(|e: String| {
            AppError::Db(sqlx::Error::Decode(e.into()))
        })?;
        Ok(Question {
            id: self.id,
            committee_form_id: self.committee_form_id,
            question: self.question,
            question_type,
            options: self.options.map(|Json(o)| o),
            required: self.required,
            order: self.sort_order,
        })
    }
}

/// Create a form with its divisions and questions in submitted order.
pub async fn create(pool: &PgPool, creator: &Identity, input: &FormInput) -> Result<CommitteeFormDetail, AppError> {
    let mut tx = pool.begin().await?;

    let (form_id,): (i64,) = sqlx::query_as(
        "INSERT INTO committee_forms (user_id, name, description, status) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(creator.user_id)
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.status.unwrap_or_default().as_str())
    .fetch_one(&mut *tx)
    .await?;

    for (order, division) in input.divisions.iter().enumerate() {
        insert_division(&mut tx, form_id, division, order).await?;
    }
    for (order, question) in input.questions.iter().enumerate() {
        insert_question(&mut tx, form_id, question, order).await?;
    }

    tx.commit().await?;

    find_detail(pool, form_id)
        .await?
        .ok_or(AppError::NotFound("Committee form"))
}

fn sort_order(index: usize) -> Result<i32, AppError> {
    i32::try_from(index).map_err(|_| AppError::invalid("Too many entries"))
}

async fn insert_division(
    conn: &mut PgConnection,
    form_id: i64,
    division: &NewDivision,
    index: usize,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO committee_form_divisions (committee_form_id, name, quota, sort_order) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(form_id)
    .bind(&division.name)
    .bind(division.quota)
    .bind(sort_order(index)?)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_question(
    conn: &mut PgConnection,
    form_id: i64,
    question: &NewQuestion,
    index: usize,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO committee_form_questions \
             (committee_form_id, question, question_type, options, required, sort_order) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(form_id)
    .bind(&question.question)
    .bind(question.question_type.as_str())
    .bind(question.options.as_ref().map(Json))
    .bind(question.required)
    .bind(sort_order(index)?)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<CommitteeForm>, AppError> {
    let row = sqlx::query_as::<_, FormRow>(&format!(
        "SELECT {FORM_COLUMNS} FROM committee_forms f WHERE f.id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(FormRow::into_form))
}

async fn lock_by_id(conn: &mut PgConnection, id: i64) -> Result<Option<CommitteeForm>, AppError> {
    let row = sqlx::query_as::<_, FormRow>(&format!(
        "SELECT {FORM_COLUMNS} FROM committee_forms f WHERE f.id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(FormRow::into_form))
}

/// All forms, newest first, with their sizes.
pub async fn find_all(pool: &PgPool) -> Result<Vec<CommitteeFormListItem>, AppError> {
    #[derive(sqlx::FromRow)]
    struct Row {
        #[sqlx(flatten)]
        form: FormRow,
        creator_name: String,
        division_count: i64,
        question_count: i64,
        registration_count: i64,
    }

    let rows = sqlx::query_as::<_, Row>(&format!(
        "SELECT {FORM_COLUMNS}, \
                COALESCE(u.name, '') AS creator_name, \
                (SELECT COUNT(*) FROM committee_form_divisions d WHERE d.committee_form_id = f.id) AS division_count, \
                (SELECT COUNT(*) FROM committee_form_questions q WHERE q.committee_form_id = f.id) AS question_count, \
                (SELECT COUNT(*) FROM committee_registrations r WHERE r.committee_form_id = f.id) AS registration_count \
         FROM committee_forms f \
         LEFT JOIN users u ON u.id = f.user_id \
         ORDER BY f.created_at DESC, f.id DESC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| CommitteeFormListItem {
            form: r.form.into_form(),
            creator_name: r.creator_name,
            division_count: r.division_count,
            question_count: r.question_count,
            registration_count: r.registration_count,
        })
        .collect())
}

/// Divisions in display order with applicant and approval counts.
pub async fn find_divisions(pool: &PgPool, form_id: i64) -> Result<Vec<DivisionSummary>, AppError> {
    let rows = sqlx::query_as::<_, DivisionRow>(
        "SELECT d.id, d.committee_form_id, d.name, d.quota, d.sort_order, \
                COUNT(rd.committee_registration_id) AS registrant_count, \
                COUNT(rd.committee_registration_id) FILTER (WHERE r.status = 'approved') AS approved_count \
         FROM committee_form_divisions d \
         LEFT JOIN committee_registration_divisions rd ON rd.committee_form_division_id = d.id \
         LEFT JOIN committee_registrations r ON r.id = rd.committee_registration_id \
         WHERE d.committee_form_id = $1 \
         GROUP BY d.id \
         ORDER BY d.sort_order, d.id",
    )
    .bind(form_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| {
            DivisionSummary::new(
                Division {
                    id: r.id,
                    committee_form_id: r.committee_form_id,
                    name: r.name,
                    quota: r.quota,
                    order: r.sort_order,
                },
                r.registrant_count,
                r.approved_count,
            )
        })
        .collect())
}

pub async fn find_questions(pool: &PgPool, form_id: i64) -> Result<Vec<Question>, AppError> {
    let rows = sqlx::query_as::<_, QuestionRow>(
        "SELECT id, committee_form_id, question, question_type, options, required, sort_order \
         FROM committee_form_questions \
         WHERE committee_form_id = $1 \
         ORDER BY sort_order, id",
    )
    .bind(form_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(QuestionRow::into_question).collect()
}

pub async fn find_detail(pool: &PgPool, id: i64) -> Result<Option<CommitteeFormDetail>, AppError> {
    let Some(form) = find_by_id(pool, id).await? else {
        return Ok(None);
    };
    let divisions = find_divisions(pool, id).await?;
    let questions = find_questions(pool, id).await?;
    Ok(Some(CommitteeFormDetail { form, divisions, questions }))
}

/// Ids currently attached to `form_id` in `table`.
async fn existing_ids(conn: &mut PgConnection, table: &str, form_id: i64) -> Result<HashSet<i64>, AppError> {
    let rows: Vec<(i64,)> = sqlx::query_as(&format!(
        "SELECT id FROM {table} WHERE committee_form_id = $1"
    ))
    .bind(form_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Submitted ids must already belong to this form.
fn check_foreign_ids(
    submitted: impl Iterator<Item = i64>,
    existing: &HashSet<i64>,
    what: &str,
) -> Result<Vec<i64>, AppError> {
    let mut kept = Vec::new();
    let mut errors = Vec::new();
    for id in submitted {
        if existing.contains(&id) {
            kept.push(id);
        } else {
            errors.push(format!("{what} {id} does not belong to this form"));
        }
    }
    if errors.is_empty() { Ok(kept) } else { Err(AppError::Validation(errors)) }
}

/// Delete rows of `table` for `form_id` whose id is not in `kept`. Rows still
/// referenced by registrations are protected by their foreign keys.
async fn delete_missing(
    conn: &mut PgConnection,
    table: &str,
    form_id: i64,
    kept: &[i64],
    what: &str,
) -> Result<u64, AppError> {
    let result = sqlx::query(&format!(
        "DELETE FROM {table} WHERE committee_form_id = $1 AND NOT (id = ANY($2))"
    ))
    .bind(form_id)
    .bind(kept)
    .execute(&mut *conn)
    .await
    .map_err(|e| match e.as_database_error() {
        Some(db_err) if db_err.is_foreign_key_violation() => AppError::Conflict(format!(
            "Cannot remove a {what} that registrations already refer to"
        )),
        _ => e.into(),
    })?;
    Ok(result.rows_affected())
}

async fn sync_divisions(conn: &mut PgConnection, form_id: i64, divisions: &[NewDivision]) -> Result<(), AppError> {
    let existing = existing_ids(conn, "committee_form_divisions", form_id).await?;
    let kept = check_foreign_ids(divisions.iter().filter_map(|d| d.id), &existing, "Division")?;
    let removed = delete_missing(conn, "committee_form_divisions", form_id, &kept, "division").await?;
    if removed > 0 {
        log::info!("Form {form_id}: removed {removed} divisions");
    }

    for (index, division) in divisions.iter().enumerate() {
        match division.id {
            Some(id) => {
                sqlx::query(
                    "UPDATE committee_form_divisions SET name = $1, quota = $2, sort_order = $3 \
                     WHERE id = $4",
                )
                .bind(&division.name)
                .bind(division.quota)
                .bind(sort_order(index)?)
                .bind(id)
                .execute(&mut *conn)
                .await?;
            }
            None => insert_division(conn, form_id, division, index).await?,
        }
    }
    Ok(())
}

async fn sync_questions(conn: &mut PgConnection, form_id: i64, questions: &[NewQuestion]) -> Result<(), AppError> {
    let existing = existing_ids(conn, "committee_form_questions", form_id).await?;
    let kept = check_foreign_ids(questions.iter().filter_map(|q| q.id), &existing, "Question")?;
    let removed = delete_missing(conn, "committee_form_questions", form_id, &kept, "question").await?;
    if removed > 0 {
        log::info!("Form {form_id}: removed {removed} questions");
    }

    for (index, question) in questions.iter().enumerate() {
        match question.id {
            Some(id) => {
                sqlx::query(
                    "UPDATE committee_form_questions \
                     SET question = $1, question_type = $2, options = $3, required = $4, sort_order = $5 \
                     WHERE id = $6",
                )
                .bind(&question.question)
                .bind(question.question_type.as_str())
                .bind(question.options.as_ref().map(Json))
                .bind(question.required)
                .bind(sort_order(index)?)
                .bind(id)
                .execute(&mut *conn)
                .await?;
            }
            None => insert_question(conn, form_id, question, index).await?,
        }
    }
    Ok(())
}

/// Replace a form's contents. Entries that carry an id keep it (and every
/// registration pointing at it); entries without one are inserted; stored
/// entries missing from the submission are removed. Display order is reset
/// to the submitted order.
pub async fn update(
    pool: &PgPool,
    id: i64,
    input: &FormInput,
    requester: &Identity,
) -> Result<CommitteeFormDetail, AppError> {
    let mut tx = pool.begin().await?;

    let form = lock_by_id(&mut tx, id).await?.ok_or(AppError::NotFound("Committee form"))?;
    ensure_owner_or_admin(form.user_id, requester, "committee form")?;

    sqlx::query(
        "UPDATE committee_forms SET name = $1, description = $2, status = $3, updated_at = NOW() \
         WHERE id = $4",
    )
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.status.unwrap_or(form.status).as_str())
    .bind(id)
    .execute(&mut *tx)
    .await?;

    sync_divisions(&mut tx, id, &input.divisions).await?;
    sync_questions(&mut tx, id, &input.questions).await?;

    tx.commit().await?;

    find_detail(pool, id).await?.ok_or(AppError::NotFound("Committee form"))
}

/// Delete a form with everything hanging off it. Returns the number of
/// registrations removed.
pub async fn delete(pool: &PgPool, id: i64, requester: &Identity) -> Result<u64, AppError> {
    let mut tx = pool.begin().await?;

    let form = lock_by_id(&mut tx, id).await?.ok_or(AppError::NotFound("Committee form"))?;
    ensure_owner_or_admin(form.user_id, requester, "committee form")?;

    // Registrations go first so their division and answer rows are gone
    // before the divisions and questions they point at.
    let registrations = sqlx::query("DELETE FROM committee_registrations WHERE committee_form_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    sqlx::query("DELETE FROM committee_forms WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(registrations)
}

/// Division and question id sets of a form, for validating a submission.
pub(crate) struct FormShape {
    pub status: FormStatus,
    pub division_ids: HashSet<i64>,
    /// question id -> (required, question text)
    pub questions: HashMap<i64, (bool, String)>,
}

pub(crate) async fn load_shape(conn: &mut PgConnection, form_id: i64) -> Result<Option<FormShape>, AppError> {
    let status: Option<(String,)> = sqlx::query_as("SELECT status FROM committee_forms WHERE id = $1")
        .bind(form_id)
        .fetch_optional(&mut *conn)
        .await?;
    let Some((status,)) = status else {
        return Ok(None);
    };

    let division_ids = existing_ids(conn, "committee_form_divisions", form_id).await?;
    let questions: Vec<(i64, bool, String)> = sqlx::query_as(
        "SELECT id, required, question FROM committee_form_questions WHERE committee_form_id = $1",
    )
    .bind(form_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(FormShape {
        status: status.parse().unwrap_or_default(),
        division_ids,
        questions: questions.into_iter().map(|(id, req, q)| (id, (req, q))).collect(),
    }))
}
