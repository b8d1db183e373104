use chrono::NaiveDateTime;
use sqlx::{PgConnection, PgPool};
use std::collections::{HashMap, HashSet};

use crate::auth::ownership::ensure_owner_or_admin;
use crate::auth::session::Identity;
use crate::errors::AppError;
use crate::models::committee_form::{self, FormShape, FormStatus};
use super::types::*;

/// Validated answers ready to insert: (question id, text).
type CleanAnswers = Vec<(i64, String)>;

fn check_submission(
    shape: &FormShape,
    division_ids: &[i64],
    answers: &[AnswerInput],
) -> Result<CleanAnswers, AppError> {
    let mut errors = Vec::new();

    for id in division_ids {
        if !shape.division_ids.contains(id) {
            errors.push(format!("Division {id} does not belong to this form"));
        }
    }

    let mut answered = HashSet::new();
    let mut clean = Vec::with_capacity(answers.len());
    for a in answers {
        if !shape.questions.contains_key(&a.question_id) {
            errors.push(format!("Question {} does not belong to this form", a.question_id));
            continue;
        }
        if !answered.insert(a.question_id) {
            errors.push(format!("Question {} is answered more than once", a.question_id));
            continue;
        }
        let text = a.answer.as_ref().map(AnswerValue::to_text).unwrap_or_default();
        if text.is_empty() {
            errors.push(format!("Answer for question {} is required", a.question_id));
            continue;
        }
        clean.push((a.question_id, text));
    }

    let mut missing: Vec<(&i64, &String)> = shape
        .questions
        .iter()
        .filter(|(id, (required, _))| *required && !answered.contains(*id))
        .map(|(id, (_, text))| (id, text))
        .collect();
    missing.sort();
    for (_, text) in missing {
        errors.push(format!("'{text}' must be answered"));
    }

    if errors.is_empty() { Ok(clean) } else { Err(AppError::Validation(errors)) }
}

/// Submit a registration for `user`: one row for the form, carrying one or
/// two divisions, plus one answer row per submitted answer. Nothing is written
/// unless every check passes.
pub async fn register(pool: &PgPool, request: &RegisterRequest, user: &Identity) -> Result<Registration, AppError> {
    let division_ids = normalize_division_ids(request.division_id, request.division_ids.as_deref())?;

    let mut tx = pool.begin().await?;

    let shape = committee_form::load_shape(&mut tx, request.form_id)
        .await?
        .ok_or(AppError::NotFound("Committee form"))?;

    let existing: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM committee_registrations WHERE user_id = $1 AND committee_form_id = $2",
    )
    .bind(user.user_id)
    .bind(request.form_id)
    .fetch_optional(&mut *tx)
    .await?;
    if existing.is_some() {
        return Err(AppError::AlreadyRegistered);
    }

    if shape.status != FormStatus::Active {
        return Err(AppError::invalid("This form is not accepting registrations"));
    }
    let answers = check_submission(&shape, &division_ids, &request.answers)?;

    let (id, status, created_at, updated_at): (i64, String, NaiveDateTime, NaiveDateTime) = sqlx::query_as(
        "INSERT INTO committee_registrations (user_id, committee_form_id, committee_form_division_id, status) \
         VALUES ($1, $2, $3, 'pending') \
         RETURNING id, status, created_at, updated_at",
    )
    .bind(user.user_id)
    .bind(request.form_id)
    .bind(division_ids[0])
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| AppError::unique_or(e, AppError::AlreadyRegistered))?;

    for (position, division_id) in division_ids.iter().enumerate() {
        sqlx::query(
            "INSERT INTO committee_registration_divisions \
                 (committee_registration_id, committee_form_division_id, position) \
             VALUES ($1, $2, $3)",
        )
        .bind(id)
        .bind(division_id)
        .bind(position as i16)
        .execute(&mut *tx)
        .await?;
    }

    for (question_id, answer) in &answers {
        sqlx::query(
            "INSERT INTO committee_registration_answers \
                 (committee_registration_id, committee_form_question_id, answer) \
             VALUES ($1, $2, $3)",
        )
        .bind(id)
        .bind(question_id)
        .bind(answer)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(Registration {
        id,
        user_id: user.user_id,
        committee_form_id: request.form_id,
        committee_form_division_id: division_ids[0],
        division_ids,
        status: status.parse().unwrap_or_default(),
        created_at,
        updated_at,
    })
}

#[derive(sqlx::FromRow)]
struct RegistrationRow {
    id: i64,
    user_id: i64,
    committee_form_id: i64,
    committee_form_division_id: i64,
    status: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
    form_name: String,
    user_name: String,
    nim: Option<String>,
    jabatan: Option<String>,
}

const REGISTRATION_SELECT: &str = "SELECT r.id, r.user_id, r.committee_form_id, r.committee_form_division_id, \
            r.status, r.created_at, r.updated_at, \
            f.name AS form_name, COALESCE(u.name, '') AS user_name, u.nim, u.jabatan \
     FROM committee_registrations r \
     JOIN committee_forms f ON f.id = r.committee_form_id \
     LEFT JOIN users u ON u.id = r.user_id";

/// Resolve divisions and answers for a batch of registrations, keeping the
/// order of `rows`.
async fn resolve(pool: &PgPool, rows: Vec<RegistrationRow>) -> Result<Vec<RegistrationDetail>, AppError> {
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();

    let division_rows: Vec<(i64, i64, String)> = sqlx::query_as(
        "SELECT rd.committee_registration_id, d.id, d.name \
         FROM committee_registration_divisions rd \
         JOIN committee_form_divisions d ON d.id = rd.committee_form_division_id \
         WHERE rd.committee_registration_id = ANY($1) \
         ORDER BY rd.committee_registration_id, rd.position",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let answer_rows: Vec<(i64, i64, i64, String, String)> = sqlx::query_as(
        "SELECT a.committee_registration_id, a.id, q.id, q.question, a.answer \
         FROM committee_registration_answers a \
         JOIN committee_form_questions q ON q.id = a.committee_form_question_id \
         WHERE a.committee_registration_id = ANY($1) \
         ORDER BY a.committee_registration_id, q.sort_order, q.id",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let mut divisions: HashMap<i64, Vec<SelectedDivision>> = HashMap::new();
    for (registration_id, id, name) in division_rows {
        divisions.entry(registration_id).or_default().push(SelectedDivision { id, name });
    }
    let mut answers: HashMap<i64, Vec<AnswerDetail>> = HashMap::new();
    for (registration_id, id, question_id, question, answer) in answer_rows {
        answers
            .entry(registration_id)
            .or_default()
            .push(AnswerDetail { id, question_id, question, answer });
    }

    Ok(rows
        .into_iter()
        .map(|r| {
            let selected = divisions.remove(&r.id).unwrap_or_default();
            RegistrationDetail {
                registration: Registration {
                    id: r.id,
                    user_id: r.user_id,
                    committee_form_id: r.committee_form_id,
                    committee_form_division_id: r.committee_form_division_id,
                    division_ids: selected.iter().map(|d| d.id).collect(),
                    status: r.status.parse().unwrap_or_default(),
                    created_at: r.created_at,
                    updated_at: r.updated_at,
                },
                form_name: r.form_name,
                user: Registrant { id: r.user_id, name: r.user_name, nim: r.nim, jabatan: r.jabatan },
                divisions: selected,
                answers: answers.remove(&r.id).unwrap_or_default(),
            }
        })
        .collect())
}

/// Admin view: every registration for a form, newest first.
pub async fn find_for_form(
    pool: &PgPool,
    form_id: i64,
    requester: &Identity,
) -> Result<Vec<RegistrationDetail>, AppError> {
    let form = committee_form::find_by_id(pool, form_id)
        .await?
        .ok_or(AppError::NotFound("Committee form"))?;
    ensure_owner_or_admin(form.user_id, requester, "committee form")?;

    let rows = sqlx::query_as::<_, RegistrationRow>(&format!(
        "{REGISTRATION_SELECT} WHERE r.committee_form_id = $1 ORDER BY r.created_at DESC, r.id DESC"
    ))
    .bind(form_id)
    .fetch_all(pool)
    .await?;
    resolve(pool, rows).await
}

/// Member view: the caller's own registrations, newest first.
pub async fn find_for_user(pool: &PgPool, user_id: i64) -> Result<Vec<RegistrationDetail>, AppError> {
    let rows = sqlx::query_as::<_, RegistrationRow>(&format!(
        "{REGISTRATION_SELECT} WHERE r.user_id = $1 ORDER BY r.created_at DESC, r.id DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    resolve(pool, rows).await
}

pub async fn find_detail(pool: &PgPool, id: i64) -> Result<Option<RegistrationDetail>, AppError> {
    let rows = sqlx::query_as::<_, RegistrationRow>(&format!("{REGISTRATION_SELECT} WHERE r.id = $1"))
        .bind(id)
        .fetch_all(pool)
        .await?;
    Ok(resolve(pool, rows).await?.into_iter().next())
}

/// Lock a registration and return the id of the owning form's creator.
async fn lock_form_owner(conn: &mut PgConnection, id: i64) -> Result<i64, AppError> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT f.user_id FROM committee_registrations r \
         JOIN committee_forms f ON f.id = r.committee_form_id \
         WHERE r.id = $1 FOR UPDATE OF r",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    row.map(|(owner,)| owner).ok_or(AppError::NotFound("Registration"))
}

/// Move a registration to `status`. Any of pending/approved/rejected may be
/// set from any other.
pub async fn update_status(
    pool: &PgPool,
    id: i64,
    status: RegistrationStatus,
    requester: &Identity,
) -> Result<RegistrationDetail, AppError> {
    let mut tx = pool.begin().await?;

    let owner = lock_form_owner(&mut tx, id).await?;
    ensure_owner_or_admin(owner, requester, "committee form")?;

    sqlx::query("UPDATE committee_registrations SET status = $1, updated_at = NOW() WHERE id = $2")
        .bind(status.as_str())
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    find_detail(pool, id).await?.ok_or(AppError::NotFound("Registration"))
}

/// Delete a registration together with its answers and division rows.
pub async fn delete(pool: &PgPool, id: i64, requester: &Identity) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let owner = lock_form_owner(&mut tx, id).await?;
    ensure_owner_or_admin(owner, requester, "committee form")?;

    sqlx::query("DELETE FROM committee_registrations WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}
