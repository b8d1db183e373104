use sqlx::PgPool;

use crate::errors::AppError;
use super::types::*;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password: String,
    name: String,
    role: String,
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: i64,
    username: String,
    name: String,
    nim: Option<String>,
    jabatan: Option<String>,
    role: String,
}

impl ProfileRow {
    fn into_profile(self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username,
            name: self.name,
            nim: self.nim,
            jabatan: self.jabatan,
            role: parse_role(&self.role),
        }
    }
}

/// The table CHECK keeps roles valid; anything else is treated as a plain member.
fn parse_role(raw: &str) -> Role {
    raw.parse().unwrap_or_else(|e| {
        log::warn!("{e}, treating as anggota");
        Role::Anggota
    })
}

pub async fn create(pool: &PgPool, new: &NewUser) -> Result<i64, AppError> {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO users (username, password, name, nim, jabatan, role) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
    )
    .bind(&new.username)
    .bind(&new.password)
    .bind(&new.name)
    .bind(&new.nim)
    .bind(&new.jabatan)
    .bind(new.role.as_str())
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<User>, AppError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, password, name, role FROM users WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| User {
        id: r.id,
        username: r.username,
        password: r.password,
        name: r.name,
        role: parse_role(&r.role),
    }))
}

pub async fn find_profile(pool: &PgPool, id: i64) -> Result<Option<UserProfile>, AppError> {
    let row = sqlx::query_as::<_, ProfileRow>(
        "SELECT id, username, name, nim, jabatan, role FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(ProfileRow::into_profile))
}

pub async fn exists(pool: &PgPool, id: i64) -> Result<bool, AppError> {
    let (found,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(found)
}

pub async fn find_all(pool: &PgPool) -> Result<Vec<UserProfile>, AppError> {
    let rows = sqlx::query_as::<_, ProfileRow>(
        "SELECT id, username, name, nim, jabatan, role FROM users ORDER BY name, id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(ProfileRow::into_profile).collect())
}
