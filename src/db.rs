use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::auth::password;
use crate::errors::AppError;
use crate::models::user::{self, NewUser, Role};

pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    sqlx::migrate!().run(pool).await?;
    log::info!("Database migrations complete");
    Ok(())
}

/// Create the initial admin account when no users exist yet.
pub async fn seed_admin(pool: &PgPool, username: &str, plain_password: &str) -> Result<(), AppError> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    if count > 0 {
        log::info!("Database already has {count} users, skipping admin seed");
        return Ok(());
    }

    let hash = password::hash_password(plain_password).map_err(AppError::Hash)?;
    let id = user::create(
        pool,
        &NewUser {
            username: username.to_string(),
            password: hash,
            name: "Administrator".to_string(),
            nim: None,
            jabatan: None,
            role: Role::Admin,
        },
    )
    .await?;
    log::info!("Seeded admin user '{username}' (id {id})");
    Ok(())
}
