use actix_session::Session;
use actix_web::{HttpResponse, web};
use sqlx::PgPool;

use crate::auth::password;
use crate::auth::session::require_admin;
use crate::errors::AppError;
use crate::handlers::envelope::ApiResponse;
use crate::models::user::{self, NewUser, UserRequest};

/// GET /users
pub async fn list(pool: web::Data<PgPool>, session: Session) -> Result<HttpResponse, AppError> {
    require_admin(&session)?;
    let users = user::find_all(&pool).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::data(users)))
}

/// POST /users
pub async fn create(
    pool: web::Data<PgPool>,
    session: Session,
    body: web::Json<UserRequest>,
) -> Result<HttpResponse, AppError> {
    let admin = require_admin(&session)?;
    let role = body.validate()?;

    let hashed = password::hash_password(&body.password).map_err(AppError::Hash)?;
    let trimmed = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from);
    let new_user = NewUser {
        username: body.username.trim().to_string(),
        password: hashed,
        name: body.name.trim().to_string(),
        nim: trimmed(&body.nim),
        jabatan: trimmed(&body.jabatan),
        role,
    };

    let id = user::create(&pool, &new_user).await.map_err(|e| match e {
        AppError::Conflict(_) => AppError::Conflict(format!("Username '{}' is already taken", new_user.username)),
        other => other,
    })?;
    log::info!("User {} created account '{}' (id {id}, role {role})", admin.user_id, new_user.username);

    let profile = user::find_profile(&pool, id).await?.ok_or(AppError::NotFound("User"))?;
    Ok(HttpResponse::Created().json(ApiResponse::with_message("User created", profile)))
}
