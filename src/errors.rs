use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use std::fmt;

use crate::handlers::envelope::ApiResponse;

#[derive(Debug)]
pub enum AppError {
    Db(sqlx::Error),
    Migrate(sqlx::migrate::MigrateError),
    Hash(String),
    Session(String),
    BadRequest(String),
    Validation(Vec<String>),
    Unauthenticated,
    PermissionDenied(String),
    NotFound(&'static str),
    Conflict(String),
    QrInvalid,
    OutsideWindow,
    AlreadyAttended,
    TooManyDivisions,
    AlreadyRegistered,
}

impl AppError {
    /// Single-message validation failure.
    pub fn invalid(msg: impl Into<String>) -> Self {
        AppError::Validation(vec![msg.into()])
    }

    /// Translate a unique-constraint violation into `on_duplicate`, so a lost
    /// insert race reports the same error as the application-level check.
    pub fn unique_or(e: sqlx::Error, on_duplicate: AppError) -> Self {
        match e.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => on_duplicate,
            _ => e.into(),
        }
    }

    /// True for failures that are server faults rather than caller mistakes.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AppError::Db(_) | AppError::Migrate(_) | AppError::Hash(_) | AppError::Session(_)
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Db(e) => write!(f, "Database error: {e}"),
            AppError::Migrate(e) => write!(f, "Migration error: {e}"),
            AppError::Hash(e) => write!(f, "Hash error: {e}"),
            AppError::Session(e) => write!(f, "Session error: {e}"),
            AppError::BadRequest(e) => write!(f, "{e}"),
            AppError::Validation(errors) => write!(f, "{}", errors.join("; ")),
            AppError::Unauthenticated => write!(f, "Authentication required"),
            AppError::PermissionDenied(e) => write!(f, "Forbidden: {e}"),
            AppError::NotFound(what) => write!(f, "{what} not found"),
            AppError::Conflict(e) => write!(f, "{e}"),
            AppError::QrInvalid => write!(f, "QR code is not valid"),
            AppError::OutsideWindow => {
                write!(f, "Attendance is only accepted from 15 minutes before start until 15 minutes after end")
            }
            AppError::AlreadyAttended => write!(f, "Attendance already recorded for this agenda"),
            AppError::TooManyDivisions => write!(f, "At most 2 divisions may be selected"),
            AppError::AlreadyRegistered => write!(f, "You have already registered for this form"),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) | AppError::QrInvalid => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::AlreadyAttended | AppError::AlreadyRegistered => {
                StatusCode::CONFLICT
            }
            AppError::Validation(_) | AppError::OutsideWindow | AppError::TooManyDivisions => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Db(_) | AppError::Migrate(_) | AppError::Hash(_) | AppError::Session(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = if self.is_internal() {
            log::error!("{self}");
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(self.status_code()).json(ApiResponse::<()>::failure(message))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db_err) = e.as_database_error() {
            if db_err.is_unique_violation() {
                log::warn!("Unique constraint rejected write: {db_err}");
                return AppError::Conflict("Record already exists".to_string());
            }
            if db_err.is_foreign_key_violation() {
                log::warn!("Foreign key constraint rejected write: {db_err}");
                return AppError::Conflict("Record is still referenced by other data".to_string());
            }
        }
        AppError::Db(e)
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        AppError::Migrate(e)
    }
}

impl From<actix_session::SessionInsertError> for AppError {
    fn from(e: actix_session::SessionInsertError) -> Self {
        AppError::Session(e.to_string())
    }
}
