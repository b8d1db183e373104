pub mod agenda_handlers;
pub mod attendance_handlers;
pub mod auth_handlers;
pub mod committee_form_handlers;
pub mod envelope;
pub mod registration_handlers;
pub mod user_handlers;

use actix_web::{HttpResponse, middleware::from_fn, web};

use crate::auth::middleware::{require_auth, require_json_content_type};
use crate::errors::AppError;
use envelope::ApiResponse;

/// Malformed or mistyped JSON bodies become a 400 envelope instead of
/// actix's plain-text error.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        AppError::BadRequest(format!("Invalid request body: {err}")).into()
    })
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|_, _req| AppError::NotFound("Resource").into())
}

pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ApiResponse::failure("Not found"))
}

/// Register every route. Literal segments come before `/{id}` so that
/// `register` and `my-registrations` are never parsed as ids.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(path_config())
        .service(
            web::resource("/auth/login")
                .wrap(from_fn(require_json_content_type))
                .route(web::post().to(auth_handlers::login)),
        )
        .service(
            web::scope("")
                .wrap(from_fn(require_json_content_type))
                .wrap(from_fn(require_auth))
                // Session
                .route("/auth/logout", web::post().to(auth_handlers::logout))
                .route("/auth/me", web::get().to(auth_handlers::me))
                // Accounts
                .route("/users", web::get().to(user_handlers::list))
                .route("/users", web::post().to(user_handlers::create))
                // Agendas
                .route("/agendas", web::get().to(agenda_handlers::list))
                .route("/agendas", web::post().to(agenda_handlers::create))
                .route("/agendas/{id}/export", web::get().to(agenda_handlers::export))
                .route("/agendas/{id}", web::get().to(agenda_handlers::show))
                .route("/agendas/{id}", web::put().to(agenda_handlers::update))
                .route("/agendas/{id}", web::delete().to(agenda_handlers::delete))
                // Attendance
                .route("/attendance/scan", web::post().to(attendance_handlers::scan))
                .route("/attendance/manual", web::post().to(attendance_handlers::manual))
                .route("/attendance/mine", web::get().to(attendance_handlers::mine))
                .route("/attendances/{id}", web::delete().to(attendance_handlers::delete))
                // Committee registrations (literal paths first)
                .route("/committee-forms/register", web::post().to(registration_handlers::register))
                .route("/committee-forms/my-registrations", web::get().to(registration_handlers::mine))
                .route(
                    "/committee-forms/registrations/{id}/status",
                    web::patch().to(registration_handlers::update_status),
                )
                .route(
                    "/committee-forms/registrations/{id}",
                    web::delete().to(registration_handlers::delete),
                )
                .route(
                    "/committee-forms/{id}/registrations",
                    web::get().to(registration_handlers::list_for_form),
                )
                // Committee forms
                .route("/committee-forms", web::get().to(committee_form_handlers::list))
                .route("/committee-forms", web::post().to(committee_form_handlers::create))
                .route("/committee-forms/{id}", web::get().to(committee_form_handlers::show))
                .route("/committee-forms/{id}", web::put().to(committee_form_handlers::update))
                .route("/committee-forms/{id}", web::delete().to(committee_form_handlers::delete)),
        );
}
