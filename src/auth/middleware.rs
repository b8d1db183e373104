use actix_session::SessionExt;
use actix_web::{
    Error, HttpResponse,
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    http::Method,
    middleware::Next,
};

use crate::handlers::envelope::ApiResponse;

/// Middleware function that checks for an authenticated session.
/// Responds 401 with the JSON envelope if no session user is found.
pub async fn require_auth(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let session = req.get_session();
    let has_user = session.get::<i64>("user_id").unwrap_or(None).is_some();

    if !has_user {
        let response = HttpResponse::Unauthorized()
            .json(ApiResponse::failure("Authentication required"));
        return Ok(req.into_response(response).map_into_right_body());
    }

    next.call(req).await.map(|res| res.map_into_left_body())
}

/// CSRF guard for mutation endpoints.
///
/// Browsers cannot send cross-origin JSON with cookies via a simple form POST,
/// so requiring `Content-Type: application/json` on requests that carry a body
/// stands in for a token. Requests without a body (logout, DELETE) are let through.
pub async fn require_json_content_type(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let method = req.method().clone();

    if method == Method::POST || method == Method::PUT || method == Method::PATCH {
        let content_type = req
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        let headers = req.headers();
        let has_body = headers.contains_key("transfer-encoding")
            || headers
                .get("content-length")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|len| len.trim() != "0");

        if has_body && !content_type.starts_with("application/json") {
            let response = HttpResponse::BadRequest().json(ApiResponse::failure(
                "Content-Type must be application/json for mutation requests",
            ));
            return Ok(req.into_response(response).map_into_right_body());
        }
    }

    next.call(req).await.map(|res| res.map_into_left_body())
}
