// web-server/src/api/mod.rs
pub mod auth;
pub mod commands;
pub mod sessions;

use actix::Addr;
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::client_registry::{ClientLookup, ClientRegistryActor, GetClient};
use crate::context::SharedContext;

// Cookie name for session tracking
pub const SESSION_COOKIE_NAME: &str = "decentfont_session";
// Cookie max age in seconds (24 hours)
pub const COOKIE_MAX_AGE: i64 = 86400;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(sessions::api_index)
            .service(sessions::create_client)
            .service(sessions::get_view)
            .service(sessions::invalidate_session)
            .service(auth::login)
            .service(auth::logout)
            .service(auth::toggle)
            .service(commands::run_command)
    );
}

/// Session token and context behind the request's session cookie
pub(crate) async fn current_client(
    req: &HttpRequest,
    registry: &Addr<ClientRegistryActor>,
) -> Result<(String, SharedContext), HttpResponse> {
    let Some(cookie) = req.cookie(SESSION_COOKIE_NAME) else {
        return Err(HttpResponse::Unauthorized().json(json!({
            "error": "No session cookie found"
        })));
    };
    let session_token = cookie.value().to_string();

    match registry.send(GetClient { session_token: session_token.clone() }).await {
        Ok(ClientLookup::Found { context, .. }) => Ok((session_token, context)),
        Ok(ClientLookup::Expired) => Err(HttpResponse::Unauthorized().json(json!({
            "error": "Session expired"
        }))),
        Ok(ClientLookup::NotFound) => Err(HttpResponse::Unauthorized().json(json!({
            "error": "Invalid session"
        }))),
        Err(e) => {
            tracing::error!("Error retrieving session: {}", e);
            Err(HttpResponse::InternalServerError().json(json!({
                "error": "Internal server error"
            })))
        }
    }
}
