// web-server/src/api/sessions.rs
use actix::Addr;
use actix_web::{get, post, delete, web, HttpRequest, HttpResponse, Responder, cookie::{Cookie, SameSite}};
use actix_web::cookie::time::Duration as CookieDuration;
use common::models::session::{ClientSession, ClientSessionResponse};
use common::Config;
use serde::Serialize;
use serde_json::json;

use crate::client_registry::{
    ClientLookup,
    ClientRegistryActor,
    GetClient,
    InvalidateClient,
    RegisterClient,
    SetPrincipal,
};
use crate::context::SharedContext;
use crate::view::ViewSnapshot;
use super::{current_client, COOKIE_MAX_AGE, SESSION_COOKIE_NAME};

/// Page load response: who is logged in and what the regions show
#[derive(Debug, Serialize)]
pub struct ClientResponse {
    #[serde(flatten)]
    pub session: ClientSessionResponse,
    pub identity_provider: String,
    pub view: ViewSnapshot,
    /// Why a stored login could not be restored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_error: Option<String>,
}

#[get("/")]
pub async fn api_index() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "name": "DecentFont front-end API",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// Page load: return the existing client or create one and restore its login
#[post("/client")]
pub async fn create_client(
    req: HttpRequest,
    registry: web::Data<Addr<ClientRegistryActor>>,
    config: web::Data<Config>,
) -> impl Responder {
    let cookie_token = req.cookie(SESSION_COOKIE_NAME).map(|cookie| cookie.value().to_string());
    // Only a token the registry has never seen (e.g. after a restart) is reused
    let mut adopt_token = None;

    if let Some(session_token) = cookie_token {
        match registry.send(GetClient { session_token: session_token.clone() }).await {
            Ok(ClientLookup::Found { session, context }) => {
                tracing::info!("Returning existing client session: {}", session.client_id);
                let response = client_response(session, &context, false, None).await;
                return HttpResponse::Ok().json(response);
            },
            Ok(ClientLookup::Expired) => {
                tracing::info!("Session expired, creating new client");
            },
            Ok(ClientLookup::NotFound) => {
                tracing::info!("Unknown session cookie, re-registering it");
                adopt_token = Some(session_token);
            },
            Err(e) => {
                tracing::error!("Error retrieving session: {}", e);
                return HttpResponse::InternalServerError().json(json!({
                    "error": "Internal server error"
                }));
            }
        }
    }

    let registered = match registry.send(RegisterClient { session_token: adopt_token }).await {
        Ok(registered) => registered,
        Err(e) => {
            tracing::error!("Error creating client: {}", e);
            return HttpResponse::InternalServerError().json(json!({
                "error": "Internal server error"
            }));
        }
    };

    let mut session = registered.session;
    let session_error = {
        let mut context = registered.context.lock().await;
        let restored = context.load().await;
        session.set_principal(context.status().principal().map(str::to_string));
        restored.err()
    };

    if let Some(e) = &session_error {
        tracing::warn!("Could not restore login for client {}: {}", session.client_id, e);
    }

    if session.is_authenticated() {
        let update = SetPrincipal {
            session_token: session.session_token.clone(),
            principal: session.principal.clone(),
        };
        if let Err(e) = registry.send(update).await {
            tracing::error!("Error updating session: {}", e);
        }
    }

    let cookie = Cookie::build(SESSION_COOKIE_NAME, session.session_token.clone())
        .path("/")
        .secure(config.session.secure_cookie)
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(CookieDuration::seconds(COOKIE_MAX_AGE))
        .finish();

    tracing::info!("Created new client session: {}", session.client_id);

    let response = client_response(
        session,
        &registered.context,
        true,
        session_error.map(|e| e.to_string()),
    ).await;

    HttpResponse::Ok()
        .cookie(cookie)
        .json(response)
}

// Current contents of the display regions
#[get("/client/view")]
pub async fn get_view(
    req: HttpRequest,
    registry: web::Data<Addr<ClientRegistryActor>>,
) -> impl Responder {
    match current_client(&req, &registry).await {
        Ok((_, context)) => HttpResponse::Ok().json(context.lock().await.snapshot()),
        Err(response) => response,
    }
}

// Log out and forget the client session
#[delete("/client/session")]
pub async fn invalidate_session(
    req: HttpRequest,
    registry: web::Data<Addr<ClientRegistryActor>>,
) -> impl Responder {
    let Some(cookie) = req.cookie(SESSION_COOKIE_NAME) else {
        return HttpResponse::BadRequest().json(json!({
            "error": "No session cookie found"
        }));
    };
    let session_token = cookie.value().to_string();

    match registry.send(InvalidateClient { session_token }).await {
        Ok(Some(context)) => {
            if let Err(e) = context.lock().await.logout().await {
                tracing::warn!("Logout during invalidation failed: {}", e);
            }

            // Create empty cookie to clear the session
            let cookie = Cookie::build(SESSION_COOKIE_NAME, "")
                .path("/")
                .max_age(CookieDuration::seconds(0))
                .finish();

            tracing::info!("Session invalidated successfully");

            HttpResponse::Ok()
                .cookie(cookie)
                .json(json!({
                    "status": "success",
                    "message": "Session invalidated"
                }))
        },
        Ok(None) => {
            tracing::info!("Attempt to invalidate non-existent session");
            HttpResponse::NotFound().json(json!({
                "error": "Session not found"
            }))
        },
        Err(e) => {
            tracing::error!("Error invalidating session: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "error": "Internal server error"
            }))
        }
    }
}

async fn client_response(
    session: ClientSession,
    context: &SharedContext,
    new_session: bool,
    session_error: Option<String>,
) -> ClientResponse {
    let mut context = context.lock().await;

    let mut summary = ClientSessionResponse::from(&session);
    summary.new_session = new_session;

    ClientResponse {
        session: summary,
        identity_provider: context.identity_provider().to_string(),
        view: context.snapshot(),
        session_error,
    }
}
