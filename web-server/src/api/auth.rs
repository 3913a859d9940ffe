// web-server/src/api/auth.rs
use actix::Addr;
use actix_web::{post, web, HttpRequest, HttpResponse, Responder};
use serde::Serialize;
use serde_json::json;

use crate::client_registry::{ClientRegistryActor, SetPrincipal};
use crate::session::SessionStatus;
use crate::view::ViewSnapshot;
use super::current_client;

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub status: SessionStatus,
    pub identity_provider: String,
    pub view: ViewSnapshot,
}

#[derive(Debug, Clone, Copy)]
enum AuthAction {
    Login,
    Logout,
    Toggle,
}

#[post("/auth/login")]
pub async fn login(req: HttpRequest, registry: web::Data<Addr<ClientRegistryActor>>) -> impl Responder {
    authenticate(req, registry, AuthAction::Login).await
}

#[post("/auth/logout")]
pub async fn logout(req: HttpRequest, registry: web::Data<Addr<ClientRegistryActor>>) -> impl Responder {
    authenticate(req, registry, AuthAction::Logout).await
}

/// The login button
#[post("/auth/toggle")]
pub async fn toggle(req: HttpRequest, registry: web::Data<Addr<ClientRegistryActor>>) -> impl Responder {
    authenticate(req, registry, AuthAction::Toggle).await
}

async fn authenticate(
    req: HttpRequest,
    registry: web::Data<Addr<ClientRegistryActor>>,
    action: AuthAction,
) -> HttpResponse {
    let (session_token, context) = match current_client(&req, &registry).await {
        Ok(client) => client,
        Err(response) => return response,
    };

    let mut context = context.lock().await;
    let result = match action {
        AuthAction::Login => context.login().await,
        AuthAction::Logout => context.logout().await,
        AuthAction::Toggle => context.toggle_login().await,
    };

    let principal = context.status().principal().map(str::to_string);
    if let Err(e) = registry.send(SetPrincipal { session_token, principal }).await {
        tracing::error!("Error updating session: {}", e);
    }

    match result {
        Ok(()) => HttpResponse::Ok().json(AuthResponse {
            status: context.status().clone(),
            identity_provider: context.identity_provider().to_string(),
            view: context.snapshot(),
        }),
        Err(e) => {
            tracing::error!("{:?} failed: {}", action, e);
            HttpResponse::BadGateway().json(json!({
                "error": e.to_string(),
                "view": context.snapshot()
            }))
        }
    }
}
