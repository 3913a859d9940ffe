// web-server/src/api/commands.rs
use actix::Addr;
use actix_web::{post, web, HttpRequest, HttpResponse, Responder};
use serde_json::json;

use crate::client_registry::ClientRegistryActor;
use crate::view::{Command, CommandInput};
use super::current_client;

/// Run one page command and return the updated regions
#[post("/commands/{command}")]
pub async fn run_command(
    req: HttpRequest,
    path: web::Path<String>,
    body: Option<web::Json<CommandInput>>,
    registry: web::Data<Addr<ClientRegistryActor>>,
) -> impl Responder {
    let command = match path.parse::<Command>() {
        Ok(command) => command,
        Err(e) => {
            return HttpResponse::BadRequest().json(json!({
                "error": e.to_string()
            }));
        }
    };

    let (_, context) = match current_client(&req, &registry).await {
        Ok(client) => client,
        Err(response) => return response,
    };

    let input = body.map(web::Json::into_inner).unwrap_or_default();

    let mut context = context.lock().await;
    tracing::debug!("Running {:?}", command);
    context.run(command, &input).await;

    HttpResponse::Ok().json(context.snapshot())
}
