// web-server/src/client_registry.rs
use actix::{Actor, AsyncContext, Context, Handler, Message, MessageResult, ResponseFuture, WrapFuture};
use common::models::session::ClientSession;
use dashmap::DashMap;
use std::time::Duration;
use uuid::Uuid;

use crate::context::{ContextBuilder, SharedContext};
use crate::utils::token::{create_session_token, is_session_token};

// Default session TTL in seconds (24 hours)
const DEFAULT_SESSION_TTL: i64 = 86400;

/// Actor message: register a browser session. A well-formed token from a
/// cookie the registry no longer knows is adopted so a stored login can be
/// restored.
#[derive(Message)]
#[rtype(result = "RegisteredClient")]
pub struct RegisterClient {
    pub session_token: Option<String>,
}

pub struct RegisteredClient {
    pub session: ClientSession,
    pub context: SharedContext,
}

/// Actor message: Get a client by session token
#[derive(Message)]
#[rtype(result = "ClientLookup")]
pub struct GetClient {
    pub session_token: String,
}

pub enum ClientLookup {
    Found {
        session: ClientSession,
        context: SharedContext,
    },
    NotFound,
    Expired,
}

/// Actor message: record the principal after login (`None` after logout)
#[derive(Message)]
#[rtype(result = "bool")]
pub struct SetPrincipal {
    pub session_token: String,
    pub principal: Option<String>,
}

/// Actor message: Invalidate/remove a client session
#[derive(Message)]
#[rtype(result = "Option<SharedContext>")]
pub struct InvalidateClient {
    pub session_token: String,
}

/// Actor message: Clean up expired sessions
#[derive(Message)]
#[rtype(result = "usize")]
pub struct CleanupExpiredSessions;

struct ClientEntry {
    session: ClientSession,
    context: SharedContext,
}

/// ClientRegistryActor for managing browser sessions and their contexts
pub struct ClientRegistryActor {
    // Map from session token to session data
    clients: DashMap<String, ClientEntry>,
    builder: ContextBuilder,
    // Session TTL in seconds
    session_ttl: i64,
    // Cleanup interval in seconds
    cleanup_interval: u64,
}

impl ClientRegistryActor {
    pub fn new(builder: ContextBuilder) -> Self {
        Self {
            clients: DashMap::new(),
            builder,
            session_ttl: DEFAULT_SESSION_TTL,
            cleanup_interval: 3600, // Run cleanup every hour
        }
    }

    pub fn with_ttl(mut self, ttl_seconds: i64) -> Self {
        self.session_ttl = ttl_seconds;
        self
    }

    pub fn with_cleanup_interval(mut self, interval_seconds: u64) -> Self {
        self.cleanup_interval = interval_seconds;
        self
    }

    /// Remove expired sessions, returning their tokens
    fn cleanup_sessions(&mut self) -> Vec<String> {
        let ttl = self.session_ttl;
        let mut expired = Vec::new();
        self.clients.retain(|token, entry| {
            let keep = !entry.session.is_expired(ttl);
            if !keep {
                expired.push(token.clone());
            }
            keep
        });
        expired
    }

    /// Drop session keys in the background
    fn release_keys(&self, session_tokens: Vec<String>, ctx: &mut Context<Self>) {
        let builder = self.builder.clone();
        ctx.spawn(
            async move {
                let swept = builder.release_keys(session_tokens).await;
                if swept > 0 {
                    tracing::info!("Swept {} expired session keys", swept);
                }
            }
            .into_actor(self),
        );
    }
}

impl Actor for ClientRegistryActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("ClientRegistryActor started with TTL: {}s", self.session_ttl);

        // Schedule periodic session cleanup
        ctx.run_interval(Duration::from_secs(self.cleanup_interval), |act, ctx| {
            let expired = act.cleanup_sessions();
            if !expired.is_empty() {
                tracing::info!("Cleaned up {} expired sessions", expired.len());
            }
            act.release_keys(expired, ctx);
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("ClientRegistryActor stopped with {} sessions", self.clients.len());
    }
}

impl Handler<RegisterClient> for ClientRegistryActor {
    type Result = MessageResult<RegisterClient>;

    fn handle(&mut self, msg: RegisterClient, _ctx: &mut Self::Context) -> Self::Result {
        let session_token = msg
            .session_token
            .filter(|token| is_session_token(token))
            .unwrap_or_else(create_session_token);

        let session = ClientSession::new_anonymous(Uuid::new_v4(), session_token.clone());
        let context = self.builder.build(&session_token);

        self.clients.insert(session_token, ClientEntry {
            session: session.clone(),
            context: context.clone(),
        });

        tracing::info!("Registered client: {}", session.client_id);

        MessageResult(RegisteredClient { session, context })
    }
}

impl Handler<GetClient> for ClientRegistryActor {
    type Result = MessageResult<GetClient>;

    fn handle(&mut self, msg: GetClient, ctx: &mut Self::Context) -> Self::Result {
        let result = if let Some(mut entry) = self.clients.get_mut(&msg.session_token) {
            let entry = entry.value_mut();

            // Check if session has expired
            if entry.session.is_expired(self.session_ttl) {
                tracing::debug!("Session expired: {}", entry.session.client_id);
                ClientLookup::Expired
            } else {
                entry.session.update_activity();
                ClientLookup::Found {
                    session: entry.session.clone(),
                    context: entry.context.clone(),
                }
            }
        } else {
            tracing::debug!("Session not found for token");
            ClientLookup::NotFound
        };

        if matches!(result, ClientLookup::Expired) {
            self.clients.remove(&msg.session_token);
            self.release_keys(vec![msg.session_token], ctx);
        }

        MessageResult(result)
    }
}

impl Handler<SetPrincipal> for ClientRegistryActor {
    type Result = bool;

    fn handle(&mut self, msg: SetPrincipal, _ctx: &mut Self::Context) -> Self::Result {
        match self.clients.get_mut(&msg.session_token) {
            Some(mut entry) => {
                let session = &mut entry.value_mut().session;
                match &msg.principal {
                    Some(principal) => tracing::info!("Client {} logged in as {}", session.client_id, principal),
                    None => tracing::info!("Client {} logged out", session.client_id),
                }
                session.set_principal(msg.principal);
                true
            },
            None => false,
        }
    }
}

impl Handler<InvalidateClient> for ClientRegistryActor {
    type Result = MessageResult<InvalidateClient>;

    fn handle(&mut self, msg: InvalidateClient, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.clients.remove(&msg.session_token).map(|(_, entry)| {
            tracing::info!("Invalidated session for client: {}", entry.session.client_id);
            entry.context
        }))
    }
}

impl Handler<CleanupExpiredSessions> for ClientRegistryActor {
    type Result = ResponseFuture<usize>;

    fn handle(&mut self, _msg: CleanupExpiredSessions, _ctx: &mut Self::Context) -> Self::Result {
        let expired = self.cleanup_sessions();
        let expired_count = expired.len();
        tracing::info!("Cleaned up {} expired sessions", expired_count);

        let builder = self.builder.clone();
        Box::pin(async move {
            builder.release_keys(expired).await;
            expired_count
        })
    }
}
