// common/src/models/session.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Browser session tracked by the front-end server, anonymous until login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSession {
    /// Unique client identifier
    pub client_id: Uuid,
    /// Secure session token used for cookie-based tracking
    pub session_token: String,
    /// Timestamp when the session was created
    pub created_at: DateTime<Utc>,
    /// Timestamp of last client activity
    pub last_active: DateTime<Utc>,
    /// Principal text of the logged-in identity
    pub principal: Option<String>,
}

impl ClientSession {
    /// Create a new anonymous client session
    pub fn new_anonymous(client_id: Uuid, session_token: String) -> Self {
        let now = Utc::now();
        Self {
            client_id,
            session_token,
            created_at: now,
            last_active: now,
            principal: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    /// Update session activity timestamp
    pub fn update_activity(&mut self) {
        self.last_active = Utc::now();
    }

    /// Check if the session has expired based on TTL
    pub fn is_expired(&self, ttl_seconds: i64) -> bool {
        let now = Utc::now();
        let age = now.signed_duration_since(self.last_active);
        age.num_seconds() > ttl_seconds
    }

    /// Record the principal of a completed login, or clear it on logout
    pub fn set_principal(&mut self, principal: Option<String>) {
        self.principal = principal;
        self.update_activity();
    }
}

/// Response structure for session API endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSessionResponse {
    pub client_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub is_authenticated: bool,
    pub principal: Option<String>,
    pub new_session: bool,
    // Omit sensitive data like session_token
}

impl From<&ClientSession> for ClientSessionResponse {
    fn from(session: &ClientSession) -> Self {
        Self {
            client_id: session.client_id,
            created_at: session.created_at,
            is_authenticated: session.is_authenticated(),
            principal: session.principal.clone(),
            new_session: false,
        }
    }
}
