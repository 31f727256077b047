//! Audit event actors.

use serde::{Deserialize, Serialize};

/// What kind of entity initiated an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    /// A human user.
    User,
    /// An AI agent acting autonomously or semi-autonomously.
    Agent,
    /// The system itself (schedulers, migrations, background jobs).
    System,
}

/// The entity that initiated an audit event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Kind of actor.
    pub kind: ActorKind,
    /// Stable identifier (user id, agent id, component name).
    pub id: String,
    /// Human-readable name, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Originating network address, if applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_address: Option<String>,
    /// Client software description (user agent, SDK version).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_info: Option<String>,
    /// Session the action belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl Actor {
    /// Create a user actor.
    pub fn user(id: impl Into<String>) -> Self {
        Self::new(ActorKind::User, id)
    }

    /// Create an agent actor.
    pub fn agent(id: impl Into<String>) -> Self {
        Self::new(ActorKind::Agent, id)
    }

    /// Create a system actor.
    pub fn system(component: impl Into<String>) -> Self {
        Self::new(ActorKind::System, component)
    }

    fn new(kind: ActorKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            display_name: None,
            network_address: None,
            client_info: None,
            session_id: None,
        }
    }

    /// Add a display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Add a network address.
    pub fn with_network_address(mut self, addr: impl Into<String>) -> Self {
        self.network_address = Some(addr.into());
        self
    }

    /// Add a session id.
    pub fn with_session_id(mut self, session: impl Into<String>) -> Self {
        self.session_id = Some(session.into());
        self
    }

    /// Get a display identifier for this actor.
    pub fn identifier(&self) -> String {
        match self.kind {
            ActorKind::User => self
                .display_name
                .clone()
                .unwrap_or_else(|| self.id.clone()),
            ActorKind::Agent => format!("agent:{}", self.id),
            ActorKind::System => format!("system:{}", self.id),
        }
    }
}
