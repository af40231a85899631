//! Broker state: connection table and client sessions.
//!
//! All methods are pure state transitions with no socket I/O. Error
//! strings are machine-readable reasons sent back in `hello_ack` or
//! `response` messages.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use crate::facade::TelecomFacade;
use crate::ipc::protocol::Role;
use crate::telephony::TelephonyPlatform;

use super::registry::ListenerRegistry;
use super::sink::{ChannelSink, OutboundEvent};

/// Unique identifier for a client connection.
///
/// Monotonically increasing counter. Used to route events and
/// responses back to the owning connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A handshaken client session.
///
/// Owns the session's listener registry; dropping the session detaches
/// every listener it attached.
pub struct Session {
    pub id: String,
    pub role: Role,
    pub registry: ListenerRegistry,
}

struct ConnectionEntry {
    /// Outbound queue for unsolicited events.
    outbound: mpsc::UnboundedSender<OutboundEvent>,
    session: Option<Session>,
}

/// Connection table plus the facade shared by all sessions.
///
/// Owned exclusively by the broker loop. No concurrent access.
pub struct BrokerState {
    facade: TelecomFacade,
    connections: HashMap<ConnectionId, ConnectionEntry>,
}

impl BrokerState {
    pub fn new(platform: Arc<dyn TelephonyPlatform>) -> Self {
        Self {
            facade: TelecomFacade::new(platform),
            connections: HashMap::new(),
        }
    }

    pub fn platform(&self) -> &Arc<dyn TelephonyPlatform> {
        self.facade.platform()
    }

    /// Track a new connection and its outbound event queue.
    pub fn add_connection(
        &mut self,
        id: ConnectionId,
        outbound: mpsc::UnboundedSender<OutboundEvent>,
    ) {
        self.connections.insert(
            id,
            ConnectionEntry {
                outbound,
                session: None,
            },
        );
    }

    /// Remove a connection. Its session, if any, is closed and its
    /// listeners detached.
    pub fn remove_connection(&mut self, id: ConnectionId) {
        if let Some(entry) = self.connections.remove(&id) {
            if let Some(session) = entry.session {
                tracing::debug!(
                    session = %session.id,
                    listeners = session.registry.len(),
                    "session closed"
                );
            }
        }
    }

    /// Open a session on a connection after a successful handshake.
    ///
    /// Returns the new session id. Returns `Err("unknown_connection")`
    /// if the connection is not tracked and `Err("duplicate_hello")` if
    /// it already has a session.
    pub fn open_session(&mut self, id: ConnectionId, role: Role) -> Result<String, &'static str> {
        let platform = Arc::clone(self.facade.platform());
        let entry = self
            .connections
            .get_mut(&id)
            .ok_or("unknown_connection")?;
        if entry.session.is_some() {
            return Err("duplicate_hello");
        }
        let sink = Arc::new(ChannelSink::new(entry.outbound.clone()));
        let session_id = uuid::Uuid::new_v4().to_string();
        entry.session = Some(Session {
            id: session_id.clone(),
            role,
            registry: ListenerRegistry::new(platform, sink),
        });
        tracing::info!(session = %session_id, ?role, "session opened");
        Ok(session_id)
    }

    /// Role of the connection's session, if it has one.
    pub fn role(&self, id: ConnectionId) -> Option<Role> {
        self.connections
            .get(&id)
            .and_then(|entry| entry.session.as_ref())
            .map(|session| session.role)
    }

    /// The facade together with the connection's session, borrowed
    /// side by side for command execution.
    pub fn session_mut(&mut self, id: ConnectionId) -> Option<(&TelecomFacade, &mut Session)> {
        let session = self.connections.get_mut(&id)?.session.as_mut()?;
        Some((&self.facade, session))
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
