//! Subscriber gateway: connection admission, channel scoping, delivery.

use crate::error::{GatewayError, GatewayResult};
use crate::token::{TokenClaims, TokenVerifier, PERMISSION_SUBSCRIBE};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Channel namespace, matching the engine's event namespace.
    pub namespace: String,
    /// Per-connection delivery buffer, in messages.
    pub connection_buffer: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            namespace: "docbase".to_string(),
            connection_buffer: 64,
        }
    }
}

impl GatewayConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the channel namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the per-connection delivery buffer.
    #[must_use]
    pub const fn with_connection_buffer(mut self, buffer: usize) -> Self {
        self.connection_buffer = buffer;
        self
    }
}

/// Handle to an admitted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Returns the numeric id.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Connection {
    claims: TokenClaims,
    channels: HashSet<String>,
    sender: mpsc::Sender<Vec<u8>>,
}

/// Token-scoped fan-out of change events to live connections.
///
/// Admission verifies the capability token; subscriptions are filtered
/// to the channels the token's claims admit and only ever grow. The
/// delivery path forwards raw payloads verbatim and evicts connections
/// whose receiver is gone or whose buffer is full.
pub struct Gateway {
    config: GatewayConfig,
    verifier: TokenVerifier,
    connections: RwLock<HashMap<u64, Connection>>,
    next_id: AtomicU64,
}

impl Gateway {
    /// Creates a gateway verifying tokens with `verifier`.
    #[must_use]
    pub fn new(config: GatewayConfig, verifier: TokenVerifier) -> Self {
        Self {
            config,
            verifier,
            connections: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Admits a connection presenting `token`.
    ///
    /// Returns the connection handle and the receiving half the
    /// transport reads delivered payloads from. The connection starts
    /// with no subscriptions.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` on a malformed or mis-signed token, or one
    /// lacking the subscribe permission, and `TokenExpired` past expiry.
    pub fn connect(&self, token: &[u8]) -> GatewayResult<(ConnectionId, mpsc::Receiver<Vec<u8>>)> {
        let claims = self.verifier.verify(token)?;
        if !claims.has_permission(PERMISSION_SUBSCRIBE) {
            return Err(GatewayError::invalid_token("missing subscribe permission"));
        }

        let (sender, receiver) = mpsc::channel(self.config.connection_buffer);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.connections.write().insert(
            id,
            Connection {
                claims,
                channels: HashSet::new(),
                sender,
            },
        );

        tracing::debug!(connection = id, "connection admitted");
        Ok((ConnectionId(id), receiver))
    }

    /// Adds channels to a connection's subscription set.
    ///
    /// Requested channels outside the token's tenant and grant are
    /// silently dropped. The set only grows; there is no unsubscribe.
    /// Returns the connection's full subscription set, sorted.
    ///
    /// # Errors
    ///
    /// Returns `UnknownConnection` if the connection is not live.
    pub fn subscribe(&self, conn: ConnectionId, channels: &[String]) -> GatewayResult<Vec<String>> {
        let mut connections = self.connections.write();
        let connection = connections
            .get_mut(&conn.0)
            .ok_or(GatewayError::UnknownConnection { id: conn.0 })?;

        for channel in channels {
            if connection
                .claims
                .permits_channel(&self.config.namespace, channel)
            {
                connection.channels.insert(channel.clone());
            } else {
                tracing::debug!(connection = conn.0, %channel, "subscription refused");
            }
        }

        let mut subscribed: Vec<String> = connection.channels.iter().cloned().collect();
        subscribed.sort();
        Ok(subscribed)
    }

    /// Removes a connection from the table.
    pub fn disconnect(&self, conn: ConnectionId) {
        self.connections.write().remove(&conn.0);
    }

    /// Delivers a payload to every connection subscribed to `channel`.
    ///
    /// Connections whose receiver is gone or whose buffer is full are
    /// evicted; one slow consumer never delays the rest.
    pub fn dispatch(&self, channel: &str, payload: &[u8]) {
        let mut dead = Vec::new();
        {
            let connections = self.connections.read();
            for (id, connection) in connections.iter() {
                if !connection.channels.contains(channel) {
                    continue;
                }
                if connection.sender.try_send(payload.to_vec()).is_err() {
                    dead.push(*id);
                }
            }
        }

        if !dead.is_empty() {
            let mut connections = self.connections.write();
            for id in dead {
                connections.remove(&id);
                tracing::warn!(connection = id, "dropping unresponsive connection");
            }
        }
    }

    /// Returns the number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("config", &self.config)
            .field("connections", &self.connection_count())
            .finish_non_exhaustive()
    }
}
