//! Server facade wiring the engine, event bus, and gateway together.

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::handler::RequestHandler;
use docbase_core::{DocumentStore, EventBus, EventPublisher, InProcessBus};
use docbase_realtime::{spawn_bridge, Gateway, TokenIssuer, TokenVerifier};
use docbase_storage::StorageBackend;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// The assembled docbase server.
///
/// Owns the document store, the in-process event bus, the fan-out
/// gateway, and the token issuer, wired so every mutation reaches the
/// gateway's subscribers. A routing shell maps transport requests onto
/// [`handler`](Self::handler) and drives gateway connections from its
/// sockets.
///
/// # Example
///
/// ```
/// use docbase_server::{DocbaseServer, ServerConfig};
/// use docbase_storage::InMemoryBackend;
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let server = DocbaseServer::new(
///     ServerConfig::new(b"secret".to_vec()),
///     Arc::new(InMemoryBackend::new()),
/// );
/// let token = server.issue_token("acme", "*").unwrap();
/// let (_conn, _rx) = server.gateway().connect(&token).unwrap();
/// # }
/// ```
pub struct DocbaseServer {
    handler: RequestHandler,
    gateway: Arc<Gateway>,
    issuer: TokenIssuer,
    bus: Arc<InProcessBus>,
    _bridge: JoinHandle<()>,
}

impl DocbaseServer {
    /// Builds the server on the given backend.
    ///
    /// The gateway's namespace is taken from the engine configuration
    /// so published channels and subscription grants line up. Must run
    /// inside a tokio runtime; the event bridge is spawned here.
    #[must_use]
    pub fn new(config: ServerConfig, backend: Arc<dyn StorageBackend>) -> Self {
        let bus = Arc::new(InProcessBus::new(config.bus_capacity));
        let publisher = EventPublisher::new(
            config.engine.namespace.clone(),
            Arc::clone(&bus) as Arc<dyn EventBus>,
            config.engine.event_queue_capacity,
        );
        let store = DocumentStore::new(backend, config.engine.clone()).with_events(publisher);

        let gateway_config = config
            .gateway
            .with_namespace(config.engine.namespace.clone());
        let gateway = Arc::new(Gateway::new(
            gateway_config,
            TokenVerifier::new(config.secret.clone()),
        ));
        let bridge = spawn_bridge(Arc::clone(&gateway), &bus);
        tracing::info!(
            namespace = %config.engine.namespace,
            bus_capacity = config.bus_capacity,
            "server assembled"
        );

        Self {
            handler: RequestHandler::new(Arc::new(store)),
            gateway,
            issuer: TokenIssuer::new(config.secret).with_lifetime(config.token_lifetime),
            bus,
            _bridge: bridge,
        }
    }

    /// Returns the request handler.
    #[must_use]
    pub fn handler(&self) -> &RequestHandler {
        &self.handler
    }

    /// Returns the fan-out gateway.
    #[must_use]
    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    /// Returns the underlying document store.
    #[must_use]
    pub fn store(&self) -> &Arc<DocumentStore> {
        self.handler.store()
    }

    /// Returns the in-process event bus.
    #[must_use]
    pub fn bus(&self) -> &Arc<InProcessBus> {
        &self.bus
    }

    /// Issues a subscribe-capable token for a tenant and grant.
    ///
    /// # Errors
    ///
    /// Returns an error if the claims cannot be serialized.
    pub fn issue_token(&self, tenant: &str, grant: &str) -> ServerResult<Vec<u8>> {
        let token = self.issuer.issue(
            tenant,
            grant,
            vec![docbase_realtime::PERMISSION_SUBSCRIBE.to_string()],
        )?;
        Ok(token)
    }
}

impl std::fmt::Debug for DocbaseServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocbaseServer")
            .field("connections", &self.gateway.connection_count())
            .finish_non_exhaustive()
    }
}
