//! Server configuration.

use docbase_core::EngineConfig;
use docbase_realtime::{GatewayConfig, DEFAULT_TOKEN_LIFETIME};
use std::time::Duration;

/// Configuration for the server facade.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Engine configuration.
    pub engine: EngineConfig,
    /// Gateway configuration. Its namespace is overridden with the
    /// engine's so publisher and gateway always agree on channel names.
    pub gateway: GatewayConfig,
    /// Shared secret for capability-token signing.
    ///
    /// The default is a development value; deployments must set their
    /// own secret.
    pub secret: Vec<u8>,
    /// Lifetime of issued tokens.
    pub token_lifetime: Duration,
    /// Capacity of the in-process event bus.
    pub bus_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            gateway: GatewayConfig::default(),
            secret: b"docbase-dev-secret".to_vec(),
            token_lifetime: DEFAULT_TOKEN_LIFETIME,
            bus_capacity: 1024,
        }
    }
}

impl ServerConfig {
    /// Creates a configuration with the given signing secret.
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            ..Self::default()
        }
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Sets the gateway configuration.
    #[must_use]
    pub fn with_gateway(mut self, gateway: GatewayConfig) -> Self {
        self.gateway = gateway;
        self
    }

    /// Sets the token lifetime.
    #[must_use]
    pub const fn with_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.token_lifetime = lifetime;
        self
    }

    /// Sets the event bus capacity.
    #[must_use]
    pub const fn with_bus_capacity(mut self, capacity: usize) -> Self {
        self.bus_capacity = capacity;
        self
    }
}
