//! Bridge from the engine's event bus to the gateway.

use crate::gateway::Gateway;
use docbase_core::InProcessBus;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Spawns the delivery task feeding bus messages into the gateway.
///
/// The task runs until the bus is dropped. A lagged subscription skips
/// the missed messages and keeps going; realtime delivery is
/// best-effort and subscribers reconcile through queries.
pub fn spawn_bridge(gateway: Arc<Gateway>, bus: &InProcessBus) -> JoinHandle<()> {
    let mut subscription = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match subscription.recv().await {
                Ok(message) => gateway.dispatch(&message.channel, &message.payload),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "gateway bridge lagged behind the event bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!("gateway bridge stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayConfig;
    use crate::token::{TokenIssuer, TokenVerifier, PERMISSION_SUBSCRIBE};
    use docbase_core::EventBus;

    const SECRET: &[u8] = b"test-secret-key-32-bytes-long!!";

    #[tokio::test]
    async fn bus_messages_reach_subscribers() {
        let bus = InProcessBus::new(16);
        let gateway = Arc::new(Gateway::new(
            GatewayConfig::default(),
            TokenVerifier::new(SECRET),
        ));
        let handle = spawn_bridge(Arc::clone(&gateway), &bus);

        let token = TokenIssuer::new(SECRET)
            .issue("acme", "users", vec![PERMISSION_SUBSCRIBE.to_string()])
            .unwrap();
        let (conn, mut rx) = gateway.connect(&token).unwrap();
        gateway
            .subscribe(conn, &["docbase:acme:users".to_string()])
            .unwrap();

        bus.publish("docbase:acme:users", b"{\"type\":\"insert\"}")
            .unwrap();
        bus.publish("docbase:globex:users", b"{}").unwrap();

        assert_eq!(rx.recv().await.unwrap(), b"{\"type\":\"insert\"}");
        assert!(rx.try_recv().is_err());

        drop(bus);
        handle.await.unwrap();
    }
}
