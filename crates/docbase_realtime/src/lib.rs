//! Real-time change fan-out for docbase.
//!
//! Subscribers present an HMAC-signed capability token scoped to one
//! tenant and one collection grant (or a wildcard). The [`Gateway`]
//! admits connections, filters subscription requests to what the token
//! permits, and forwards change-event payloads verbatim. The bridge
//! couples the gateway to the engine's in-process event bus.
//!
//! The transport itself (WebSocket, SSE) is out of scope; a routing
//! shell owns the sockets and drives [`Gateway::connect`],
//! [`Gateway::subscribe`], and the per-connection receivers.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod bridge;
mod error;
mod gateway;
mod token;

pub use bridge::spawn_bridge;
pub use error::{GatewayError, GatewayResult};
pub use gateway::{ConnectionId, Gateway, GatewayConfig};
pub use token::{
    TokenClaims, TokenIssuer, TokenVerifier, DEFAULT_TOKEN_LIFETIME, PERMISSION_SUBSCRIBE,
    SIGNATURE_LEN, WILDCARD_GRANT,
};
