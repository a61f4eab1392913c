//! Capability tokens for realtime subscribers.
//!
//! A token is the serialized claims JSON followed by a 32-byte
//! HMAC-SHA256 trailer over those bytes, signed with a shared secret.
//! Tokens are opaque bytes on the wire; callers base64 them for
//! transports that need text.

use crate::error::{GatewayError, GatewayResult};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Length of the HMAC-SHA256 trailer.
pub const SIGNATURE_LEN: usize = 32;

/// Grant value admitting every collection of the tenant.
pub const WILDCARD_GRANT: &str = "*";

/// Default token lifetime: 24 hours.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Permission required to subscribe to channels.
pub const PERMISSION_SUBSCRIBE: &str = "subscribe";

/// The signed claims carried by a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// The tenant the token is scoped to.
    pub tenant: String,
    /// A collection name, or [`WILDCARD_GRANT`] for all collections.
    pub grant: String,
    /// Granted permissions, e.g. `["subscribe"]`.
    pub permissions: Vec<String>,
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Expiry, Unix seconds.
    pub exp: i64,
}

impl TokenClaims {
    /// Returns true if the expiry has passed at `now` (Unix seconds).
    #[must_use]
    pub const fn is_expired(&self, now: i64) -> bool {
        now >= self.exp
    }

    /// Returns true if the claims carry the permission.
    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// Returns true if the claims admit `channel` under `namespace`.
    ///
    /// A channel is `{namespace}:{tenant}:{collection}`; the tenant must
    /// match exactly and the collection must match the grant, with
    /// [`WILDCARD_GRANT`] admitting every collection.
    #[must_use]
    pub fn permits_channel(&self, namespace: &str, channel: &str) -> bool {
        let Some(rest) = channel.strip_prefix(namespace).and_then(|r| r.strip_prefix(':')) else {
            return false;
        };
        let Some((tenant, collection)) = rest.split_once(':') else {
            return false;
        };
        tenant == self.tenant
            && !collection.is_empty()
            && (self.grant == WILDCARD_GRANT || self.grant == collection)
    }
}

/// Issues signed capability tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: Vec<u8>,
    lifetime: Duration,
}

impl TokenIssuer {
    /// Creates an issuer with the default 24-hour lifetime.
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            lifetime: DEFAULT_TOKEN_LIFETIME,
        }
    }

    /// Sets the token lifetime.
    #[must_use]
    pub const fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Issues a token for a tenant with the given collection grant.
    ///
    /// # Errors
    ///
    /// Returns an error if the claims cannot be serialized.
    pub fn issue(
        &self,
        tenant: impl Into<String>,
        grant: impl Into<String>,
        permissions: Vec<String>,
    ) -> GatewayResult<Vec<u8>> {
        let iat = Utc::now().timestamp();
        let exp = iat + self.lifetime.as_secs() as i64;
        let claims = TokenClaims {
            tenant: tenant.into(),
            grant: grant.into(),
            permissions,
            iat,
            exp,
        };

        let mut token = serde_json::to_vec(&claims)?;
        let signature = sign(&self.secret, &token);
        token.extend_from_slice(&signature);
        Ok(token)
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

/// Verifies token signatures and expiry.
#[derive(Clone)]
pub struct TokenVerifier {
    secret: Vec<u8>,
}

impl TokenVerifier {
    /// Creates a verifier sharing the issuer's secret.
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Verifies a token and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` on a malformed or mis-signed token and
    /// `TokenExpired` past the expiry.
    pub fn verify(&self, token: &[u8]) -> GatewayResult<TokenClaims> {
        if token.len() <= SIGNATURE_LEN {
            return Err(GatewayError::invalid_token("token too short"));
        }
        let (body, signature) = token.split_at(token.len() - SIGNATURE_LEN);

        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(body);
        if mac.verify_slice(signature).is_err() {
            return Err(GatewayError::invalid_token("signature mismatch"));
        }

        let claims: TokenClaims = serde_json::from_slice(body)
            .map_err(|_| GatewayError::invalid_token("malformed claims"))?;
        if claims.is_expired(Utc::now().timestamp()) {
            return Err(GatewayError::TokenExpired);
        }
        Ok(claims)
    }
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier").finish_non_exhaustive()
    }
}

fn sign(secret: &[u8], data: &[u8]) -> [u8; SIGNATURE_LEN] {
    let mut mac =
        HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().into()
}
