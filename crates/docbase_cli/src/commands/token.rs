//! Token issue and verify command implementations.

use docbase_realtime::{TokenIssuer, TokenVerifier, PERMISSION_SUBSCRIBE};
use std::time::Duration;

/// Issues a subscribe token and prints it hex-encoded.
pub fn issue(
    secret: &str,
    tenant: &str,
    grant: &str,
    lifetime: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut issuer = TokenIssuer::new(secret.as_bytes().to_vec());
    if let Some(secs) = lifetime {
        issuer = issuer.with_lifetime(Duration::from_secs(secs));
    }

    let token = issuer.issue(tenant, grant, vec![PERMISSION_SUBSCRIBE.to_string()])?;
    println!("{}", hex_encode(&token));
    Ok(())
}

/// Verifies a hex-encoded token and prints its claims.
pub fn verify(secret: &str, token: &str) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = hex_decode(token).ok_or("Token is not valid hex")?;
    let verifier = TokenVerifier::new(secret.as_bytes().to_vec());
    let claims = verifier.verify(&bytes)?;

    println!("{}", serde_json::to_string_pretty(&claims)?);
    Ok(())
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

fn hex_decode(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(text.get(i..i + 2)?, 16).ok())
        .collect()
}
