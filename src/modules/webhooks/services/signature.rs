use crate::core::{AppError, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the processor's signature
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Verifies `t=<unix>,v1=<hex>` webhook signatures
///
/// The MAC is computed over `"<t>." ++ body` using the raw request bytes, so
/// the body must not be decoded or re-serialized before verification.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<String>, tolerance_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    pub fn verify(&self, header: Option<&str>, body: &[u8]) -> Result<()> {
        self.verify_at(header, body, chrono::Utc::now().timestamp())
    }

    /// Verify against an explicit clock
    ///
    /// # Errors
    /// * `AppError::Authentication` - Header missing or malformed, timestamp
    ///   outside the tolerance window, or no `v1` signature matches
    pub fn verify_at(&self, header: Option<&str>, body: &[u8], now: i64) -> Result<()> {
        let header = header
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| AppError::authentication("Missing signature header"))?;

        let mut timestamp: Option<&str> = None;
        let mut signatures: Vec<&str> = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = Some(value),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| AppError::authentication("Signature header has no timestamp"))?;
        if signatures.is_empty() {
            return Err(AppError::authentication("Signature header has no v1 signature"));
        }

        let issued_at: i64 = timestamp
            .parse()
            .map_err(|_| AppError::authentication("Signature timestamp is not a number"))?;
        let tolerance = u64::try_from(self.tolerance_secs).unwrap_or(0);
        if now.abs_diff(issued_at) > tolerance {
            return Err(AppError::authentication(
                "Signature timestamp outside the tolerance window",
            ));
        }

        let mac = self.mac_for(timestamp, body)?;
        let matched = signatures.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });

        if matched {
            Ok(())
        } else {
            Err(AppError::authentication("Signature mismatch"))
        }
    }

    fn mac_for(&self, timestamp: &str, body: &[u8]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| AppError::Configuration(format!("Invalid webhook secret: {}", e)))?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        Ok(mac)
    }
}

/// Build a signature header value for `body` signed at `timestamp`
pub fn sign(secret: &str, timestamp: i64, body: &[u8]) -> Result<String> {
    let timestamp = timestamp.to_string();
    let mac = SignatureVerifier::new(secret, 0).mac_for(&timestamp, body)?;
    Ok(format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    ))
}
