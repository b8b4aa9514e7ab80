use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

const PREFIX: &str = "sha256=";

fn mac(secret: &str) -> Result<HmacSha256> {
    if secret.is_empty() {
        return Err(AppError::WebhookVerification(
            "Webhook secret is not configured".to_string(),
        ));
    }
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::WebhookVerification(format!("Invalid HMAC key: {e}")))
}

/// Check an `X-Hub-Signature-256` header (`sha256=<hex>`) against the body.
pub fn verify_signature(secret: &str, payload: &[u8], header: Option<&str>) -> Result<()> {
    let header = header.ok_or_else(|| {
        AppError::WebhookVerification("Missing X-Hub-Signature-256 header".to_string())
    })?;
    let hex_digest = header
        .strip_prefix(PREFIX)
        .ok_or_else(|| AppError::WebhookVerification("Missing sha256= prefix".to_string()))?;
    let expected = hex::decode(hex_digest)
        .map_err(|e| AppError::WebhookVerification(format!("Invalid hex in signature: {e}")))?;

    let mut mac = mac(secret)?;
    mac.update(payload);
    mac.verify_slice(&expected)
        .map_err(|_| AppError::WebhookVerification("Signature mismatch".to_string()))
}

/// Header value GitHub would send for `payload`.
pub fn sign(secret: &str, payload: &[u8]) -> Result<String> {
    let mut mac = mac(secret)?;
    mac.update(payload);
    Ok(format!("{PREFIX}{}", hex::encode(mac.finalize().into_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"action":"opened"}"#;

    #[test]
    fn test_signed_body_verifies() {
        let header = sign("s3cret", BODY).unwrap();
        assert!(verify_signature("s3cret", BODY, Some(&header)).is_ok());
    }

    #[test]
    fn test_tampered_body_or_wrong_secret_fails() {
        let header = sign("s3cret", BODY).unwrap();
        assert!(verify_signature("s3cret", b"{}", Some(&header)).is_err());
        assert!(verify_signature("other", BODY, Some(&header)).is_err());
    }

    #[test]
    fn test_malformed_headers() {
        for header in [None, Some("abcdef"), Some("sha256=zz")] {
            let err = verify_signature("s3cret", BODY, header).unwrap_err();
            assert!(matches!(err, AppError::WebhookVerification(_)));
        }
    }

    #[test]
    fn test_empty_secret_rejects_everything() {
        let err = verify_signature("", BODY, Some("sha256=00")).unwrap_err();
        assert!(matches!(err, AppError::WebhookVerification(msg) if msg.contains("not configured")));
    }
}
