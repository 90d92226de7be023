//! Signed, expiring, path-bound download tokens.
//!
//! A token is `base64url(path|expires_at) . base64url(hmac_sha256(payload))`.
//! Whoever holds the string holds a capability for exactly that object key
//! until expiry; tokens are not revocable and not prefix-scoped.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TTL_SECS: i64 = 300;

#[derive(Clone, Debug, PartialEq)]
pub struct VerifiedToken {
    pub path: String,
    pub expires_at: i64,
}

/// Single undifferentiated failure: callers can never tell a parse error
/// from a bad signature from an expired token.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InvalidToken;

pub fn issue(path: &str, secret: &str, ttl_secs: i64) -> String {
    issue_at(path, secret, ttl_secs, Utc::now())
}

pub fn issue_at(path: &str, secret: &str, ttl_secs: i64, now: DateTime<Utc>) -> String {
    let expires_at = (now + Duration::seconds(ttl_secs)).timestamp();
    let payload = format!("{path}|{expires_at}");
    let signature = sign(payload.as_bytes(), secret);
    format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(payload.as_bytes()),
        URL_SAFE_NO_PAD.encode(signature)
    )
}

pub fn verify(token: &str, secret: &str) -> Result<VerifiedToken, InvalidToken> {
    verify_at(token, secret, Utc::now())
}

pub fn verify_at(
    token: &str,
    secret: &str,
    now: DateTime<Utc>,
) -> Result<VerifiedToken, InvalidToken> {
    let (payload_b64, sig_b64) = token.split_once('.').ok_or(InvalidToken)?;
    let payload = URL_SAFE_NO_PAD.decode(payload_b64).map_err(|_| InvalidToken)?;
    let signature = URL_SAFE_NO_PAD.decode(sig_b64).map_err(|_| InvalidToken)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(&payload);
    // Constant-time comparison.
    mac.verify_slice(&signature).map_err(|_| InvalidToken)?;

    let payload = String::from_utf8(payload).map_err(|_| InvalidToken)?;
    let (path, expires_str) = payload.rsplit_once('|').ok_or(InvalidToken)?;
    let expires_at: i64 = expires_str.parse().map_err(|_| InvalidToken)?;
    if expires_at < now.timestamp() {
        return Err(InvalidToken);
    }

    Ok(VerifiedToken {
        path: path.to_string(),
        expires_at,
    })
}

fn sign(payload: &[u8], secret: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-signing-secret";

    #[test]
    fn round_trip_verifies_immediately() {
        let token = issue("docs/report.pdf", SECRET, DEFAULT_TTL_SECS);
        let verified = verify(&token, SECRET).expect("fresh token must verify");
        assert_eq!(verified.path, "docs/report.pdf");
    }

    #[test]
    fn expired_token_is_rejected() {
        let issued = Utc::now();
        let token = issue_at("docs/report.pdf", SECRET, 300, issued);
        // Still valid right at the expiry instant, invalid one second past.
        assert!(verify_at(&token, SECRET, issued + Duration::seconds(300)).is_ok());
        assert_eq!(
            verify_at(&token, SECRET, issued + Duration::seconds(301)),
            Err(InvalidToken)
        );
    }

    #[test]
    fn any_single_bit_mutation_invalidates() {
        let token = issue("docs/report.pdf", SECRET, DEFAULT_TTL_SECS);
        let bytes = token.as_bytes();
        for i in 0..bytes.len() {
            for bit in 0..8 {
                let mut mutated = bytes.to_vec();
                mutated[i] ^= 1 << bit;
                let Ok(mutated) = String::from_utf8(mutated) else {
                    continue;
                };
                if mutated == token {
                    continue;
                }
                assert_eq!(
                    verify(&mutated, SECRET),
                    Err(InvalidToken),
                    "mutation at byte {i} bit {bit} still verified"
                );
            }
        }
    }

    #[test]
    fn token_binds_to_exactly_one_path() {
        let token = issue("a.txt", SECRET, DEFAULT_TTL_SECS);
        let verified = verify(&token, SECRET).unwrap();
        assert_ne!(verified.path, "b.txt");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue("a.txt", SECRET, DEFAULT_TTL_SECS);
        assert_eq!(verify(&token, "other-secret"), Err(InvalidToken));
    }

    #[test]
    fn garbage_is_rejected() {
        for junk in ["", ".", "abc", "a.b.c", "!!!.???"] {
            assert_eq!(verify(junk, SECRET), Err(InvalidToken));
        }
    }
}
