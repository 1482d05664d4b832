use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use reqwest::{Method, header::HeaderValue};
use sha2::Sha256;
use tracing::error;
use uuid::Uuid;

use crate::error::{Result, TimekeeperError};

type HmacSha256 = Hmac<Sha256>;

pub const AUTH_SCHEME: &str = "Nonce-Encoded-API-Key";

/// A single-use nonce. Never reuse one across requests.
pub fn new_nonce() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Base64 HMAC-SHA256 over `METHOD\nURL\nACTOR\nNONCE`, keyed with the shared secret.
pub fn sign(
    url: &str,
    method: &Method,
    actor: &str,
    shared_secret: &str,
    nonce: &str,
) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(shared_secret.as_bytes())
        .map_err(|e| TimekeeperError::Auth(e.to_string()))?;
    mac.update(format!("{}\n{}\n{}\n{}", method.as_str(), url, actor, nonce).as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

pub fn authorization_header(
    url: &str,
    method: &Method,
    actor: &str,
    api_key: &str,
    shared_secret: &str,
    nonce: &str,
) -> Result<HeaderValue> {
    let signature = sign(url, method, actor, shared_secret, nonce)?;
    let value = format!("{} {},{},{},{}", AUTH_SCHEME, api_key, nonce, signature, actor);

    match HeaderValue::from_str(&value) {
        Ok(mut header) => {
            header.set_sensitive(true);
            Ok(header)
        }
        Err(e) => {
            error!("Failed to create Authorization header value: {}", e);
            Err(TimekeeperError::Auth(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://tk.example.edu/tasks";

    #[test]
    fn same_inputs_sign_identically() {
        let a = sign(URL, &Method::POST, "jdoe", "secret", "n1").unwrap();
        let b = sign(URL, &Method::POST, "jdoe", "secret", "n1").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn signature_covers_method_actor_and_nonce() {
        let base = sign(URL, &Method::POST, "jdoe", "secret", "n1").unwrap();
        assert_ne!(base, sign(URL, &Method::PUT, "jdoe", "secret", "n1").unwrap());
        assert_ne!(base, sign(URL, &Method::POST, "asmith", "secret", "n1").unwrap());
        assert_ne!(base, sign(URL, &Method::POST, "jdoe", "secret", "n2").unwrap());
        assert_ne!(base, sign(URL, &Method::POST, "jdoe", "other", "n1").unwrap());
        assert_ne!(
            base,
            sign("https://tk.example.edu/tasks/1", &Method::POST, "jdoe", "secret", "n1").unwrap()
        );
    }

    #[test]
    fn nonces_are_fresh() {
        assert_ne!(new_nonce(), new_nonce());
    }

    #[test]
    fn header_carries_key_nonce_and_actor() {
        let header =
            authorization_header(URL, &Method::GET, "jdoe", "key-1", "secret", "abc").unwrap();
        assert!(header.is_sensitive());

        let value = header.to_str().unwrap();
        assert!(value.starts_with("Nonce-Encoded-API-Key key-1,abc,"));
        assert!(value.ends_with(",jdoe"));
    }
}
