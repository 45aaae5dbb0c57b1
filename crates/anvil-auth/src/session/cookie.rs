//! The cookie-backed store: the session data round-trips inside the
//! cookie itself, HMAC-signed so a client can't forge it, rather than
//! living server-side. Signs only, rather than encrypting, since the
//! engine core's config surface doesn't carry a session encryption key,
//! only a signing one.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::session::store::{SessionData, Store, StoredSession};

/// Packs/unpacks session data into the opaque string a cookie carries,
/// and verifies it wasn't tampered with.
pub struct CookieStore {
    secret: SecretString,
}

impl CookieStore {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// `base64(json) + "." + base64(hmac-sha256(json, secret))`. Plain
    /// HMAC-SHA256 rather than `hmac` crate's typed API, matching the
    /// workspace's existing `sha2`-only dependency footprint (`anvil-http`
    /// derives ETags the same way).
    fn sign(&self, payload: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.expose_secret().as_bytes());
        hasher.update(payload);
        let digest = hasher.finalize();
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
    }

    pub fn encode(&self, data: &SessionData) -> Result<String> {
        let json = serde_json::to_vec(data)?;
        let body = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&json);
        let signature = self.sign(&json);
        Ok(format!("{body}.{signature}"))
    }

    pub fn decode(&self, cookie_value: &str) -> Result<SessionData> {
        let (body, signature) = cookie_value
            .split_once('.')
            .ok_or_else(|| Error::StoreUnavailable("malformed session cookie".into()))?;
        let json = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|e| Error::StoreUnavailable(format!("invalid base64: {e}")))?;
        if self.sign(&json) != signature {
            return Err(Error::StoreUnavailable("session cookie signature mismatch".into()));
        }
        Ok(serde_json::from_slice(&json)?)
    }
}

/// A [`Store`] whose `load`/`save`/`destroy` are no-ops: the cookie *is*
/// the session, so by the time `load` would be called the middleware has
/// already decoded it from the request's cookie jar via
/// [`CookieStore::decode`] directly. Registered only so `cookie` strategy
/// selection has a `Store` to report, matching how every other strategy
/// reports one.
#[async_trait]
impl Store for CookieStore {
    async fn load(&self, _id: &str) -> Result<Option<StoredSession>> {
        Ok(None)
    }

    async fn save(&self, _id: &str, _data: SessionData, _expiry: Duration) -> Result<()> {
        Ok(())
    }

    async fn destroy(&self, _id: &str) -> Result<()> {
        Ok(())
    }

    async fn regenerate_id(&self, _old: &str, _new: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_round_trips() {
        let store = CookieStore::new(SecretString::from("test-signing-key".to_string()));
        let mut data = SessionData::new();
        data.insert("user_id".into(), serde_json::json!(7));

        let encoded = store.encode(&data).unwrap();
        let decoded = store.decode(&encoded).unwrap();
        assert_eq!(decoded.get("user_id"), Some(&serde_json::json!(7)));
    }

    #[test]
    fn tampered_cookie_is_rejected() {
        let store = CookieStore::new(SecretString::from("test-signing-key".to_string()));
        let encoded = store.encode(&SessionData::new()).unwrap();
        let mut tampered = encoded.clone();
        tampered.push('x');
        assert!(store.decode(&tampered).is_err());
    }

    #[test]
    fn different_secret_rejects_decode() {
        let signer = CookieStore::new(SecretString::from("key-a".to_string()));
        let verifier = CookieStore::new(SecretString::from("key-b".to_string()));
        let encoded = signer.encode(&SessionData::new()).unwrap();
        assert!(verifier.decode(&encoded).is_err());
    }
}
