//! Signed OAuth state cookie
//!
//! The cookie lets the callback recognise a state token it issued even when
//! the pending-auth store no longer has it. Value layout:
//!
//! ```text
//! {state}.{expires_unix}.{base64url(HMAC-SHA256(secret, "{state}.{expires_unix}"))}
//! ```
//!
//! State tokens are base64url, so they never contain `.`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::error::{CommonError, CommonResult};

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies state cookie values.
#[derive(Clone)]
pub struct StateCookieSigner {
    mac: HmacSha256,
}

impl std::fmt::Debug for StateCookieSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCookieSigner").field("secret", &"[REDACTED]").finish()
    }
}

impl StateCookieSigner {
    pub fn new(secret: &[u8]) -> CommonResult<Self> {
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| CommonError::config(format!("invalid cookie secret: {e}")))?;
        Ok(Self { mac })
    }

    /// Signer with a random per-process secret.
    pub fn ephemeral() -> CommonResult<Self> {
        let mut secret = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        Self::new(&secret)
    }

    /// Signed cookie value for `state`, valid until `expires_at`.
    #[must_use]
    pub fn sign(&self, state: &str, expires_at: DateTime<Utc>) -> String {
        let payload = format!("{state}.{}", expires_at.timestamp());
        let signature = URL_SAFE_NO_PAD.encode(self.mac(&payload).finalize().into_bytes());
        format!("{payload}.{signature}")
    }

    /// Return the state token if the signature verifies and the cookie has
    /// not expired at `now`.
    #[must_use]
    pub fn verify(&self, cookie_value: &str, now: DateTime<Utc>) -> Option<String> {
        let mut parts = cookie_value.rsplitn(2, '.');
        let signature = parts.next()?;
        let payload = parts.next()?;
        let (state, expires) = payload.split_once('.')?;

        let provided = URL_SAFE_NO_PAD.decode(signature).ok()?;
        self.mac(payload).verify_slice(&provided).ok()?;

        let expires: i64 = expires.parse().ok()?;
        (now.timestamp() < expires && !state.is_empty()).then(|| state.to_string())
    }

    fn mac(&self, payload: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac
    }
}
