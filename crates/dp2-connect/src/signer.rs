//! Request signing for authenticated Pipeline 2 services
//!
//! A signed request carries `authid`, `time` and `nonce` query parameters,
//! followed by `sign`: the base64 HMAC-SHA1 of the full URL built so far,
//! keyed with the client secret.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use dp2_core_interface::Credentials;
use rand::Rng;
use ring::hmac;
use std::sync::Arc;
use url::Url;

const NONCE_DIGITS: usize = 30;
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Signs request URLs with the client secret
///
/// The secret is only held as an HMAC key and is never printed.
#[derive(Clone)]
pub struct RequestSigner {
    client_id: String,
    key: Arc<hmac::Key>,
}

impl RequestSigner {
    pub fn new(credentials: &Credentials) -> Self {
        let key = hmac::Key::new(
            hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY,
            credentials.secret.as_bytes(),
        );
        Self {
            client_id: credentials.key.clone(),
            key: Arc::new(key),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Append the authentication parameters and signature to `url`
    pub fn sign(&self, url: &mut Url) {
        self.sign_with(url, Utc::now(), &generate_nonce());
    }

    pub(crate) fn sign_with(&self, url: &mut Url, time: DateTime<Utc>, nonce: &str) {
        url.query_pairs_mut()
            .append_pair("authid", &self.client_id)
            .append_pair("time", &time.format(TIME_FORMAT).to_string())
            .append_pair("nonce", nonce);

        let tag = hmac::sign(&self.key, url.as_str().as_bytes());
        let signature = STANDARD.encode(tag.as_ref());

        url.query_pairs_mut().append_pair("sign", &signature);
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("client_id", &self.client_id)
            .field("key", &"<redacted>")
            .finish()
    }
}

fn generate_nonce() -> String {
    let mut rng = rand::rng();
    (0..NONCE_DIGITS)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}
