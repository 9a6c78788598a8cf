//! Access-key request signing
//!
//! Requests carry `Timestamp` and `Authorization: Apollo {appId}:{signature}`
//! headers when a secret is configured. The signature is the Base64 HMAC-SHA1
//! of `{timestamp}\n{pathAndQuery}`, matching what Apollo-protocol servers
//! verify.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use url::Url;

type HmacSha1 = Hmac<Sha1>;

pub const TIMESTAMP_HEADER: &str = "Timestamp";
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Sign the path-and-query of a request URL.
pub fn signature(timestamp_millis: i64, url: &Url, secret: &str) -> String {
    let mut path_and_query = url.path().to_string();
    if let Some(query) = url.query() {
        path_and_query.push('?');
        path_and_query.push_str(query);
    }
    let input = format!("{}\n{}", timestamp_millis, path_and_query);

    // HMAC accepts keys of any length
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
        .expect("HMAC key of any length is valid");
    mac.update(input.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Value of the `Authorization` header.
pub fn authorization(app_id: &str, signature: &str) -> String {
    format!("Apollo {}:{}", app_id, signature)
}
