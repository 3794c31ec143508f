//! Request signing for nimbus.io.
//!
//! Every request carries an `x-nimbus-io-timestamp` header.  Authenticated requests also carry
//! an `Authorization` header of the form `NIMBUS.IO <auth_key_id>:<signature>`, where the
//! signature is a hex-encoded HMAC-SHA256, keyed with the identity's auth key, over the user
//! name, method, timestamp and unescaped path, each separated by a newline.

use crate::identity::Identity;
use crate::util::unquote_plus;
use hmac_sha256::HMAC;
use std::time::{SystemTime, UNIX_EPOCH};

pub const TIMESTAMP_HEADER: &str = "x-nimbus-io-timestamp";
pub const AGENT_HEADER: &str = "agent";
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// The current time, in whole seconds since the Unix epoch
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Compute the value of the `Authorization` header for a request.
pub fn compute_authentication_string(
    auth_key_id: u64,
    auth_key: &str,
    user_name: &str,
    method: &str,
    timestamp: u64,
    unescaped_path: &str,
) -> String {
    let message = format!(
        "{}\n{}\n{}\n{}",
        user_name, method, timestamp, unescaped_path
    );
    let mut hmac = HMAC::new(auth_key.as_bytes());
    hmac.update(message.as_bytes());
    format!(
        "NIMBUS.IO {}:{}",
        auth_key_id,
        hex::encode(hmac.finalize())
    )
}

/// Compute the standard headers for a request, in the order they are sent.  The
/// `Authorization` header is included only when an identity is given.
pub(crate) fn request_headers(
    identity: Option<&Identity>,
    agent_name: &str,
    method: &str,
    path: &str,
    timestamp: u64,
) -> Vec<(String, String)> {
    let mut headers = vec![
        (TIMESTAMP_HEADER.to_owned(), timestamp.to_string()),
        (AGENT_HEADER.to_owned(), agent_name.to_owned()),
    ];

    if let Some(identity) = identity {
        headers.push((
            AUTHORIZATION_HEADER.to_owned(),
            compute_authentication_string(
                identity.auth_key_id,
                &identity.auth_key,
                &identity.user_name,
                method,
                timestamp,
                &unquote_plus(path),
            ),
        ));
    }

    headers
}
