//! HTTP Basic credential verification.
//!
//! Stored passwords may be `$sha256$<hex>`, `$md5$<hex>`, a bare 32-character
//! MD5 hex digest, or plaintext. Every comparison is constant-time.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use md5::Md5;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::auth::context::{AuthContext, AuthMethod};
use crate::config::UserConfig;

const BASIC_PREFIX: &str = "Basic ";

/// Authenticate a `Basic` header against the configured users.
pub fn authenticate(header: &str, users: &[UserConfig]) -> Option<AuthContext> {
    let encoded = header.strip_prefix(BASIC_PREFIX)?;

    let decoded = match STANDARD.decode(encoded.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "Malformed basic credentials");
            return None;
        }
    };
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;

    let user = users.iter().find(|u| u.username == username)?;
    if !verify_password(password, &user.password) {
        tracing::debug!(username = %username, "Basic password mismatch");
        return None;
    }

    Some(AuthContext::new(username, AuthMethod::Basic).with_roles(user.roles.iter().cloned()))
}

/// Check `provided` against a stored password in any supported form.
pub fn verify_password(provided: &str, stored: &str) -> bool {
    if let Some(hex_digest) = stored.strip_prefix("$sha256$") {
        let digest = hex::encode(Sha256::digest(provided.as_bytes()));
        return constant_time_eq(&digest, &hex_digest.to_ascii_lowercase());
    }

    if let Some(hex_digest) = stored.strip_prefix("$md5$") {
        return constant_time_eq(&md5_hex(provided), &hex_digest.to_ascii_lowercase());
    }

    if is_md5_hex(stored) {
        return constant_time_eq(&md5_hex(provided), &stored.to_ascii_lowercase());
    }

    constant_time_eq(provided, stored)
}

fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

fn is_md5_hex(stored: &str) -> bool {
    stored.len() == 32 && stored.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Length-independent constant-time comparison.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let max_len = a.len().max(b.len());

    // different pad bytes so unequal lengths never compare equal
    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];
    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());

    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);
    (lengths_equal & contents_equal).into()
}
