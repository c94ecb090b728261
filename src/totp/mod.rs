use crate::account::Account;
use crate::base32::{self, Base32Error};
use percent_encoding::percent_decode_str;
use ring::hmac;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum TotpError {
    /// The shared secret did not decode as base32. Surfaced to the user
    /// as "check your secret".
    #[error("invalid secret: {0}")]
    InvalidSecret(#[from] Base32Error),
}

/// Knobs for code generation. `timestamp_ms` defaults to wall-clock time;
/// fix it for reproducible output.
#[derive(Debug, Clone)]
pub struct TotpOptions {
    pub digits: u32,
    pub period: u64,
    pub timestamp_ms: u64,
}

impl Default for TotpOptions {
    fn default() -> Self {
        TotpOptions {
            digits: 6,
            period: 30,
            timestamp_ms: now_ms(),
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Generate a TOTP code per RFC 6238: base32-decode the secret, derive the
/// time-step counter, HMAC-SHA1 the 8-byte big-endian counter and apply
/// RFC 4226 dynamic truncation.
pub fn generate(secret: &str, options: &TotpOptions) -> Result<String, TotpError> {
    let key_bytes = base32::decode(secret)?;
    let counter = options.timestamp_ms / 1000 / options.period;

    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, &key_bytes);
    let tag = hmac::sign(&key, &counter.to_be_bytes());

    Ok(truncate(tag.as_ref(), options.digits))
}

/// RFC 4226 dynamic truncation over a 20-byte HMAC-SHA1 digest.
fn truncate(digest: &[u8], digits: u32) -> String {
    // The offset is the low nibble of the last digest byte.
    let offset = (digest[19] & 0x0f) as usize;

    let mut h: u32 = u32::from(digest[offset] & 0x7f) << 24;
    h |= u32::from(digest[offset + 1]) << 16;
    h |= u32::from(digest[offset + 2]) << 8;
    h |= u32::from(digest[offset + 3]);

    format!("{:0width$}", h % 10u32.pow(digits), width = digits as usize)
}

/// Seconds left in the window containing `timestamp_ms`. Countdown only;
/// not part of the cryptographic contract.
pub fn remaining_seconds(period: u64, timestamp_ms: u64) -> u64 {
    period - ((timestamp_ms / 1000) % period)
}

/// Parse an `otpauth://totp/<label>?secret=...&issuer=...` URI into an
/// account. The label may carry an `Issuer:` prefix, which is stripped.
/// Anything malformed (scheme, missing or invalid secret) yields `None`.
pub fn parse_otpauth_uri(uri: &str) -> Option<Account> {
    if !uri.starts_with("otpauth://totp/") {
        return None;
    }

    let url = Url::parse(uri).ok()?;

    let mut secret = None;
    let mut issuer: Option<String> = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "secret" => secret = Some(value.into_owned()),
            "issuer" => issuer = Some(value.into_owned()),
            _ => {}
        }
    }

    let cleaned: String = secret?
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    if !base32::is_valid_secret(&cleaned) {
        return None;
    }

    let issuer = issuer.filter(|i| !i.is_empty());

    let mut label = percent_decode_str(url.path().trim_start_matches('/'))
        .decode_utf8()
        .ok()?
        .into_owned();
    if label.contains(':') {
        label = label
            .splitn(2, ':')
            .nth(1)
            .unwrap_or("")
            .trim()
            .to_string();
    }

    let name = if label.is_empty() {
        issuer
            .clone()
            .unwrap_or_else(|| String::from("Imported Account"))
    } else {
        label
    };

    Some(Account {
        name,
        secret: cleaned,
        issuer,
    })
}
