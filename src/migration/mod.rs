//! Google Authenticator migration payloads: a hand-rolled subset of the
//! protobuf wire format (varints and length-delimited fields only), plus
//! the `otpauth-migration://offline?data=...` URI surface around it.

use crate::account::Account;
use crate::base32;
use data_encoding::BASE64;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use rand::Rng;
use url::Url;

const WIRE_VARINT: u32 = 0;
const WIRE_LENGTH_DELIMITED: u32 = 2;

/// Google Authenticator packs roughly this many accounts per QR code.
const ACCOUNTS_PER_QR: usize = 10;

/// One `otp_parameters` sub-message of the migration payload.
#[derive(Debug, Clone, PartialEq)]
pub struct OtpParameters {
    /// Raw secret bytes (field 1).
    pub secret: Vec<u8>,
    /// Account label (field 2), conventionally `issuer:name`.
    pub name: String,
    /// Issuer (field 3).
    pub issuer: String,
    /// Field 4: 1 = SHA1, 2 = SHA256, 3 = SHA512.
    pub algorithm: u32,
    /// Field 5: 1 = six digits, 2 = eight digits.
    pub digits: u32,
    /// Field 6: 1 = HOTP, 2 = TOTP.
    pub otp_type: u32,
}

// --- wire-level encoder ---

fn encode_varint(value: u32, out: &mut Vec<u8>) {
    let mut v = value;
    while v > 0x7f {
        out.push(((v & 0x7f) | 0x80) as u8);
        v >>= 7;
    }
    out.push((v & 0x7f) as u8);
}

fn encode_tag(field: u32, wire_type: u32, out: &mut Vec<u8>) {
    encode_varint((field << 3) | wire_type, out);
}

fn encode_bytes(field: u32, data: &[u8], out: &mut Vec<u8>) {
    encode_tag(field, WIRE_LENGTH_DELIMITED, out);
    encode_varint(data.len() as u32, out);
    out.extend_from_slice(data);
}

fn encode_string(field: u32, value: &str, out: &mut Vec<u8>) {
    encode_bytes(field, value.as_bytes(), out);
}

/// proto3 semantics: a zero int32 is elided entirely.
fn encode_int32(field: u32, value: u32, out: &mut Vec<u8>) {
    if value == 0 {
        return;
    }
    encode_tag(field, WIRE_VARINT, out);
    encode_varint(value, out);
}

fn encode_parameters(param: &OtpParameters, out: &mut Vec<u8>) {
    encode_bytes(1, &param.secret, out);
    encode_string(2, &param.name, out);
    encode_string(3, &param.issuer, out);
    encode_int32(4, param.algorithm, out);
    encode_int32(5, param.digits, out);
    encode_int32(6, param.otp_type, out);
}

/// Serialize one migration payload: each parameter set as an embedded
/// message in field 1, followed by version (2), batch_size (3) and the
/// zero-elided batch_index (4) and batch_id (5).
pub fn encode_payload(
    params: &[OtpParameters],
    batch_index: u32,
    batch_size: u32,
    batch_id: u32,
) -> Vec<u8> {
    let mut out = Vec::new();

    for param in params {
        let mut body = Vec::new();
        encode_parameters(param, &mut body);
        encode_bytes(1, &body, &mut out);
    }

    encode_int32(2, 1, &mut out); // version
    encode_int32(3, batch_size, &mut out);
    encode_int32(4, batch_index, &mut out);
    encode_int32(5, batch_id, &mut out);

    out
}

// --- wire-level decoder ---

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Cursor { data, pos: 0 }
    }

    fn done(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Base-128 varint. The shift wraps modulo 32 so over-long encodings
    /// keep the 32-bit wraparound semantics of the wire format.
    fn varint(&mut self) -> Option<u32> {
        let mut result: u32 = 0;
        let mut shift = 0u32;
        loop {
            let byte = *self.data.get(self.pos)?;
            self.pos += 1;
            result |= u32::from(byte & 0x7f).wrapping_shl(shift);
            if byte & 0x80 == 0 {
                return Some(result);
            }
            shift += 7;
        }
    }

    fn tag(&mut self) -> Option<(u32, u32)> {
        let value = self.varint()?;
        Some((value >> 3, value & 0x07))
    }

    fn length_delimited(&mut self) -> Option<&'a [u8]> {
        let len = self.varint()? as usize;
        let end = self.pos.checked_add(len)?;
        if end > self.data.len() {
            return None;
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Some(slice)
    }
}

/// Decode one `otp_parameters` message. Unknown field numbers of the two
/// known wire types are skipped; anything else means the input is not a
/// migration payload.
fn decode_parameters(data: &[u8]) -> Option<OtpParameters> {
    let mut cur = Cursor::new(data);
    let mut param = OtpParameters {
        secret: Vec::new(),
        name: String::new(),
        issuer: String::new(),
        algorithm: 1,
        digits: 1,
        otp_type: 2,
    };

    while !cur.done() {
        let (field, wire_type) = cur.tag()?;
        match wire_type {
            WIRE_LENGTH_DELIMITED => {
                let bytes = cur.length_delimited()?;
                match field {
                    1 => param.secret = bytes.to_vec(),
                    2 => param.name = String::from_utf8_lossy(bytes).into_owned(),
                    3 => param.issuer = String::from_utf8_lossy(bytes).into_owned(),
                    _ => {}
                }
            }
            WIRE_VARINT => {
                let value = cur.varint()?;
                match field {
                    4 => param.algorithm = value,
                    5 => param.digits = value,
                    6 => param.otp_type = value,
                    _ => {}
                }
            }
            _ => return None,
        }
    }

    Some(param)
}

/// Decode a full migration payload into its parameter sets. Batch metadata
/// (version, batch_size, batch_index, batch_id) is read and discarded.
pub fn decode_payload(data: &[u8]) -> Option<Vec<OtpParameters>> {
    let mut cur = Cursor::new(data);
    let mut params = Vec::new();

    while !cur.done() {
        let (field, wire_type) = cur.tag()?;
        match wire_type {
            WIRE_LENGTH_DELIMITED => {
                let bytes = cur.length_delimited()?;
                if field == 1 {
                    params.push(decode_parameters(bytes)?);
                }
            }
            WIRE_VARINT => {
                cur.varint()?;
            }
            _ => return None,
        }
    }

    Some(params)
}

// --- URI surface ---

/// Batch accounts into migration URIs, ten per QR code. All URIs of one
/// export share a random batch id. Accounts whose secret does not decode
/// are carried with an empty secret; callers wanting a hard failure should
/// validate with `base32::is_valid_secret` first.
pub fn generate_migration_uris(accounts: &[Account]) -> Vec<String> {
    if accounts.is_empty() {
        return Vec::new();
    }

    let batch_id = rand::thread_rng().gen_range(0..1_000_000u32);
    let batches: Vec<&[Account]> = accounts.chunks(ACCOUNTS_PER_QR).collect();
    let batch_size = batches.len() as u32;

    batches
        .iter()
        .enumerate()
        .map(|(index, batch)| {
            let params: Vec<OtpParameters> = batch
                .iter()
                .map(|account| OtpParameters {
                    secret: base32::decode(&account.secret).unwrap_or_default(),
                    name: match &account.issuer {
                        Some(issuer) => format!("{}:{}", issuer, account.name),
                        None => account.name.clone(),
                    },
                    issuer: account
                        .issuer
                        .clone()
                        .unwrap_or_else(|| account.name.clone()),
                    algorithm: 1,
                    digits: 1,
                    otp_type: 2,
                })
                .collect();

            let payload = encode_payload(&params, index as u32, batch_size, batch_id);
            let b64 = BASE64.encode(&payload);
            format!(
                "otpauth-migration://offline?data={}",
                utf8_percent_encode(&b64, NON_ALPHANUMERIC)
            )
        })
        .collect()
}

/// Parse one migration URI back into accounts. Only TOTP entries with a
/// non-empty secret are kept; `issuer:name` labels are split back apart.
/// Every malformed input (scheme, missing data, bad base64, truncated
/// protobuf) yields `None` rather than an error.
pub fn parse_migration_uri(uri: &str) -> Option<Vec<Account>> {
    if !uri.starts_with("otpauth-migration://offline") {
        return None;
    }

    let url = Url::parse(uri).ok()?;
    let data = url
        .query_pairs()
        .find(|(key, _)| key == "data")
        .map(|(_, value)| value.into_owned())?;

    let bytes = BASE64.decode(data.as_bytes()).ok()?;
    let params = decode_payload(&bytes)?;

    let accounts = params
        .into_iter()
        .filter(|p| p.otp_type == 2 && !p.secret.is_empty())
        .map(|p| {
            let mut name = p.name;
            let mut issuer = if p.issuer.is_empty() {
                None
            } else {
                Some(p.issuer)
            };

            if name.contains(':') {
                let mut parts = name.splitn(2, ':');
                let head = parts.next().unwrap_or("").trim().to_string();
                let rest = parts.next().unwrap_or("").trim().to_string();
                if issuer.is_none() {
                    issuer = Some(head);
                }
                name = rest;
            }

            let name = if name.is_empty() {
                issuer
                    .clone()
                    .unwrap_or_else(|| String::from("Imported Account"))
            } else {
                name
            };

            Account {
                name,
                secret: base32::encode(&p.secret),
                issuer,
            }
        })
        .collect();

    Some(accounts)
}
