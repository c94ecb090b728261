use thiserror::Error;

/// RFC 4648 base32 alphabet. Index of a character is its 5-bit value.
const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

#[derive(Debug, Error, PartialEq)]
pub enum Base32Error {
    #[error("invalid base32 character: {0:?}")]
    InvalidCharacter(char),
}

/// Strip whitespace, uppercase and drop trailing padding. This is the
/// normal form every decode/validate entry point works on, so secrets
/// pasted with spaces or lowercase survive.
fn normalize(text: &str) -> String {
    let mut cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    cleaned.make_ascii_uppercase();
    while cleaned.ends_with('=') {
        cleaned.pop();
    }
    cleaned
}

/// Decode a base32 string into bytes.
///
/// The input is normalized first; any remaining character outside the
/// alphabet is an error. Trailing bits that do not fill a whole byte are
/// discarded, matching how authenticator apps treat unpadded secrets.
pub fn decode(text: &str) -> Result<Vec<u8>, Base32Error> {
    let cleaned = normalize(text);

    let mut out = Vec::with_capacity(cleaned.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;

    for c in cleaned.chars() {
        let val = match ALPHABET.iter().position(|&a| char::from(a) == c) {
            Some(v) => v as u32,
            None => return Err(Base32Error::InvalidCharacter(c)),
        };

        buffer = (buffer << 5) | val;
        bits += 5;

        if bits >= 8 {
            bits -= 8;
            out.push(((buffer >> bits) & 0xff) as u8);
        }
    }

    Ok(out)
}

/// Encode bytes as unpadded base32. A non-empty trailing group is
/// left-shifted to a full 5 bits and emitted, so the output matches the
/// standard encoding minus the `=` padding.
pub fn encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8 + 4) / 5);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;

    for &byte in data {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;

        while bits >= 5 {
            bits -= 5;
            out.push(char::from(ALPHABET[((buffer >> bits) & 0x1f) as usize]));
        }
    }

    if bits > 0 {
        out.push(char::from(ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize]));
    }

    out
}

/// A secret is valid when its normal form is non-empty and entirely
/// within the alphabet.
pub fn is_valid_secret(secret: &str) -> bool {
    let cleaned = normalize(secret);
    !cleaned.is_empty() && cleaned.bytes().all(|b| ALPHABET.contains(&b))
}

/// Uppercase a secret and regroup it in blocks of four for display.
pub fn format_secret(secret: &str) -> String {
    let mut cleaned: String = secret.chars().filter(|c| !c.is_whitespace()).collect();
    cleaned.make_ascii_uppercase();

    cleaned
        .chars()
        .collect::<Vec<char>>()
        .chunks(4)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 4648 test vectors, minus the padding this codec never emits.
    #[test]
    fn rfc4648_encode_vectors() {
        assert_eq!(encode(b""), "");
        assert_eq!(encode(b"f"), "MY");
        assert_eq!(encode(b"fo"), "MZXQ");
        assert_eq!(encode(b"foo"), "MZXW6");
        assert_eq!(encode(b"foob"), "MZXW6YQ");
        assert_eq!(encode(b"fooba"), "MZXW6YTB");
        assert_eq!(encode(b"foobar"), "MZXW6YTBOI");
    }

    #[test]
    fn rfc4648_decode_vectors() {
        assert_eq!(decode("MY").unwrap(), b"f");
        assert_eq!(decode("MZXQ").unwrap(), b"fo");
        assert_eq!(decode("MZXW6").unwrap(), b"foo");
        assert_eq!(decode("MZXW6YQ").unwrap(), b"foob");
        assert_eq!(decode("MZXW6YTB").unwrap(), b"fooba");
        assert_eq!(decode("MZXW6YTBOI").unwrap(), b"foobar");
    }

    #[test]
    fn decode_known_secret() {
        assert_eq!(
            decode("JBSWY3DPEHPK3PXP").unwrap(),
            vec![0x48, 0x65, 0x6c, 0x6c, 0x6f, 0x21, 0xde, 0xad, 0xbe, 0xef]
        );
    }

    #[test]
    fn round_trip_byte_aligned() {
        // Lengths that are multiples of 5 encode without trailing bits.
        for len in &[5usize, 10, 20, 25] {
            let bytes: Vec<u8> = (0..*len).map(|i| (i * 37 % 256) as u8).collect();
            assert_eq!(decode(&encode(&bytes)).unwrap(), bytes);
        }
    }

    #[test]
    fn decode_is_lenient_about_form() {
        let canonical = decode("JBSWY3DPEHPK3PXP").unwrap();
        assert_eq!(decode("jbsw y3dp ehpk 3pxp").unwrap(), canonical);
        assert_eq!(decode("JBSWY3DPEHPK3PXP======").unwrap(), canonical);
    }

    #[test]
    fn decode_rejects_bad_characters() {
        assert_eq!(decode("ABC1"), Err(Base32Error::InvalidCharacter('1')));
        assert_eq!(decode("AB=C"), Err(Base32Error::InvalidCharacter('=')));
    }

    #[test]
    fn empty_input_decodes_to_nothing() {
        assert_eq!(decode("").unwrap(), Vec::<u8>::new());
        assert_eq!(decode("====").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn secret_validity() {
        assert!(is_valid_secret("JBSWY3DPEHPK3PXP"));
        assert!(is_valid_secret("jbsw y3dp ehpk 3pxp=="));
        assert!(!is_valid_secret(""));
        assert!(!is_valid_secret("===="));
        assert!(!is_valid_secret("JBSWY3DP0"));
    }

    #[test]
    fn format_groups_of_four() {
        assert_eq!(format_secret("jbswy3dpehpk3pxp"), "JBSW Y3DP EHPK 3PXP");
        assert_eq!(format_secret("ABCDE"), "ABCD E");
    }
}
