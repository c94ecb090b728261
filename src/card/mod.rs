//! Luhn checksum verification and BIN-driven synthesis of valid-looking
//! test card numbers. Nothing here touches real issuing ranges beyond the
//! public prefix table; the output is only ever useful for form testing.

use rand::Rng;
use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Clone)]
pub struct CardType {
    pub name: &'static str,
    pub prefixes: &'static [&'static str],
    pub length: usize,
    pub cvv_length: usize,
}

/// Declaration order is the tie-break for `detect_card_type`: the first
/// entry whose prefix matches wins.
pub const CARD_TYPES: &[(&str, CardType)] = &[
    (
        "visa",
        CardType {
            name: "Visa",
            prefixes: &["4"],
            length: 16,
            cvv_length: 3,
        },
    ),
    (
        "mastercard",
        CardType {
            name: "Mastercard",
            prefixes: &["51", "52", "53", "54", "55"],
            length: 16,
            cvv_length: 3,
        },
    ),
    (
        "amex",
        CardType {
            name: "American Express",
            prefixes: &["34", "37"],
            length: 15,
            cvv_length: 4,
        },
    ),
    (
        "discover",
        CardType {
            name: "Discover",
            prefixes: &["6011", "65"],
            length: 16,
            cvv_length: 3,
        },
    ),
    (
        "jcb",
        CardType {
            name: "JCB",
            prefixes: &["3528", "3529", "353", "354", "355", "356", "357", "358"],
            length: 16,
            cvv_length: 3,
        },
    ),
    (
        "unionpay",
        CardType {
            name: "UnionPay",
            prefixes: &["62"],
            length: 16,
            cvv_length: 3,
        },
    ),
];

/// Look up a card type by its table key.
pub fn card_type(key: &str) -> Option<&'static CardType> {
    CARD_TYPES
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, config)| config)
}

fn strip_non_digits(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Luhn checksum over the digits of `card_number` (non-digits are
/// stripped). Empty input is invalid.
pub fn luhn_check(card_number: &str) -> bool {
    let digits: Vec<u32> = card_number.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.is_empty() {
        return false;
    }

    let mut sum = 0;
    for (i, &digit) in digits.iter().rev().enumerate() {
        let mut digit = digit;
        // Every second digit from the right is doubled; the rightmost is
        // the check digit and stays as is.
        if i % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }

    sum % 10 == 0
}

/// The digit that, appended to `partial`, makes the whole string pass
/// `luhn_check`. Doubling starts at the rightmost existing digit because
/// the not-yet-appended check digit occupies the undoubled slot.
pub fn luhn_check_digit(partial: &str) -> u32 {
    let digits: Vec<u32> = partial.chars().filter_map(|c| c.to_digit(10)).collect();

    let mut sum = 0;
    for (i, &digit) in digits.iter().rev().enumerate() {
        let mut digit = digit;
        if i % 2 == 0 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }

    (10 - sum % 10) % 10
}

/// First card type whose declared prefix is a literal prefix of the BIN,
/// in table order.
pub fn detect_card_type(bin: &str) -> Option<&'static str> {
    let clean = strip_non_digits(bin);
    for (key, config) in CARD_TYPES {
        for prefix in config.prefixes {
            if clean.starts_with(prefix) {
                return Some(*key);
            }
        }
    }
    None
}

/// Group a number for display: 4-6-5 for 15-digit Amex, blocks of four
/// otherwise.
pub fn format_card_number(number: &str) -> String {
    let clean = strip_non_digits(number);
    if clean.len() == 15 && (clean.starts_with("34") || clean.starts_with("37")) {
        return format!("{} {} {}", &clean[..4], &clean[4..10], &clean[10..]);
    }

    clean
        .chars()
        .collect::<Vec<char>>()
        .chunks(4)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<String>>()
        .join(" ")
}

/// A BIN is 1 to 14 digits once separators are stripped.
pub fn is_valid_bin(bin: &str) -> bool {
    let clean = strip_non_digits(bin);
    !clean.is_empty() && clean.len() <= 14
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedCard {
    pub number: String,
    pub formatted_number: String,
    /// "MM/YY".
    pub expiry: String,
    pub cvv: String,
    pub type_name: String,
    pub type_key: String,
    pub is_valid: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Leading digits to build on; the card type is detected from it.
    pub bin: Option<String>,
    pub expiry_month: Option<String>,
    /// 2- or 4-digit year.
    pub expiry_year: Option<String>,
    /// CVV pattern; `x`/`X` become random digits, other non-digits drop.
    pub cvv: Option<String>,
    /// Table key; ignored when a BIN matches a known type.
    pub card_type: Option<String>,
}

fn random_digits(count: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

fn generate_expiry(month: Option<&str>, year: Option<&str>) -> String {
    if let (Some(month), Some(year)) = (month, year) {
        let m = month.trim().parse::<u32>().unwrap_or(1).max(1).min(12);

        let mut y = strip_non_digits(year);
        if y.len() == 4 {
            y = y[2..].to_string();
        }
        if y.len() == 1 {
            y = format!("2{}", y);
        }
        if y.is_empty() {
            y = format!("{:02}", (OffsetDateTime::now_utc().year() + 3) % 100);
        }

        return format!("{:02}/{}", m, y);
    }

    let mut rng = rand::thread_rng();
    let future_year = OffsetDateTime::now_utc().year() + rng.gen_range(1..=5);
    let month = rng.gen_range(1..=12u32);
    format!("{:02}/{:02}", month, future_year % 100)
}

fn generate_cvv(pattern: Option<&str>, length: usize) -> String {
    let mut rng = rand::thread_rng();

    let mut cvv = String::new();
    match pattern {
        None => return random_digits(length),
        Some(pattern) => {
            for c in pattern.chars() {
                if c == 'x' || c == 'X' {
                    cvv.push(char::from(b'0' + rng.gen_range(0..10u8)));
                } else if c.is_ascii_digit() {
                    cvv.push(c);
                }
            }
        }
    }

    while cvv.len() < length {
        cvv.push(char::from(b'0' + rng.gen_range(0..10u8)));
    }
    cvv.truncate(length);
    cvv
}

/// Synthesize one Luhn-valid card. The type comes from the BIN when one
/// is given and detectable, else from `card_type`, else visa; without a
/// BIN a random declared prefix seeds the number. A BIN longer than the
/// type's length is truncated rather than rejected.
///
/// Panics on an unknown `card_type` key; that is a caller bug, not input
/// validation.
pub fn generate_card(options: &GenerateOptions) -> GeneratedCard {
    let mut type_key = options.card_type.as_deref().unwrap_or("visa");
    let mut config = card_type(type_key).expect("unknown card type key");

    let mut bin = strip_non_digits(options.bin.as_deref().unwrap_or(""));

    if !bin.is_empty() {
        if let Some(detected) = detect_card_type(&bin) {
            type_key = detected;
            config = card_type(detected).expect("unknown card type key");
        }
    } else {
        let mut rng = rand::thread_rng();
        bin = config.prefixes[rng.gen_range(0..config.prefixes.len())].to_string();
    }

    let target_length = config.length;
    let partial = if target_length > bin.len() + 1 {
        let middle = random_digits(target_length - bin.len() - 1);
        format!("{}{}", bin, middle)
    } else {
        bin.chars().take(target_length - 1).collect()
    };
    let number = format!("{}{}", partial, luhn_check_digit(&partial));

    let is_valid = luhn_check(&number);
    let expiry = generate_expiry(
        options.expiry_month.as_deref().filter(|s| !s.is_empty()),
        options.expiry_year.as_deref().filter(|s| !s.is_empty()),
    );
    let cvv = generate_cvv(
        options.cvv.as_deref().filter(|s| !s.is_empty()),
        config.cvv_length,
    );

    GeneratedCard {
        formatted_number: format_card_number(&number),
        number,
        expiry,
        cvv,
        type_name: config.name.to_string(),
        type_key: type_key.to_string(),
        is_valid,
    }
}

/// Synthesize a batch with shared options.
pub fn generate_cards(quantity: usize, options: &GenerateOptions) -> Vec<GeneratedCard> {
    (0..quantity).map(|_| generate_card(options)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luhn_known_numbers() {
        assert!(luhn_check("4532015112830366"));
        assert!(!luhn_check("4532015112830367"));
        assert!(luhn_check("4532 0151 1283 0366")); // separators stripped
        assert!(!luhn_check(""));
        assert!(!luhn_check("no digits"));
    }

    #[test]
    fn check_digit_completes_partials() {
        assert_eq!(luhn_check_digit("453201511283036"), 6);
        for partial in &["4111", "51234567", "37000000000000"] {
            let digit = luhn_check_digit(partial);
            assert!(luhn_check(&format!("{}{}", partial, digit)));
        }
    }

    #[test]
    fn detection_follows_table_order() {
        assert_eq!(detect_card_type("4111"), Some("visa"));
        assert_eq!(detect_card_type("5500"), Some("mastercard"));
        assert_eq!(detect_card_type("3400"), Some("amex"));
        assert_eq!(detect_card_type("6011"), Some("discover"));
        assert_eq!(detect_card_type("3528"), Some("jcb"));
        assert_eq!(detect_card_type("62"), Some("unionpay"));
        assert_eq!(detect_card_type("9999"), None);
        assert_eq!(detect_card_type(""), None);
        assert_eq!(detect_card_type("4-1 1.1"), Some("visa"));
    }

    #[test]
    fn formatting_by_scheme() {
        assert_eq!(
            format_card_number("4532015112830366"),
            "4532 0151 1283 0366"
        );
        assert_eq!(format_card_number("340000000000009"), "3400 000000 00009");
    }

    #[test]
    fn bin_validation() {
        assert!(is_valid_bin("4111"));
        assert!(is_valid_bin("4"));
        assert!(is_valid_bin("41-11 11")); // separators stripped
        assert!(!is_valid_bin(""));
        assert!(!is_valid_bin("abc"));
        assert!(!is_valid_bin("411111111111111")); // 15 digits
    }

    #[test]
    fn thousand_generated_visas_are_valid() {
        let options = GenerateOptions {
            bin: Some(String::from("4111")),
            ..Default::default()
        };
        for _ in 0..1000 {
            let card = generate_card(&options);
            assert!(card.is_valid);
            assert!(luhn_check(&card.number));
            assert_eq!(card.number.len(), 16);
            assert!(card.number.starts_with("4111"));
            assert_eq!(card.type_key, "visa");
            assert_eq!(card.cvv.len(), 3);
        }
    }

    #[test]
    fn overlong_bin_is_truncated() {
        let options = GenerateOptions {
            bin: Some("4".repeat(20)),
            ..Default::default()
        };
        let card = generate_card(&options);
        assert_eq!(card.number.len(), 16);
        assert!(card.number.starts_with("444444444444444"));
        assert!(luhn_check(&card.number));
    }

    #[test]
    fn amex_length_and_cvv() {
        let options = GenerateOptions {
            bin: Some(String::from("37")),
            ..Default::default()
        };
        for _ in 0..50 {
            let card = generate_card(&options);
            assert_eq!(card.number.len(), 15);
            assert_eq!(card.cvv.len(), 4);
            assert_eq!(card.type_key, "amex");
            assert!(card.is_valid);
        }
    }

    #[test]
    fn declared_type_without_bin() {
        let options = GenerateOptions {
            card_type: Some(String::from("jcb")),
            ..Default::default()
        };
        for _ in 0..50 {
            let card = generate_card(&options);
            assert_eq!(card.type_key, "jcb");
            assert_eq!(card.number.len(), 16);
            assert!(card.is_valid);
        }
    }

    #[test]
    fn unknown_bin_falls_back_to_declared_type() {
        let options = GenerateOptions {
            bin: Some(String::from("9999")),
            card_type: Some(String::from("discover")),
            ..Default::default()
        };
        let card = generate_card(&options);
        assert_eq!(card.type_key, "discover");
        assert!(card.number.starts_with("9999"));
        assert!(card.is_valid);
    }

    #[test]
    #[should_panic(expected = "unknown card type key")]
    fn unknown_type_key_is_a_caller_bug() {
        let options = GenerateOptions {
            card_type: Some(String::from("emerald")),
            ..Default::default()
        };
        generate_card(&options);
    }

    #[test]
    fn expiry_normalization() {
        let card = generate_card(&GenerateOptions {
            expiry_month: Some(String::from("13")),
            expiry_year: Some(String::from("2029")),
            ..Default::default()
        });
        assert_eq!(card.expiry, "12/29");

        let card = generate_card(&GenerateOptions {
            expiry_month: Some(String::from("0")),
            expiry_year: Some(String::from("9")),
            ..Default::default()
        });
        assert_eq!(card.expiry, "01/29");

        let card = generate_card(&GenerateOptions::default());
        assert_eq!(card.expiry.len(), 5);
        assert_eq!(&card.expiry[2..3], "/");
    }

    #[test]
    fn cvv_patterns() {
        let card = generate_card(&GenerateOptions {
            cvv: Some(String::from("12x")),
            ..Default::default()
        });
        assert_eq!(card.cvv.len(), 3);
        assert!(card.cvv.starts_with("12"));

        let card = generate_card(&GenerateOptions {
            cvv: Some(String::from("9-9")),
            ..Default::default()
        });
        assert_eq!(card.cvv.len(), 3);
        assert!(card.cvv.starts_with("99"));

        let card = generate_card(&GenerateOptions {
            cvv: Some(String::from("123456")),
            ..Default::default()
        });
        assert_eq!(card.cvv, "123");
    }
}
