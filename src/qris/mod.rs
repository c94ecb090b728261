//! QRIS (Quick Response Code Indonesian Standard) payloads: EMVCo TLV
//! parsing and re-serialization, the CRC16-CCITT trailer, and the
//! static-to-dynamic rewrite that stamps an amount into a merchant code.

use serde::Serialize;

/// One Tag-Length-Value record. The length is implied by the value.
#[derive(Debug, Clone, PartialEq)]
pub struct Tlv {
    pub tag: String,
    pub value: String,
}

/// Merchant account information from tag 26 or 51.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantAccountInfo {
    pub global_unique_id: String,
    pub merchant_id: String,
}

/// Tag 62 sub-fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_label: Option<String>,
}

/// Structured projection of a parsed QRIS payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrisData {
    pub payload_format: String,
    pub point_of_initiation: String,
    pub merchant_account_info: MerchantAccountInfo,
    pub merchant_category_code: String,
    pub transaction_currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_amount: Option<String>,
    pub country_code: String,
    pub merchant_name: String,
    pub merchant_city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_data: Option<AdditionalData>,
    pub crc: String,
    pub is_static: bool,
    pub is_valid: bool,
    pub raw_data: String,
}

/// Optional tag 62 sub-fields for the dynamic rewrite.
#[derive(Debug, Clone, Default)]
pub struct DynamicOptions {
    pub reference_label: Option<String>,
    pub terminal_label: Option<String>,
}

/// Walk a TLV string left to right: 2-char tag, 2-digit decimal length,
/// then that many characters of value. A truncated or unparseable tail
/// ends the walk silently; whatever parsed so far is returned.
pub fn parse_tlv(data: &str) -> Vec<Tlv> {
    let chars: Vec<char> = data.chars().collect();
    let mut result = Vec::new();
    let mut index = 0;

    while index + 4 <= chars.len() {
        let tag: String = chars[index..index + 2].iter().collect();
        let length: usize = match chars[index + 2..index + 4].iter().collect::<String>().parse() {
            Ok(len) => len,
            Err(_) => break,
        };
        if index + 4 + length > chars.len() {
            break;
        }
        let value: String = chars[index + 4..index + 4 + length].iter().collect();
        result.push(Tlv { tag, value });
        index += 4 + length;
    }

    result
}

/// Serialize one record: tag, zero-padded 2-digit length, value.
pub fn encode_tlv(tag: &str, value: &str) -> String {
    format!("{}{:02}{}", tag, value.chars().count(), value)
}

/// CRC16-CCITT: polynomial 0x1021, initial value 0xFFFF, no final XOR.
/// Each character's code point is folded into the high byte. Rendered as
/// four uppercase hex digits, the way the trailer embeds it.
pub fn crc16_ccitt(data: &str) -> String {
    const POLYNOMIAL: u16 = 0x1021;
    let mut crc: u16 = 0xffff;

    for c in data.chars() {
        crc ^= (c as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ POLYNOMIAL;
            } else {
                crc <<= 1;
            }
        }
    }

    format!("{:04X}", crc)
}

/// True when the trailing four characters equal the CRC of everything
/// before them (hex comparison is case-insensitive).
pub fn validate_crc(payload: &str) -> bool {
    let chars: Vec<char> = payload.chars().collect();
    if chars.len() < 8 {
        return false;
    }

    let body: String = chars[..chars.len() - 4].iter().collect();
    let provided: String = chars[chars.len() - 4..]
        .iter()
        .collect::<String>()
        .to_uppercase();

    crc16_ccitt(&body) == provided
}

/// Parse a QRIS payload into its structured projection, or `None` when no
/// TLV records can be read at all. Field mapping follows the EMVCo/QRIS
/// tag registry; unknown tags are ignored.
pub fn parse_qris(payload: &str) -> Option<QrisData> {
    let clean = payload.trim();
    let records = parse_tlv(clean);
    if records.is_empty() {
        return None;
    }

    let mut data = QrisData {
        payload_format: String::new(),
        point_of_initiation: String::new(),
        merchant_account_info: MerchantAccountInfo::default(),
        merchant_category_code: String::new(),
        transaction_currency: String::new(),
        transaction_amount: None,
        country_code: String::new(),
        merchant_name: String::new(),
        merchant_city: String::new(),
        postal_code: None,
        additional_data: None,
        crc: String::new(),
        is_static: true,
        is_valid: false,
        raw_data: clean.to_string(),
    };

    for tlv in &records {
        match tlv.tag.as_str() {
            "00" => data.payload_format = tlv.value.clone(),
            "01" => {
                data.point_of_initiation = tlv.value.clone();
                // Only "11" is static; every other value, recognized or
                // not, counts as dynamic.
                data.is_static = tlv.value == "11";
            }
            "26" | "51" => {
                for mai in parse_tlv(&tlv.value) {
                    match mai.tag.as_str() {
                        "00" => data.merchant_account_info.global_unique_id = mai.value,
                        "01" | "02" | "03" => data.merchant_account_info.merchant_id = mai.value,
                        _ => {}
                    }
                }
            }
            "52" => data.merchant_category_code = tlv.value.clone(),
            "53" => data.transaction_currency = tlv.value.clone(),
            "54" => data.transaction_amount = Some(tlv.value.clone()),
            "58" => data.country_code = tlv.value.clone(),
            "59" => data.merchant_name = tlv.value.clone(),
            "60" => data.merchant_city = tlv.value.clone(),
            "61" => data.postal_code = Some(tlv.value.clone()),
            "62" => {
                let mut additional = AdditionalData::default();
                for sub in parse_tlv(&tlv.value) {
                    match sub.tag.as_str() {
                        "05" => additional.reference_label = Some(sub.value),
                        "07" => additional.terminal_label = Some(sub.value),
                        _ => {}
                    }
                }
                data.additional_data = Some(additional);
            }
            "63" => data.crc = tlv.value.clone(),
            _ => {}
        }
    }

    data.is_valid = validate_crc(clean);
    Some(data)
}

/// Sanity-check a scanned string before treating it as QRIS: plausible
/// length, the tag-00 prefix, a valid CRC and payload format "01".
pub fn is_valid_qris(payload: &str) -> bool {
    if payload.chars().count() < 50 {
        return false;
    }
    if !payload.starts_with("0002") {
        return false;
    }
    if !validate_crc(payload) {
        return false;
    }

    match parse_qris(payload) {
        Some(data) => data.payload_format == "01",
        None => false,
    }
}

fn encode_labels(options: &DynamicOptions) -> String {
    let mut value = String::new();
    if let Some(reference) = &options.reference_label {
        if !reference.is_empty() {
            value.push_str(&encode_tlv("05", reference));
        }
    }
    if let Some(terminal) = &options.terminal_label {
        if !terminal.is_empty() {
            value.push_str(&encode_tlv("07", terminal));
        }
    }
    value
}

/// Rewrite a static QRIS payload into a dynamic, amount-bearing one: tag
/// 01 is forced to "12", tag 54 carries the amount, tag 62 is rebuilt from
/// the supplied labels (or passed through untouched), and a fresh
/// `6304<CRC>` trailer is appended.
///
/// When the source had no tag 54, the amount is spliced in front of the
/// literal substring "5802" if it occurs exactly once. That keeps tag 54
/// ahead of the country code the way most verifiers expect, but it is a
/// blind string split, not a TLV-aware insertion.
pub fn convert_to_dynamic(
    static_payload: &str,
    amount: u64,
    options: &DynamicOptions,
) -> Option<String> {
    let clean = static_payload.trim();
    let records = parse_tlv(clean);
    if records.is_empty() {
        return None;
    }

    let labels = encode_labels(options);
    let mut result = String::new();
    let mut has_amount = false;
    let mut has_additional = false;

    for tlv in &records {
        match tlv.tag.as_str() {
            // The old CRC is dropped; a fresh one is appended below.
            "63" => {}
            "01" => result.push_str(&encode_tlv("01", "12")),
            "54" => {
                result.push_str(&encode_tlv("54", &amount.to_string()));
                has_amount = true;
            }
            "62" => {
                if labels.is_empty() {
                    result.push_str(&encode_tlv(&tlv.tag, &tlv.value));
                } else {
                    result.push_str(&encode_tlv("62", &labels));
                }
                has_additional = true;
            }
            _ => result.push_str(&encode_tlv(&tlv.tag, &tlv.value)),
        }
    }

    if !has_amount && amount > 0 {
        let amount_tlv = encode_tlv("54", &amount.to_string());
        let parts: Vec<&str> = result.split("5802").collect();
        if parts.len() == 2 {
            result = format!("{}{}5802{}", parts[0], amount_tlv, parts[1]);
        } else {
            result.push_str(&amount_tlv);
        }
    }

    if !has_additional && !labels.is_empty() {
        result.push_str(&encode_tlv("62", &labels));
    }

    result.push_str("6304");
    let crc = crc16_ccitt(&result);
    result.push_str(&crc);

    Some(result)
}
