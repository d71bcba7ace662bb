//! IBAN Codec
//!
//! Generates, validates and formats the mod-97 protected account
//! identifiers used to address accounts externally.
//!
//! Layout: `<country><check digits><bank code><account id, 10 digits>`,
//! e.g. `NL12BANK0123456789`.

use crate::domain::DomainError;

/// Number of digits in the account segment
const ACCOUNT_DIGITS: usize = 10;

/// Largest account id that fits the account segment
pub const MAX_ACCOUNT_ID: i64 = 9_999_999_999;

const DEFAULT_COUNTRY_CODE: &str = "NL";
const DEFAULT_BANK_CODE: &str = "BANK";

/// IBAN codec bound to one country and bank code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IbanCodec {
    country_code: String,
    bank_code: String,
}

impl Default for IbanCodec {
    fn default() -> Self {
        Self {
            country_code: DEFAULT_COUNTRY_CODE.to_string(),
            bank_code: DEFAULT_BANK_CODE.to_string(),
        }
    }
}

impl IbanCodec {
    /// Create a codec. Country code must be 2 letters, bank code 1+ letters.
    pub fn new(country_code: &str, bank_code: &str) -> Result<Self, DomainError> {
        let country_ok =
            country_code.len() == 2 && country_code.chars().all(|c| c.is_ascii_uppercase());
        let bank_ok = !bank_code.is_empty() && bank_code.chars().all(|c| c.is_ascii_uppercase());

        if !country_ok || !bank_ok {
            return Err(DomainError::InvalidInput(format!(
                "invalid IBAN country/bank code: {country_code}/{bank_code}"
            )));
        }

        Ok(Self {
            country_code: country_code.to_string(),
            bank_code: bank_code.to_string(),
        })
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    pub fn bank_code(&self) -> &str {
        &self.bank_code
    }

    fn expected_len(&self) -> usize {
        4 + self.bank_code.len() + ACCOUNT_DIGITS
    }

    // =========================================================================
    // generate
    // =========================================================================

    /// Build the IBAN for an account id
    pub fn generate(&self, account_id: i64) -> Result<String, DomainError> {
        if !(0..=MAX_ACCOUNT_ID).contains(&account_id) {
            return Err(DomainError::InvalidInput(format!(
                "account id {account_id} does not fit an IBAN"
            )));
        }

        let body = format!("{}{:0width$}", self.bank_code, account_id, width = ACCOUNT_DIGITS);
        let checksum = checksum(&self.country_code, &body);

        Ok(format!("{}{:02}{}", self.country_code, checksum, body))
    }

    // =========================================================================
    // validate
    // =========================================================================

    /// Check structure and check digits. Never fails, only answers.
    pub fn validate(&self, iban: &str) -> bool {
        if iban.len() < 5 || iban.len() != self.expected_len() || !iban.is_ascii() {
            return false;
        }

        if !iban.starts_with(&self.country_code) {
            return false;
        }

        let bank_end = 4 + self.bank_code.len();
        if &iban[4..bank_end] != self.bank_code {
            return false;
        }

        if !iban[bank_end..].bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }

        let claimed = match iban[2..4].parse::<u32>() {
            Ok(digits) if iban[2..4].bytes().all(|b| b.is_ascii_digit()) => digits,
            _ => return false,
        };

        checksum(&iban[0..2], &iban[4..]) == claimed
    }

    // =========================================================================
    // extract_account_id
    // =========================================================================

    /// Account id carried by a valid IBAN
    pub fn extract_account_id(&self, iban: &str) -> Result<i64, DomainError> {
        if !self.validate(iban) {
            return Err(DomainError::InvalidInput(format!("invalid IBAN: {iban}")));
        }

        iban[iban.len() - ACCOUNT_DIGITS..]
            .parse::<i64>()
            .map_err(|e| DomainError::InvalidInput(e.to_string()))
    }

    // =========================================================================
    // format
    // =========================================================================

    /// Group in blocks of 4 for display: `NL12 BANK 0123 4567 89`.
    /// Malformed input is returned untouched.
    pub fn format(&self, iban: &str) -> String {
        if iban.len() < 8 || !iban.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return iban.to_string();
        }

        iban.as_bytes()
            .chunks(4)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Strip whitespace and upper-case, so formatted input can be validated
    pub fn normalize(input: &str) -> String {
        input
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect()
    }
}

/// `98 - (n mod 97)` where `n` is `body + country + "00"` read as a number
/// with letters mapped A=10 .. Z=35. The remainder is computed digit by digit,
/// which gives the same result as reducing the full big integer.
fn checksum(country_code: &str, body: &str) -> u32 {
    let rearranged = body.chars().chain(country_code.chars()).chain("00".chars());

    let remainder = rearranged.fold(0u32, |acc, c| {
        if let Some(d) = c.to_digit(10) {
            (acc * 10 + d) % 97
        } else {
            let value = c.to_ascii_uppercase() as u32 - 'A' as u32 + 10;
            (acc * 100 + value) % 97
        }
    });

    98 - remainder
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_known_value() {
        let codec = IbanCodec::default();
        assert_eq!(codec.generate(123456789).unwrap(), "NL12BANK0123456789");
        assert_eq!(codec.generate(42).unwrap(), "NL28BANK0000000042");
        assert_eq!(codec.generate(0).unwrap(), "NL95BANK0000000000");
    }

    #[test]
    fn test_generate_42_round_trip() {
        let codec = IbanCodec::default();
        let iban = codec.generate(42).unwrap();

        assert!(codec.validate(&iban));
        assert_eq!(codec.extract_account_id(&iban).unwrap(), 42);
    }

    #[test]
    fn test_round_trip_across_range() {
        let codec = IbanCodec::default();
        for id in [0, 1, 7, 96, 97, 98, 1_000, 65_535, 123_456_789, MAX_ACCOUNT_ID] {
            let iban = codec.generate(id).unwrap();
            assert!(codec.validate(&iban), "{iban} should validate");
            assert_eq!(codec.extract_account_id(&iban).unwrap(), id);
        }
    }

    #[test]
    fn test_generate_rejects_out_of_range() {
        let codec = IbanCodec::default();
        assert!(matches!(codec.generate(-1), Err(DomainError::InvalidInput(_))));
        assert!(matches!(
            codec.generate(MAX_ACCOUNT_ID + 1),
            Err(DomainError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_single_digit_tamper_detected() {
        let codec = IbanCodec::default();
        let iban = codec.generate(123456789).unwrap();

        for (pos, original) in iban.char_indices() {
            let Some(d) = original.to_digit(10) else {
                continue;
            };
            for replacement in 0..10u32 {
                if replacement == d {
                    continue;
                }
                let mut tampered = iban.clone();
                let digit = char::from_digit(replacement, 10).unwrap();
                tampered.replace_range(pos..pos + 1, &digit.to_string());
                assert!(!codec.validate(&tampered), "{tampered} should be rejected");
            }
        }
    }

    #[test]
    fn test_validate_rejects_malformed() {
        let codec = IbanCodec::default();
        assert!(!codec.validate(""));
        assert!(!codec.validate("NL"));
        assert!(!codec.validate("NL12"));
        // wrong bank code
        assert!(!codec.validate("NL12ABCD0123456789"));
        // wrong country
        assert!(!codec.validate("DE12BANK0123456789"));
        // non-digit check digits
        assert!(!codec.validate("NLx2BANK0123456789"));
        // letters in account segment
        assert!(!codec.validate("NL12BANK01234567A9"));
        // too long
        assert!(!codec.validate("NL12BANK01234567890"));
        // non-ascii
        assert!(!codec.validate("NL12BANK012345678é"));
    }

    #[test]
    fn test_extract_requires_validation() {
        let codec = IbanCodec::default();
        let result = codec.extract_account_id("NL13BANK0123456789");
        assert!(matches!(result, Err(DomainError::InvalidInput(_))));
    }

    #[test]
    fn test_format() {
        let codec = IbanCodec::default();
        assert_eq!(codec.format("NL12BANK0123456789"), "NL12 BANK 0123 4567 89");
        assert_eq!(codec.format("NL12"), "NL12");
        assert_eq!(codec.format("NL12-BANK-0123"), "NL12-BANK-0123");
    }

    #[test]
    fn test_normalize_accepts_formatted_input() {
        let codec = IbanCodec::default();
        let normalized = IbanCodec::normalize("nl12 bank 0123 4567 89");
        assert_eq!(normalized, "NL12BANK0123456789");
        assert!(codec.validate(&normalized));
    }

    #[test]
    fn test_custom_codes() {
        let codec = IbanCodec::new("DE", "ABCD").unwrap();
        let iban = codec.generate(5).unwrap();
        assert!(iban.starts_with("DE"));
        assert_eq!(&iban[4..8], "ABCD");
        assert!(codec.validate(&iban));
        assert!(!IbanCodec::default().validate(&iban));

        assert!(IbanCodec::new("nl", "BANK").is_err());
        assert!(IbanCodec::new("NL", "").is_err());
    }
}
