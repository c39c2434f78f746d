//! Checksum validators for the legal identifiers found in farm paperwork.
//!
//! Each validator implements the published national standard for its
//! identifier family:
//! - SIREN / SIRET (France): Luhn alternating doubling
//! - CUI (Romania, fiscal code): weighted mod-11, key 753217532, remainder 10 → 0
//! - CNP (Romania, personal numeric code): weighted mod-11, key 279146358279,
//!   remainder 10 → 1
//! - IBAN: mod-97 with letter-to-number substitution and block rotation
//!
//! All functions are pure and total: malformed input returns `false`, never
//! an error or a panic. The pattern extractors use the verdict to raise or
//! lower confidence, not to discard matches.

/// Luhn check used by both SIREN (9 digits) and SIRET (14 digits).
fn luhn(digits: &[u32]) -> bool {
    let checksum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(idx, &digit)| {
            if idx % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                digit
            }
        })
        .sum();
    checksum % 10 == 0
}

/// Collect digits, rejecting anything that is not a digit or a plain space.
fn digits_only(value: &str) -> Option<Vec<u32>> {
    let mut digits = Vec::with_capacity(value.len());
    for ch in value.chars() {
        if ch == ' ' {
            continue;
        }
        digits.push(ch.to_digit(10)?);
    }
    Some(digits)
}

/// Validate a French SIREN (9-digit company number).
pub fn siren_checksum(value: &str) -> bool {
    match digits_only(value) {
        Some(digits) if digits.len() == 9 => luhn(&digits),
        _ => false,
    }
}

/// Validate a French SIRET (14-digit establishment number).
pub fn siret_checksum(value: &str) -> bool {
    match digits_only(value) {
        Some(digits) if digits.len() == 14 => luhn(&digits),
        _ => false,
    }
}

/// Validate a Romanian CUI / CIF (2–10 digits, last digit is the control).
///
/// The body is right-aligned against the key 753217532, products summed,
/// then `sum * 10 mod 11`; a remainder of 10 maps to control digit 0.
pub fn cui_checksum(value: &str) -> bool {
    const KEY: [u32; 9] = [7, 5, 3, 2, 1, 7, 5, 3, 2];

    let digits = match digits_only(value) {
        Some(d) if (2..=10).contains(&d.len()) => d,
        _ => return false,
    };

    let (body, control) = digits.split_at(digits.len() - 1);
    let control = control[0];

    // Right-align the body against the key (left-pad with zeros)
    let offset = KEY.len() - body.len();
    let sum: u32 = body
        .iter()
        .enumerate()
        .map(|(i, &d)| d * KEY[offset + i])
        .sum();

    let mut check = (sum * 10) % 11;
    if check == 10 {
        check = 0;
    }
    check == control
}

/// Validate a Romanian CNP (13-digit personal numeric code).
///
/// Weighted sum of the first 12 digits against the key 279146358279,
/// mod 11; a remainder of 10 maps to control digit 1. The first digit
/// encodes sex/century and is never 0.
pub fn cnp_checksum(value: &str) -> bool {
    const KEY: [u32; 12] = [2, 7, 9, 1, 4, 6, 3, 5, 8, 2, 7, 9];

    let digits = match digits_only(value) {
        Some(d) if d.len() == 13 => d,
        _ => return false,
    };
    if digits[0] == 0 {
        return false;
    }

    let sum: u32 = digits[..12].iter().zip(KEY.iter()).map(|(d, k)| d * k).sum();
    let mut check = sum % 11;
    if check == 10 {
        check = 1;
    }
    check == digits[12]
}

/// Validate an IBAN (mod-97 per ISO 13616).
///
/// Accepts grouped input ("FR14 2004 …"); rejects anything that is not
/// letters and digits after space removal, or outside 15–34 characters.
pub fn iban_checksum(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| *c != ' ')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if !(15..=34).contains(&compact.len()) {
        return false;
    }
    let bytes = compact.as_bytes();
    if !bytes[0].is_ascii_uppercase()
        || !bytes[1].is_ascii_uppercase()
        || !bytes[2].is_ascii_digit()
        || !bytes[3].is_ascii_digit()
    {
        return false;
    }
    if !compact.chars().all(|c| c.is_ascii_alphanumeric()) {
        return false;
    }

    // Block rotation: country code + check digits move to the end
    let rearranged = format!("{}{}", &compact[4..], &compact[..4]);

    let mut remainder: u32 = 0;
    for ch in rearranged.chars() {
        if let Some(d) = ch.to_digit(10) {
            remainder = (remainder * 10 + d) % 97;
        } else {
            let v = 10 + (ch as u32 - 'A' as u32);
            remainder = (remainder * 100 + v) % 97;
        }
    }
    remainder == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_siren_accepted() {
        assert!(siren_checksum("732829320"));
        assert!(siren_checksum("732 829 320")); // grouped form
    }

    #[test]
    fn invalid_siren_rejected() {
        assert!(!siren_checksum("732829321")); // perturbed control
        assert!(!siren_checksum("73282932")); // too short
        assert!(!siren_checksum("7328293201")); // too long
        assert!(!siren_checksum("73282932a"));
        assert!(!siren_checksum(""));
    }

    #[test]
    fn valid_siret_accepted() {
        assert!(siret_checksum("73282932000074"));
        assert!(siret_checksum("732 829 320 00074"));
    }

    #[test]
    fn invalid_siret_rejected() {
        assert!(!siret_checksum("73282932000075"));
        assert!(!siret_checksum("732829320000740"));
        assert!(!siret_checksum("73282932000074x"));
    }

    #[test]
    fn valid_cui_accepted() {
        assert!(cui_checksum("1590082"));
        assert!(cui_checksum("18547290"));
    }

    #[test]
    fn invalid_cui_rejected() {
        assert!(!cui_checksum("1590083")); // perturbed control
        assert!(!cui_checksum("1")); // below minimum length
        assert!(!cui_checksum("12345678901")); // above maximum length
        assert!(!cui_checksum("159OO82")); // letters
    }

    #[test]
    fn valid_cnp_accepted() {
        assert!(cnp_checksum("1800101221144"));
    }

    #[test]
    fn invalid_cnp_rejected() {
        assert!(!cnp_checksum("1800101221145")); // perturbed control
        assert!(!cnp_checksum("0800101221144")); // leading zero
        assert!(!cnp_checksum("180010122114")); // 12 digits
        assert!(!cnp_checksum("18001012211440")); // 14 digits
    }

    #[test]
    fn valid_iban_accepted() {
        assert!(iban_checksum("FR1420041010050500013M02606"));
        assert!(iban_checksum("RO49AAAA1B31007593840000"));
        assert!(iban_checksum("FR14 2004 1010 0505 0001 3M02 606"));
        assert!(iban_checksum("fr1420041010050500013m02606")); // case-folded
    }

    #[test]
    fn invalid_iban_rejected() {
        assert!(!iban_checksum("FR1420041010050500013M02607")); // perturbed
        assert!(!iban_checksum("RO49AAAA1B3100759384000")); // truncated
        assert!(!iban_checksum("1R49AAAA1B31007593840000")); // digit country code
        assert!(!iban_checksum("FRAA20041010050500013M02606")); // letter check digits
        assert!(!iban_checksum("FR14-2004-1010")); // separators + too short
    }

    #[test]
    fn malformed_input_never_panics() {
        for garbage in ["", " ", "€€€", "ABC", "123", "\u{0000}\u{FFFF}"] {
            let _ = siren_checksum(garbage);
            let _ = siret_checksum(garbage);
            let _ = cui_checksum(garbage);
            let _ = cnp_checksum(garbage);
            let _ = iban_checksum(garbage);
        }
    }
}
