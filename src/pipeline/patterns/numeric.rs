//! Locale-aware numeric parsing.
//!
//! Farm paperwork mixes European (`1.234,56`, `50 000`) and Anglo
//! (`1,234.56`) conventions, sometimes in the same document. The parser
//! decides per value which separator is decimal and which is grouping.

/// Parse a number in either European or Anglo format.
///
/// Rules:
/// - spaces (including NBSP leftovers) are grouping and removed;
/// - when both `.` and `,` appear, the one appearing last is the decimal
///   separator;
/// - a lone separator followed by exactly 1–2 digits is decimal;
/// - a lone separator followed by 3-digit groups is grouping (`50.000` →
///   50000 — the corpus is French/Romanian, see DESIGN.md).
pub fn parse_localized_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{00A0}' | '\u{202F}'))
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    let normalized = match (cleaned.contains('.'), cleaned.contains(',')) {
        (true, true) => {
            let last_dot = cleaned.rfind('.').unwrap_or(0);
            let last_comma = cleaned.rfind(',').unwrap_or(0);
            if last_comma > last_dot {
                // European: dots group, comma is decimal
                cleaned.replace('.', "").replace(',', ".")
            } else {
                // Anglo: commas group, dot is decimal
                cleaned.replace(',', "")
            }
        }
        (false, true) => {
            if is_decimal_tail(&cleaned, ',') {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        (true, false) => {
            if is_decimal_tail(&cleaned, '.') {
                cleaned
            } else {
                cleaned.replace('.', "")
            }
        }
        (false, false) => cleaned,
    };

    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parse a whole count (employee numbers). Grouping separators allowed,
/// fractional values rejected.
pub fn parse_count(raw: &str) -> Option<i64> {
    let n = parse_localized_number(raw)?;
    if n < 0.0 || n.fract() != 0.0 || n > i64::MAX as f64 {
        return None;
    }
    Some(n as i64)
}

/// A lone separator is decimal when it appears once with 1–2 digits after it.
fn is_decimal_tail(s: &str, sep: char) -> bool {
    let parts: Vec<&str> = s.split(sep).collect();
    parts.len() == 2 && (1..=2).contains(&parts[1].len())
}
