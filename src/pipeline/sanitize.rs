//! Text sanitization ahead of pattern matching.
//!
//! Registry extracts arrive through copy-paste, OCR exports and PDF text
//! layers; control characters and exotic spaces break both the regex pass and
//! locale-aware number parsing ("50 000 €" uses NBSP between digit groups).

/// Strip control characters and normalize space variants.
///
/// Keeps newlines and tabs (line structure matters for labeled patterns),
/// maps NBSP and narrow NBSP to plain spaces, drops the rest of the C0/C1
/// range and zero-width characters.
pub fn sanitize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\n' | '\t' => out.push(ch),
            '\u{00A0}' | '\u{202F}' | '\u{2007}' => out.push(' '),
            '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}' => {}
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}
