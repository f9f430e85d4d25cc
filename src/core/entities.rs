//! Predefined Entities and Character References
//!
//! Handles the pieces of `&...;` processing that need no DTD:
//! - The five predefined XML entities (lt, gt, amp, quot, apos)
//! - Decimal and hexadecimal character references
//! - Escaping text for re-serialization

use std::borrow::Cow;

use crate::error::{Result, TreeError};

/// Names of the predefined entities, in declaration order
pub const PREDEFINED_ENTITIES: [&str; 5] = ["lt", "gt", "amp", "apos", "quot"];

/// Replacement text of a predefined entity
#[inline]
pub fn predefined_entity(name: &str) -> Option<&'static str> {
    match name {
        "lt" => Some("<"),
        "gt" => Some(">"),
        "amp" => Some("&"),
        "apos" => Some("'"),
        "quot" => Some("\""),
        _ => None,
    }
}

/// Decode the digits of a character reference (text between `&#` or
/// `&#x` and `;`).
///
/// An invalid digit or a value outside the XML Char production is an error.
pub fn decode_char_ref(digits: &str, hex: bool) -> Result<char> {
    let (radix, err) = if hex {
        (16, TreeError::InvalidHexCharRef)
    } else {
        (10, TreeError::InvalidDecCharRef)
    };
    if digits.is_empty() {
        return Err(err);
    }
    let mut value: u32 = 0;
    for c in digits.chars() {
        let digit = c.to_digit(radix).ok_or_else(|| err.clone())?;
        value = value
            .checked_mul(radix)
            .and_then(|v| v.checked_add(digit))
            .ok_or(TreeError::InvalidCharValue(u32::MAX))?;
    }
    if !is_valid_xml_char(value) {
        return Err(TreeError::InvalidCharValue(value));
    }
    char::from_u32(value).ok_or(TreeError::InvalidCharValue(value))
}

/// Check if a code point is a valid XML 1.0 Char
/// Char ::= #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]
#[inline]
pub fn is_valid_xml_char(codepoint: u32) -> bool {
    matches!(codepoint,
        0x9 | 0xA | 0xD |
        0x20..=0xD7FF |
        0xE000..=0xFFFD |
        0x10000..=0x10FFFF
    )
}

/// XML whitespace (S production)
#[inline]
pub fn is_blank_char(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | b'\r')
}

/// Escape text for an entity-preserving string: `<`, `>`, `&` and CR
pub fn encode_entities(input: &str) -> Cow<'_, str> {
    encode_with(input, false)
}

/// Escape text for a raw string: `<`, `>`, `&`, `"` and CR
pub fn encode_special_chars(input: &str) -> Cow<'_, str> {
    encode_with(input, true)
}

fn encode_with(input: &str, quotes: bool) -> Cow<'_, str> {
    let needs = |b: u8| matches!(b, b'<' | b'>' | b'&' | b'\r') || (quotes && b == b'"');

    // Fast path: check if any escaping needed
    if !input.bytes().any(needs) {
        return Cow::Borrowed(input);
    }

    let mut result = String::with_capacity(input.len() + 16);
    for c in input.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            '\r' => result.push_str("&#13;"),
            '"' if quotes => result.push_str("&quot;"),
            _ => result.push(c),
        }
    }
    Cow::Owned(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predefined() {
        for name in PREDEFINED_ENTITIES {
            assert!(predefined_entity(name).is_some());
        }
        assert_eq!(predefined_entity("amp"), Some("&"));
        assert_eq!(predefined_entity("nbsp"), None);
    }

    #[test]
    fn test_numeric_decimal() {
        assert_eq!(decode_char_ref("65", false), Ok('A'));
        assert_eq!(decode_char_ref("6a", false), Err(TreeError::InvalidDecCharRef));
    }

    #[test]
    fn test_numeric_hex() {
        assert_eq!(decode_char_ref("41", true), Ok('A'));
        assert_eq!(decode_char_ref("1F600", true), Ok('😀'));
        assert_eq!(decode_char_ref("", true), Err(TreeError::InvalidHexCharRef));
    }

    #[test]
    fn test_invalid_char_values() {
        assert_eq!(decode_char_ref("0", false), Err(TreeError::InvalidCharValue(0)));
        assert_eq!(decode_char_ref("D800", true), Err(TreeError::InvalidCharValue(0xD800)));
        assert!(decode_char_ref("FFFFFFFFFF", true).is_err());
    }

    #[test]
    fn test_encode_entities() {
        let input = "<hello> & \"world\"\r";
        assert_eq!(encode_entities(input), "&lt;hello&gt; &amp; \"world\"&#13;");
        assert_eq!(encode_special_chars(input), "&lt;hello&gt; &amp; &quot;world&quot;&#13;");
        assert!(matches!(encode_entities("plain"), Cow::Borrowed(_)));
    }
}
