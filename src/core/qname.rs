//! Qualified names
//!
//! Building and splitting `prefix:local` names, and checking the
//! Name / NCName / QName / Nmtoken productions.

use std::borrow::Cow;

/// Join a prefix and a local name. No prefix gives the local name back.
pub fn build_qname<'a>(ncname: &'a str, prefix: Option<&str>) -> Cow<'a, str> {
    match prefix {
        None | Some("") => Cow::Borrowed(ncname),
        Some(prefix) => {
            let mut qname = String::with_capacity(prefix.len() + 1 + ncname.len());
            qname.push_str(prefix);
            qname.push(':');
            qname.push_str(ncname);
            Cow::Owned(qname)
        }
    }
}

/// Split `prefix:local` into its parts.
///
/// Returns `None` for unprefixed names and for names that start or end
/// with the colon.
pub fn split_qname2(name: &str) -> Option<(&str, &str)> {
    if name.starts_with(':') {
        return None;
    }
    let (prefix, local) = name.split_once(':')?;
    if local.is_empty() {
        return None;
    }
    Some((prefix, local))
}

/// Locate the local part of a qualified name.
///
/// Returns the prefix length and the local part, `None` when unprefixed.
pub fn split_qname3(name: &str) -> Option<(usize, &str)> {
    let (prefix, local) = split_qname2(name)?;
    Some((prefix.len(), local))
}

#[inline]
fn is_name_start_char(c: char) -> bool {
    matches!(c,
        ':' | 'A'..='Z' | '_' | 'a'..='z' |
        '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}' |
        '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' | '\u{200C}'..='\u{200D}' |
        '\u{2070}'..='\u{218F}' | '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}' |
        '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' | '\u{10000}'..='\u{EFFFF}'
    )
}

#[inline]
fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c, '-' | '.' | '0'..='9' | '\u{B7}' | '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}')
}

/// Trim surrounding blanks when `space` allows them
fn trimmed(value: &str, space: bool) -> &str {
    if space {
        value.trim_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r'))
    } else {
        value
    }
}

/// Name production
pub fn validate_name(value: &str, space: bool) -> bool {
    let value = trimmed(value, space);
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if is_name_start_char(c) => chars.all(is_name_char),
        _ => false,
    }
}

/// NCName production (a Name without colons)
pub fn validate_ncname(value: &str, space: bool) -> bool {
    let value = trimmed(value, space);
    !value.contains(':') && validate_name(value, false)
}

/// QName production: `NCName` or `NCName:NCName`
pub fn validate_qname(value: &str, space: bool) -> bool {
    let value = trimmed(value, space);
    match value.split_once(':') {
        Some((prefix, local)) => validate_ncname(prefix, false) && validate_ncname(local, false),
        None => validate_ncname(value, false),
    }
}

/// Nmtoken production
pub fn validate_nmtoken(value: &str, space: bool) -> bool {
    let value = trimmed(value, space);
    !value.is_empty() && value.chars().all(is_name_char)
}
