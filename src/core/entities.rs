//! XML entity decoding
//!
//! Handles the references that can appear in attribute values:
//! - Built-in entities: &lt; &gt; &amp; &quot; &apos;
//! - Numeric character references: &#123; &#x7B;
//!
//! Fragment text is emitted verbatim from the source, so only attribute
//! values (namespace URIs, predicate comparisons) are ever decoded.
//! Uses Cow for zero-copy when no entities are present.

use memchr::memchr;
use std::borrow::Cow;

/// Decode entity references in an attribute value
///
/// Returns Borrowed if no entities present (zero-copy),
/// returns Owned if entities were decoded.
#[inline]
pub fn decode_value(input: &[u8]) -> Cow<'_, [u8]> {
    if memchr(b'&', input).is_none() {
        return Cow::Borrowed(input);
    }
    Cow::Owned(decode_entities(input))
}

/// Decode all entity references in the input
fn decode_entities(input: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let mut pos = 0;

    while pos < input.len() {
        if let Some(amp_pos) = memchr(b'&', &input[pos..]) {
            result.extend_from_slice(&input[pos..pos + amp_pos]);
            pos += amp_pos;

            if let Some(semi_offset) = memchr(b';', &input[pos..]) {
                let entity = &input[pos + 1..pos + semi_offset];

                if let Some(decoded) = decode_entity(entity) {
                    result.extend_from_slice(decoded.as_bytes());
                    pos += semi_offset + 1;
                } else {
                    // Unknown entity, keep as-is
                    result.push(b'&');
                    pos += 1;
                }
            } else {
                // No semicolon found, keep the ampersand
                result.push(b'&');
                pos += 1;
            }
        } else {
            result.extend_from_slice(&input[pos..]);
            break;
        }
    }

    result
}

/// Decode a single entity (without & and ;)
fn decode_entity(entity: &[u8]) -> Option<String> {
    if entity.is_empty() {
        return None;
    }

    if entity[0] == b'#' {
        return decode_numeric_entity(&entity[1..]);
    }

    match entity {
        b"lt" => Some("<".to_string()),
        b"gt" => Some(">".to_string()),
        b"amp" => Some("&".to_string()),
        b"quot" => Some("\"".to_string()),
        b"apos" => Some("'".to_string()),
        _ => None,
    }
}

/// Decode a numeric character reference (after '#')
fn decode_numeric_entity(digits: &[u8]) -> Option<String> {
    let code = if digits.first() == Some(&b'x') || digits.first() == Some(&b'X') {
        u32::from_str_radix(std::str::from_utf8(&digits[1..]).ok()?, 16).ok()?
    } else {
        std::str::from_utf8(digits).ok()?.parse::<u32>().ok()?
    };
    char::from_u32(code).map(|c| c.to_string())
}
