//! Helpers for the packed argument format shared by error responses and the
//! admin service: integers are big-endian, and strings are referenced by a
//! two-byte offset from the start of the payload plus a length.

use byteorder::{BigEndian, ByteOrder};

/// How many bytes encode an ascii field's length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AsciiLength {
    One,
    Two,
}

pub(crate) fn extract_u8(
    payload: &[u8],
    index: &mut usize,
    field: &str,
    response: &str,
) -> Result<u8, String> {
    if payload.len() - *index < 1 {
        return Err(not_enough_bytes(field, response));
    }
    let value = payload[*index];
    *index += 1;
    Ok(value)
}

pub(crate) fn extract_u16(
    payload: &[u8],
    index: &mut usize,
    field: &str,
    response: &str,
) -> Result<u16, String> {
    if payload.len() - *index < 2 {
        return Err(not_enough_bytes(field, response));
    }
    let value = BigEndian::read_u16(&payload[*index..]);
    *index += 2;
    Ok(value)
}

/// Extract an ascii string referenced by offset and length argument bytes.
///
/// The referenced slice must lie entirely within `payload`. Non-ascii bytes
/// are decoded as U+FFFD.
pub(crate) fn extract_ascii(
    payload: &[u8],
    index: &mut usize,
    length_size: AsciiLength,
    field: &str,
    response: &str,
) -> Result<String, String> {
    let arg_bytes = match length_size {
        AsciiLength::One => 3,
        AsciiLength::Two => 4,
    };
    if payload.len() - *index < arg_bytes {
        return Err(not_enough_bytes(field, response));
    }
    let offset = usize::from(BigEndian::read_u16(&payload[*index..]));
    let length = match length_size {
        AsciiLength::One => usize::from(payload[*index + 2]),
        AsciiLength::Two => usize::from(BigEndian::read_u16(&payload[*index + 2..])),
    };
    *index += arg_bytes;
    if offset + length > payload.len() {
        return Err(format!(
            "{} exceeds the bounds of the {} response",
            field, response
        ));
    }
    Ok(decode_ascii(&payload[offset..offset + length]))
}

fn decode_ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { '\u{fffd}' })
        .collect()
}

fn not_enough_bytes(field: &str, response: &str) -> String {
    format!(
        "the {} response does not have enough bytes remaining for {}",
        response, field
    )
}
