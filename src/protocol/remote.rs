//! Decoding of error response payloads into [`RemoteError`] values.

use crate::error::{CrowError, ErrorDetails, RemoteError, RemoteErrorKind};

use super::fields::{extract_ascii, extract_u16, extract_u8, AsciiLength};

/// Turn the payload of an error response into the error to raise.
///
/// The first byte is the error number; an optional second byte is a bitfield
/// selecting the diagnostic fields that follow. Decoding is progressive: if
/// a field cannot be extracted, the failure is reported as a host-side error
/// that still carries every field decoded before it.
pub(crate) fn error_from_response(payload: &[u8], address: u8, port: u16) -> CrowError {
    if payload.is_empty() {
        return RemoteError {
            kind: RemoteErrorKind::UnspecifiedDevice,
            number: 0,
            address,
            port,
            details: ErrorDetails::default(),
        }
        .into();
    }

    let number = payload[0];
    let mut details = ErrorDetails::default();

    if payload.len() >= 2 {
        let selected = payload[1];
        let response = format!("error number {}", number);
        let mut index = 2;

        // Fields appear in bitfield order; stop at the first bad one.
        let result = (|| -> Result<(), String> {
            if selected & 0x01 != 0 {
                details.message = Some(extract_ascii(
                    payload,
                    &mut index,
                    AsciiLength::Two,
                    "message",
                    &response,
                )?);
            }
            if selected & 0x02 != 0 {
                details.crow_version =
                    Some(extract_u8(payload, &mut index, "crow_version", &response)?);
            }
            if selected & 0x04 != 0 {
                details.max_command_size = Some(extract_u16(
                    payload,
                    &mut index,
                    "max_command_size",
                    &response,
                )?);
            }
            if selected & 0x08 != 0 {
                details.max_response_size = Some(extract_u16(
                    payload,
                    &mut index,
                    "max_response_size",
                    &response,
                )?);
            }
            if selected & 0x10 != 0 {
                details.address = Some(extract_u8(payload, &mut index, "address", &response)?);
            }
            if selected & 0x20 != 0 {
                details.port = Some(extract_u8(payload, &mut index, "port", &response)?);
            }
            if selected & 0x40 != 0 {
                details.service_identifier = Some(extract_ascii(
                    payload,
                    &mut index,
                    AsciiLength::One,
                    "service_identifier",
                    &response,
                )?);
            }
            Ok(())
        })();

        if let Err(message) = result {
            return CrowError::Host {
                address,
                port,
                message,
                details: Some(details),
            };
        }
    }

    RemoteError {
        kind: RemoteErrorKind::from_number(number),
        number,
        address,
        port,
        details,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(payload: &[u8]) -> CrowError {
        error_from_response(payload, 5, 32)
    }

    #[test]
    fn test_empty_payload_is_unspecified_device() {
        match decode(&[]) {
            CrowError::Remote(error) => {
                assert_eq!(error.kind, RemoteErrorKind::UnspecifiedDevice);
                assert_eq!(error.number, 0);
                assert!(error.details.is_empty());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_number_only() {
        match decode(&[8]) {
            CrowError::Remote(error) => {
                assert_eq!(error.kind, RemoteErrorKind::DeviceLowResources);
                assert_eq!(error.number, 8);
                assert!(error.details.is_empty());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_crow_version_detail() {
        match decode(&[8, 0x02, 1]) {
            CrowError::Remote(error) => {
                assert_eq!(error.kind, RemoteErrorKind::DeviceLowResources);
                assert_eq!(error.details.crow_version, Some(1));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_message_detail() {
        // number, bitfield, offset 0x0006, length 0x0005, then the string.
        let payload = b"\x40\x01\x00\x06\x00\x05hello";
        match decode(payload) {
            CrowError::Remote(error) => {
                assert_eq!(error.kind, RemoteErrorKind::UnspecifiedService);
                assert_eq!(error.details.message.as_deref(), Some("hello"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_all_integer_details() {
        let payload = [
            0x04, // DeviceIsBusy
            0x3e, // crow_version, both sizes, address, port
            0x02, // crow_version
            0x07, 0xff, // max_command_size
            0x08, 0x00, // max_response_size
            0x05, // address
            0x20, // port
        ];
        match decode(&payload) {
            CrowError::Remote(error) => {
                assert_eq!(error.kind, RemoteErrorKind::DeviceIsBusy);
                assert_eq!(error.details.crow_version, Some(2));
                assert_eq!(error.details.max_command_size, Some(0x07ff));
                assert_eq!(error.details.max_response_size, Some(0x0800));
                assert_eq!(error.details.address, Some(5));
                assert_eq!(error.details.port, Some(0x20));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_service_identifier_detail() {
        // One-byte length: offset 0x0005, length 4.
        let payload = b"\x43\x40\x00\x05\x04echo";
        match decode(payload) {
            CrowError::Remote(error) => {
                assert_eq!(error.kind, RemoteErrorKind::ServiceLowResources);
                assert_eq!(error.details.service_identifier.as_deref(), Some("echo"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_truncated_detail_keeps_partial_record() {
        // crow_version decodes, then max_command_size runs out of bytes.
        let payload = [0x04, 0x06, 0x02, 0x07];
        match decode(&payload) {
            CrowError::Host {
                message, details, ..
            } => {
                assert!(message.contains("max_command_size"));
                let details = details.expect("partial details");
                assert_eq!(details.crow_version, Some(2));
                assert_eq!(details.max_command_size, None);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_message_out_of_bounds_is_host_error() {
        // Offset way past the end of the payload.
        let payload = b"\x40\x01\x00\x50\x00\x05";
        match decode(payload) {
            CrowError::Host { message, .. } => {
                assert!(message.contains("exceeds the bounds"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
