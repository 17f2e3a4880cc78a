use crate::error::CrowError;

use super::checksum::fletcher16_checkbytes;
use super::{body_size, CHUNK_SIZE, MAX_PAYLOAD_SIZE};

/// A command to be framed and written to the serial line.
///
/// The token is assigned by the host at send time, so it is not part of this
/// struct; see [`Command::encode`].
#[derive(Debug, Clone)]
pub struct Command<'a> {
    /// Device address, 0 to 31. Address 0 is broadcast and forbids responses.
    pub address: u8,
    /// Service port on the device. Port 0 (the admin service) is encoded
    /// implicitly with a shorter header.
    pub port: u16,
    /// Command payload, up to 2047 bytes.
    pub payload: &'a [u8],
    /// When false the device must not respond and the command is muted.
    pub response_expected: bool,
    /// Command type bit: user command when true, admin command when false.
    pub is_user: bool,
    /// Emit each chunk's payload in reversed four-byte groups (PropCR order).
    pub propcr_order: bool,
}

impl Default for Command<'_> {
    fn default() -> Self {
        Self {
            address: 1,
            port: 32,
            payload: &[],
            response_expected: true,
            is_user: true,
            propcr_order: false,
        }
    }
}

impl Command<'_> {
    /// Serialize the command packet: header, header check bytes, and the
    /// chunked payload with per-chunk check bytes.
    pub fn encode(&self, token: u8) -> Result<Vec<u8>, CrowError> {
        if self.address > 31 {
            return Err(CrowError::InvalidArgument(
                "address must be 0 to 31".into(),
            ));
        }
        if self.address == 0 && self.response_expected {
            return Err(CrowError::InvalidArgument(
                "broadcast commands (address 0) must not expect a response".into(),
            ));
        }
        let payload_size = self.payload.len();
        if payload_size > MAX_PAYLOAD_SIZE {
            return Err(CrowError::InvalidArgument(
                "payload may have 0 to 2047 bytes".into(),
            ));
        }

        let header_size = if self.port == 0 { 4 } else { 6 };
        let mut packet = Vec::with_capacity(header_size + 2 + body_size(payload_size));

        // CH0, CH1: reserved pattern, command type, payload length.
        let mut ch0 = 0x40 | (payload_size >> 8) as u8;
        if self.is_user {
            ch0 |= 0x10;
        }
        packet.push(ch0);
        packet.push(payload_size as u8);

        // CH2: token.
        packet.push(token);

        // CH3: address, mute flag, explicit-port flag.
        let mut ch3 = self.address;
        if !self.response_expected {
            ch3 |= 0x40;
        }
        if self.port > 0 {
            ch3 |= 0x80;
        }
        packet.push(ch3);

        // CH4, CH5: explicit port, present only when nonzero.
        if self.port > 0 {
            packet.extend_from_slice(&self.port.to_be_bytes());
        }

        let check = fletcher16_checkbytes(&packet);
        packet.extend_from_slice(&check);

        // Body: chunks of up to 128 payload bytes, each followed by check
        // bytes computed over the bytes as they appear on the wire.
        for chunk in self.payload.chunks(CHUNK_SIZE) {
            let start = packet.len();
            if self.propcr_order {
                for group in chunk.chunks(4) {
                    packet.extend(group.iter().rev());
                }
            } else {
                packet.extend_from_slice(chunk);
            }
            let check = fletcher16_checkbytes(&packet[start..]);
            packet.extend_from_slice(&check);
        }

        Ok(packet)
    }
}
