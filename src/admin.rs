//! Client for the admin service every device exposes on port 0.
//!
//! Admin command payloads open with the identifying bytes `0x43 0x41`
//! ("CA") and a command code; responses echo those three bytes back before
//! their arguments. Ping is the exception: it is an empty payload answered
//! by an empty response.

use std::time::{Duration, Instant};

use byteorder::{BigEndian, ByteOrder};

use crate::error::CrowError;
use crate::host::Host;
use crate::link::SerialLink;
use crate::protocol::fields::{extract_ascii, AsciiLength};
use crate::protocol::Command;

const IDENTIFIER: [u8; 2] = [0x43, 0x41];

const CODE_ECHO: u8 = 0;
const CODE_GET_DEVICE_INFO: u8 = 1;
const CODE_GET_OPEN_PORTS: u8 = 2;
const CODE_GET_PORT_INFO: u8 = 3;

/// Information reported by `get_device_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub crow_version: u8,
    pub admin_version: u8,
    pub max_command_size: u16,
    pub max_response_size: u16,
    pub impl_identifier: Option<String>,
    pub impl_description: Option<String>,
    pub device_identifier: Option<String>,
    pub device_description: Option<String>,
}

/// Information reported by `get_port_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub is_open: bool,
    pub service_identifier: Option<String>,
    pub service_description: Option<String>,
}

/// Admin service client bound to one device address.
pub struct CrowAdmin<'h, L: SerialLink> {
    host: &'h mut Host<L>,
    pub address: u8,
    pub port: u16,
    pub propcr_order: bool,
}

impl<'h, L: SerialLink> CrowAdmin<'h, L> {
    pub fn new(host: &'h mut Host<L>, address: u8) -> Self {
        Self {
            host,
            address,
            port: 0,
            propcr_order: false,
        }
    }

    /// Ping the device. Returns the round-trip time of the exchange.
    pub fn ping(&mut self) -> Result<Duration, CrowError> {
        let start = Instant::now();
        let response = self.exchange(&[])?;
        let elapsed = start.elapsed();
        if !response.is_empty() {
            return Err(self.invalid("the ping response was not empty"));
        }
        Ok(elapsed)
    }

    /// Ask the device to echo `data` back. Fails if the echo differs.
    pub fn echo(&mut self, data: &[u8]) -> Result<(), CrowError> {
        let command = self.admin_payload(CODE_ECHO, data);
        let response = self.exchange(&command)?;
        self.check_header(CODE_ECHO, &response)?;
        if response.len() < command.len() {
            return Err(self.invalid("the echo response has too few bytes"));
        }
        if response.len() > command.len() {
            return Err(self.invalid("the echo response has too many bytes"));
        }
        if response != command {
            return Err(self.invalid("the echo response has incorrect bytes"));
        }
        Ok(())
    }

    /// Announce host presence. The command is muted, so there is no reply.
    pub fn host_presence(&mut self, data: &[u8]) -> Result<(), CrowError> {
        let payload = self.admin_payload(CODE_ECHO, data);
        let command = Command {
            address: self.address,
            port: self.port,
            payload: &payload,
            response_expected: false,
            is_user: false,
            propcr_order: self.propcr_order,
        };
        self.host.send_command(&command)?;
        Ok(())
    }

    pub fn get_device_info(&mut self) -> Result<DeviceInfo, CrowError> {
        let command = self.admin_payload(CODE_GET_DEVICE_INFO, &[]);
        let response = self.exchange(&command)?;
        self.check_header(CODE_GET_DEVICE_INFO, &response)?;
        if response.len() < 9 {
            return Err(self.invalid("the get_device_info response has less than nine bytes"));
        }
        let mut info = DeviceInfo {
            crow_version: response[3],
            admin_version: response[4],
            max_command_size: BigEndian::read_u16(&response[5..7]),
            max_response_size: BigEndian::read_u16(&response[7..9]),
            impl_identifier: None,
            impl_description: None,
            device_identifier: None,
            device_description: None,
        };
        if response.len() == 9 {
            return Ok(info);
        }

        let details = response[9];
        let mut index = 10;
        let fields = [
            (0x01, &mut info.impl_identifier, "impl_identifier"),
            (0x02, &mut info.impl_description, "impl_description"),
            (0x04, &mut info.device_identifier, "device_identifier"),
            (0x08, &mut info.device_description, "device_description"),
        ];
        for (bit, slot, name) in fields {
            if details & bit != 0 {
                *slot = Some(
                    extract_ascii(&response, &mut index, AsciiLength::One, name, "get_device_info")
                        .map_err(|message| self.invalid(&message))?,
                );
            }
        }
        Ok(info)
    }

    /// List the open ports on the device.
    pub fn get_open_ports(&mut self) -> Result<Vec<u8>, CrowError> {
        let command = self.admin_payload(CODE_GET_OPEN_PORTS, &[]);
        let response = self.exchange(&command)?;
        self.check_header(CODE_GET_OPEN_PORTS, &response)?;
        if response.len() < 4 {
            return Err(self.invalid("the get_open_ports response has less than four bytes"));
        }
        match response[3] {
            0 => Ok(response[4..].to_vec()),
            1 => {
                // Bitfield format: bit N of byte M marks port 8*M+N open.
                let mut ports = Vec::new();
                for (byte_index, &byte) in response[4..].iter().enumerate() {
                    for bit in 0..8 {
                        if byte & (1 << bit) != 0 {
                            let port = byte_index * 8 + bit;
                            if port > 255 {
                                return Err(self.invalid(
                                    "the get_open_ports bitfield covers more than 256 ports",
                                ));
                            }
                            ports.push(port as u8);
                        }
                    }
                }
                Ok(ports)
            }
            _ => Err(self.invalid("invalid format for the get_open_ports response")),
        }
    }

    pub fn get_port_info(&mut self, port: u8) -> Result<PortInfo, CrowError> {
        let command = self.admin_payload(CODE_GET_PORT_INFO, &[port]);
        let response = self.exchange(&command)?;
        self.check_header(CODE_GET_PORT_INFO, &response)?;
        if response.len() < 4 {
            return Err(self.invalid("the get_port_info response has less than four bytes"));
        }
        let details = response[3];
        let mut info = PortInfo {
            is_open: details & 0x01 != 0,
            service_identifier: None,
            service_description: None,
        };
        let mut index = 4;
        if details & 0x02 != 0 {
            info.service_identifier = Some(
                extract_ascii(
                    &response,
                    &mut index,
                    AsciiLength::One,
                    "service_identifier",
                    "get_port_info",
                )
                .map_err(|message| self.invalid(&message))?,
            );
        }
        if details & 0x04 != 0 {
            info.service_description = Some(
                extract_ascii(
                    &response,
                    &mut index,
                    AsciiLength::One,
                    "service_description",
                    "get_port_info",
                )
                .map_err(|message| self.invalid(&message))?,
            );
        }
        Ok(info)
    }

    fn admin_payload(&self, code: u8, data: &[u8]) -> Vec<u8> {
        let mut payload = Vec::with_capacity(3 + data.len());
        payload.extend_from_slice(&IDENTIFIER);
        payload.push(code);
        payload.extend_from_slice(data);
        payload
    }

    /// Send an admin command and return the response payload.
    fn exchange(&mut self, payload: &[u8]) -> Result<Vec<u8>, CrowError> {
        let command = Command {
            address: self.address,
            port: self.port,
            payload,
            response_expected: true,
            is_user: false,
            propcr_order: self.propcr_order,
        };
        let transaction = self.host.send_command(&command)?;
        Ok(transaction.response.unwrap_or_default())
    }

    /// Validate the three identifying bytes every non-ping response opens with.
    fn check_header(&self, code: u8, response: &[u8]) -> Result<(), CrowError> {
        if response.is_empty() {
            return Err(self.invalid("the response is empty; at least three bytes are required"));
        }
        if response.len() < 3 {
            return Err(self.invalid("the response has less than three bytes"));
        }
        if response[0..2] != IDENTIFIER {
            return Err(self.invalid("the response does not have the correct identifying bytes"));
        }
        if response[2] != code {
            return Err(self.invalid("the response does not include the correct command code"));
        }
        Ok(())
    }

    fn invalid(&self, message: &str) -> CrowError {
        CrowError::InvalidResponse {
            address: self.address,
            port: self.port,
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::error::LinkError;
    use crate::link::StopBits;
    use crate::protocol::checksum::fletcher16;
    use crate::types::SerialSettings;

    struct ScriptedLink {
        incoming: Rc<RefCell<Vec<u8>>>,
        written: Rc<RefCell<Vec<Vec<u8>>>>,
    }

    impl SerialLink for ScriptedLink {
        fn set_baud_rate(&mut self, _baudrate: u32) -> Result<(), LinkError> {
            Ok(())
        }

        fn set_read_timeout(&mut self, _timeout: Duration) -> Result<(), LinkError> {
            Ok(())
        }

        fn clear_input(&mut self) -> Result<(), LinkError> {
            Ok(())
        }

        fn read_some(&mut self, max: usize) -> Result<Vec<u8>, LinkError> {
            let mut incoming = self.incoming.borrow_mut();
            let count = max.min(incoming.len());
            Ok(incoming.drain(..count).collect())
        }

        fn write_all(&mut self, data: &[u8]) -> Result<(), LinkError> {
            self.written.borrow_mut().push(data.to_vec());
            Ok(())
        }

        fn stop_bits(&self) -> Result<StopBits, LinkError> {
            Ok(StopBits::One)
        }
    }

    type Taps = (Rc<RefCell<Vec<u8>>>, Rc<RefCell<Vec<Vec<u8>>>>);

    /// Host whose next transaction (token 2) will see `payload` come back,
    /// plus handles onto the link's unread input and written packets.
    fn tapped_host(payload: &[u8]) -> (Host<ScriptedLink>, Taps) {
        let incoming = Rc::new(RefCell::new(make_response(2, payload)));
        let written = Rc::new(RefCell::new(Vec::new()));
        let link = ScriptedLink {
            incoming: Rc::clone(&incoming),
            written: Rc::clone(&written),
        };
        let mut host = Host::new(link);
        host.set_all_settings(SerialSettings {
            baudrate: 115_200,
            timeout: Duration::from_millis(5),
        });
        (host, (incoming, written))
    }

    fn make_response(token: u8, payload: &[u8]) -> Vec<u8> {
        let mut packet = Vec::new();
        packet.push(0x80 | (payload.len() >> 8) as u8);
        packet.push(payload.len() as u8);
        packet.push(token);
        let (upper, lower) = fletcher16(&packet);
        packet.push(upper);
        packet.push(lower);
        for chunk in payload.chunks(128) {
            packet.extend_from_slice(chunk);
            let (upper, lower) = fletcher16(chunk);
            packet.push(upper);
            packet.push(lower);
        }
        packet
    }

    fn host_with_response(payload: &[u8]) -> Host<ScriptedLink> {
        tapped_host(payload).0
    }

    #[test]
    fn test_ping() {
        let mut host = host_with_response(&[]);
        let mut admin = CrowAdmin::new(&mut host, 5);
        admin.ping().unwrap();
    }

    #[test]
    fn test_ping_rejects_nonempty_response() {
        let mut host = host_with_response(b"x");
        let mut admin = CrowAdmin::new(&mut host, 5);
        assert!(matches!(
            admin.ping(),
            Err(CrowError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_admin_commands_use_admin_type() {
        let (mut host, (_, written)) = tapped_host(&[0x43, 0x41, 0x00, b'h', b'i']);
        let mut admin = CrowAdmin::new(&mut host, 5);
        admin.echo(b"hi").unwrap();
        // T bit clear in CH0 for admin commands.
        assert_eq!(written.borrow()[0][0] & 0x10, 0x00);
    }

    #[test]
    fn test_echo_mismatch() {
        let mut host = host_with_response(&[0x43, 0x41, 0x00, b'h', b'o']);
        let mut admin = CrowAdmin::new(&mut host, 5);
        match admin.echo(b"hi") {
            Err(CrowError::InvalidResponse { message, .. }) => {
                assert!(message.contains("incorrect bytes"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_host_presence_is_muted() {
        let (mut host, (incoming, written)) = tapped_host(&[]);
        let mut admin = CrowAdmin::new(&mut host, 5);
        admin.host_presence(b"here").unwrap();
        // The muted command leaves the scripted response unread.
        assert!(!incoming.borrow().is_empty());
        assert_eq!(written.borrow()[0][3] & 0x40, 0x40);
    }

    #[test]
    fn test_get_device_info() {
        let mut host = host_with_response(&[
            0x43, 0x41, 0x01, // header
            0x02, 0x01, // crow_version, admin_version
            0x07, 0xff, // max_command_size
            0x08, 0x00, // max_response_size
        ]);
        let mut admin = CrowAdmin::new(&mut host, 5);
        let info = admin.get_device_info().unwrap();
        assert_eq!(info.crow_version, 2);
        assert_eq!(info.admin_version, 1);
        assert_eq!(info.max_command_size, 0x07ff);
        assert_eq!(info.max_response_size, 0x0800);
        assert_eq!(info.impl_identifier, None);
    }

    #[test]
    fn test_get_device_info_with_identifier() {
        // Details bit 0 selects impl_identifier: offset 13, length 6.
        let mut payload = vec![
            0x43, 0x41, 0x01, 0x02, 0x01, 0x07, 0xff, 0x08, 0x00, 0x01, 0x00, 0x0d, 0x06,
        ];
        payload.extend_from_slice(b"PropCR");
        let mut host = host_with_response(&payload);
        let mut admin = CrowAdmin::new(&mut host, 5);
        let info = admin.get_device_info().unwrap();
        assert_eq!(info.impl_identifier.as_deref(), Some("PropCR"));
    }

    #[test]
    fn test_get_device_info_too_short() {
        let mut host = host_with_response(&[0x43, 0x41, 0x01, 0x02]);
        let mut admin = CrowAdmin::new(&mut host, 5);
        assert!(matches!(
            admin.get_device_info(),
            Err(CrowError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_get_open_ports_list_format() {
        let mut host = host_with_response(&[0x43, 0x41, 0x02, 0x00, 5, 6, 0xaf]);
        let mut admin = CrowAdmin::new(&mut host, 5);
        assert_eq!(admin.get_open_ports().unwrap(), [5, 6, 0xaf]);
    }

    #[test]
    fn test_get_open_ports_bitfield_format() {
        let mut host = host_with_response(&[0x43, 0x41, 0x02, 0x01, 0b0000_0110, 0b1000_0000]);
        let mut admin = CrowAdmin::new(&mut host, 5);
        assert_eq!(admin.get_open_ports().unwrap(), [1, 2, 15]);
    }

    #[test]
    fn test_get_port_info() {
        let mut payload = vec![0x43, 0x41, 0x03, 0x03, 0x00, 0x07, 0x04];
        payload.extend_from_slice(b"echo");
        let mut host = host_with_response(&payload);
        let mut admin = CrowAdmin::new(&mut host, 5);
        let info = admin.get_port_info(100).unwrap();
        assert!(info.is_open);
        assert_eq!(info.service_identifier.as_deref(), Some("echo"));
        assert_eq!(info.service_description, None);
    }

    #[test]
    fn test_wrong_identifying_bytes() {
        let mut host = host_with_response(&[0x53, 0x41, 0x01, 0, 0, 0, 0, 0, 0]);
        let mut admin = CrowAdmin::new(&mut host, 5);
        match admin.get_device_info() {
            Err(CrowError::InvalidResponse { message, .. }) => {
                assert!(message.contains("identifying bytes"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_wrong_command_code() {
        let mut host = host_with_response(&[0x43, 0x41, 0x02, 0, 0, 0, 0, 0, 0]);
        let mut admin = CrowAdmin::new(&mut host, 5);
        match admin.get_device_info() {
            Err(CrowError::InvalidResponse { message, .. }) => {
                assert!(message.contains("command code"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
