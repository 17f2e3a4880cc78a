use std::cmp;
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::error::CrowError;
use crate::link::{SerialLink, StopBits};
use crate::protocol::remote::error_from_response;
use crate::protocol::{Command, ParseResult, Parser};
use crate::types::{SerialSettings, Transaction};

/// Upper bound on the wire size of a response, used to cap how far receive
/// time may stretch the transaction deadline.
const MAX_RESPONSE_WIRE_BYTES: u32 = 2084;

/// The transaction engine: one blocking command/response exchange at a time
/// over a serial link.
///
/// Commands on the same line are strictly serialized; a `send_command` call
/// completes (payload, error, or muted finish) before the next may begin.
/// Tokens advance monotonically modulo 256 so a late response to an earlier
/// command is never mistaken for the current one.
pub struct Host<L: SerialLink> {
    link: L,
    settings: [SerialSettings; 32],
    next_token: u8,
    parser: Parser,
}

impl<L: SerialLink> Host<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            settings: [SerialSettings::default(); 32],
            next_token: 2,
            parser: Parser::new(),
        }
    }

    /// Line settings used for transactions with `address`.
    pub fn settings(&self, address: u8) -> Option<SerialSettings> {
        self.settings.get(usize::from(address)).copied()
    }

    pub fn set_settings(
        &mut self,
        address: u8,
        settings: SerialSettings,
    ) -> Result<(), CrowError> {
        match self.settings.get_mut(usize::from(address)) {
            Some(slot) => {
                *slot = settings;
                Ok(())
            }
            None => Err(CrowError::InvalidArgument(
                "address must be 0 to 31".into(),
            )),
        }
    }

    /// Apply the same settings to every address.
    pub fn set_all_settings(&mut self, settings: SerialSettings) {
        self.settings = [settings; 32];
    }

    /// Replace the whole per-address settings table.
    pub fn set_settings_table(&mut self, table: [SerialSettings; 32]) {
        self.settings = table;
    }

    /// Send one command and, unless muted, wait for its response.
    ///
    /// Returns the completed [`Transaction`]; its `response` is `None` when
    /// `response_expected` was false. Device-reported errors, timeouts, and
    /// host-side decode failures are raised as [`CrowError`].
    pub fn send_command(&mut self, command: &Command<'_>) -> Result<Transaction, CrowError> {
        let token = self.next_token;
        self.next_token = self.next_token.wrapping_add(1);

        let packet = command.encode(token)?;
        let address = command.address;
        let port = command.port;
        let settings = self.settings[usize::from(address)];

        self.link.set_baud_rate(settings.baudrate)?;
        self.link.clear_input()?;
        trace!("{}:{} --> {:02x?}", address, port, packet);
        self.link.write_all(&packet)?;

        let mut transaction = Transaction {
            address,
            port,
            token,
            command: packet,
            response: None,
        };
        if !command.response_expected {
            return Ok(transaction);
        }

        self.parser.reset();

        // The deadline starts at the configured timeout and stretches by the
        // transmission time of bytes actually received, up to a hard cap.
        let seconds_per_byte =
            bits_per_byte(self.link.stop_bits()?) / f64::from(settings.baudrate);
        let start = Instant::now();
        let mut time_limit = start + settings.timeout;
        let max_time_limit = time_limit
            + Duration::from_secs_f64(seconds_per_byte * f64::from(MAX_RESPONSE_WIRE_BYTES));

        let mut byte_count = 0usize;
        let mut results = Vec::new();
        let mut now = start;

        while self.parser.min_bytes_expected() > 0 && now < time_limit {
            self.link.set_read_timeout(time_limit - now)?;
            let data = self.link.read_some(self.parser.min_bytes_expected())?;
            if !data.is_empty() {
                trace!("{}:{} <-- {:02x?}", address, port, data);
            }
            byte_count += data.len();
            results.extend(self.parser.parse(&data, Some(token)));

            let received = Duration::from_secs_f64(seconds_per_byte * data.len() as f64);
            time_limit = cmp::min(time_limit + received, max_time_limit);
            now = Instant::now();
        }

        if self.parser.min_bytes_expected() == 0 {
            // The parser saw the expected transaction through; find the item
            // that fulfilled it.
            for item in results {
                match item {
                    ParseResult::Response {
                        is_error,
                        token: item_token,
                        payload,
                    } if item_token == token => {
                        if is_error {
                            debug!("{}:{} error response, {} bytes", address, port, payload.len());
                            return Err(error_from_response(&payload, address, port));
                        }
                        transaction.response = Some(payload);
                        return Ok(transaction);
                    }
                    ParseResult::Error {
                        token: item_token,
                        message,
                    } if item_token == token => {
                        return Err(CrowError::NoResponse {
                            address,
                            port,
                            byte_count,
                            message,
                        });
                    }
                    _ => {}
                }
            }
            Err(CrowError::Host {
                address,
                port,
                message: "parser finished without a matching result".into(),
                details: None,
            })
        } else {
            let stale = results.iter().any(|item| {
                matches!(item, ParseResult::Response { token: item_token, .. }
                    if *item_token != token)
            });
            let message = if byte_count > 0 && stale {
                "an invalid response was received (incorrect token); it may be \
                 a stale response, or the responding device may have malfunctioned"
            } else {
                "the transaction timed out"
            };
            Err(CrowError::NoResponse {
                address,
                port,
                byte_count,
                message: message.into(),
            })
        }
    }
}

/// Bits on the line per byte sent: start bit, eight data bits, stop bits.
fn bits_per_byte(stop_bits: StopBits) -> f64 {
    match stop_bits {
        StopBits::One => 10.0,
        StopBits::OneAndHalf => 10.5,
        StopBits::Two => 11.0,
    }
}
