use std::time::Duration;

/// One command/response exchange as seen by the host.
#[derive(Debug, Clone)]
pub struct Transaction {
    /// Device address the command was sent to.
    pub address: u8,
    /// Service port the command was sent to.
    pub port: u16,
    /// Token assigned to the command.
    pub token: u8,
    /// The encoded command packet as written to the line.
    pub command: Vec<u8>,
    /// Response payload, or `None` when no response was expected.
    pub response: Option<Vec<u8>>,
}

/// Per-address line settings, read at the start of each transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialSettings {
    pub baudrate: u32,
    /// Base transaction timeout, before stretching for receive time.
    pub timeout: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baudrate: 115_200,
            timeout: Duration::from_millis(250),
        }
    }
}
