#[cfg(feature = "serial")]
pub mod serial;

#[cfg(feature = "serial")]
pub use serial::SharedPort;

use std::time::Duration;

use crate::error::LinkError;

/// Stop-bit configuration of the line, used for byte-time accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    OneAndHalf,
    Two,
}

/// The narrow serial interface the transaction engine drives.
///
/// Implementations block only in `read_some` and `write_all`; everything
/// else returns promptly. The engine serializes access itself, so a link is
/// never used from two transactions at once.
pub trait SerialLink {
    fn set_baud_rate(&mut self, baudrate: u32) -> Result<(), LinkError>;

    /// Bound the next `read_some` call.
    fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), LinkError>;

    /// Discard anything already buffered on the receive side.
    fn clear_input(&mut self) -> Result<(), LinkError>;

    /// Read up to `max` bytes. Returns an empty vector on timeout.
    fn read_some(&mut self, max: usize) -> Result<Vec<u8>, LinkError>;

    /// Write the whole buffer, blocking as needed.
    fn write_all(&mut self, data: &[u8]) -> Result<(), LinkError>;

    fn stop_bits(&self) -> Result<StopBits, LinkError>;
}
