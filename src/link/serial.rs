//! Shared, reference-counted serial port handles.
//!
//! A process-wide registry keyed by port name ensures each OS handle is
//! opened exactly once; every [`SharedPort`] for the same name refers to the
//! same underlying handle, which closes when the last one drops.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};

use crate::error::LinkError;

use super::{SerialLink, StopBits};

const OPEN_TIMEOUT: Duration = Duration::from_millis(250);

fn registry() -> &'static Mutex<HashMap<String, Weak<PortInner>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, Weak<PortInner>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

struct PortInner {
    name: String,
    port: Mutex<Box<dyn SerialPort>>,
}

impl Drop for PortInner {
    fn drop(&mut self) {
        // Drop the registry entry, unless the name was already reopened.
        let mut map = match registry().lock() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(weak) = map.get(&self.name) {
            if weak.upgrade().is_none() {
                map.remove(&self.name);
            }
        }
    }
}

/// A handle to a serial port shared across hosts.
#[derive(Clone)]
pub struct SharedPort {
    inner: Arc<PortInner>,
}

impl SharedPort {
    /// Open `name`, or attach to the handle already open under that name.
    pub fn open(name: &str) -> Result<Self, LinkError> {
        let mut map = match registry().lock() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(existing) = map.get(name).and_then(Weak::upgrade) {
            return Ok(Self { inner: existing });
        }

        let port = serialport::new(name, 115_200)
            .timeout(OPEN_TIMEOUT)
            .open()
            .map_err(|e| LinkError::Port(e.to_string()))?;
        let inner = Arc::new(PortInner {
            name: name.to_string(),
            port: Mutex::new(port),
        });
        map.insert(name.to_string(), Arc::downgrade(&inner));
        Ok(Self { inner })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    fn with_port<T>(
        &self,
        f: impl FnOnce(&mut Box<dyn SerialPort>) -> Result<T, LinkError>,
    ) -> Result<T, LinkError> {
        let mut port = match self.inner.port.lock() {
            Ok(port) => port,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut port)
    }
}

impl SerialLink for SharedPort {
    fn set_baud_rate(&mut self, baudrate: u32) -> Result<(), LinkError> {
        self.with_port(|port| {
            port.set_baud_rate(baudrate)
                .map_err(|e| LinkError::Port(e.to_string()))
        })
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), LinkError> {
        self.with_port(|port| {
            port.set_timeout(timeout)
                .map_err(|e| LinkError::Port(e.to_string()))
        })
    }

    fn clear_input(&mut self) -> Result<(), LinkError> {
        self.with_port(|port| {
            port.clear(ClearBuffer::Input)
                .map_err(|e| LinkError::Port(e.to_string()))
        })
    }

    fn read_some(&mut self, max: usize) -> Result<Vec<u8>, LinkError> {
        self.with_port(|port| {
            let mut buffer = vec![0u8; max];
            match port.read(&mut buffer) {
                Ok(count) => {
                    buffer.truncate(count);
                    Ok(buffer)
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(Vec::new()),
                Err(e) => Err(LinkError::Io(e)),
            }
        })
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), LinkError> {
        self.with_port(|port| {
            port.write_all(data)?;
            port.flush()?;
            Ok(())
        })
    }

    fn stop_bits(&self) -> Result<StopBits, LinkError> {
        self.with_port(|port| {
            let bits = port
                .stop_bits()
                .map_err(|e| LinkError::Port(e.to_string()))?;
            Ok(match bits {
                serialport::StopBits::One => StopBits::One,
                serialport::StopBits::Two => StopBits::Two,
            })
        })
    }
}
