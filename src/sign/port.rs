use std::{io, thread, time::Duration};

use serialport::{DataBits, FlowControl, Parity, StopBits};

use crate::{sign::FrameSink, Error, Result};

/// Pause after each frame so the sign can latch it before the next write.
const SETTLE_MS: u64 = 200;

/// Serial parameters for the sign link. The protocol itself fixes the line
/// discipline at 7 data bits, even parity, one stop bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortOptions {
    pub baud: u32,
    pub timeout_ms: u64,
}

impl Default for PortOptions {
    fn default() -> Self {
        Self {
            baud: 9_600,
            timeout_ms: 1_000,
        }
    }
}

/// The physical sign connection. Holds the device path so a dropped port
/// can be reopened on the next write; callers only ever see success or
/// failure per frame.
pub struct SignPort {
    device: String,
    options: PortOptions,
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl std::fmt::Debug for SignPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignPort")
            .field("device", &self.device)
            .field("options", &self.options)
            .field("port", &self.port.is_some())
            .finish()
    }
}

impl SignPort {
    pub fn connect(device: &str, options: PortOptions) -> Result<Self> {
        if device.is_empty() {
            return Err(Error::Config("device path cannot be empty".to_string()));
        }
        let mut sign = Self {
            device: device.to_string(),
            options,
            port: None,
        };
        sign.ensure_open()?;
        Ok(sign)
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    fn ensure_open(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>> {
        if self.port.is_none() {
            let port = serialport::new(&self.device, self.options.baud)
                .data_bits(DataBits::Seven)
                .parity(Parity::Even)
                .stop_bits(StopBits::One)
                .flow_control(FlowControl::None)
                .timeout(Duration::from_millis(self.options.timeout_ms))
                .open()
                .map_err(map_serial_error)?;
            self.port = Some(port);
        }
        Ok(self.port.as_mut().expect("port opened above"))
    }
}

impl FrameSink for SignPort {
    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        let port = self.ensure_open()?;
        let outcome = port.write_all(frame).and_then(|_| port.flush());
        match outcome {
            Ok(()) => {
                thread::sleep(Duration::from_millis(SETTLE_MS));
                Ok(())
            }
            Err(err) => {
                // Drop the handle so the next write reopens the device.
                self.port = None;
                Err(Error::Io(err))
            }
        }
    }
}

fn map_serial_error(err: serialport::Error) -> Error {
    use serialport::ErrorKind;

    let kind = match err.kind() {
        ErrorKind::NoDevice => io::ErrorKind::NotFound,
        ErrorKind::InvalidInput => io::ErrorKind::InvalidInput,
        ErrorKind::Io(inner) => inner,
        ErrorKind::Unknown => io::ErrorKind::Other,
    };

    Error::Io(io::Error::new(kind, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_device() {
        let err = SignPort::connect("", PortOptions::default()).unwrap_err();
        assert!(format!("{err}").contains("device path cannot be empty"));
    }

    #[test]
    fn connects_or_returns_io_error() {
        let res = SignPort::connect("/dev/ttyUSB0", PortOptions::default());
        match res {
            Ok(port) => assert_eq!(port.device(), "/dev/ttyUSB0"),
            Err(Error::Io(_)) => { /* acceptable in test env without device */ }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
}
