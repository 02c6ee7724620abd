//! Transport layer abstraction for picoboot communication
//!
//! The protocol engine only needs a duplex byte channel with blocking
//! semantics; the bundled implementation drives a serial port, and tests
//! substitute recording mocks.

use crate::error::Result;

/// Duplex byte channel with blocking send and receive-with-timeout
pub trait Transport {
    /// Write the whole buffer; short writes only surface as hard failures
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Read exactly `buf.len()` bytes, or fail with
    /// [`PicobootError::Timeout`](crate::PicobootError::Timeout) when the
    /// device stays silent past the configured window
    fn recv(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Discard any stale input buffered on the channel
    fn drain(&mut self) -> Result<()>;
}

pub mod serial {
    //! Serial port transport implementation

    use super::*;
    use crate::error::PicobootError;
    use crate::protocol::DEFAULT_BAUD;
    use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
    use std::io::{Read, Write};
    use std::time::Duration;

    /// Serial port transport
    pub struct SerialTransport {
        port: Box<dyn SerialPort>,
    }

    impl SerialTransport {
        /// Open a serial port at the given baud rate
        ///
        /// Falls back to the bootloader's default of 460800 baud when none
        /// is given.
        pub fn open(device: &str, baud: Option<u32>) -> Result<Self> {
            let baud_rate = baud.unwrap_or(DEFAULT_BAUD);

            let port = serialport::new(device, baud_rate)
                .data_bits(DataBits::Eight)
                .parity(Parity::None)
                .stop_bits(StopBits::One)
                .flow_control(FlowControl::None)
                .timeout(Duration::from_secs(1))
                .open()?;

            log::info!("Opened serial port {} at {} baud", device, baud_rate);

            Ok(Self { port })
        }

        /// Set the acknowledgement timeout
        pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
            self.port.set_timeout(timeout)?;
            Ok(())
        }
    }

    impl Transport for SerialTransport {
        fn send(&mut self, data: &[u8]) -> Result<()> {
            self.port.write_all(data)?;
            Ok(())
        }

        fn recv(&mut self, buf: &mut [u8]) -> Result<()> {
            match self.port.read_exact(buf) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    Err(PicobootError::Timeout)
                }
                Err(e) => Err(e.into()),
            }
        }

        fn drain(&mut self) -> Result<()> {
            self.port.clear(ClearBuffer::Input)?;
            Ok(())
        }
    }
}
