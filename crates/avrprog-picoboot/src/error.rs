//! Error types for picoboot operations

use avrprog_core::part::MemoryKind;
use thiserror::Error;

/// Picoboot-specific errors
///
/// These carry the diagnostic payloads; at the capability trait boundary
/// they are narrowed into [`avrprog_core::Error`], preserving the
/// recoverable/fatal classification.
#[derive(Debug, Error)]
pub enum PicobootError {
    /// Serial port error
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error during communication
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No response within the transport timeout
    #[error("timed out waiting for device response")]
    Timeout,

    /// The device answered something other than ACK
    #[error("protocol error: expected ACK 0x00, got 0x{0:02X}")]
    UnexpectedAck(u8),

    /// Command byte outside the protocol's fixed set
    #[error("unknown command byte 0x{0:02X}")]
    UnknownCommand(u8),

    /// Frame checksum does not match its fields
    #[error("corrupt frame: checksum 0x{got:02X}, computed 0x{want:02X}")]
    ChecksumMismatch {
        /// Checksum byte carried by the frame
        got: u8,
        /// Checksum recomputed from the frame's fields
        want: u8,
    },

    /// A write targeted the reserved bootloader region
    #[error("attempt to write bootloader memory at 0x{addr:04X}")]
    BootloaderOverwrite {
        /// Start address of the offending write
        addr: u32,
    },

    /// The image's first word is not an `rjmp` reset vector
    #[error("no rjmp reset vector at start of image (found 0x{found:04X})")]
    MissingResetVector {
        /// The word found at address 0
        found: u16,
    },

    /// The image cannot hold the bootloader reservation plus one page
    #[error("image of {size} bytes is too small for the bootloader reservation")]
    ImageTooSmall {
        /// Size of the offending image
        size: usize,
    },

    /// Memory class the bootloader cannot write
    #[error("no support for writing {0} memory")]
    UnsupportedMemory(MemoryKind),
}

/// Result type for picoboot operations
pub type Result<T> = core::result::Result<T, PicobootError>;

impl From<PicobootError> for avrprog_core::Error {
    fn from(e: PicobootError) -> Self {
        use avrprog_core::Error as CoreError;
        match e {
            PicobootError::Serial(_) | PicobootError::Io(_) => CoreError::Io,
            PicobootError::Timeout => CoreError::Timeout,
            PicobootError::UnexpectedAck(response) => CoreError::Protocol { response },
            PicobootError::UnknownCommand(response) => CoreError::Protocol { response },
            PicobootError::ChecksumMismatch { got, .. } => CoreError::Protocol { response: got },
            PicobootError::BootloaderOverwrite { addr } => CoreError::BootloaderBoundary { addr },
            PicobootError::MissingResetVector { found } => CoreError::MissingResetVector { found },
            PicobootError::ImageTooSmall { .. } => CoreError::InvalidImage,
            PicobootError::UnsupportedMemory(_) => CoreError::UnsupportedMemory,
        }
    }
}
