//! Acknowledgement pipeline
//!
//! The bootloader acknowledges every frame with a single byte, which over a
//! serial line costs one round trip each. Data-stage traffic dominates a
//! page fill, so those frames are batched into a bounded window, written in
//! one burst, and their acknowledgements drained afterwards in send order.
//! Side-effecting commands (erase, commit) bypass the window: their
//! completion is a precondition for the next step and their count per page
//! is small.

use crate::error::{PicobootError, Result};
use crate::protocol::{Frame, ACK, MAX_FRAMES};
use crate::transport::Transport;

/// Bounded window of frames awaiting acknowledgement
///
/// Owned by one device handle, so no state can leak between programming
/// sessions. The window never holds more than [`MAX_FRAMES`] frames: it is
/// flushed the moment it fills.
#[derive(Debug)]
pub struct AckPipeline {
    buf: [u8; MAX_FRAMES * Frame::LEN],
    pending: usize,
}

impl AckPipeline {
    /// Create an empty window
    pub fn new() -> Self {
        Self {
            buf: [0; MAX_FRAMES * Frame::LEN],
            pending: 0,
        }
    }

    /// Frames buffered but not yet flushed
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Queue a frame, flushing the window when it fills
    ///
    /// A failed flush aborts with the acknowledgement state undefined; the
    /// caller must treat the whole page operation as failed.
    pub fn buffered_send<T: Transport>(&mut self, transport: &mut T, frame: Frame) -> Result<()> {
        let off = self.pending * Frame::LEN;
        self.buf[off..off + Frame::LEN].copy_from_slice(&frame.to_bytes());
        self.pending += 1;

        if self.pending == MAX_FRAMES {
            self.flush(transport)?;
        }
        Ok(())
    }

    /// Force out a partially filled window at an operation boundary
    ///
    /// Writes the buffered frames as one contiguous burst, then drains one
    /// acknowledgement per frame in send order. No-op when empty.
    pub fn flush<T: Transport>(&mut self, transport: &mut T) -> Result<()> {
        if self.pending == 0 {
            return Ok(());
        }

        transport.send(&self.buf[..self.pending * Frame::LEN])?;
        let expected = self.pending;
        self.pending = 0;

        for _ in 0..expected {
            wait_ack(transport)?;
        }
        Ok(())
    }
}

impl Default for AckPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Send one frame and require its acknowledgement before returning
///
/// Used for erase/commit/sync frames, which must never be pipelined.
pub fn send_and_wait<T: Transport>(transport: &mut T, frame: Frame) -> Result<()> {
    transport.send(&frame.to_bytes())?;
    wait_ack(transport)
}

/// Read one acknowledgement byte
///
/// Anything other than `0x00` means the device has desynchronized from the
/// host and the session must not continue.
pub fn wait_ack<T: Transport>(transport: &mut T) -> Result<()> {
    let mut resp = [0u8; 1];
    transport.recv(&mut resp)?;
    if resp[0] != ACK {
        log::error!("picoboot: expected ACK 0x00, got 0x{:02X}", resp[0]);
        return Err(PicobootError::UnexpectedAck(resp[0]));
    }
    Ok(())
}
