//! Programmer capability interface
//!
//! Every hardware backend exposes the same operation set through the
//! [`Programmer`] trait so the rest of the toolchain never cares which
//! backend is active. Operations a backend cannot perform keep their
//! default bodies: they touch no transport, log the fact, and report a
//! neutral success/zero result. Callers branch on returned values only,
//! never on whether an operation is "bound".

use crate::error::Result;
use crate::part::{Memory, Part};

/// Uniform operation set over heterogeneous programmer hardware
pub trait Programmer {
    /// Backend name, used for logging and diagnostics
    fn name(&self) -> &'static str;

    /// Bring the link to a known state after the transport is open
    fn initialize(&mut self, part: &Part) -> Result<()>;

    /// Enable the programmer hardware (voltage switches, buffers, ...)
    ///
    /// Backends without such hardware accept silently.
    fn enable(&mut self) -> Result<()> {
        log::debug!("{}: enable not implemented", self.name());
        Ok(())
    }

    /// Put the target into programming mode
    fn program_enable(&mut self, part: &Part) -> Result<()> {
        let _ = part;
        log::debug!("{}: program_enable not implemented", self.name());
        Ok(())
    }

    /// Erase the whole device
    fn chip_erase(&mut self, part: &Part) -> Result<()> {
        let _ = part;
        log::debug!("{}: chip_erase not implemented", self.name());
        Ok(())
    }

    /// Read the 3-byte device signature
    fn read_signature(&mut self, part: &Part) -> Result<[u8; 3]>;

    /// Write one full page of a memory space
    ///
    /// `addr` is the page base address, `num_bytes` always equals one full
    /// `page_size`. Backends may rewrite parts of the image (for example to
    /// relocate the reset vector), which is why the memory is taken by
    /// mutable reference. Returns the number of bytes written.
    fn paged_write(
        &mut self,
        mem: &mut Memory,
        page_size: usize,
        addr: u32,
        num_bytes: usize,
    ) -> Result<usize>;

    /// Exchange a raw 4-byte command with the target
    ///
    /// Backends whose protocol has no raw command channel answer with a
    /// zeroed response.
    fn raw_command(&mut self, cmd: [u8; 4]) -> Result<[u8; 4]> {
        let _ = cmd;
        log::debug!("{}: raw_command not implemented", self.name());
        Ok([0; 4])
    }

    /// Release the transport
    ///
    /// Backends own their transport, so dropping the handle releases it on
    /// every exit path; `close` exists for callers that want the teardown
    /// to be explicit.
    fn close(&mut self) {
        log::debug!("{}: close", self.name());
    }
}

impl Programmer for Box<dyn Programmer + Send> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn initialize(&mut self, part: &Part) -> Result<()> {
        (**self).initialize(part)
    }

    fn enable(&mut self) -> Result<()> {
        (**self).enable()
    }

    fn program_enable(&mut self, part: &Part) -> Result<()> {
        (**self).program_enable(part)
    }

    fn chip_erase(&mut self, part: &Part) -> Result<()> {
        (**self).chip_erase(part)
    }

    fn read_signature(&mut self, part: &Part) -> Result<[u8; 3]> {
        (**self).read_signature(part)
    }

    fn paged_write(
        &mut self,
        mem: &mut Memory,
        page_size: usize,
        addr: u32,
        num_bytes: usize,
    ) -> Result<usize> {
        (**self).paged_write(mem, page_size, addr, num_bytes)
    }

    fn raw_command(&mut self, cmd: [u8; 4]) -> Result<[u8; 4]> {
        (**self).raw_command(cmd)
    }

    fn close(&mut self) {
        (**self).close()
    }
}
