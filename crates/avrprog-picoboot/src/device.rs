//! Picoboot device implementation
//!
//! This module provides the `Picoboot` handle that speaks the frame
//! protocol and implements the `Programmer` capability trait.
//!
//! The bootloader occupies the last [`BOOTLOADER_SIZE`] bytes of flash and
//! the device enforces nothing, so the host is the sole protection point:
//! writes into the reserved region are refused, and the application's reset
//! vector is relocated so the bootloader keeps control of reset while the
//! application still starts. Both sides were produced by a compiler that
//! knows nothing about the split; the relocation is what lets them coexist.

use crate::error::{PicobootError, Result};
use crate::pipeline::{self, AckPipeline};
use crate::protocol::{
    Command, Frame, BOOTLOADER_SIZE, BOOTLOADER_WORDS, BOOT_ENTRY_JMP, FAKE_SIGNATURE,
    RJMP_OPCODE, RJMP_OPCODE_MASK, RJMP_TARGET_MASK,
};
use crate::transport::serial::SerialTransport;
use crate::transport::Transport;

use avrprog_core::part::{Memory, MemoryKind, Part};
use avrprog_core::programmer::Programmer;
use avrprog_core::Result as CoreResult;

/// Handle for one programming session against a picoboot bootloader
///
/// Owns the transport and the acknowledgement window for the session;
/// dropping the handle releases the port on every exit path.
pub struct Picoboot<T: Transport> {
    transport: T,
    pipeline: AckPipeline,
}

impl Picoboot<SerialTransport> {
    /// Open a serial port and return a device handle
    ///
    /// Stale input is drained so a response from a previous session cannot
    /// be mistaken for an acknowledgement.
    pub fn open(device: &str, baud: Option<u32>) -> Result<Self> {
        let mut transport = SerialTransport::open(device, baud)?;
        transport.drain()?;
        Ok(Self::new(transport))
    }
}

impl<T: Transport> Picoboot<T> {
    /// Wrap an already-open transport
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            pipeline: AckPipeline::new(),
        }
    }

    /// Give the transport back, consuming the handle
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Send an all-zero frame and require its ACK, proving both ends agree
    /// on framing
    fn sync(&mut self) -> Result<()> {
        pipeline::send_and_wait(&mut self.transport, Frame::new(0, 0, Command::Data))
    }

    /// Stream one page into the device's temporary buffer
    ///
    /// Each 16-bit word costs two frames: a data stage carrying the word,
    /// then a fill command carrying its absolute address. Both ride the
    /// acknowledgement window; the window is drained before returning so
    /// the following erase/commit exchange starts clean.
    fn fill_page_buf(&mut self, image: &[u8], page_addr: usize, page_size: usize) -> Result<()> {
        log::debug!("picoboot: fill page buffer at 0x{:04X}", page_addr);

        let mut cur = page_addr;
        while cur < page_addr + page_size {
            self.pipeline.buffered_send(
                &mut self.transport,
                Frame::new(image[cur], image[cur + 1], Command::Data),
            )?;
            self.pipeline.buffered_send(
                &mut self.transport,
                Frame::with_addr(cur as u16, Command::FillBuffer),
            )?;
            cur += 2;
        }

        self.pipeline.flush(&mut self.transport)
    }

    fn erase_page(&mut self, page_addr: u16) -> Result<()> {
        pipeline::send_and_wait(
            &mut self.transport,
            Frame::with_addr(page_addr, Command::ErasePage),
        )
    }

    fn write_page(&mut self, page_addr: u16) -> Result<()> {
        pipeline::send_and_wait(
            &mut self.transport,
            Frame::with_addr(page_addr, Command::WritePage),
        )
    }

    /// Redirect reset to the bootloader and park the application's own
    /// entry jump in the virtual vector slot
    ///
    /// The image must begin with an `rjmp`; its 12-bit target is advanced
    /// by the bootloader size in words so the instruction still reaches the
    /// application once it executes from the relocated slot. The page
    /// holding the slot is programmed immediately, before page zero, since
    /// the bootloader needs it to dispatch once flashing completes.
    fn relocate_reset_vector(
        &mut self,
        mem: &mut Memory,
        page_size: usize,
        vector_addr: usize,
    ) -> Result<()> {
        let data = mem.data_mut();

        let reset = u16::from_le_bytes([data[0], data[1]]);
        if reset & RJMP_OPCODE_MASK != RJMP_OPCODE {
            return Err(PicobootError::MissingResetVector { found: reset });
        }

        data[0] = BOOT_ENTRY_JMP[0];
        data[1] = BOOT_ENTRY_JMP[1];

        let vector =
            RJMP_OPCODE | ((reset & RJMP_TARGET_MASK).wrapping_add(BOOTLOADER_WORDS) & RJMP_TARGET_MASK);
        data[vector_addr] = vector as u8;
        data[vector_addr + 1] = (vector >> 8) as u8;
        log::debug!(
            "picoboot: virtual reset vector 0x{:04X} at 0x{:04X}",
            vector,
            vector_addr
        );

        let page = vector_addr - page_size + 2;
        self.fill_page_buf(mem.data(), page, page_size)?;
        self.erase_page(page as u16)?;
        self.write_page(page as u16)
    }

    /// Write one full flash page
    ///
    /// Pages overlapping the reserved region from below report success
    /// without traffic: their bytes are programmed as part of the
    /// relocation write at address 0, sourced from the same image buffer,
    /// so the outcome does not depend on which of the two calls happens
    /// first.
    fn write_flash_page(
        &mut self,
        mem: &mut Memory,
        page_size: usize,
        addr: usize,
        num_bytes: usize,
    ) -> Result<usize> {
        log::debug!("picoboot: paged write at 0x{:04X}", addr);

        if mem.kind() != MemoryKind::Flash {
            log::debug!("picoboot: no support for writing {}", mem.kind());
            return Err(PicobootError::UnsupportedMemory(mem.kind()));
        }

        let vector_addr = match mem.size().checked_sub(BOOTLOADER_SIZE) {
            Some(base) if base >= page_size => base,
            _ => return Err(PicobootError::ImageTooSmall { size: mem.size() }),
        };

        if addr >= vector_addr {
            return Err(PicobootError::BootloaderOverwrite { addr: addr as u32 });
        }

        if addr + page_size > vector_addr {
            // written along with page 0
            return Ok(num_bytes);
        }

        if addr == 0 {
            self.relocate_reset_vector(mem, page_size, vector_addr)?;
        }

        self.fill_page_buf(mem.data(), addr, page_size)?;
        self.erase_page(addr as u16)?;
        self.write_page(addr as u16)?;

        Ok(num_bytes)
    }
}

impl<T: Transport> Programmer for Picoboot<T> {
    fn name(&self) -> &'static str {
        "picoboot"
    }

    fn initialize(&mut self, part: &Part) -> CoreResult<()> {
        log::debug!("picoboot: initialize {}", part.name);
        self.sync()?;
        Ok(())
    }

    fn read_signature(&mut self, _part: &Part) -> CoreResult<[u8; 3]> {
        // the bootloader has no signature-read command; report the fixed
        // stand-in so callers relying on identification keep working
        log::debug!("picoboot: faking device signature");
        Ok(FAKE_SIGNATURE)
    }

    fn paged_write(
        &mut self,
        mem: &mut Memory,
        page_size: usize,
        addr: u32,
        num_bytes: usize,
    ) -> CoreResult<usize> {
        Ok(self.write_flash_page(mem, page_size, addr as usize, num_bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ACK;
    use avrprog_core::Error as CoreError;
    use std::collections::VecDeque;

    #[derive(Debug, PartialEq, Clone)]
    enum Op {
        Send(Vec<u8>),
        Recv(usize),
    }

    struct MockTransport {
        ops: Vec<Op>,
        responses: VecDeque<u8>,
        auto_ack: bool,
    }

    impl MockTransport {
        fn acking() -> Self {
            Self {
                ops: Vec::new(),
                responses: VecDeque::new(),
                auto_ack: true,
            }
        }

        fn sends(&self) -> Vec<Vec<u8>> {
            self.ops
                .iter()
                .filter_map(|op| match op {
                    Op::Send(data) => Some(data.clone()),
                    Op::Recv(_) => None,
                })
                .collect()
        }

        fn recv_count(&self) -> usize {
            self.ops.iter().filter(|op| matches!(op, Op::Recv(_))).count()
        }
    }

    impl Transport for MockTransport {
        fn send(&mut self, data: &[u8]) -> Result<()> {
            self.ops.push(Op::Send(data.to_vec()));
            Ok(())
        }

        fn recv(&mut self, buf: &mut [u8]) -> Result<()> {
            self.ops.push(Op::Recv(buf.len()));
            for slot in buf.iter_mut() {
                *slot = match self.responses.pop_front() {
                    Some(b) => b,
                    None if self.auto_ack => ACK,
                    None => return Err(PicobootError::Timeout),
                };
            }
            Ok(())
        }

        fn drain(&mut self) -> Result<()> {
            Ok(())
        }
    }

    const FLASH_SIZE: usize = 8192;
    const PAGE_SIZE: usize = 64;
    /// `FLASH_SIZE - BOOTLOADER_SIZE`
    const VECTOR_ADDR: usize = 8126;

    fn attiny() -> Part {
        Part::new("attiny85", [0x1E, 0x93, 0x0B])
    }

    fn flash_image() -> Memory {
        let mut mem = Memory::new(MemoryKind::Flash, FLASH_SIZE);
        // rjmp with target offset 0x3F0
        mem.data_mut()[0] = 0xF0;
        mem.data_mut()[1] = 0xC3;
        mem
    }

    /// Search a burst list for a serialized frame
    fn contains_frame(bursts: &[Vec<u8>], frame: Frame) -> bool {
        let needle = frame.to_bytes();
        bursts
            .iter()
            .any(|burst| burst.windows(Frame::LEN).any(|w| w == needle))
    }

    #[test]
    fn initialize_syncs_with_a_zero_frame() {
        let mut dev = Picoboot::new(MockTransport::acking());
        dev.initialize(&attiny()).unwrap();

        let transport = dev.into_transport();
        assert_eq!(
            transport.ops,
            vec![Op::Send(vec![0, 0, 0, 0]), Op::Recv(1)]
        );
    }

    #[test]
    fn signature_is_faked_without_transport_io() {
        let mut dev = Picoboot::new(MockTransport::acking());
        assert_eq!(dev.read_signature(&attiny()), Ok([0x1E, 0x2A, 0x00]));
        assert!(dev.into_transport().ops.is_empty());
    }

    #[test]
    fn non_flash_memory_is_an_ordinary_failure() {
        let mut dev = Picoboot::new(MockTransport::acking());
        let mut mem = Memory::new(MemoryKind::Eeprom, 512);

        let err = dev.paged_write(&mut mem, 4, 0, 4).unwrap_err();
        assert_eq!(err, CoreError::UnsupportedMemory);
        assert!(!err.is_fatal());
        assert!(dev.into_transport().ops.is_empty());
    }

    #[test]
    fn bootloader_region_write_is_fatal_before_any_frame() {
        let mut dev = Picoboot::new(MockTransport::acking());
        let mut mem = flash_image();

        let err = dev
            .paged_write(&mut mem, PAGE_SIZE, VECTOR_ADDR as u32, PAGE_SIZE)
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::BootloaderBoundary {
                addr: VECTOR_ADDR as u32
            }
        );
        assert!(err.is_fatal());
        assert!(dev.into_transport().ops.is_empty());
    }

    #[test]
    fn page_beside_the_boundary_short_circuits() {
        let mut dev = Picoboot::new(MockTransport::acking());
        let mut mem = flash_image();

        // 0x1F80 + 64 overlaps the reserved region from below
        let written = dev
            .paged_write(&mut mem, PAGE_SIZE, 0x1F80, PAGE_SIZE)
            .unwrap();
        assert_eq!(written, PAGE_SIZE);
        assert!(dev.into_transport().ops.is_empty());
    }

    #[test]
    fn missing_reset_vector_is_fatal_before_any_frame() {
        let mut dev = Picoboot::new(MockTransport::acking());
        let mut mem = Memory::new(MemoryKind::Flash, FLASH_SIZE);
        // image head left erased: no rjmp

        let err = dev.paged_write(&mut mem, PAGE_SIZE, 0, PAGE_SIZE).unwrap_err();
        assert_eq!(err, CoreError::MissingResetVector { found: 0xFFFF });
        assert!(err.is_fatal());
        assert!(dev.into_transport().ops.is_empty());
    }

    #[test]
    fn image_without_room_for_the_bootloader_is_rejected() {
        let mut dev = Picoboot::new(MockTransport::acking());
        let mut mem = Memory::from_bytes(MemoryKind::Flash, vec![0xFF; 64]);

        let err = dev.paged_write(&mut mem, PAGE_SIZE, 0, PAGE_SIZE).unwrap_err();
        assert_eq!(err, CoreError::InvalidImage);
        assert!(dev.into_transport().ops.is_empty());
    }

    #[test]
    fn page_zero_relocates_and_writes_the_vector_page_first() {
        let mut dev = Picoboot::new(MockTransport::acking());
        let mut mem = flash_image();
        // an application byte living in the page beside the boundary
        mem.data_mut()[8100] = 0xAB;

        let written = dev.paged_write(&mut mem, PAGE_SIZE, 0, PAGE_SIZE).unwrap();
        assert_eq!(written, PAGE_SIZE);

        // image head now jumps into the bootloader
        assert_eq!(&mem.data()[0..2], &BOOT_ENTRY_JMP);
        // original target 0x3F0 advanced by 33 words: 0xC411, little-endian
        assert_eq!(mem.data()[VECTOR_ADDR], 0x11);
        assert_eq!(mem.data()[VECTOR_ADDR + 1], 0xC4);

        let transport = dev.into_transport();
        let sends = transport.sends();

        // per page: 8 full-window bursts, one erase frame, one commit frame
        assert_eq!(sends.len(), 20);
        // one ack per data/fill frame plus one per erase/commit
        assert_eq!(transport.recv_count(), 2 * (PAGE_SIZE + 2));
        assert!(transport
            .ops
            .iter()
            .all(|op| !matches!(op, Op::Recv(n) if *n != 1)));

        // vector page (0x1F80) is filled, erased and committed before
        // page zero is touched
        for burst in &sends[0..8] {
            assert_eq!(burst.len(), 8 * Frame::LEN);
        }
        assert_eq!(
            sends[8],
            Frame::with_addr(0x1F80, Command::ErasePage).to_bytes().to_vec()
        );
        assert_eq!(
            sends[9],
            Frame::with_addr(0x1F80, Command::WritePage).to_bytes().to_vec()
        );
        assert_eq!(
            sends[18],
            Frame::with_addr(0x0000, Command::ErasePage).to_bytes().to_vec()
        );
        assert_eq!(
            sends[19],
            Frame::with_addr(0x0000, Command::WritePage).to_bytes().to_vec()
        );

        // the relocated vector and the neighbouring application byte both
        // go out with the vector page
        let vector_fill = &sends[0..8];
        assert!(contains_frame(
            vector_fill,
            Frame::new(0x11, 0xC4, Command::Data)
        ));
        assert!(contains_frame(
            vector_fill,
            Frame::with_addr(VECTOR_ADDR as u16, Command::FillBuffer)
        ));
        assert!(contains_frame(
            vector_fill,
            Frame::new(0xAB, 0xFF, Command::Data)
        ));

        // page zero's fill starts with the patched entry jump
        assert_eq!(
            &sends[10][0..Frame::LEN],
            &Frame::new(BOOT_ENTRY_JMP[0], BOOT_ENTRY_JMP[1], Command::Data).to_bytes()
        );
        assert_eq!(
            &sends[10][Frame::LEN..2 * Frame::LEN],
            &Frame::with_addr(0x0000, Command::FillBuffer).to_bytes()
        );
    }

    #[test]
    fn short_circuited_page_lands_through_page_zero_in_any_order() {
        let mut dev = Picoboot::new(MockTransport::acking());
        let mut mem = flash_image();
        mem.data_mut()[8100] = 0xAB;

        // the page beside the boundary is asked for first
        assert_eq!(
            dev.paged_write(&mut mem, PAGE_SIZE, 0x1F80, PAGE_SIZE),
            Ok(PAGE_SIZE)
        );
        // ...and its bytes still reach the device once page 0 is written
        dev.paged_write(&mut mem, PAGE_SIZE, 0, PAGE_SIZE).unwrap();

        let sends = dev.into_transport().sends();
        assert!(contains_frame(
            &sends[0..8],
            Frame::new(0xAB, 0xFF, Command::Data)
        ));
    }

    #[test]
    fn partial_window_is_flushed_before_erase() {
        let mut dev = Picoboot::new(MockTransport::acking());
        let mut mem = Memory::from_bytes(MemoryKind::Flash, vec![0xFF; 128]);

        // 4-byte page: 4 frames, half a window
        let written = dev.paged_write(&mut mem, 4, 4, 4).unwrap();
        assert_eq!(written, 4);

        let transport = dev.into_transport();
        let sends = transport.sends();
        assert_eq!(sends.len(), 3);
        assert_eq!(sends[0].len(), 4 * Frame::LEN);
        assert_eq!(
            sends[1],
            Frame::with_addr(4, Command::ErasePage).to_bytes().to_vec()
        );
        assert_eq!(
            sends[2],
            Frame::with_addr(4, Command::WritePage).to_bytes().to_vec()
        );
        assert_eq!(transport.recv_count(), 6);
    }

    #[test]
    fn bad_ack_during_fill_fails_the_page() {
        let mut responses: VecDeque<u8> = std::iter::repeat(ACK).take(5).collect();
        responses.push_back(0x5A);
        let transport = MockTransport {
            ops: Vec::new(),
            responses,
            auto_ack: false,
        };

        let mut dev = Picoboot::new(transport);
        let mut mem = flash_image();

        let err = dev
            .paged_write(&mut mem, PAGE_SIZE, 0x40, PAGE_SIZE)
            .unwrap_err();
        assert_eq!(err, CoreError::Protocol { response: 0x5A });
        assert!(err.is_fatal());

        // one burst went out, ack draining stopped at the bad byte
        let transport = dev.into_transport();
        assert_eq!(transport.sends().len(), 1);
        assert_eq!(transport.recv_count(), 6);
    }

    #[test]
    fn silent_device_fails_the_page_recoverably() {
        let transport = MockTransport {
            ops: Vec::new(),
            responses: VecDeque::new(),
            auto_ack: false,
        };

        let mut dev = Picoboot::new(transport);
        let mut mem = flash_image();

        let err = dev
            .paged_write(&mut mem, PAGE_SIZE, 0x40, PAGE_SIZE)
            .unwrap_err();
        assert_eq!(err, CoreError::Timeout);
        assert!(!err.is_fatal());
    }
}
