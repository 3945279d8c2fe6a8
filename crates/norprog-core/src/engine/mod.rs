//! Chunked data engine
//!
//! Splits arbitrarily large host-requested transfers into device-buffer-
//! sized and sector-aligned chunks, handles strided (non-contiguous)
//! element access, and optional write verification. All bus activity goes
//! through the mode-specific primitives in [`crate::protocol`].

use alloc::vec;
use alloc::vec::Vec;
use core::cmp;

use crate::error::{Error, Result};
use crate::layout::SECTOR_SIZE;
use crate::protocol;
use crate::spi::{BusFeatures, SpiBus};

/// Scratch size for post-write verification readback
const VERIFY_CHUNK: usize = 256;

/// The logical unit of work for a read, write, or fill
///
/// `stride == 1` means byte-contiguous access: element framing is ignored
/// and `count` is a byte count. Any other stride means one `value_size`-
/// sized element every `stride` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRequest {
    /// Target offset in the flash address space
    pub addr: u32,
    /// Number of elements (bytes, when contiguous)
    pub count: u32,
    /// Address distance between consecutive elements
    pub stride: u32,
    /// Element size in bytes: 1, 2 or 4
    pub value_size: u8,
}

impl TransferRequest {
    /// Canonical form: contiguous requests ignore element framing
    pub fn normalized(mut self) -> Self {
        if self.stride == 1 {
            self.value_size = 1;
        }
        self
    }

    /// Reject bad value sizes, strides, spans that would wrap the address
    /// space, and requests that cannot fit the staging buffer. Runs before
    /// any bus activity, so a rejected request has no partial side effects.
    pub fn validate(&self, capacity: usize) -> Result<()> {
        self.check_shape()?;
        if self.total_bytes() > capacity {
            return Err(Error::InvalidRequest);
        }
        Ok(())
    }

    /// Size/stride rules plus the span bound, without the capacity check
    /// (fills are not capacity-bounded)
    fn check_shape(&self) -> Result<()> {
        if !matches!(self.value_size, 1 | 2 | 4) {
            return Err(Error::InvalidRequest);
        }
        if self.stride != 1 && self.stride < self.value_size as u32 {
            return Err(Error::InvalidRequest);
        }
        if self.end_addr().is_none() {
            return Err(Error::InvalidRequest);
        }
        Ok(())
    }

    /// Offset one past the last byte touched, if the span stays within the
    /// address space. `None` means host parameters that would wrap; every
    /// per-element address computed afterwards is bounded by this value.
    fn end_addr(&self) -> Option<u32> {
        if self.count == 0 {
            return Some(self.addr);
        }
        (self.count - 1)
            .checked_mul(self.stride)?
            .checked_add(self.addr)?
            .checked_add(self.value_size as u32)
    }

    /// Total payload size in bytes
    pub fn total_bytes(&self) -> usize {
        self.count as usize * self.value_size as usize
    }
}

/// Engine limits and policy
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Busy-poll iteration ceiling for every status wait
    pub busy_limit: u32,
    /// Staging buffer capacity in sectors (at least one)
    pub staging_sectors: usize,
    /// Use quad-mode transfers when the transceiver is capable
    pub use_quad: bool,
    /// Spin iterations spanning the chip's minimum reset pulse width
    pub reset_spin: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            busy_limit: protocol::DEFAULT_BUSY_LIMIT,
            staging_sectors: 1,
            use_quad: false,
            reset_spin: 4096,
        }
    }
}

/// The chunked read/write/fill engine
///
/// Owns the staging buffer (one allocation, reused across requests; a
/// multiple of the sector size). Single active request at a time by
/// construction - the driver is fully sequential.
pub struct Engine {
    cfg: EngineConfig,
    staging: Vec<u8>,
}

impl Engine {
    /// Create an engine with the given limits
    pub fn new(cfg: EngineConfig) -> Self {
        let sectors = cmp::max(1, cfg.staging_sectors);
        let staging = vec![0xFF; sectors * SECTOR_SIZE];
        Self { cfg, staging }
    }

    /// The engine limits in effect
    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// Staging buffer capacity in bytes
    pub fn capacity(&self) -> usize {
        self.staging.len()
    }

    /// Write `data` to flash as described by `req`
    ///
    /// Contiguous requests are carved sector-aware: first up to the current
    /// sector boundary, then in whole-sector pieces, because the page-write
    /// command cannot reliably cross those boundaries. Strided requests go
    /// out one element at a time. With `verify` set, every written element
    /// is read back and compared; a mismatch reports
    /// [`Error::VerifyMismatch`], distinct from a raw write failure.
    pub fn write_data<B: SpiBus + ?Sized>(
        &self,
        bus: &mut B,
        req: TransferRequest,
        data: &[u8],
        verify: bool,
    ) -> Result<()> {
        let req = req.normalized();
        req.validate(self.staging.len())?;

        let total = req.total_bytes();
        if data.len() < total {
            return Err(Error::InvalidRequest);
        }

        if req.stride == 1 {
            let mut addr = req.addr;
            let mut off = 0usize;
            while off < total {
                let sector_room = SECTOR_SIZE - (addr as usize % SECTOR_SIZE);
                let chunk = cmp::min(sector_room, total - off);
                self.write_chunk(bus, addr, &data[off..off + chunk])?;
                off += chunk;
                addr += chunk as u32;
            }
        } else {
            let vs = req.value_size as usize;
            for i in 0..req.count {
                let off = i as usize * vs;
                let addr = req.addr + i * req.stride;
                self.write_chunk(bus, addr, &data[off..off + vs])?;
            }
        }

        if verify {
            self.verify_written(bus, req, &data[..total])?;
        }
        Ok(())
    }

    /// Read flash into `out` as described by `req`
    pub fn read_data<B: SpiBus + ?Sized>(
        &self,
        bus: &mut B,
        req: TransferRequest,
        out: &mut [u8],
    ) -> Result<()> {
        let req = req.normalized();
        req.validate(self.staging.len())?;

        let total = req.total_bytes();
        if out.len() < total {
            return Err(Error::InvalidRequest);
        }

        if req.stride == 1 {
            self.read_chunk(bus, req.addr, &mut out[..total])
        } else {
            let vs = req.value_size as usize;
            for i in 0..req.count {
                let off = i as usize * vs;
                let addr = req.addr + i * req.stride;
                self.read_chunk(bus, addr, &mut out[off..off + vs])?;
            }
            Ok(())
        }
    }

    /// Replicate a scalar across `req.count` elements
    ///
    /// The value is laid out little-endian at `value_size` granularity
    /// across the staging buffer once, then written out in chunks of up to
    /// the buffer's element capacity. An arbitrarily large fill therefore
    /// reuses one small buffer instead of allocating a full-size image.
    pub fn fill_data<B: SpiBus + ?Sized>(
        &mut self,
        bus: &mut B,
        req: TransferRequest,
        value: u32,
        verify: bool,
    ) -> Result<()> {
        let req = req.normalized();
        // Capacity does not bound a fill; size, stride, and span rules apply
        req.check_shape()?;

        let vs = req.value_size as usize;
        let le = value.to_le_bytes();
        for slot in self.staging.chunks_exact_mut(vs) {
            slot.copy_from_slice(&le[..vs]);
        }

        let elems_per_buf = (self.staging.len() / vs) as u32;
        let mut done = 0u32;
        while done < req.count {
            let chunk_count = cmp::min(req.count - done, elems_per_buf);
            let sub = TransferRequest {
                // done < count, so this stays within the validated span
                addr: req.addr + done * req.stride,
                count: chunk_count,
                stride: req.stride,
                value_size: req.value_size,
            };
            let byte_len = chunk_count as usize * vs;
            let staging = &self.staging;
            self.write_data(bus, sub, &staging[..byte_len], verify)?;
            done += chunk_count;
        }
        Ok(())
    }

    fn write_chunk<B: SpiBus + ?Sized>(&self, bus: &mut B, addr: u32, data: &[u8]) -> Result<()> {
        if self.cfg.use_quad && bus.features().contains(BusFeatures::QUAD_TX) {
            protocol::write_quad(bus, addr, data, self.cfg.busy_limit)
        } else {
            protocol::write_single(bus, addr, data, self.cfg.busy_limit)
        }
    }

    fn read_chunk<B: SpiBus + ?Sized>(&self, bus: &mut B, addr: u32, buf: &mut [u8]) -> Result<()> {
        let features = bus.features();
        if self.cfg.use_quad && features.contains(BusFeatures::QUAD_RX) {
            protocol::read_quad(bus, addr, buf, self.cfg.busy_limit)
        } else if features.contains(BusFeatures::DUAL_RX) {
            protocol::read_dual(bus, addr, buf, self.cfg.busy_limit)
        } else {
            protocol::read_single(bus, addr, buf, self.cfg.busy_limit)
        }
    }

    /// Re-read every written element through a small scratch buffer and
    /// byte-compare against what was sent.
    fn verify_written<B: SpiBus + ?Sized>(
        &self,
        bus: &mut B,
        req: TransferRequest,
        data: &[u8],
    ) -> Result<()> {
        let mut scratch = [0u8; VERIFY_CHUNK];

        if req.stride == 1 {
            let mut off = 0usize;
            while off < data.len() {
                let chunk = cmp::min(VERIFY_CHUNK, data.len() - off);
                self.read_chunk(bus, req.addr + off as u32, &mut scratch[..chunk])?;
                if scratch[..chunk] != data[off..off + chunk] {
                    return Err(Error::VerifyMismatch);
                }
                off += chunk;
            }
        } else {
            let vs = req.value_size as usize;
            for i in 0..req.count {
                let off = i as usize * vs;
                let addr = req.addr + i * req.stride;
                self.read_chunk(bus, addr, &mut scratch[..vs])?;
                if scratch[..vs] != data[off..off + vs] {
                    return Err(Error::VerifyMismatch);
                }
            }
        }
        Ok(())
    }
}
