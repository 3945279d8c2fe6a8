//! Sector map and geometry model
//!
//! A static partition of the device address space into fixed-size sectors,
//! built once from the sector count of the identified chip. Pure function
//! of the count; no I/O.

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

/// Erasable unit of the address space (64 KiB)
pub const SECTOR_SIZE: usize = 0x1_0000;

/// One sector's address span, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorSpan {
    /// First byte offset of the sector
    pub start: u32,
    /// Last byte offset of the sector
    pub end: u32,
}

/// Ordered, contiguous, non-overlapping partition of the address range
///
/// Invariants: `span[0].start == 0` and
/// `span[i].end + 1 == span[i + 1].start`.
#[cfg(feature = "alloc")]
#[derive(Debug, Clone)]
pub struct SectorMap {
    spans: Vec<SectorSpan>,
}

#[cfg(feature = "alloc")]
impl SectorMap {
    /// Build the map for a chip with `sector_count` uniform sectors
    pub fn new(sector_count: u32) -> Self {
        let mut spans = Vec::with_capacity(sector_count as usize);
        let mut start = 0u32;
        for _ in 0..sector_count {
            let end = start + (SECTOR_SIZE as u32 - 1);
            spans.push(SectorSpan { start, end });
            start = end + 1;
        }
        Self { spans }
    }

    /// Number of sectors
    pub fn sector_count(&self) -> u32 {
        self.spans.len() as u32
    }

    /// Span of the sector at `index`, if in range
    pub fn get(&self, index: u32) -> Option<SectorSpan> {
        self.spans.get(index as usize).copied()
    }

    /// Sector index containing `addr`, if any
    ///
    /// Linear scan; sector counts are small (at most a few hundred).
    pub fn sector_of(&self, addr: u32) -> Option<u32> {
        self.spans
            .iter()
            .position(|s| addr >= s.start && addr <= s.end)
            .map(|i| i as u32)
    }

    /// Total size covered by the map in bytes
    pub fn total_size(&self) -> u32 {
        self.spans.len() as u32 * SECTOR_SIZE as u32
    }

    /// Whether `[addr, addr + len)` lies entirely inside the map
    pub fn contains_range(&self, addr: u32, len: usize) -> bool {
        (addr as u64 + len as u64) <= self.total_size() as u64
    }
}
