//! Flash chip identity
//!
//! A small static table of supported parts, resolved once at startup via a
//! JEDEC ID read. All sector geometry decisions derive from the entry found
//! here; the identity is immutable afterwards.

use crate::error::{Error, Result};
use crate::protocol;
use crate::spi::SpiBus;

/// Identity of a supported flash chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashDevice {
    /// JEDEC manufacturer ID
    pub manufacturer_id: u8,
    /// JEDEC device ID (two bytes)
    pub device_id: u16,
    /// Part name
    pub name: &'static str,
    /// Manufacturer name
    pub vendor: &'static str,
    /// Number of 64 KiB sectors
    pub sector_count: u32,
}

impl FlashDevice {
    /// Total addressable size in bytes
    pub const fn total_size(&self) -> u32 {
        self.sector_count * crate::layout::SECTOR_SIZE as u32
    }
}

/// Parts this engine knows how to drive
///
/// All are uniform 64 KiB-sector chips with the SPI25 command set and a
/// quad-enable bit at SR2 bit 1.
pub static DEVICES: &[FlashDevice] = &[
    FlashDevice {
        manufacturer_id: 0xEF,
        device_id: 0x4016,
        name: "W25Q32FV",
        vendor: "Winbond",
        sector_count: 64,
    },
    FlashDevice {
        manufacturer_id: 0xEF,
        device_id: 0x4017,
        name: "W25Q64FV",
        vendor: "Winbond",
        sector_count: 128,
    },
    FlashDevice {
        manufacturer_id: 0xEF,
        device_id: 0x4018,
        name: "W25Q128FV",
        vendor: "Winbond",
        sector_count: 256,
    },
    FlashDevice {
        manufacturer_id: 0x9D,
        device_id: 0x6017,
        name: "IS25LP064",
        vendor: "ISSI",
        sector_count: 128,
    },
    FlashDevice {
        manufacturer_id: 0xC2,
        device_id: 0x2017,
        name: "MX25L6433F",
        vendor: "Macronix",
        sector_count: 128,
    },
];

/// Look up a part by its JEDEC ID
pub fn find_by_jedec_id(manufacturer: u8, device: u16) -> Option<&'static FlashDevice> {
    DEVICES
        .iter()
        .find(|d| d.manufacturer_id == manufacturer && d.device_id == device)
}

/// Identify the attached chip via a JEDEC ID read
pub fn probe<B: SpiBus + ?Sized>(bus: &mut B) -> Result<&'static FlashDevice> {
    let (manufacturer, device) = protocol::read_jedec_id(bus)?;
    log::debug!(
        "JEDEC ID: manufacturer 0x{:02X}, device 0x{:04X}",
        manufacturer,
        device
    );

    find_by_jedec_id(manufacturer, device).ok_or(Error::ChipNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_ids_resolve() {
        let dev = find_by_jedec_id(0xEF, 0x4018).unwrap();
        assert_eq!(dev.name, "W25Q128FV");
        assert_eq!(dev.sector_count, 256);
        assert_eq!(dev.total_size(), 16 * 1024 * 1024);
    }

    #[test]
    fn unknown_id_is_none() {
        assert!(find_by_jedec_id(0x00, 0x0000).is_none());
        assert!(find_by_jedec_id(0xEF, 0xFFFF).is_none());
    }
}
