//! Host command protocol and dispatcher
//!
//! The host drives the device through an in-memory mailbox: it populates a
//! numeric command plus parameter fields, waits, and observes the command
//! slot return to idle with an error code and any response fields written
//! back. The dispatcher maps each command onto the engine, the sector map,
//! or the protocol primitives, and always clears the command slot whether
//! the operation succeeded or failed.

use crate::chip::{self, FlashDevice};
use crate::engine::{Engine, EngineConfig, TransferRequest};
use crate::error::Error;
use crate::layout::SectorMap;
use crate::protocol;
use crate::spi::SpiBus;
use crate::Result;

/// Command set understood by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Command {
    /// Idle slot; the host observes this value to detect completion
    NoCommand = 0,
    /// Report chip identity and geometry
    GetCodes = 1,
    /// Software-reset the flash chip
    Reset = 2,
    /// Write the data buffer to flash
    Write = 3,
    /// Replicate a scalar value across a range
    Fill = 4,
    /// Erase every sector, best-effort
    EraseAll = 5,
    /// Erase one sector by index
    EraseSector = 6,
    /// Read flash into the data buffer
    Read = 7,
    /// Map an offset to its sector index
    GetSectorNum = 8,
    /// Report the start/end offsets of a sector
    GetSectorStartEnd = 9,
}

impl Command {
    /// Decode a raw command word from the host
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Self::NoCommand,
            1 => Self::GetCodes,
            2 => Self::Reset,
            3 => Self::Write,
            4 => Self::Fill,
            5 => Self::EraseAll,
            6 => Self::EraseSector,
            7 => Self::Read,
            8 => Self::GetSectorNum,
            9 => Self::GetSectorStartEnd,
            _ => return None,
        })
    }
}

/// Host-visible result codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum ErrorCode {
    /// Command completed
    #[default]
    NoError = 0,
    /// Startup/identification failed; nothing is serviceable
    SetupError = 1,
    /// The command needs a data buffer and none was supplied
    BufferIsNull = 2,
    /// Write, fill, or erase failed (including parameter rejection)
    WriteError = 3,
    /// Read failed (including parameter rejection)
    NotReadError = 4,
    /// Post-write readback differed from the written data
    VerifyWriteMismatch = 5,
    /// Sector index or offset outside the chip
    InvalidSector = 6,
    /// Command-level failure not covered by a more specific code
    ProcessCommandError = 7,
    /// Command word not in the command set
    UnknownCommand = 8,
}

/// Shared request/response block between host and device
///
/// An explicit struct rather than ambient global state, so each command is
/// directly testable in isolation. The raw data buffer travels separately
/// as a slice.
#[derive(Debug, Clone)]
pub struct Mailbox {
    /// Raw command word; reset to idle after every dispatch
    pub command: u32,
    /// Target offset in flash
    pub offset: u32,
    /// Element count (byte count for contiguous requests)
    pub count: u32,
    /// Address distance between consecutive elements
    pub stride: u32,
    /// Element size in bytes: 1, 2 or 4
    pub value_size: u8,
    /// Sector index parameter for erase/geometry commands
    pub sector_index: u32,
    /// Verify writes by reading back
    pub verify: bool,
    /// Scalar for fill commands (little-endian, low `value_size` bytes)
    pub fill_value: u32,

    // Response fields, written back by the device
    /// Result of the last command
    pub error: ErrorCode,
    /// JEDEC manufacturer code of the identified chip
    pub manufacturer_code: u8,
    /// JEDEC device code of the identified chip
    pub device_code: u16,
    /// Part name of the identified chip
    pub name: &'static str,
    /// Manufacturer name of the identified chip
    pub vendor: &'static str,
    /// Number of sectors of the identified chip
    pub sector_count: u32,
    /// Start offset answer for geometry queries
    pub sector_start: u32,
    /// End offset answer for geometry queries
    pub sector_end: u32,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self {
            command: Command::NoCommand as u32,
            offset: 0,
            count: 0,
            stride: 1,
            value_size: 1,
            sector_index: 0,
            verify: false,
            fill_value: 0,
            error: ErrorCode::NoError,
            manufacturer_code: 0,
            device_code: 0,
            name: "",
            vendor: "",
            sector_count: 0,
            sector_start: 0,
            sector_end: 0,
        }
    }
}

impl Mailbox {
    /// The transfer request described by the current parameter fields
    fn request(&self) -> TransferRequest {
        TransferRequest {
            addr: self.offset,
            count: self.count,
            stride: self.stride,
            value_size: self.value_size,
        }
    }
}

/// The device-side programmer: identified chip, sector map, data engine
pub struct Programmer {
    device: &'static FlashDevice,
    map: SectorMap,
    engine: Engine,
}

impl Programmer {
    /// Identify the attached chip and set up the sector map and staging
    /// buffer. A failure here is fatal for the session; no command is
    /// serviceable without an identified chip.
    pub fn new<B: SpiBus + ?Sized>(bus: &mut B, cfg: EngineConfig) -> Result<Self> {
        let device = chip::probe(bus)?;
        log::info!(
            "identified {} {} ({} sectors)",
            device.vendor,
            device.name,
            device.sector_count
        );

        Ok(Self {
            device,
            map: SectorMap::new(device.sector_count),
            engine: Engine::new(cfg),
        })
    }

    /// The identified chip
    pub fn device(&self) -> &'static FlashDevice {
        self.device
    }

    /// The sector map built for the identified chip
    pub fn sector_map(&self) -> &SectorMap {
        &self.map
    }

    /// The data engine
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Process one host command
    ///
    /// Writes the result code back and clears the command slot to idle on
    /// every path, success or failure - the host detects completion by the
    /// slot returning to [`Command::NoCommand`].
    pub fn process<B: SpiBus + ?Sized>(
        &mut self,
        bus: &mut B,
        mailbox: &mut Mailbox,
        data: &mut [u8],
    ) {
        let code = self.dispatch(bus, mailbox, data);
        if code != ErrorCode::NoError {
            log::debug!("command {} finished with {:?}", mailbox.command, code);
        }
        mailbox.error = code;
        mailbox.command = Command::NoCommand as u32;
    }

    fn dispatch<B: SpiBus + ?Sized>(
        &mut self,
        bus: &mut B,
        mailbox: &mut Mailbox,
        data: &mut [u8],
    ) -> ErrorCode {
        let Some(command) = Command::from_raw(mailbox.command) else {
            return ErrorCode::UnknownCommand;
        };

        let busy_limit = self.engine.config().busy_limit;

        match command {
            Command::NoCommand => ErrorCode::NoError,

            Command::GetCodes => {
                mailbox.manufacturer_code = self.device.manufacturer_id;
                mailbox.device_code = self.device.device_id;
                mailbox.name = self.device.name;
                mailbox.vendor = self.device.vendor;
                mailbox.sector_count = self.device.sector_count;
                ErrorCode::NoError
            }

            Command::Reset => {
                let spin = self.engine.config().reset_spin;
                match protocol::reset(bus, spin, busy_limit) {
                    Ok(()) => ErrorCode::NoError,
                    // The chip cannot leave quad mode; the device is done for
                    Err(Error::QuadEnableStuck) => ErrorCode::SetupError,
                    Err(_) => ErrorCode::ProcessCommandError,
                }
            }

            Command::Write => {
                if data.is_empty() {
                    return ErrorCode::BufferIsNull;
                }
                match self
                    .engine
                    .write_data(bus, mailbox.request(), data, mailbox.verify)
                {
                    Ok(()) => ErrorCode::NoError,
                    Err(Error::VerifyMismatch) => ErrorCode::VerifyWriteMismatch,
                    Err(_) => ErrorCode::WriteError,
                }
            }

            Command::Fill => {
                match self
                    .engine
                    .fill_data(bus, mailbox.request(), mailbox.fill_value, mailbox.verify)
                {
                    Ok(()) => ErrorCode::NoError,
                    Err(Error::VerifyMismatch) => ErrorCode::VerifyWriteMismatch,
                    Err(_) => ErrorCode::WriteError,
                }
            }

            Command::Read => {
                if data.is_empty() {
                    return ErrorCode::BufferIsNull;
                }
                match self.engine.read_data(bus, mailbox.request(), data) {
                    Ok(()) => ErrorCode::NoError,
                    Err(_) => ErrorCode::NotReadError,
                }
            }

            Command::EraseAll => {
                // Best-effort: one bad sector must not block erasing the
                // rest. The first failure's code is latched and reported
                // after every sector has been attempted, ascending.
                let mut code = ErrorCode::NoError;
                for index in 0..self.map.sector_count() {
                    let Some(span) = self.map.get(index) else {
                        break;
                    };
                    if let Err(e) = protocol::erase_sector(bus, span.start, busy_limit) {
                        log::warn!("erase of sector {} failed: {}", index, e);
                        if code == ErrorCode::NoError {
                            code = ErrorCode::WriteError;
                        }
                    }
                }
                code
            }

            Command::EraseSector => match self.map.get(mailbox.sector_index) {
                None => ErrorCode::InvalidSector,
                Some(span) => match protocol::erase_sector(bus, span.start, busy_limit) {
                    Ok(()) => ErrorCode::NoError,
                    Err(_) => ErrorCode::WriteError,
                },
            },

            Command::GetSectorNum => match self.map.sector_of(mailbox.offset) {
                Some(index) => {
                    mailbox.sector_index = index;
                    ErrorCode::NoError
                }
                None => ErrorCode::InvalidSector,
            },

            Command::GetSectorStartEnd => match self.map.get(mailbox.sector_index) {
                Some(span) => {
                    mailbox.sector_start = span.start;
                    mailbox.sector_end = span.end;
                    ErrorCode::NoError
                }
                // Output offsets stay untouched on a bad index
                None => ErrorCode::InvalidSector,
            },
        }
    }
}
