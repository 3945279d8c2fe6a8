//! The bus trait and scoped bus state handling

use crate::error::{Error, Result};
use crate::spi::SpiTransaction;
use bitflags::bitflags;

bitflags! {
    /// Transceiver capability flags
    ///
    /// Reported by a bus implementation so callers can pick the fastest
    /// data-phase mode the hardware can clock.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BusFeatures: u32 {
        /// Can receive two bits per clock (dual output reads)
        const DUAL_RX = 1 << 0;
        /// Can receive four bits per clock (quad output reads)
        const QUAD_RX = 1 << 1;
        /// Can transmit four bits per clock (quad page program)
        const QUAD_TX = 1 << 2;
    }
}

impl Default for BusFeatures {
    fn default() -> Self {
        BusFeatures::empty()
    }
}

/// Data-line configuration of the transceiver
///
/// The prologue of every command is always clocked in `Single`; the other
/// modes apply only to the data phase of a dual/quad transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BusMode {
    /// One data line each direction (default)
    #[default]
    Single,
    /// Two receive lines (1-1-2 data phase)
    DualRx,
    /// Four receive lines (1-1-4 data phase)
    QuadRx,
    /// Four transmit lines (quad page program data phase)
    QuadTx,
}

/// Blocking SPI transceiver capability
///
/// The only interface through which the engine touches hardware. One call
/// to [`transceive`](Self::transceive) is exactly one blocking exchange:
/// prologue out, then transmit payload out, then receive payload in. No
/// retries happen at this layer; a failure is propagated verbatim by every
/// caller.
///
/// Chip-select is normally handled by the peripheral per exchange. Multi-
/// phase commands (where the data phase runs in a different [`BusMode`]
/// than the prologue) switch to manual select so one logical flash command
/// can span several exchanges.
pub trait SpiBus {
    /// Capabilities of this transceiver
    fn features(&self) -> BusFeatures;

    /// Execute one blocking exchange
    fn transceive(&mut self, xfer: &mut SpiTransaction<'_>) -> Result<()>;

    /// Switch the data-line configuration
    fn set_mode(&mut self, mode: BusMode) -> Result<()>;

    /// Switch between automatic (per-exchange) and manual chip-select
    fn set_manual_select(&mut self, manual: bool) -> Result<()>;

    /// Assert or deassert chip-select (only meaningful under manual select)
    fn select(&mut self, asserted: bool) -> Result<()>;
}

impl<'a> SpiBus for &'a mut (dyn SpiBus + 'a) {
    fn features(&self) -> BusFeatures {
        (**self).features()
    }

    fn transceive(&mut self, xfer: &mut SpiTransaction<'_>) -> Result<()> {
        (**self).transceive(xfer)
    }

    fn set_mode(&mut self, mode: BusMode) -> Result<()> {
        (**self).set_mode(mode)
    }

    fn set_manual_select(&mut self, manual: bool) -> Result<()> {
        (**self).set_manual_select(manual)
    }

    fn select(&mut self, asserted: bool) -> Result<()> {
        (**self).select(asserted)
    }
}

/// Check that the transceiver can clock the requested mode
pub(crate) fn check_mode_supported(mode: BusMode, features: BusFeatures) -> Result<()> {
    let ok = match mode {
        BusMode::Single => true,
        BusMode::DualRx => features.contains(BusFeatures::DUAL_RX),
        BusMode::QuadRx => features.contains(BusFeatures::QUAD_RX),
        BusMode::QuadTx => features.contains(BusFeatures::QUAD_TX),
    };
    if ok {
        Ok(())
    } else {
        Err(Error::BusModeNotSupported)
    }
}

/// Scoped acquisition of manual chip-select and a non-default bus mode
///
/// Leaving the bus in a non-default mode (e.g. quad) would corrupt every
/// subsequent command, so the two bus properties a multi-phase sequence
/// touches are restored on every exit path, error or not. Restoration
/// failures cannot be propagated out of `drop` and are logged instead;
/// teardown continues through the remaining steps regardless.
pub struct BusStateGuard<'a, B: SpiBus + ?Sized> {
    bus: &'a mut B,
}

impl<'a, B: SpiBus + ?Sized> BusStateGuard<'a, B> {
    /// Take manual control of chip-select for a multi-phase sequence
    pub fn manual_select(bus: &'a mut B) -> Result<Self> {
        bus.set_manual_select(true)?;
        Ok(Self { bus })
    }

    /// Access the underlying bus
    pub fn bus(&mut self) -> &mut B {
        self.bus
    }
}

impl<'a, B: SpiBus + ?Sized> Drop for BusStateGuard<'a, B> {
    fn drop(&mut self) {
        if let Err(e) = self.bus.select(false) {
            log::warn!("failed to deassert chip-select during cleanup: {}", e);
        }
        if let Err(e) = self.bus.set_mode(BusMode::Single) {
            log::warn!("failed to restore single-bit mode during cleanup: {}", e);
        }
        if let Err(e) = self.bus.set_manual_select(false) {
            log::warn!("failed to restore automatic chip-select during cleanup: {}", e);
        }
    }
}
