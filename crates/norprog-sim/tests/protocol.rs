//! Protocol primitive behavior against the simulated bus, including the
//! cleanup guarantees of the multi-phase sequences.

use norprog_core::error::Error;
use norprog_core::protocol;
use norprog_core::spi::{BusFeatures, BusMode, SpiBus};
use norprog_sim::SimBus;

const LIMIT: u32 = 64;

fn assert_bus_defaults(bus: &SimBus) {
    assert_eq!(bus.mode(), BusMode::Single);
    assert!(!bus.is_manual_select());
    assert!(!bus.is_selected());
}

#[test]
fn busy_wait_returns_promptly_when_idle() {
    let mut bus = SimBus::new_default();
    assert_eq!(protocol::busy_wait(&mut bus, 1), Ok(()));
}

#[test]
fn busy_wait_times_out_with_shrunken_bound() {
    let mut bus = SimBus::new_default();
    bus.force_busy(true);
    assert_eq!(protocol::busy_wait(&mut bus, 8), Err(Error::BusyTimeout));
}

#[test]
fn write_enable_sets_the_latch() {
    let mut bus = SimBus::new_default();
    protocol::write_enable(&mut bus, LIMIT).unwrap();
    assert_eq!(
        protocol::read_status1(&mut bus).unwrap() & norprog_core::spi::opcodes::SR1_WEL,
        norprog_core::spi::opcodes::SR1_WEL
    );
}

#[test]
fn reset_clears_a_dangling_quad_enable_bit() {
    let mut bus = SimBus::new_default();
    protocol::write_status2(&mut bus, norprog_core::spi::opcodes::SR2_QE, LIMIT).unwrap();
    assert!(bus.quad_enabled());

    protocol::reset(&mut bus, 4, LIMIT).unwrap();
    assert!(!bus.quad_enabled());
}

#[test]
fn reset_reports_stuck_quad_enable_as_fatal() {
    let mut bus = SimBus::new_default();
    bus.set_stuck_qe();
    assert_eq!(
        protocol::reset(&mut bus, 4, LIMIT),
        Err(Error::QuadEnableStuck)
    );
}

#[test]
fn single_read_returns_written_data() {
    let mut bus = SimBus::new_default();
    let data = [0xDE, 0xAD, 0xBE, 0xEF];
    protocol::write_single(&mut bus, 0x2000, &data, LIMIT).unwrap();

    let mut buf = [0u8; 4];
    protocol::read_single(&mut bus, 0x2000, &mut buf, LIMIT).unwrap();
    assert_eq!(buf, data);
}

#[test]
fn dual_read_returns_written_data_and_restores_bus() {
    let mut bus = SimBus::new_default();
    let data = [0x11, 0x22, 0x33];
    protocol::write_single(&mut bus, 0x100, &data, LIMIT).unwrap();

    let mut buf = [0u8; 3];
    protocol::read_dual(&mut bus, 0x100, &mut buf, LIMIT).unwrap();
    assert_eq!(buf, data);
    assert_bus_defaults(&bus);
}

#[test]
fn quad_read_brackets_quad_enable() {
    let mut bus = SimBus::new_default();
    let data = [0xA5; 8];
    protocol::write_single(&mut bus, 0, &data, LIMIT).unwrap();

    let mut buf = [0u8; 8];
    protocol::read_quad(&mut bus, 0, &mut buf, LIMIT).unwrap();
    assert_eq!(buf, data);
    assert!(!bus.quad_enabled());
    assert_bus_defaults(&bus);
}

#[test]
fn quad_read_failure_still_restores_bus_state() {
    let mut bus = SimBus::new_default();
    bus.fail_next_data_phase();

    let mut buf = [0u8; 4];
    let result = protocol::read_quad(&mut bus, 0, &mut buf, LIMIT);
    assert!(result.is_err());
    assert!(!bus.quad_enabled());
    assert_bus_defaults(&bus);
}

#[test]
fn dual_read_failure_still_restores_bus_state() {
    let mut bus = SimBus::new_default();
    bus.fail_next_data_phase();

    let mut buf = [0u8; 4];
    assert!(protocol::read_dual(&mut bus, 0, &mut buf, LIMIT).is_err());
    assert_bus_defaults(&bus);
}

#[test]
fn quad_write_round_trips_and_clears_quad_enable() {
    let mut bus = SimBus::new_default();
    let data: Vec<u8> = (0..64).collect();
    protocol::write_quad(&mut bus, 0x8000, &data, LIMIT).unwrap();

    let mut buf = vec![0u8; 64];
    protocol::read_single(&mut bus, 0x8000, &mut buf, LIMIT).unwrap();
    assert_eq!(buf, data);
    assert!(!bus.quad_enabled());
    assert_bus_defaults(&bus);
}

#[test]
fn quad_write_failure_still_restores_bus_state() {
    let mut bus = SimBus::new_default();
    bus.fail_next_data_phase();

    let result = protocol::write_quad(&mut bus, 0, &[0x55; 16], LIMIT);
    assert!(result.is_err());
    assert!(!bus.quad_enabled());
    assert_bus_defaults(&bus);
}

#[test]
fn multi_io_rejected_on_single_only_transceiver() {
    let mut bus = SimBus::new_default().with_features(BusFeatures::empty());
    let mut buf = [0u8; 4];
    assert_eq!(
        protocol::read_dual(&mut bus, 0, &mut buf, LIMIT),
        Err(Error::BusModeNotSupported)
    );
    assert_eq!(
        protocol::read_quad(&mut bus, 0, &mut buf, LIMIT),
        Err(Error::BusModeNotSupported)
    );
    assert_eq!(
        protocol::write_quad(&mut bus, 0, &buf, LIMIT),
        Err(Error::BusModeNotSupported)
    );
}

#[test]
fn erase_failure_is_reported_with_the_address() {
    let mut bus = SimBus::new_default();
    bus.fail_erase_at(0x2_0000);
    assert_eq!(
        protocol::erase_sector(&mut bus, 0x2_0000, LIMIT),
        Err(Error::EraseFailed { addr: 0x2_0000 })
    );
}
