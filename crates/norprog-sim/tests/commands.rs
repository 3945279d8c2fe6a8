//! Command dispatcher behavior: parameter handling, error code mapping,
//! and the command-slot handshake.

use norprog_core::command::{Command, ErrorCode, Mailbox, Programmer};
use norprog_core::engine::EngineConfig;
use norprog_core::error::Error;
use norprog_core::layout::SECTOR_SIZE;
use norprog_sim::{SimBus, SimConfig};

fn setup() -> (SimBus, Programmer) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut bus = SimBus::new_default();
    let cfg = EngineConfig {
        busy_limit: 64,
        reset_spin: 4,
        ..Default::default()
    };
    let programmer = Programmer::new(&mut bus, cfg).unwrap();
    (bus, programmer)
}

fn issue(bus: &mut SimBus, programmer: &mut Programmer, mailbox: &mut Mailbox, command: Command) {
    mailbox.command = command as u32;
    programmer.process(bus, mailbox, &mut []);
}

#[test]
fn probe_rejects_unknown_chips() {
    let mut bus = SimBus::new(SimConfig {
        manufacturer_id: 0x12,
        device_id: 0x3456,
        size: 4 * SECTOR_SIZE,
    });
    assert_eq!(
        Programmer::new(&mut bus, EngineConfig::default()).err(),
        Some(Error::ChipNotFound)
    );
}

#[test]
fn get_codes_reports_identity_and_geometry() {
    let (mut bus, mut programmer) = setup();
    let mut mailbox = Mailbox::default();
    issue(&mut bus, &mut programmer, &mut mailbox, Command::GetCodes);

    assert_eq!(mailbox.error, ErrorCode::NoError);
    assert_eq!(mailbox.manufacturer_code, 0xEF);
    assert_eq!(mailbox.device_code, 0x4016);
    assert_eq!(mailbox.name, "W25Q32FV");
    assert_eq!(mailbox.vendor, "Winbond");
    assert_eq!(mailbox.sector_count, 64);
}

#[test]
fn command_slot_is_cleared_after_every_dispatch() {
    let (mut bus, mut programmer) = setup();

    let mut mailbox = Mailbox::default();
    issue(&mut bus, &mut programmer, &mut mailbox, Command::GetCodes);
    assert_eq!(mailbox.command, Command::NoCommand as u32);

    // failing command clears the slot too
    mailbox.command = Command::Write as u32;
    programmer.process(&mut bus, &mut mailbox, &mut []);
    assert_eq!(mailbox.error, ErrorCode::BufferIsNull);
    assert_eq!(mailbox.command, Command::NoCommand as u32);
}

#[test]
fn unknown_command_word_is_reported() {
    let (mut bus, mut programmer) = setup();
    let mut mailbox = Mailbox {
        command: 42,
        ..Default::default()
    };
    programmer.process(&mut bus, &mut mailbox, &mut []);
    assert_eq!(mailbox.error, ErrorCode::UnknownCommand);
    assert_eq!(mailbox.command, Command::NoCommand as u32);
}

#[test]
fn write_then_read_round_trips() {
    let (mut bus, mut programmer) = setup();

    let mut data: Vec<u8> = (0..2048u32).map(|i| (i % 201) as u8).collect();
    let mut mailbox = Mailbox {
        command: Command::Write as u32,
        offset: 0x1_8000,
        count: 2048,
        stride: 1,
        verify: true,
        ..Default::default()
    };
    programmer.process(&mut bus, &mut mailbox, &mut data);
    assert_eq!(mailbox.error, ErrorCode::NoError);

    let mut out = vec![0u8; 2048];
    mailbox.command = Command::Read as u32;
    programmer.process(&mut bus, &mut mailbox, &mut out);
    assert_eq!(mailbox.error, ErrorCode::NoError);
    assert_eq!(out, data);
}

#[test]
fn verify_mismatch_maps_to_its_own_code() {
    let (mut bus, mut programmer) = setup();
    bus.corrupt_byte(0x20);

    let mut data = vec![0xAB; 64];
    let mut mailbox = Mailbox {
        command: Command::Write as u32,
        offset: 0,
        count: 64,
        stride: 1,
        verify: true,
        ..Default::default()
    };
    programmer.process(&mut bus, &mut mailbox, &mut data);
    assert_eq!(mailbox.error, ErrorCode::VerifyWriteMismatch);
}

#[test]
fn out_of_range_write_maps_to_write_error() {
    let (mut bus, mut programmer) = setup();

    let mut data = vec![0x00; 16];
    let mut mailbox = Mailbox {
        command: Command::Write as u32,
        offset: 64 * SECTOR_SIZE as u32 - 8,
        count: 16,
        stride: 1,
        ..Default::default()
    };
    programmer.process(&mut bus, &mut mailbox, &mut data);
    assert_eq!(mailbox.error, ErrorCode::WriteError);
}

#[test]
fn invalid_parameters_map_to_write_and_read_errors() {
    let (mut bus, mut programmer) = setup();

    // value_size 3 with a non-unit stride is rejected before any bus work
    let mut data = vec![0u8; 64];
    let mut mailbox = Mailbox {
        command: Command::Write as u32,
        count: 4,
        stride: 4,
        value_size: 3,
        ..Default::default()
    };
    programmer.process(&mut bus, &mut mailbox, &mut data);
    assert_eq!(mailbox.error, ErrorCode::WriteError);
    assert!(bus.data().iter().all(|&b| b == 0xFF));

    mailbox.command = Command::Read as u32;
    programmer.process(&mut bus, &mut mailbox, &mut data);
    assert_eq!(mailbox.error, ErrorCode::NotReadError);
}

#[test]
fn fill_through_dispatcher() {
    let (mut bus, mut programmer) = setup();

    let mut mailbox = Mailbox {
        command: Command::Fill as u32,
        offset: 0x4000,
        count: 256,
        stride: 2,
        value_size: 2,
        fill_value: 0xCAFE,
        ..Default::default()
    };
    programmer.process(&mut bus, &mut mailbox, &mut []);
    assert_eq!(mailbox.error, ErrorCode::NoError);

    for slot in bus.data()[0x4000..0x4200].chunks_exact(2) {
        assert_eq!(slot, &0xCAFEu16.to_le_bytes());
    }
}

#[test]
fn erase_sector_by_index() {
    let (mut bus, mut programmer) = setup();
    bus.data_mut()[SECTOR_SIZE..2 * SECTOR_SIZE].fill(0x00);

    let mut mailbox = Mailbox {
        command: Command::EraseSector as u32,
        sector_index: 1,
        ..Default::default()
    };
    programmer.process(&mut bus, &mut mailbox, &mut []);
    assert_eq!(mailbox.error, ErrorCode::NoError);
    assert!(bus.data()[SECTOR_SIZE..2 * SECTOR_SIZE]
        .iter()
        .all(|&b| b == 0xFF));
}

#[test]
fn erase_sector_rejects_out_of_range_index() {
    let (mut bus, mut programmer) = setup();
    let mut mailbox = Mailbox {
        command: Command::EraseSector as u32,
        sector_index: 64, // one past the last
        ..Default::default()
    };
    programmer.process(&mut bus, &mut mailbox, &mut []);
    assert_eq!(mailbox.error, ErrorCode::InvalidSector);
    assert!(bus.erase_attempts().is_empty());
}

#[test]
fn erase_all_is_best_effort_and_ascending() {
    let (mut bus, mut programmer) = setup();
    bus.data_mut().fill(0x00);
    bus.fail_erase_at(3 * SECTOR_SIZE as u32);

    let mut mailbox = Mailbox {
        command: Command::EraseAll as u32,
        ..Default::default()
    };
    programmer.process(&mut bus, &mut mailbox, &mut []);
    assert_eq!(mailbox.error, ErrorCode::WriteError);

    // every sector was attempted, in ascending order
    let expected: Vec<u32> = (0..64u32).map(|i| i * SECTOR_SIZE as u32).collect();
    assert_eq!(bus.erase_attempts(), &expected[..]);

    // all sectors except the failing one were genuinely erased
    for i in 0..64usize {
        let range = i * SECTOR_SIZE..(i + 1) * SECTOR_SIZE;
        if i == 3 {
            assert!(bus.data()[range].iter().all(|&b| b == 0x00));
        } else {
            assert!(bus.data()[range].iter().all(|&b| b == 0xFF));
        }
    }
}

#[test]
fn sector_start_end_query() {
    let (mut bus, mut programmer) = setup();

    let mut mailbox = Mailbox {
        command: Command::GetSectorStartEnd as u32,
        sector_index: 63,
        ..Default::default()
    };
    programmer.process(&mut bus, &mut mailbox, &mut []);
    assert_eq!(mailbox.error, ErrorCode::NoError);
    assert_eq!(mailbox.sector_start, 63 * SECTOR_SIZE as u32);
    assert_eq!(mailbox.sector_end, 64 * SECTOR_SIZE as u32 - 1);

    // one past the last: rejected, outputs untouched
    mailbox.command = Command::GetSectorStartEnd as u32;
    mailbox.sector_index = 64;
    programmer.process(&mut bus, &mut mailbox, &mut []);
    assert_eq!(mailbox.error, ErrorCode::InvalidSector);
    assert_eq!(mailbox.sector_start, 63 * SECTOR_SIZE as u32);
    assert_eq!(mailbox.sector_end, 64 * SECTOR_SIZE as u32 - 1);
}

#[test]
fn sector_number_lookup_by_offset() {
    let (mut bus, mut programmer) = setup();

    let mut mailbox = Mailbox {
        command: Command::GetSectorNum as u32,
        offset: 5 * SECTOR_SIZE as u32 + 0x123,
        ..Default::default()
    };
    programmer.process(&mut bus, &mut mailbox, &mut []);
    assert_eq!(mailbox.error, ErrorCode::NoError);
    assert_eq!(mailbox.sector_index, 5);

    mailbox.command = Command::GetSectorNum as u32;
    mailbox.offset = 64 * SECTOR_SIZE as u32;
    programmer.process(&mut bus, &mut mailbox, &mut []);
    assert_eq!(mailbox.error, ErrorCode::InvalidSector);
}

#[test]
fn reset_with_stuck_quad_enable_is_fatal() {
    let (mut bus, mut programmer) = setup();
    bus.set_stuck_qe();

    let mut mailbox = Mailbox {
        command: Command::Reset as u32,
        ..Default::default()
    };
    programmer.process(&mut bus, &mut mailbox, &mut []);
    assert_eq!(mailbox.error, ErrorCode::SetupError);
}

#[test]
fn reset_leaves_device_serviceable() {
    let (mut bus, mut programmer) = setup();

    let mut mailbox = Mailbox {
        command: Command::Reset as u32,
        ..Default::default()
    };
    programmer.process(&mut bus, &mut mailbox, &mut []);
    assert_eq!(mailbox.error, ErrorCode::NoError);

    issue(&mut bus, &mut programmer, &mut mailbox, Command::GetCodes);
    assert_eq!(mailbox.error, ErrorCode::NoError);
}
