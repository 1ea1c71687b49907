use std::time::{Duration, Instant};

use dfu::{ControlRecord, Direction, MockTransport};
use nusb::transfer::{ControlType, Recipient, TransferError};
use usbmux::{
    CONNECT_SETTLE_DELAY, DFU_ENTRY_DELAY, DISCONNECT_SETTLE_DELAY,
    DeviceIdentity, LinkState, Mux, MuxCommand, MuxError,
    SUPPORTED_PROTOCOL_VERSION, Version,
};

const IDLE_STATUS: [u8; 8] = [0xd0, 0x00, 0, 0, 0, 0, 0, 0x80];
const LOCKED_STATUS: [u8; 8] = [0xd0, 0x00, 0, 0, 0, 0, 0b0000_0001, 0x80];

fn identity() -> DeviceIdentity {
    DeviceIdentity {
        usb_path: "1-4.2".into(),
        serial_number: "00001.00020".into(),
        product_name: "USB-Mux".into(),
    }
}

fn open_mux(sw_version: &str) -> (Mux<MockTransport>, MockTransport) {
    let mock = MockTransport::new();
    mock.queue_in(&SUPPORTED_PROTOCOL_VERSION);
    mock.queue_in(sw_version.as_bytes());
    let mux = Mux::new(mock.clone(), identity()).unwrap();
    mock.clear_records();
    (mux, mock)
}

fn queue_statuses(mock: &MockTransport, count: usize) {
    for _ in 0..count {
        mock.queue_in(&IDLE_STATUS);
    }
}

fn commands(records: &[ControlRecord]) -> Vec<(u16, u16)> {
    records.iter().map(|r| (r.value, r.index)).collect()
}

/// Time between request `i - 1` and request `i`
fn gap_before(records: &[ControlRecord], i: usize) -> Duration {
    records[i].at.duration_since(records[i - 1].at)
}

const GET_STATUS: u16 = MuxCommand::GetStatus as u16;
const SET_POWER: u16 = MuxCommand::SetPower as u16;
const SET_DATA: u16 = MuxCommand::SetData as u16;
const SET_OTG: u16 = MuxCommand::SetOtg as u16;

#[test]
fn test_construction_reads_versions() {
    let mock = MockTransport::new();
    mock.queue_in(&SUPPORTED_PROTOCOL_VERSION);
    mock.queue_in(b"usbmux 0.1.2 2021-04-01");
    let mux = Mux::new(mock.clone(), identity()).unwrap();

    assert_eq!(mux.sw_version_num(), &Version::new([0, 1, 2]));
    assert!(mux.is_software_up_to_date());

    let records = mock.records();
    assert_eq!(commands(&records), vec![(255, 0), (254, 0)]);
    for rec in &records {
        assert_eq!(rec.direction, Direction::In);
        assert_eq!(rec.control_type, ControlType::Vendor);
        assert_eq!(rec.recipient, Recipient::Device);
        assert_eq!(rec.request, 0xff);
        assert_eq!(rec.length, 128);
    }
}

#[test]
fn test_protocol_version_mismatch() {
    let mock = MockTransport::new();
    mock.queue_in(&[0, 0, 0, 0, 0, 0, 0, 1]);
    assert!(matches!(
        Mux::new(mock, identity()),
        Err(MuxError::ProtocolVersionMismatch(v))
            if v == [0, 0, 0, 0, 0, 0, 0, 1]
    ));
}

#[test]
fn test_unreadable_protocol_version_is_privilege_problem() {
    let mock = MockTransport::new();
    mock.queue_in(&[]);
    assert!(matches!(
        Mux::new(mock, identity()),
        Err(MuxError::InsufficientPrivileges)
    ));
}

#[test]
fn test_invalid_software_version() {
    let mock = MockTransport::new();
    mock.queue_in(&SUPPORTED_PROTOCOL_VERSION);
    mock.queue_in(b"garbage");
    assert!(matches!(
        Mux::new(mock, identity()),
        Err(MuxError::InvalidSoftwareVersion(_))
    ));
}

#[test]
fn test_get_status() {
    let (mux, mock) = open_mux("usbmux 0.1.2 2021-04-01");
    mock.queue_in(&[
        0x80, 0x00, 0x40, 0x00, 0x20, 0x00, 0b0000_0101, 0b1000_0000,
    ]);
    let st = mux.get_status().unwrap();
    assert!((st.voltage_host - 4.95).abs() < 0.001);
    assert!(st.dut_power_lockout);
    assert!(!st.dut_otg_output);
    assert!(st.dut_otg_input);
    assert_eq!(st.power_links, LinkState::DeviceHost);
    assert_eq!(st.data_links, LinkState::None);
    assert_eq!(st.device.identity, identity());
    assert_eq!(st.device.sw_version, "usbmux 0.1.2 2021-04-01");
    assert!(st.device.sw_up_to_date);
    assert_eq!(commands(&mock.records()), vec![(GET_STATUS, 0)]);
}

#[test]
fn test_get_status_short_packet() {
    let (mux, mock) = open_mux("usbmux 0.1.2 2021-04-01");
    mock.queue_in(&[0; 7]);
    assert!(matches!(
        mux.get_status(),
        Err(MuxError::InvalidPacketLength(7))
    ));
}

#[test]
fn test_device_vanished() {
    let (mux, mock) = open_mux("usbmux 0.1.2 2021-04-01");
    mock.disconnect();
    assert!(matches!(mux.get_status(), Err(MuxError::DeviceVanished)));
}

#[test]
fn test_software_up_to_date() {
    let (mut mux, _) = open_mux("usbmux 1.2 2022-01-01");
    mux.set_firmware_version(Version::new([1, 2]));
    assert!(mux.is_software_up_to_date());

    let (mut mux, _) = open_mux("usbmux 1.1 2021-01-01");
    mux.set_firmware_version(Version::new([1, 2]));
    assert!(!mux.is_software_up_to_date());

    // older than the bundled 0.1.2
    let (mux, mock) = open_mux("usbmux 0.1.1 2021-01-01");
    assert!(!mux.is_software_up_to_date());
    queue_statuses(&mock, 1);
    assert!(!mux.get_status().unwrap().device.sw_up_to_date);
}

#[test]
fn test_pull_otg_id_low() {
    let (mux, mock) = open_mux("usbmux 0.1.2 2021-04-01");
    mock.queue_in(&[0, 0, 0, 0, 0, 0, 0b10, 0]);
    assert!(mux.pull_otg_id_low(true).unwrap().dut_otg_output);
    queue_statuses(&mock, 1);
    mux.pull_otg_id_low(false).unwrap();
    assert_eq!(commands(&mock.records()), vec![(SET_OTG, 1), (SET_OTG, 0)]);
}

#[test]
fn test_connect_refused_when_locked_out() {
    for target in [LinkState::DutHost, LinkState::DutHostDeviceHost] {
        let (mux, mock) = open_mux("usbmux 0.1.2 2021-04-01");
        mock.queue_in(&LOCKED_STATUS);
        queue_statuses(&mock, 6);
        assert!(matches!(
            mux.connect(target, Some(false)),
            Err(MuxError::ConnectionLockedOut(link)) if link == target
        ));
        // only the status query, no SET_POWER / SET_DATA
        assert_eq!(commands(&mock.records()), vec![(GET_STATUS, 0)]);
    }
}

#[test]
fn test_connect_ignores_lockout_for_other_links() {
    let (mux, mock) = open_mux("usbmux 0.1.2 2021-04-01");
    queue_statuses(&mock, 4);
    mux.connect(LinkState::DeviceHost, None).unwrap();
    assert_eq!(
        commands(&mock.records()),
        vec![(SET_POWER, 0), (SET_DATA, 0), (SET_POWER, 1), (SET_DATA, 1)]
    );
}

#[test]
fn test_connect_sequence_and_delays() {
    let (mux, mock) = open_mux("usbmux 0.1.2 2021-04-01");
    queue_statuses(&mock, 7);
    mux.connect(LinkState::DutHost, Some(false)).unwrap();
    let done = Instant::now();

    let records = mock.records();
    assert_eq!(
        commands(&records),
        vec![
            (GET_STATUS, 0),
            (SET_POWER, 0),
            (SET_DATA, 0),
            (SET_OTG, 0),
            (SET_POWER, 2),
            (SET_DATA, 2),
            (SET_OTG, 0),
        ]
    );
    // all clearing transfers go out before the settle time
    assert!(gap_before(&records, 2) < DISCONNECT_SETTLE_DELAY);
    assert!(gap_before(&records, 3) < DISCONNECT_SETTLE_DELAY);
    assert!(gap_before(&records, 4) >= DISCONNECT_SETTLE_DELAY);
    // all setting transfers go out before the second settle time
    assert!(gap_before(&records, 5) < CONNECT_SETTLE_DELAY);
    assert!(gap_before(&records, 6) < CONNECT_SETTLE_DELAY);
    assert!(done.duration_since(records[6].at) >= CONNECT_SETTLE_DELAY);
}

#[test]
fn test_connect_without_id_settles_between_clear_and_set() {
    let (mux, mock) = open_mux("usbmux 0.1.2 2021-04-01");
    queue_statuses(&mock, 4);
    mux.connect(LinkState::DeviceHost, None).unwrap();
    let done = Instant::now();

    let records = mock.records();
    assert_eq!(records.len(), 4);
    assert!(gap_before(&records, 1) < DISCONNECT_SETTLE_DELAY);
    assert!(gap_before(&records, 2) >= DISCONNECT_SETTLE_DELAY);
    assert!(gap_before(&records, 3) < CONNECT_SETTLE_DELAY);
    assert!(done.duration_since(records[3].at) >= CONNECT_SETTLE_DELAY);
}

#[test]
fn test_connect_dut_device_pulls_id_low() {
    let (mux, mock) = open_mux("usbmux 0.1.2 2021-04-01");
    queue_statuses(&mock, 6);
    mux.connect(LinkState::DutDevice, Some(true)).unwrap();
    assert_eq!(
        commands(&mock.records()),
        vec![
            (SET_POWER, 0),
            (SET_DATA, 0),
            (SET_OTG, 0),
            (SET_POWER, 4),
            (SET_DATA, 4),
            (SET_OTG, 1),
        ]
    );
}

#[test]
fn test_connect_is_not_skipped_when_already_applied() {
    let (mux, mock) = open_mux("usbmux 0.1.2 2021-04-01");
    queue_statuses(&mock, 8);
    // IDLE_STATUS reports no links, so None is already applied
    mux.connect(LinkState::None, None).unwrap();
    mux.connect(LinkState::None, None).unwrap();
    let cmds = commands(&mock.records());
    assert_eq!(cmds.len(), 8);
    assert_eq!(
        cmds[..4],
        [(SET_POWER, 0), (SET_DATA, 0), (SET_POWER, 0), (SET_DATA, 0)]
    );
    assert_eq!(cmds[..4], cmds[4..]);
}

#[test]
fn test_enter_dfu_swallows_reset() {
    let (mux, mock) = open_mux("usbmux 0.1.2 2021-04-01");
    queue_statuses(&mock, 2);
    mock.queue_in_error(TransferError::Disconnected);
    mux.enter_dfu().unwrap();
    let records = mock.records();
    assert_eq!(
        commands(&records),
        vec![(SET_POWER, 0), (SET_DATA, 0), (MuxCommand::Dfu as u16, 0)]
    );
    assert!(gap_before(&records, 1) < DFU_ENTRY_DELAY);
    assert!(gap_before(&records, 2) >= DFU_ENTRY_DELAY);
}

#[test]
fn test_enter_dfu_fails_if_links_cannot_be_cleared() {
    let (mux, mock) = open_mux("usbmux 0.1.2 2021-04-01");
    mock.queue_in_error(TransferError::Stall);
    assert!(matches!(mux.enter_dfu(), Err(MuxError::Transfer(_))));
    assert_eq!(mock.records().len(), 1);
}
