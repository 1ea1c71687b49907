use std::{thread::sleep, time::Duration};

use dfu::ControlTransport;
use log::{debug, info, warn};
use nusb::transfer::{ControlIn, ControlType, Recipient};

use crate::{
    DeviceIdentity, DeviceStatus, FIRMWARE_VERSION, LinkState, MUX_USB_IDS,
    MuxError, Selector, StatusSnapshot, Version, locate,
};

const MUX_REQUEST: u8 = 0xff;
const MUX_REPLY_LEN: u16 = 128;

/// The only protocol version this driver speaks
pub const SUPPORTED_PROTOCOL_VERSION: [u8; 8] = [0; 8];

/// Time for downstream devices to power off after all links were cleared
pub const DISCONNECT_SETTLE_DELAY: Duration = Duration::from_millis(500);
/// Time for the analog switches to settle after connecting
pub const CONNECT_SETTLE_DELAY: Duration = Duration::from_millis(300);
/// Pause between clearing the links and rebooting into the bootloader
pub const DFU_ENTRY_DELAY: Duration = Duration::from_millis(100);

/// Vendor requests, sent as `wValue` of request `0xff`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MuxCommand {
    GetStatus = 0,
    SetPower = 1,
    SetData = 2,
    SetOtg = 3,
    Dfu = 42,
    SwVersion = 254,
    ProtoVersion = 255,
}

/// Driver for one USB-Mux
///
/// Holds the device open for its whole lifetime and assumes nobody else
/// talks to the same device meanwhile.
pub struct Mux<T: ControlTransport = nusb::Device> {
    transport: T,
    identity: DeviceIdentity,
    sw_version: String,
    sw_version_num: Version,
    firmware_version: Version,
}

impl Mux {
    /// Locate and open a USB-Mux.
    pub fn open(selector: &Selector) -> Result<Self, MuxError> {
        let located = locate(MUX_USB_IDS, selector)?;
        Mux::new(located.device, located.identity)
    }
}

impl<T: ControlTransport> Mux<T> {
    /// Set up the driver on an already opened device.
    ///
    /// Checks the protocol version and reads the software version.
    pub fn new(
        transport: T,
        identity: DeviceIdentity,
    ) -> Result<Self, MuxError> {
        let mut mux = Mux {
            transport,
            identity,
            sw_version: String::new(),
            sw_version_num: Version::default(),
            firmware_version: Version::new(FIRMWARE_VERSION),
        };

        let proto_version = mux.send_cmd(MuxCommand::ProtoVersion, 0)?;
        // a device that cannot be read properly is not one we may talk to
        if proto_version.len() != SUPPORTED_PROTOCOL_VERSION.len() {
            return Err(MuxError::InsufficientPrivileges);
        }
        if proto_version != SUPPORTED_PROTOCOL_VERSION {
            return Err(MuxError::ProtocolVersionMismatch(proto_version));
        }

        let sw_version = mux.send_cmd(MuxCommand::SwVersion, 0)?;
        mux.sw_version = String::from_utf8_lossy(&sw_version)
            .trim_end_matches('\0')
            .to_string();
        mux.sw_version_num = Version::from_sw_string(&mux.sw_version)?;
        debug!(
            "USB-Mux {} runs {}",
            mux.identity.serial_number, mux.sw_version
        );
        Ok(mux)
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn sw_version(&self) -> &str {
        &self.sw_version
    }

    pub fn sw_version_num(&self) -> &Version {
        &self.sw_version_num
    }

    /// Compare against another firmware than the bundled one.
    pub fn set_firmware_version(&mut self, version: Version) {
        self.firmware_version = version;
    }

    /// Whether the device runs at least the firmware version we know of.
    pub fn is_software_up_to_date(&self) -> bool {
        self.firmware_version <= self.sw_version_num
    }

    pub fn get_status(&self) -> Result<StatusSnapshot, MuxError> {
        let data = self.send_cmd(MuxCommand::GetStatus, 0)?;
        self.parse_status(&data)
    }

    /// Apply `code` to the power links.
    ///
    /// If the DUT-Host link is locked in hardware the request still
    /// succeeds but the link is not set, which the returned status shows.
    pub(crate) fn set_power_link(
        &self,
        code: u8,
    ) -> Result<StatusSnapshot, MuxError> {
        let link = LinkState::try_from(code)?;
        debug!("Set power links: {link}");
        let data = self.send_cmd(MuxCommand::SetPower, link.code() as u16)?;
        self.parse_status(&data)
    }

    /// Apply `code` to the data links, see [Mux::set_power_link].
    pub(crate) fn set_data_link(
        &self,
        code: u8,
    ) -> Result<StatusSnapshot, MuxError> {
        let link = LinkState::try_from(code)?;
        debug!("Set data links: {link}");
        let data = self.send_cmd(MuxCommand::SetData, link.code() as u16)?;
        self.parse_status(&data)
    }

    /// Pull the ID pin of the DUT port low, or let it float (100k pull-up).
    pub fn pull_otg_id_low(
        &self,
        low: bool,
    ) -> Result<StatusSnapshot, MuxError> {
        debug!("Pull OTG ID low: {low}");
        let data = self.send_cmd(MuxCommand::SetOtg, low as u16)?;
        self.parse_status(&data)
    }

    /// Switch power and data links to `target`.
    ///
    /// All links are cleared first, which power cycles every attached
    /// device, even if `target` is already applied. `id_pull_low` controls
    /// the DUT ID pin: `None` leaves it alone, otherwise it floats while
    /// disconnected and is set to the given state with the new links.
    ///
    /// A DUT-Host link is refused while the power lockout switch is set.
    pub fn connect(
        &self,
        target: LinkState,
        id_pull_low: Option<bool>,
    ) -> Result<(), MuxError> {
        if target.includes_dut_host() && self.get_status()?.dut_power_lockout {
            return Err(MuxError::ConnectionLockedOut(target));
        }
        info!("Connecting {target}");

        self.set_power_link(LinkState::None.code())?;
        self.set_data_link(LinkState::None.code())?;
        if id_pull_low.is_some() {
            self.pull_otg_id_low(false)?;
        }

        sleep(DISCONNECT_SETTLE_DELAY);

        self.set_power_link(target.code())?;
        self.set_data_link(target.code())?;
        if let Some(low) = id_pull_low {
            self.pull_otg_id_low(low)?;
        }

        sleep(CONNECT_SETTLE_DELAY);
        Ok(())
    }

    /// Disconnect everything and reboot into the ROM bootloader.
    ///
    /// The device resets right away, so the reboot request itself is not
    /// expected to complete. To resume normal operation the device has to
    /// leave the bootloader or be power cycled.
    pub fn enter_dfu(&self) -> Result<(), MuxError> {
        info!("Entering DFU mode");
        self.set_power_link(LinkState::None.code())?;
        self.set_data_link(LinkState::None.code())?;

        sleep(DFU_ENTRY_DELAY);
        if let Err(err) = self.send_cmd(MuxCommand::Dfu, 0) {
            warn!("Ignoring error of DFU request: {err}");
        }
        Ok(())
    }

    fn device_status(&self) -> DeviceStatus {
        DeviceStatus {
            identity: self.identity.clone(),
            sw_version: self.sw_version.clone(),
            sw_version_num: self.sw_version_num.clone(),
            sw_up_to_date: self.is_software_up_to_date(),
        }
    }

    fn parse_status(&self, data: &[u8]) -> Result<StatusSnapshot, MuxError> {
        StatusSnapshot::decode(data, self.device_status())
    }

    fn send_cmd(&self, cmd: MuxCommand, arg: u16) -> Result<Vec<u8>, MuxError> {
        let data = self.transport.control_in(ControlIn {
            control_type: ControlType::Vendor,
            recipient: Recipient::Device,
            request: MUX_REQUEST,
            value: cmd as u16,
            index: arg,
            length: MUX_REPLY_LEN,
        })?;
        debug!("{cmd:?}({arg}) -> {data:02x?}");
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use dfu::MockTransport;

    use super::*;

    fn mux() -> (Mux<MockTransport>, MockTransport) {
        let mock = MockTransport::new();
        mock.queue_in(&SUPPORTED_PROTOCOL_VERSION);
        mock.queue_in(b"usbmux 0.1.2 2021-04-01\0");
        let mux = Mux::new(mock.clone(), DeviceIdentity::default()).unwrap();
        mock.clear_records();
        (mux, mock)
    }

    #[test]
    fn test_invalid_link_code_not_sent() {
        let (mux, mock) = mux();
        assert!(matches!(
            mux.set_power_link(5),
            Err(MuxError::InvalidLinkArgument(5))
        ));
        assert!(matches!(
            mux.set_data_link(5),
            Err(MuxError::InvalidLinkArgument(5))
        ));
        assert!(mock.records().is_empty());
    }

    #[test]
    fn test_set_links() {
        let (mux, mock) = mux();
        // power links Device-Host
        mock.queue_in(&[0, 0, 0, 0, 0, 0, 1 << 2, 0]);
        let st = mux.set_power_link(1).unwrap();
        assert_eq!(st.power_links, LinkState::DeviceHost);
        mock.queue_in(&[0, 0, 0, 0, 0, 0, 4 << 5, 0]);
        let st = mux.set_data_link(4).unwrap();
        assert_eq!(st.data_links, LinkState::DutDevice);

        let records = mock.records();
        assert_eq!((records[0].value, records[0].index), (1, 1));
        assert_eq!((records[1].value, records[1].index), (2, 4));
    }

    #[test]
    fn test_sw_version_trailing_nul() {
        let (mux, _) = mux();
        assert_eq!(mux.sw_version(), "usbmux 0.1.2 2021-04-01");
        assert_eq!(mux.sw_version_num(), &Version::new([0, 1, 2]));
    }
}
