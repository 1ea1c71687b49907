use serde::Serialize;

use crate::{DeviceIdentity, LinkState, MuxError, Version};

pub const STATUS_PACKET_LEN: usize = 8;

// ADC calibration: 3.3 V full scale behind a 1/3 divider, 16 bit
const ADC_RANGE: f64 = ((1 << 16) - 1) as f64;
const ADC_SCALE: f64 = 3.3 * 3.0;

const LOCKOUT_BIT: u8 = 1 << 0;
const OTG_OUTPUT_BIT: u8 = 1 << 1;
const OTG_INPUT_BIT: u8 = 1 << 7;
const POWER_LINKS_SHIFT: u8 = 2;
const DATA_LINKS_SHIFT: u8 = 5;
const LINKS_MASK: u8 = 0b111;

pub fn adc_to_volts(raw: u16) -> f64 {
    raw as f64 * ADC_SCALE / ADC_RANGE
}

/// Device information attached to every status
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DeviceStatus {
    #[serde(flatten)]
    pub identity: DeviceIdentity,
    pub sw_version: String,
    pub sw_version_num: Version,
    pub sw_up_to_date: bool,
}

/// Status of the USB-Mux as returned by every vendor request
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub voltage_host: f64,
    pub voltage_device: f64,
    pub voltage_dut: f64,
    /// The 'Lock' switch forbids powering the DUT from the Host
    pub dut_power_lockout: bool,
    /// Open-drain output on the DUT ID pin, `true` pulls low
    pub dut_otg_output: bool,
    /// Level measured on the DUT ID pin
    pub dut_otg_input: bool,
    pub power_links: LinkState,
    pub data_links: LinkState,
    pub device: DeviceStatus,
}

impl StatusSnapshot {
    /// Decode an 8 byte status packet.
    ///
    /// Layout: three big endian ADC readings (host, device, DUT), a flags
    /// byte holding lockout, OTG output, power links (bits 2-4) and data
    /// links (bits 5-7), and a byte whose MSB is the OTG input level.
    pub fn decode(pkg: &[u8], device: DeviceStatus) -> Result<Self, MuxError> {
        if pkg.len() != STATUS_PACKET_LEN {
            return Err(MuxError::InvalidPacketLength(pkg.len()));
        }
        let adc = |i: usize| {
            adc_to_volts(u16::from_be_bytes([pkg[i], pkg[i + 1]]))
        };
        let link = |shift: u8| {
            let code = (pkg[6] >> shift) & LINKS_MASK;
            LinkState::try_from(code)
                .map_err(|_| MuxError::InvalidLinkState(code))
        };
        Ok(StatusSnapshot {
            voltage_host: adc(0),
            voltage_device: adc(2),
            voltage_dut: adc(4),
            dut_power_lockout: pkg[6] & LOCKOUT_BIT != 0,
            dut_otg_output: pkg[6] & OTG_OUTPUT_BIT != 0,
            dut_otg_input: pkg[7] & OTG_INPUT_BIT != 0,
            power_links: link(POWER_LINKS_SHIFT)?,
            data_links: link(DATA_LINKS_SHIFT)?,
            device,
        })
    }
}
