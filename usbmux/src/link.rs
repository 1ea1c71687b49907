use std::fmt;

use serde::Serialize;

use crate::MuxError;

/// Connection between the ports of the USB-Mux
///
/// Power and data lines each have their own link state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LinkState {
    #[serde(rename = "None")]
    None = 0,
    #[serde(rename = "Device-Host")]
    DeviceHost = 1,
    #[serde(rename = "DUT-Host")]
    DutHost = 2,
    #[serde(rename = "DUT-Host Device-Host")]
    DutHostDeviceHost = 3,
    #[serde(rename = "DUT-Device")]
    DutDevice = 4,
}

impl LinkState {
    pub const ALL: [LinkState; 5] = [
        LinkState::None,
        LinkState::DeviceHost,
        LinkState::DutHost,
        LinkState::DutHostDeviceHost,
        LinkState::DutDevice,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether the link connects the DUT to the Host, which the power
    /// lockout switch can forbid
    pub fn includes_dut_host(self) -> bool {
        matches!(self, LinkState::DutHost | LinkState::DutHostDeviceHost)
    }

    pub fn name(self) -> &'static str {
        match self {
            LinkState::None => "None",
            LinkState::DeviceHost => "Device-Host",
            LinkState::DutHost => "DUT-Host",
            LinkState::DutHostDeviceHost => "DUT-Host Device-Host",
            LinkState::DutDevice => "DUT-Device",
        }
    }
}

impl TryFrom<u8> for LinkState {
    type Error = MuxError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        LinkState::ALL
            .get(code as usize)
            .copied()
            .ok_or(MuxError::InvalidLinkArgument(code))
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
