use crate::DfuStatus;

#[derive(Debug)]
pub enum DfuError {
    Usb(nusb::Error),
    Transfer(nusb::transfer::TransferError),
    /// The device disappeared from the bus during a transfer
    DeviceVanished,
    /// The device reported a status other than OK
    Status(DfuStatus),
    /// The status is OK but the device is not in the expected state
    UnexpectedState(DfuStatus),
    InvalidStatusLength(usize),
    UnknownStatus(u8),
    UnknownState(u8),
    ShortRead {
        expected: usize,
        received: usize,
    },
    NoDfuDevice,
    ManyDfuDevices(Vec<String>),
}

impl std::error::Error for DfuError {}

impl std::fmt::Display for DfuError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DfuError::Usb(err) => write!(f, "USB error: {}", err),
            DfuError::Transfer(err) => write!(f, "Transfer error: {}", err),
            DfuError::DeviceVanished => {
                write!(f, "DFU device disappeared from the bus")
            }
            DfuError::Status(st) => write!(f, "DFU status error: {}", st),
            DfuError::UnexpectedState(st) => {
                write!(f, "Unexpected DFU state: {}", st)
            }
            DfuError::InvalidStatusLength(len) => {
                write!(f, "Invalid DFU status length: {} bytes", len)
            }
            DfuError::UnknownStatus(code) => {
                write!(f, "Unknown DFU status code {:#04x}", code)
            }
            DfuError::UnknownState(code) => {
                write!(f, "Unknown DFU state {:#04x}", code)
            }
            DfuError::ShortRead { expected, received } => write!(
                f,
                "Short read: expected {} bytes, received {}",
                expected, received
            ),
            DfuError::NoDfuDevice => write!(f, "No DFU device found"),
            DfuError::ManyDfuDevices(paths) => write!(
                f,
                "More than one DFU device found, select one of: {}",
                paths.join(", ")
            ),
        }
    }
}

impl From<nusb::Error> for DfuError {
    fn from(err: nusb::Error) -> Self {
        DfuError::Usb(err)
    }
}

impl From<nusb::transfer::TransferError> for DfuError {
    fn from(err: nusb::transfer::TransferError) -> Self {
        match err {
            nusb::transfer::TransferError::Disconnected => {
                DfuError::DeviceVanished
            }
            err => DfuError::Transfer(err),
        }
    }
}
