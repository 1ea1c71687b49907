use std::process::ExitStatus;

use dfu::{DfuError, DfuUtilError};

use crate::{LinkState, Selector};

#[derive(Debug)]
pub enum MuxError {
    Usb(nusb::Error),
    Transfer(nusb::transfer::TransferError),
    /// The device disappeared from the bus during a transfer
    DeviceVanished,
    /// Nothing matched the selector
    DeviceNotFound(Selector),
    /// A USB-Mux is present but cannot be accessed (udev rules?)
    InsufficientPrivileges,
    ProtocolVersionMismatch(Vec<u8>),
    InvalidPacketLength(usize),
    /// The power lockout switch forbids the requested DUT-Host link
    ConnectionLockedOut(LinkState),
    /// Link code out of range, a programming error
    InvalidLinkArgument(u8),
    /// Link code in a status packet out of range
    InvalidLinkState(u8),
    InvalidSoftwareVersion(String),
}

impl std::error::Error for MuxError {}

impl std::fmt::Display for MuxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MuxError::Usb(err) => write!(f, "USB error: {}", err),
            MuxError::Transfer(err) => write!(f, "Transfer error: {}", err),
            MuxError::DeviceVanished => {
                write!(f, "USB-Mux disappeared from the bus")
            }
            MuxError::DeviceNotFound(selector) => {
                write!(f, "Failed to find the defined USB-Mux ({selector})")
            }
            MuxError::InsufficientPrivileges => write!(
                f,
                "Could not communicate with USB-Mux. Check privileges, maybe add udev-rule"
            ),
            MuxError::ProtocolVersionMismatch(version) => write!(
                f,
                "The protocol version reported by the USB-Mux ({:?}) is not supported",
                version
            ),
            MuxError::InvalidPacketLength(len) => {
                write!(f, "Invalid status packet length: {} bytes", len)
            }
            MuxError::ConnectionLockedOut(link) => write!(
                f,
                "{} connection is locked in hardware. Refusing to set connection. \
                 Maybe set 'Lock' switch in the other position?",
                link
            ),
            MuxError::InvalidLinkArgument(code) => {
                write!(f, "{} is not a valid link id", code)
            }
            MuxError::InvalidLinkState(code) => {
                write!(f, "USB-Mux reported invalid link id {}", code)
            }
            MuxError::InvalidSoftwareVersion(version) => {
                write!(f, "Invalid software version string {:?}", version)
            }
        }
    }
}

impl From<nusb::Error> for MuxError {
    fn from(err: nusb::Error) -> Self {
        MuxError::Usb(err)
    }
}

impl From<nusb::transfer::TransferError> for MuxError {
    fn from(err: nusb::transfer::TransferError) -> Self {
        match err {
            nusb::transfer::TransferError::Disconnected => {
                MuxError::DeviceVanished
            }
            err => MuxError::Transfer(err),
        }
    }
}

/// Failure of a firmware update
///
/// Any error after the USB-Mux entered its bootloader leaves it there, it
/// has to be resumed with [resume_user_code](crate::resume_user_code) or
/// power cycled.
#[derive(Debug)]
pub enum UpdateError {
    /// `dfu-util` is not installed, nothing was done
    FlashToolNotFound(String),
    FlashToolFailed(ExitStatus),
    FlashToolIo(std::io::Error),
    Mux(MuxError),
    Dfu(DfuError),
}

impl std::error::Error for UpdateError {}

impl std::fmt::Display for UpdateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateError::FlashToolNotFound(cmd) => write!(
                f,
                "Could not find tool '{}'. Please install using your package manager and re-run this command.",
                cmd
            ),
            UpdateError::FlashToolFailed(status) => write!(
                f,
                "'dfu-util' failed: '{}'. Please check the log above for hints how to fix this.",
                status
            ),
            UpdateError::FlashToolIo(err) => {
                write!(f, "Could not run 'dfu-util': {}", err)
            }
            UpdateError::Mux(err) => write!(f, "{}", err),
            UpdateError::Dfu(err) => write!(f, "DFU error: {}", err),
        }
    }
}

impl From<DfuUtilError> for UpdateError {
    fn from(err: DfuUtilError) -> Self {
        match err {
            DfuUtilError::NotFound(cmd) => UpdateError::FlashToolNotFound(cmd),
            DfuUtilError::Failed(status) => {
                UpdateError::FlashToolFailed(status)
            }
            DfuUtilError::Io(err) => UpdateError::FlashToolIo(err),
        }
    }
}

impl From<MuxError> for UpdateError {
    fn from(err: MuxError) -> Self {
        UpdateError::Mux(err)
    }
}

impl From<DfuError> for UpdateError {
    fn from(err: DfuError) -> Self {
        UpdateError::Dfu(err)
    }
}
