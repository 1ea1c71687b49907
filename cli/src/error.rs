use std::fmt::Display;

use dfu::DfuError;
use usbmux::{MuxError, UpdateError};

pub enum CliError {
    Mux(MuxError),
    Update(UpdateError),
    Dfu(DfuError),
    /// DUT-Device cannot be combined with other links
    InvalidLinks,
    NoSelector,
}

impl From<MuxError> for CliError {
    fn from(value: MuxError) -> Self {
        CliError::Mux(value)
    }
}

impl From<UpdateError> for CliError {
    fn from(value: UpdateError) -> Self {
        CliError::Update(value)
    }
}

impl From<DfuError> for CliError {
    fn from(value: DfuError) -> Self {
        CliError::Dfu(value)
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Mux(err) => write!(f, "{err}"),
            CliError::Update(err) => write!(f, "{err}"),
            CliError::Dfu(err) => write!(f, "DFU error: {err}"),
            CliError::InvalidLinks => write!(
                f,
                "DUT-Device can not be combined with other connections"
            ),
            CliError::NoSelector => write!(f, "No serial number or path"),
        }
    }
}
