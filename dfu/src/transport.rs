use nusb::{
    MaybeFuture,
    transfer::{ControlIn, ControlOut, TransferError},
};

use crate::DEFAULT_TIMEOUT;

/// Blocking USB control transfers
///
/// Both the DFU driver and the USB-Mux driver only ever need control
/// transfers, so this is the single seam between the protocol code and the
/// host USB stack. `MockTransport` (feature `mock`) implements it for
/// tests.
pub trait ControlTransport {
    /// Device-to-host transfer, returns the bytes actually received
    fn control_in(&self, request: ControlIn) -> Result<Vec<u8>, TransferError>;

    /// Host-to-device transfer
    fn control_out(&self, request: ControlOut<'_>)
    -> Result<(), TransferError>;
}

impl ControlTransport for nusb::Device {
    fn control_in(&self, request: ControlIn) -> Result<Vec<u8>, TransferError> {
        nusb::Device::control_in(self, request, DEFAULT_TIMEOUT).wait()
    }

    fn control_out(
        &self,
        request: ControlOut<'_>,
    ) -> Result<(), TransferError> {
        nusb::Device::control_out(self, request, DEFAULT_TIMEOUT).wait()
    }
}

impl ControlTransport for nusb::Interface {
    fn control_in(&self, request: ControlIn) -> Result<Vec<u8>, TransferError> {
        nusb::Interface::control_in(self, request, DEFAULT_TIMEOUT).wait()
    }

    fn control_out(
        &self,
        request: ControlOut<'_>,
    ) -> Result<(), TransferError> {
        nusb::Interface::control_out(self, request, DEFAULT_TIMEOUT).wait()
    }
}
