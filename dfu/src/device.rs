use log::debug;
use nusb::{self, MaybeFuture};

use crate::{DFU_PRODUCT_ID, DFU_VENDOR_ID, DfuConnection, DfuError, usb_path};

const DFU_INTERFACE: u8 = 0;
const DFU_ALT_SETTING: u8 = 0;

/// A device enumerated under the ROM bootloader's USB identity
pub struct DfuDevice {
    dev: nusb::DeviceInfo,
}

impl DfuDevice {
    pub fn device_info(&self) -> &nusb::DeviceInfo {
        &self.dev
    }

    pub fn vendor_id(&self) -> u16 {
        self.dev.vendor_id()
    }

    pub fn product_id(&self) -> u16 {
        self.dev.product_id()
    }

    /// Bus path of the device, see [usb_path]
    pub fn path(&self) -> String {
        usb_path(&self.dev)
    }

    /// Connect to the DFU interface
    ///
    /// The interface is released when the connection is dropped.
    pub fn connect(&self) -> Result<DfuConnection, DfuError> {
        let dev = self.dev.open().wait()?;
        let interface = dev.claim_interface(DFU_INTERFACE).wait()?;
        interface.set_alt_setting(DFU_ALT_SETTING).wait()?;
        Ok(DfuConnection::new(interface, DFU_INTERFACE))
    }
}

/// List all bootloader devices, optionally only the one at `path`.
pub fn find_dfu_devices(
    path: Option<&str>,
) -> Result<Vec<DfuDevice>, DfuError> {
    let devices: Vec<DfuDevice> = nusb::list_devices()
        .wait()?
        .filter(|dev| {
            dev.vendor_id() == DFU_VENDOR_ID
                && dev.product_id() == DFU_PRODUCT_ID
        })
        .filter(|dev| path.is_none_or(|p| usb_path(dev) == p))
        .map(|dev| DfuDevice { dev })
        .collect();
    debug!("Found {} DFU devices", devices.len());
    Ok(devices)
}

/// Find exactly one bootloader device, optionally at `path`.
pub fn find_dfu_device(path: Option<&str>) -> Result<DfuDevice, DfuError> {
    select_one(find_dfu_devices(path)?, DfuDevice::path)
}

fn select_one<D>(
    devices: Vec<D>,
    path_of: impl Fn(&D) -> String,
) -> Result<D, DfuError> {
    if devices.len() > 1 {
        return Err(DfuError::ManyDfuDevices(
            devices.iter().map(path_of).collect(),
        ));
    }
    devices.into_iter().next().ok_or(DfuError::NoDfuDevice)
}
