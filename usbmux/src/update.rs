use std::{path::Path, thread::sleep, time::Duration};

use dfu::{
    ControlTransport, DfuConnection, DfuError, DfuUtil, find_dfu_device,
};
use log::info;

use crate::{Mux, UpdateError};

/// Time for the ROM bootloader to enumerate after the reboot request
pub const BOOTLOADER_ENUMERATION_DELAY: Duration = Duration::from_secs(1);

/// The ROM bootloader a USB-Mux reboots into
///
/// [update_firmware] finds it on the host USB stack, tests provide their
/// own.
pub trait Bootloader {
    type Transport: ControlTransport;

    /// Find the bootloader at `usb_path`, returns the path to hand to
    /// `dfu-util`.
    fn locate(&self, usb_path: &str) -> Result<String, DfuError>;

    /// Open the DFU interface of the bootloader at `usb_path`.
    fn connect(
        &self,
        usb_path: &str,
    ) -> Result<DfuConnection<Self::Transport>, DfuError>;
}

/// Bootloader enumerated as `0483:df11`
pub struct UsbBootloader;

impl Bootloader for UsbBootloader {
    type Transport = nusb::Interface;

    fn locate(&self, usb_path: &str) -> Result<String, DfuError> {
        Ok(find_dfu_device(Some(usb_path))?.path())
    }

    fn connect(
        &self,
        usb_path: &str,
    ) -> Result<DfuConnection<nusb::Interface>, DfuError> {
        find_dfu_device(Some(usb_path))?.connect()
    }
}

/// Flash `image` onto the USB-Mux and restart it.
///
/// Fails before touching the device if `dfu-util` is missing. Once the
/// device entered its bootloader there is no automatic recovery: on error
/// it stays there until [resume_user_code] or a power cycle.
pub fn update_firmware<T: ControlTransport>(
    mux: &Mux<T>,
    image: &Path,
    tool: &DfuUtil,
) -> Result<(), UpdateError> {
    update_firmware_with(mux, image, tool, &UsbBootloader)
}

/// [update_firmware] reaching the bootloader through `bootloader`.
pub fn update_firmware_with<T: ControlTransport, B: Bootloader>(
    mux: &Mux<T>,
    image: &Path,
    tool: &DfuUtil,
    bootloader: &B,
) -> Result<(), UpdateError> {
    let tool_version = tool.version()?;
    info!("Using {tool_version}");

    let usb_path = mux.identity().usb_path.clone();
    info!(
        "Updating USB-Mux {} @ {}",
        mux.identity().serial_number,
        usb_path
    );
    mux.enter_dfu()?;
    sleep(BOOTLOADER_ENUMERATION_DELAY);

    // the bootloader shows up under its own ids at the same bus path
    let dfu_path = bootloader.locate(&usb_path)?;
    tool.flash_firmware(image, &dfu_path)?;

    bootloader.connect(&dfu_path)?.enter_user_code()?;
    Ok(())
}

/// Flash a configuration block onto a USB-Mux already in its bootloader.
pub fn flash_config(
    usb_path: Option<&str>,
    image: &Path,
    tool: &DfuUtil,
) -> Result<(), UpdateError> {
    let device = find_dfu_device(usb_path)?;
    tool.flash_config(image, &device.path())?;
    Ok(())
}

/// Leave the bootloader of a USB-Mux, e.g. after a failed update.
pub fn resume_user_code(usb_path: Option<&str>) -> Result<(), DfuError> {
    let device = find_dfu_device(usb_path)?;
    device.connect()?.enter_user_code()
}
