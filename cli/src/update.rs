use std::path::Path;

use dfu::DfuUtil;
use log::{info, warn};
use usbmux::{
    Mux, Selector, Version, flash_config, resume_user_code, update_firmware,
};

use crate::CliError;

pub(crate) fn update(
    selector: &Selector,
    firmware: &Path,
) -> Result<(), CliError> {
    // updating whatever comes first is too easy to get wrong
    if selector.is_any() {
        return Err(CliError::NoSelector);
    }
    let mut mux = Mux::open(selector)?;

    let name = firmware
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match Version::from_firmware_name(&name) {
        Some(version) => {
            info!("Firmware {name} is version {version}");
            mux.set_firmware_version(version);
            if mux.is_software_up_to_date() {
                info!("USB-Mux already runs {}", mux.sw_version());
            }
        }
        None => warn!("No version in firmware file name {name}"),
    }

    update_firmware(&mux, firmware, &DfuUtil::default())?;
    Ok(())
}

pub(crate) fn write_config(
    path: Option<&str>,
    file: &Path,
) -> Result<(), CliError> {
    flash_config(path, file, &DfuUtil::default())?;
    Ok(())
}

pub(crate) fn leave_dfu(path: Option<&str>) -> Result<(), CliError> {
    resume_user_code(path)?;
    Ok(())
}
