use std::fmt;

use log::{debug, warn};
use nusb::{self, MaybeFuture};
use serde::Serialize;

use crate::MuxError;

/// Accepted (vendor id, product id) pairs, in probing order
pub const MUX_USB_IDS: &[(u16, u16)] = &[
    // Linux Automation GmbH
    (0x33f7, 0x0001),
    // development ID used during the transition, not expected in the wild
    (0x5824, 0x27dd),
];

/// Where a USB-Mux is attached and what it calls itself
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    pub usb_path: String,
    pub serial_number: String,
    pub product_name: String,
}

impl DeviceIdentity {
    fn from_device_info(dev: &nusb::DeviceInfo) -> Self {
        DeviceIdentity {
            usb_path: dfu::usb_path(dev),
            serial_number: dev.serial_number().unwrap_or_default().into(),
            product_name: dev.product_string().unwrap_or_default().into(),
        }
    }
}

/// Entry of [find_devices]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MuxSummary {
    pub serial: String,
    pub path: String,
}

/// Which USB-Mux to use
///
/// The serial number takes priority over the path. Without either the
/// first accessible USB-Mux is used.
#[derive(Clone, Debug, Default)]
pub struct Selector {
    pub serial: Option<String>,
    pub path: Option<String>,
}

impl Selector {
    pub fn by_serial(serial: impl Into<String>) -> Self {
        Selector {
            serial: Some(serial.into()),
            path: None,
        }
    }

    pub fn by_path(path: impl Into<String>) -> Self {
        Selector {
            serial: None,
            path: Some(path.into()),
        }
    }

    pub fn is_any(&self) -> bool {
        self.serial.is_none() && self.path.is_none()
    }

    fn matches(&self, identity: &DeviceIdentity) -> bool {
        if let Some(serial) = &self.serial {
            return identity.serial_number == *serial;
        }
        if let Some(path) = &self.path {
            return identity.usb_path == *path;
        }
        true
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.serial, &self.path) {
            (Some(serial), _) => write!(f, "serial number {serial}"),
            (None, Some(path)) => write!(f, "USB path {path}"),
            (None, None) => write!(f, "any"),
        }
    }
}

/// An opened USB-Mux
///
/// The device is closed when this is dropped.
pub struct LocatedDevice {
    pub identity: DeviceIdentity,
    pub device: nusb::Device,
}

pub(crate) enum Probe<D> {
    Accessible(D),
    Denied,
}

fn candidates(
    ids: &[(u16, u16)],
) -> Result<Vec<nusb::DeviceInfo>, MuxError> {
    let devices: Vec<nusb::DeviceInfo> = nusb::list_devices().wait()?.collect();
    // keep the order of `ids`, then enumeration order
    Ok(ids
        .iter()
        .flat_map(|&(vid, pid)| {
            devices
                .iter()
                .filter(move |d| d.vendor_id() == vid && d.product_id() == pid)
                .cloned()
        })
        .collect())
}

/// List all attached USB-Mux without opening them.
pub fn find_devices(ids: &[(u16, u16)]) -> Result<Vec<MuxSummary>, MuxError> {
    Ok(candidates(ids)?
        .iter()
        .map(DeviceIdentity::from_device_info)
        .map(|identity| MuxSummary {
            serial: identity.serial_number,
            path: identity.usb_path,
        })
        .collect())
}

/// Open the USB-Mux selected by `selector`.
///
/// Candidates that cannot be opened for lack of permission are skipped.
pub fn locate(
    ids: &[(u16, u16)],
    selector: &Selector,
) -> Result<LocatedDevice, MuxError> {
    let probed = candidates(ids)?.into_iter().map(|info| {
        let identity = DeviceIdentity::from_device_info(&info);
        match info.open().wait() {
            Ok(device) => Ok((identity, Probe::Accessible(device))),
            Err(err) if err.kind() == nusb::ErrorKind::PermissionDenied => {
                Ok((identity, Probe::Denied))
            }
            Err(err) => Err(MuxError::from(err)),
        }
    });
    let (identity, device) = select(probed, selector)?;
    debug!("Using USB-Mux {} at {}", identity.serial_number, identity.usb_path);
    Ok(LocatedDevice { identity, device })
}

/// Pick the first accessible candidate matching `selector`.
///
/// Only when every candidate was denied and nothing narrowed the search is
/// this reported as a permission problem rather than a missing device.
pub(crate) fn select<D>(
    candidates: impl IntoIterator<
        Item = Result<(DeviceIdentity, Probe<D>), MuxError>,
    >,
    selector: &Selector,
) -> Result<(DeviceIdentity, D), MuxError> {
    let mut seen = 0;
    let mut denied = 0;
    for candidate in candidates {
        let (identity, probe) = candidate?;
        seen += 1;
        match probe {
            Probe::Denied => {
                warn!(
                    "Access denied while checking serial number for device: {}",
                    identity.usb_path
                );
                denied += 1;
            }
            Probe::Accessible(device) => {
                if selector.matches(&identity) {
                    return Ok((identity, device));
                }
            }
        }
    }
    if seen > 0 && denied == seen && selector.is_any() {
        Err(MuxError::InsufficientPrivileges)
    } else {
        Err(MuxError::DeviceNotFound(selector.clone()))
    }
}
