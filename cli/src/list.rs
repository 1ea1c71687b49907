use usbmux::{
    MUX_USB_IDS, Mux, MuxSummary, Selector, StatusSnapshot, find_devices,
};

use crate::{CliError, output::ListEntry};

/// Enumerate all attached USB-Mux, with their status if `with_status`.
///
/// A device that cannot be queried still shows up, with the reason
/// instead of a status.
pub(crate) fn list_muxes(
    with_status: bool,
) -> Result<Vec<ListEntry>, CliError> {
    let devices = find_devices(MUX_USB_IDS)?;
    Ok(entries(devices, with_status, |device| {
        Mux::open(&Selector::by_path(device.path.clone()))?.get_status()
    }))
}

fn entries(
    devices: Vec<MuxSummary>,
    with_status: bool,
    query: impl Fn(&MuxSummary) -> Result<StatusSnapshot, usbmux::MuxError>,
) -> Vec<ListEntry> {
    devices
        .into_iter()
        .map(|device| {
            let status = with_status
                .then(|| query(&device).map_err(|err| err.to_string()));
            ListEntry { device, status }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use usbmux::MuxError;

    use super::*;

    fn summaries() -> Vec<MuxSummary> {
        vec![
            MuxSummary {
                serial: "00001.00020".into(),
                path: "1-4.2".into(),
            },
            MuxSummary {
                serial: "00001.00021".into(),
                path: "1-4.3".into(),
            },
        ]
    }

    #[test]
    fn test_entries_without_status_do_not_open() {
        let listed = entries(summaries(), false, |_| {
            panic!("device must not be opened")
        });
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|e| e.status.is_none()));
        assert_eq!(listed[1].device.path, "1-4.3");
    }

    #[test]
    fn test_entries_keep_unreachable_devices() {
        let listed = entries(summaries(), true, |_| {
            Err(MuxError::InsufficientPrivileges)
        });
        assert_eq!(listed.len(), 2);
        assert!(matches!(
            &listed[0].status,
            Some(Err(msg)) if msg.starts_with("Could not communicate")
        ));
    }
}
