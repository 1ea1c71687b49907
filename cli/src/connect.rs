use usbmux::LinkState;

use crate::CliError;

/// Map the connect flags onto a link state and the ID pin setting.
///
/// DUT-Device pulls the ID pin low unless `no_id` is given, every other
/// link lets it float.
pub(crate) fn links_from_flags(
    host_dut: bool,
    host_device: bool,
    dut_device: bool,
    no_id: bool,
) -> Result<(LinkState, Option<bool>), CliError> {
    let (link, pull_low) = match (host_dut, host_device, dut_device) {
        (false, false, false) => (LinkState::None, false),
        (true, false, false) => (LinkState::DutHost, false),
        (false, true, false) => (LinkState::DeviceHost, false),
        (true, true, false) => (LinkState::DutHostDeviceHost, false),
        (false, false, true) => (LinkState::DutDevice, true),
        _ => return Err(CliError::InvalidLinks),
    };
    Ok((link, (!no_id).then_some(pull_low)))
}
