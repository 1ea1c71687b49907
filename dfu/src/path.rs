use std::fmt::Write;

/// Position of a device on the USB bus tree, e.g. `1-2.2.1`
///
/// The bus number is followed by the chain of hub ports leading to the
/// device. This is the same notation `dfu-util --path` accepts and it stays
/// the same for a physical port across re-enumeration, which is how a
/// USB-Mux is found again after it rebooted into its bootloader.
pub fn usb_path(dev: &nusb::DeviceInfo) -> String {
    format_usb_path(dev.bus_id(), dev.port_chain())
}

/// Build a bus path from a bus id and the hub port chain.
///
/// Leading zeros of numeric bus ids (`"003"` on Linux) are dropped.
pub fn format_usb_path(bus_id: &str, ports: &[u8]) -> String {
    let mut path = match bus_id.parse::<u32>() {
        Ok(bus) => bus.to_string(),
        Err(_) => bus_id.to_string(),
    };
    path.push('-');
    for (i, port) in ports.iter().enumerate() {
        if i > 0 {
            path.push('.');
        }
        let _ = write!(path, "{port}");
    }
    path
}
