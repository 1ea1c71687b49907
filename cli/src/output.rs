use serde_json::{Value, json};
use usbmux::{MuxSummary, StatusSnapshot};

/// Result of a subcommand, rendered according to the output mode
pub(crate) enum Output {
    Status(StatusSnapshot),
    List(Vec<ListEntry>),
    Done,
}

pub(crate) struct ListEntry {
    pub device: MuxSummary,
    /// Not queried in JSON mode
    pub status: Option<Result<StatusSnapshot, String>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Text,
    Raw,
    Json,
}

const RAW_ANNOTATIONS: &[(&str, &str)] = &[
    ("data_links", "List of active links of USB data lines"),
    ("device", "The device this status message is printed for"),
    ("dut_otg_input", "Measured level on the ID pin on the DUT port"),
    (
        "dut_otg_output",
        "State of the open-drain MOSFET on the ID pin on the DUT port",
    ),
    ("dut_power_lockout", "State of the 'Lock' switch on the USB-Mux"),
    ("power_links", "List of active links of USB power lines"),
    ("voltage_device", "Measured voltage on the device port"),
    ("voltage_dut", "Measured voltage on the DUT port"),
    ("voltage_host", "Measured voltage on the host port"),
];

/// Warnings worth showing next to a status.
pub(crate) fn ui_messages(status: &StatusSnapshot) -> Vec<String> {
    let mut messages = Vec::new();
    if !status.device.sw_up_to_date {
        messages.push("Software update for USB-Mux available".to_string());
    }
    if status.voltage_host < 4.5 {
        messages.push(format!(
            "WARN: Host USB voltage is very low ({:0.1}V)!",
            status.voltage_host
        ));
    }
    if status.voltage_host > 5.3 {
        messages.push(format!(
            "WARN: Host USB voltage is very high ({:0.1}V)!",
            status.voltage_host
        ));
    }
    if status.voltage_dut > 5.3 {
        messages.push(format!(
            "WARN: DUT USB voltage is very high ({:0.1}V)!",
            status.voltage_dut
        ));
    }
    messages
}

pub(crate) fn print_json(command: &str, result: &Result<Output, String>) {
    let mut doc = json!({ "command": command, "error": result.is_err() });
    match result {
        Ok(Output::Status(status)) => doc["status"] = json!(status),
        Ok(Output::List(entries)) => {
            doc["list"] =
                Value::Array(entries.iter().map(|e| json!(e.device)).collect())
        }
        Ok(Output::Done) => {}
        Err(message) => doc["errormessage"] = json!(message),
    }
    println!("{doc}");
}

pub(crate) fn print_text(output: &Output, mode: Mode) {
    match output {
        Output::Status(status) if mode == Mode::Raw => print_raw(status),
        Output::Status(status) => print_status(status),
        Output::List(entries) => print_list(entries),
        Output::Done => println!("OK"),
    }
}

fn print_status(status: &StatusSnapshot) {
    let device = &status.device;
    println!(
        "USB-Mux {} @ {} ({})",
        device.identity.serial_number,
        device.identity.usb_path,
        device.sw_version
    );
    println!("  Host   VCC: {:1.2}V", status.voltage_host);
    println!(
        "  DUT    VCC: {:1.2}V  ID: {}  {}",
        status.voltage_dut,
        if status.dut_otg_input { "High" } else { "Low" },
        if status.dut_power_lockout { "LOCKED" } else { "unlocked" },
    );
    println!("  Device VCC: {:1.2}V", status.voltage_device);
    println!("  Power links: {}", status.power_links);
    println!("  Data links:  {}", status.data_links);
    let messages = ui_messages(status);
    if !messages.is_empty() {
        println!("{}", messages.join(" "));
    }
}

fn print_raw(status: &StatusSnapshot) {
    let Value::Object(fields) = json!(status) else {
        return;
    };
    for (key, value) in fields {
        let note = RAW_ANNOTATIONS.iter().find(|(k, _)| *k == key);
        if let Some((_, note)) = note {
            println!("# {note}");
        }
        println!("{key}: {value}");
        println!();
    }
}

fn print_list(entries: &[ListEntry]) {
    println!("Serial      | USB-Path           | Host-DUT Lock? | Connections");
    println!("----------- | ------------------ | -------------- | -----------");
    for entry in entries {
        let (lock, connections, messages) = match &entry.status {
            Some(Ok(status)) => (
                if status.dut_power_lockout { "locked" } else { "unlocked" },
                status.data_links.to_string(),
                ui_messages(status).join(" "),
            ),
            Some(Err(err)) => ("-", "-".to_string(), err.clone()),
            None => ("-", "-".to_string(), String::new()),
        };
        println!(
            "{:11} | {:18} | {:14} | {:14} {}",
            entry.device.serial, entry.device.path, lock, connections, messages
        );
    }
}

#[cfg(test)]
mod tests {
    use usbmux::{DeviceIdentity, DeviceStatus, LinkState, Version};

    use super::*;

    fn status(host: f64, dut: f64, up_to_date: bool) -> StatusSnapshot {
        StatusSnapshot {
            voltage_host: host,
            voltage_device: 0.0,
            voltage_dut: dut,
            dut_power_lockout: false,
            dut_otg_output: false,
            dut_otg_input: true,
            power_links: LinkState::None,
            data_links: LinkState::None,
            device: DeviceStatus {
                identity: DeviceIdentity::default(),
                sw_version: "usbmux 0.1.2 2021-04-01".into(),
                sw_version_num: Version::new([0, 1, 2]),
                sw_up_to_date: up_to_date,
            },
        }
    }

    #[test]
    fn test_no_messages_when_healthy() {
        assert!(ui_messages(&status(5.0, 5.0, true)).is_empty());
    }

    #[test]
    fn test_voltage_warnings() {
        assert_eq!(
            ui_messages(&status(4.2, 0.0, true)),
            vec!["WARN: Host USB voltage is very low (4.2V)!"]
        );
        assert_eq!(
            ui_messages(&status(5.5, 5.6, true)),
            vec![
                "WARN: Host USB voltage is very high (5.5V)!",
                "WARN: DUT USB voltage is very high (5.6V)!",
            ]
        );
    }

    #[test]
    fn test_update_available() {
        assert_eq!(
            ui_messages(&status(5.0, 0.0, false)),
            vec!["Software update for USB-Mux available"]
        );
    }
}
