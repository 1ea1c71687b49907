//! Host side driver for the Linux Automation USB-Mux
//!
//! The USB-Mux switches the power and data lines between a Host, a
//! Device-Under-Test (DUT) and an auxiliary Device port. It is controlled
//! with a handful of vendor control requests, each of which answers with an
//! 8 byte status packet (see [StatusSnapshot]).
//!
//! Firmware updates go through the STM32 ROM bootloader, see
//! [update_firmware] and the [`dfu`] crate.
//!
//! # Example
//!
//! ```no_run
//! use usbmux::{LinkState, Mux, Selector};
//!
//! let mux = Mux::open(&Selector::default())?;
//! mux.connect(LinkState::DutHost, Some(false))?;
//! println!("{:?}", mux.get_status()?.data_links);
//! # Ok::<(), usbmux::MuxError>(())
//! ```

mod error;
mod link;
mod locator;
mod mux;
mod status;
mod update;
mod version;

// Re-exports
pub use error::{MuxError, UpdateError};
pub use link::LinkState;
pub use locator::{
    DeviceIdentity, LocatedDevice, MUX_USB_IDS, MuxSummary, Selector,
    find_devices, locate,
};
pub use mux::{
    CONNECT_SETTLE_DELAY, DFU_ENTRY_DELAY, DISCONNECT_SETTLE_DELAY, Mux,
    MuxCommand, SUPPORTED_PROTOCOL_VERSION,
};
pub use status::{DeviceStatus, STATUS_PACKET_LEN, StatusSnapshot, adc_to_volts};
pub use update::{
    BOOTLOADER_ENUMERATION_DELAY, Bootloader, UsbBootloader, flash_config,
    resume_user_code, update_firmware, update_firmware_with,
};
pub use version::{BUNDLED_FIRMWARE, FIRMWARE_VERSION, Version};
