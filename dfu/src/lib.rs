//! Minimal USB Device Firmware Upgrade (DFU) client based on [`nusb`]
//!
//! Talks to the STM32 ROM bootloader (`0483:df11`) just enough to read
//! memory (entry point, UUID) and to send the device back into its user
//! firmware. Flashing is delegated to `dfu-util`, see [`DfuUtil`].
//!
//! Useful references:
//! - DFU: [USB Device Firmware Upgrade Specification, Revision 1.1](https://www.usb.org/sites/default/files/DFU_1.1.pdf)
//! - DfuSe: [STMicroelectronics AN3156](https://www.st.com/resource/en/application_note/an3156-usb-dfu-protocol-used-in-the-stm32-bootloader-stmicroelectronics.pdf)
//!
//! # Example
//!
//! Leaving the bootloader of the only attached device:
//! ```no_run
//! use dfu::find_dfu_device;
//!
//! match find_dfu_device(None) {
//!     Ok(device) => {
//!         let connection = device.connect()?;
//!         connection.enter_user_code()?;
//!     }
//!     Err(e) => println!("Error: {e}"),
//! }
//! # Ok::<(), dfu::DfuError>(())
//! ```
//!
//! [`nusb`]: https://docs.rs/nusb

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000u64);

/// Vendor id of the STM32 ROM bootloader
pub const DFU_VENDOR_ID: u16 = 0x0483;
/// Product id of the STM32 ROM bootloader
pub const DFU_PRODUCT_ID: u16 = 0xdf11;

mod connection;
mod device;
mod dfu_util;
mod error;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod path;
mod status;
mod transport;

use std::time::Duration;

// Re-exports
pub use connection::{
    DfuConnection, DfuRequest, FLASH_BASE_ADDRESS, UUID_ADDRESS, UUID_LEN,
};
pub use device::{DfuDevice, find_dfu_device, find_dfu_devices};
pub use dfu_util::{
    CONFIG_OFFSET, DFU_UTIL_CMD, DfuUtil, DfuUtilError, FIRMWARE_OFFSET,
};
pub use error::DfuError;
#[cfg(any(test, feature = "mock"))]
pub use mock::{ControlRecord, Direction, MockTransport};
pub use path::{format_usb_path, usb_path};
pub use status::{DfuState, DfuStatus, DfuStatusCode};
pub use transport::ControlTransport;
