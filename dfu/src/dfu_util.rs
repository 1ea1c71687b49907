use std::{
    ffi::OsString,
    fmt, io,
    path::Path,
    process::{Command, ExitStatus},
};

use log::{debug, info};

use crate::{DFU_PRODUCT_ID, DFU_VENDOR_ID};

pub const DFU_UTIL_CMD: &str = "dfu-util";

/// Flash offset of the firmware image
pub const FIRMWARE_OFFSET: u32 = 0x0800_0000;
/// Flash offset of the configuration block
pub const CONFIG_OFFSET: u32 = 0x0800_7C00;

#[derive(Debug)]
pub enum DfuUtilError {
    /// The executable could not be found
    NotFound(String),
    Failed(ExitStatus),
    Io(io::Error),
}

impl std::error::Error for DfuUtilError {}

impl fmt::Display for DfuUtilError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DfuUtilError::NotFound(cmd) => {
                write!(f, "{cmd} not found. Might not be installed.")
            }
            DfuUtilError::Failed(status) => {
                write!(f, "{DFU_UTIL_CMD} failed with: {status}")
            }
            DfuUtilError::Io(err) => write!(f, "IO error: {err}"),
        }
    }
}

/// Wrapper around the `dfu-util` executable used for the actual flashing
#[derive(Clone, Debug)]
pub struct DfuUtil {
    program: OsString,
}

impl Default for DfuUtil {
    fn default() -> Self {
        Self::with_program(DFU_UTIL_CMD)
    }
}

impl DfuUtil {
    pub fn with_program(program: impl Into<OsString>) -> Self {
        DfuUtil {
            program: program.into(),
        }
    }

    /// First line of `dfu-util -V`, e.g. `dfu-util 0.11`
    ///
    /// Used to fail early, before a device is sent into its bootloader.
    pub fn version(&self) -> Result<String, DfuUtilError> {
        let output = Command::new(&self.program)
            .arg("-V")
            .output()
            .map_err(|e| self.map_spawn_error(e))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().to_string())
    }

    pub fn flash_firmware(
        &self,
        image: &Path,
        usb_path: &str,
    ) -> Result<(), DfuUtilError> {
        self.flash(image, FIRMWARE_OFFSET, usb_path)
    }

    pub fn flash_config(
        &self,
        image: &Path,
        usb_path: &str,
    ) -> Result<(), DfuUtilError> {
        self.flash(image, CONFIG_OFFSET, usb_path)
    }

    fn flash(
        &self,
        image: &Path,
        offset: u32,
        usb_path: &str,
    ) -> Result<(), DfuUtilError> {
        info!(
            "Flashing {} at {offset:#x} to device at {usb_path}",
            image.display()
        );
        let args = flash_args(image, offset, usb_path);
        debug!("{:?} {:?}", self.program, args);
        let status = Command::new(&self.program)
            .args(&args)
            .status()
            .map_err(|e| self.map_spawn_error(e))?;
        if !status.success() {
            return Err(DfuUtilError::Failed(status));
        }
        Ok(())
    }

    fn map_spawn_error(&self, err: io::Error) -> DfuUtilError {
        if err.kind() == io::ErrorKind::NotFound {
            DfuUtilError::NotFound(self.program.to_string_lossy().into_owned())
        } else {
            DfuUtilError::Io(err)
        }
    }
}

fn flash_args(image: &Path, offset: u32, usb_path: &str) -> Vec<OsString> {
    vec![
        "-d".into(),
        format!("{DFU_VENDOR_ID:04x}:{DFU_PRODUCT_ID:04x}").into(),
        "-a".into(),
        "0".into(),
        "-D".into(),
        image.into(),
        "-s".into(),
        format!("{offset:#x}").into(),
        "--path".into(),
        usb_path.into(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flash_args() {
        let args = flash_args(Path::new("umx.bin"), FIRMWARE_OFFSET, "1-2.2");
        assert_eq!(
            args,
            vec![
                "-d", "0483:df11", "-a", "0", "-D", "umx.bin", "-s",
                "0x8000000", "--path", "1-2.2"
            ]
        );
        let args = flash_args(Path::new("cfg.bin"), CONFIG_OFFSET, "1-2.2");
        assert_eq!(args[7], "0x8007c00");
    }

    #[test]
    fn test_missing_tool() {
        let tool = DfuUtil::with_program("dfu-util-that-does-not-exist");
        assert!(matches!(tool.version(), Err(DfuUtilError::NotFound(_))));
        assert!(matches!(
            tool.flash_firmware(Path::new("umx.bin"), "1-1"),
            Err(DfuUtilError::NotFound(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_tool_exit_status() {
        let failing = DfuUtil::with_program("false");
        assert!(matches!(
            failing.flash_firmware(Path::new("umx.bin"), "1-1"),
            Err(DfuUtilError::Failed(_))
        ));
        let succeeding = DfuUtil::with_program("true");
        succeeding
            .flash_config(Path::new("cfg.bin"), "1-1")
            .unwrap();
    }
}
