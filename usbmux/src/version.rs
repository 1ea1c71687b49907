use std::{fmt, str::FromStr};

use serde::Serialize;

use crate::MuxError;

/// Firmware release shipped with this tool
pub const BUNDLED_FIRMWARE: &str = "umx-T03_0.1.2.bin";
/// Version of [BUNDLED_FIRMWARE]
pub const FIRMWARE_VERSION: [u32; 3] = [0, 1, 2];

/// Dotted numeric version, compared component by component
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Version(Vec<u32>);

impl Version {
    pub fn new(parts: impl Into<Vec<u32>>) -> Self {
        Version(parts.into())
    }

    pub fn parts(&self) -> &[u32] {
        &self.0
    }

    /// Parse the answer to the software version request.
    ///
    /// The device reports `<name> <version> <build info>`.
    pub fn from_sw_string(sw_version: &str) -> Result<Self, MuxError> {
        sw_version
            .split(' ')
            .nth(1)
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| MuxError::InvalidSoftwareVersion(sw_version.into()))
    }

    /// Version of a firmware image named `<name>_<version>.<ext>`
    pub fn from_firmware_name(name: &str) -> Option<Self> {
        let (_, tail) = name.rsplit_once('_')?;
        let (version, _) = tail.rsplit_once('.')?;
        version.parse().ok()
    }
}

impl FromStr for Version {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split('.')
            .map(str::parse)
            .collect::<Result<Vec<u32>, _>>()
            .map(Version)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}
