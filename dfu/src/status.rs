use std::fmt;

use crate::DfuError;

pub(crate) const DFU_STATUS_LEN: u16 = 6;

/// `bStatus` values (DFU 1.1, section 6.1.2)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DfuStatusCode {
    Ok = 0x00,
    ErrTarget = 0x01,
    ErrFile = 0x02,
    ErrWrite = 0x03,
    ErrErase = 0x04,
    ErrCheckErased = 0x05,
    ErrProg = 0x06,
    ErrVerify = 0x07,
    ErrAddress = 0x08,
    ErrNotDone = 0x09,
    ErrFirmware = 0x0a,
    ErrVendor = 0x0b,
    ErrUsbr = 0x0c,
    ErrPor = 0x0d,
    ErrUnknown = 0x0e,
    ErrStalledPkt = 0x0f,
}

impl TryFrom<u8> for DfuStatusCode {
    type Error = DfuError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x00 => Self::Ok,
            0x01 => Self::ErrTarget,
            0x02 => Self::ErrFile,
            0x03 => Self::ErrWrite,
            0x04 => Self::ErrErase,
            0x05 => Self::ErrCheckErased,
            0x06 => Self::ErrProg,
            0x07 => Self::ErrVerify,
            0x08 => Self::ErrAddress,
            0x09 => Self::ErrNotDone,
            0x0a => Self::ErrFirmware,
            0x0b => Self::ErrVendor,
            0x0c => Self::ErrUsbr,
            0x0d => Self::ErrPor,
            0x0e => Self::ErrUnknown,
            0x0f => Self::ErrStalledPkt,
            code => return Err(DfuError::UnknownStatus(code)),
        })
    }
}

/// `bState` values (DFU 1.1, section 6.1.2)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DfuState {
    AppIdle = 0,
    AppDetach = 1,
    DfuIdle = 2,
    DfuDnloadSync = 3,
    DfuDnbusy = 4,
    DfuDnloadIdle = 5,
    DfuManifestSync = 6,
    DfuManifest = 7,
    DfuManifestWaitReset = 8,
    DfuUploadIdle = 9,
    DfuError = 10,
}

impl TryFrom<u8> for DfuState {
    type Error = DfuError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::AppIdle,
            1 => Self::AppDetach,
            2 => Self::DfuIdle,
            3 => Self::DfuDnloadSync,
            4 => Self::DfuDnbusy,
            5 => Self::DfuDnloadIdle,
            6 => Self::DfuManifestSync,
            7 => Self::DfuManifest,
            8 => Self::DfuManifestWaitReset,
            9 => Self::DfuUploadIdle,
            10 => Self::DfuError,
            state => return Err(DfuError::UnknownState(state)),
        })
    }
}

/// Decoded `DFU_GETSTATUS` response
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DfuStatus {
    pub status: DfuStatusCode,
    pub state: DfuState,
    /// `bwPollTimeout`, 24 bit
    pub poll_timeout: u32,
}

impl DfuStatus {
    pub fn from_raw(data: &[u8]) -> Result<Self, DfuError> {
        if data.len() != DFU_STATUS_LEN as usize {
            return Err(DfuError::InvalidStatusLength(data.len()));
        }
        Ok(DfuStatus {
            status: DfuStatusCode::try_from(data[0])?,
            poll_timeout: (data[3] as u32) << 16
                | (data[2] as u32) << 8
                | (data[1] as u32),
            state: DfuState::try_from(data[4])?,
        })
    }

    pub fn is_ok(&self) -> bool {
        self.status == DfuStatusCode::Ok
    }

    pub fn ok(&self) -> Result<(), DfuError> {
        self.ret(())
    }

    pub fn ret<T>(&self, t: T) -> Result<T, DfuError> {
        if !self.is_ok() {
            Err(DfuError::Status(*self))
        } else {
            Ok(t)
        }
    }
}

impl fmt::Display for DfuStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "status {:?} in state {:?} (poll timeout {} ms)",
            self.status, self.state, self.poll_timeout
        )
    }
}
