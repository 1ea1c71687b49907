use log::{debug, info, warn};
use nusb::transfer::{ControlIn, ControlOut, ControlType, Recipient};

use crate::error::*;
use crate::status::{DFU_STATUS_LEN, DfuState, DfuStatus};
use crate::transport::ControlTransport;

const DFUSE_CMD_ADDR: u8 = 0x21;

// wValue of an UPLOAD once the address pointer has been set (AN3156)
const DFUSE_UPLOAD_BLOCK: u16 = 2;

/// Start of the internal flash, its second word is the reset vector
pub const FLASH_BASE_ADDRESS: u32 = 0x0800_0000;
/// STM32F0 unique device id (RM0091, 33.1)
pub const UUID_ADDRESS: u32 = 0x1FFF_F7AC;
pub const UUID_LEN: usize = 12;

/// DFU class requests (DFU 1.1, table 3.2)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DfuRequest {
    Detach = 0,
    Dnload = 1,
    Upload = 2,
    GetStatus = 3,
    ClrStatus = 4,
    GetState = 5,
    Abort = 6,
}

/// Connection to the DFU interface of a device in bootloader mode
///
/// Only implements what is needed to inspect the device and to leave the
/// bootloader. Obtained with [DfuDevice::connect](crate::DfuDevice::connect)
/// or built on any [ControlTransport] with [DfuConnection::new].
pub struct DfuConnection<T: ControlTransport = nusb::Interface> {
    transport: T,
    interface: u8,
}

impl<T: ControlTransport> DfuConnection<T> {
    pub fn new(transport: T, interface: u8) -> Self {
        DfuConnection {
            transport,
            interface,
        }
    }

    pub fn get_status(&self) -> Result<DfuStatus, DfuError> {
        let data = self.dfu_cmd_in(DfuRequest::GetStatus, 0, DFU_STATUS_LEN)?;
        let st = DfuStatus::from_raw(&data)?;
        debug!("get_status: {:?}", st);
        Ok(st)
    }

    pub fn get_state(&self) -> Result<DfuState, DfuError> {
        let data = self.dfu_cmd_in(DfuRequest::GetState, 0, 1)?;
        match data.first() {
            Some(state) => DfuState::try_from(*state),
            None => Err(DfuError::ShortRead {
                expected: 1,
                received: 0,
            }),
        }
    }

    /// Read the status and fail unless the device reports OK.
    pub fn check_status(&self) -> Result<DfuStatus, DfuError> {
        let st = self.get_status()?;
        st.ret(st)
    }

    /// Clear an error status.
    ///
    /// The bootloader needs two `CLRSTATUS` to leave `dfuERROR` after a
    /// failed request, so the first failing attempt is tolerated once.
    pub fn clear_status(&self) -> Result<(), DfuError> {
        match self.clear_status_once() {
            Ok(()) => Ok(()),
            Err(DfuError::DeviceVanished) => Err(DfuError::DeviceVanished),
            Err(err) => {
                warn!("First clear status failed ({err}), clearing again");
                self.clear_status_once()
            }
        }
    }

    fn clear_status_once(&self) -> Result<(), DfuError> {
        debug!("Clear status");
        self.dfu_cmd_out(DfuRequest::ClrStatus, 0, &[])?;
        self.check_status()?;
        Ok(())
    }

    pub fn abort(&self) -> Result<(), DfuError> {
        debug!("Abort");
        self.dfu_cmd_out(DfuRequest::Abort, 0, &[])?;
        self.check_status()?;
        Ok(())
    }

    /// Set the address pointer used by the next upload or leave request.
    pub fn set_address(&self, addr: u32) -> Result<(), DfuError> {
        debug!("Set address: {addr:#010x}");
        let mut addr_cmd = vec![DFUSE_CMD_ADDR];
        addr_cmd.extend_from_slice(&addr.to_le_bytes());
        self.dfu_cmd_out(DfuRequest::Dnload, 0, &addr_cmd)?;
        self.check_status()?;
        Ok(())
    }

    /// Read `length` bytes at the current address pointer.
    ///
    /// The device may return fewer bytes than requested.
    pub fn read_memory(&self, length: u16) -> Result<Vec<u8>, DfuError> {
        debug!("Reading memory, length: {length}");
        let data =
            self.dfu_cmd_in(DfuRequest::Upload, DFUSE_UPLOAD_BLOCK, length)?;
        debug!("Data received: {}", hex(&data));
        self.check_status()?;
        Ok(data)
    }

    /// Read memory at `addr`.
    ///
    /// Not every address is readable, the bootloader may refuse reads
    /// outside of its memory map.
    pub fn read_at_address(
        &self,
        addr: u32,
        length: u16,
    ) -> Result<Vec<u8>, DfuError> {
        self.clear_status()?;
        self.abort()?;

        // address set and upload share the command state, re-arm in between
        self.set_address(addr)?;
        self.check_status()?;
        self.abort()?;
        self.check_status()?;
        let data = self.read_memory(length)?;

        self.abort()?;
        Ok(data)
    }

    /// Read the 96 bit unique device id.
    pub fn get_uuid(&self) -> Result<[u8; UUID_LEN], DfuError> {
        let data = self.read_at_address(UUID_ADDRESS, UUID_LEN as u16)?;
        let uuid: [u8; UUID_LEN] =
            data.as_slice().try_into().map_err(|_| DfuError::ShortRead {
                expected: UUID_LEN,
                received: data.len(),
            })?;
        debug!("Get UUID: {}", hex(&uuid));
        Ok(uuid)
    }

    /// Jump to the user firmware in flash, which exits the bootloader.
    ///
    /// The entry point is taken from the reset vector of the vector table
    /// at the start of the flash.
    pub fn enter_user_code(&self) -> Result<(), DfuError> {
        info!("Entering user code");
        self.clear_status()?;
        self.abort()?;

        let vectors = self.read_at_address(FLASH_BASE_ADDRESS, 8)?;
        let reset_vector = reset_vector(&vectors)?;
        debug!("Code entry address: {reset_vector:#010x}");

        self.abort()?;
        self.set_address(reset_vector)?;
        let _ = self.get_status()?;

        self.leave()
    }

    /// Execute the code at the current address pointer.
    fn leave(&self) -> Result<(), DfuError> {
        debug!("Leaving DFU mode");
        self.dfu_cmd_out(DfuRequest::Dnload, 0, &[])?;
        let st = self.check_status()?;
        if st.state != DfuState::DfuManifest {
            return Err(DfuError::UnexpectedState(st));
        }
        Ok(())
    }

    fn dfu_cmd_out(
        &self,
        req: DfuRequest,
        value: u16,
        data: &[u8],
    ) -> Result<(), DfuError> {
        Ok(self.transport.control_out(ControlOut {
            control_type: ControlType::Class,
            recipient: Recipient::Interface,
            request: req as u8,
            value,
            index: self.interface as u16,
            data,
        })?)
    }

    fn dfu_cmd_in(
        &self,
        req: DfuRequest,
        value: u16,
        length: u16,
    ) -> Result<Vec<u8>, DfuError> {
        Ok(self.transport.control_in(ControlIn {
            control_type: ControlType::Class,
            recipient: Recipient::Interface,
            request: req as u8,
            value,
            index: self.interface as u16,
            length,
        })?)
    }
}

fn reset_vector(vectors: &[u8]) -> Result<u32, DfuError> {
    match vectors.get(4..8) {
        Some(word) => {
            Ok(u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
        }
        None => Err(DfuError::ShortRead {
            expected: 8,
            received: vectors.len(),
        }),
    }
}

fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02X}")).collect()
}
