//! Scripted control transport for unit testing the protocol drivers.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use nusb::transfer::{
    ControlIn, ControlOut, ControlType, Recipient, TransferError,
};

use crate::ControlTransport;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

/// One control request as seen by the [`MockTransport`]
#[derive(Clone, Debug)]
pub struct ControlRecord {
    pub direction: Direction,
    pub control_type: ControlType,
    pub recipient: Recipient,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    /// Requested length for IN transfers, `data.len()` for OUT transfers
    pub length: u16,
    /// Payload of OUT transfers, empty for IN transfers
    pub data: Vec<u8>,
    /// When the request was issued
    pub at: Instant,
}

#[derive(Default)]
struct MockState {
    in_queue: VecDeque<Result<Vec<u8>, TransferError>>,
    out_queue: VecDeque<Result<(), TransferError>>,
    records: Vec<ControlRecord>,
    disconnected: bool,
}

/// Mock transport for unit testing protocol logic
///
/// Clones share their state, so a test can keep one handle for scripting
/// and inspection while the driver under test owns another.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        // a poisoned lock only happens after a panicking test
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue the reply to the next IN transfer.
    pub fn queue_in(&self, data: &[u8]) {
        self.state().in_queue.push_back(Ok(data.to_vec()));
    }

    /// Make the next IN transfer fail.
    pub fn queue_in_error(&self, err: TransferError) {
        self.state().in_queue.push_back(Err(err));
    }

    /// Make the next OUT transfer fail. OUT transfers succeed otherwise.
    pub fn queue_out_error(&self, err: TransferError) {
        self.state().out_queue.push_back(Err(err));
    }

    /// Simulate the device dropping off the bus.
    pub fn disconnect(&self) {
        self.state().disconnected = true;
    }

    /// All requests issued so far, in order.
    pub fn records(&self) -> Vec<ControlRecord> {
        self.state().records.clone()
    }

    pub fn clear_records(&self) {
        self.state().records.clear();
    }
}

impl ControlTransport for MockTransport {
    fn control_in(&self, request: ControlIn) -> Result<Vec<u8>, TransferError> {
        let mut state = self.state();
        state.records.push(ControlRecord {
            direction: Direction::In,
            control_type: request.control_type,
            recipient: request.recipient,
            request: request.request,
            value: request.value,
            index: request.index,
            length: request.length,
            data: Vec::new(),
            at: Instant::now(),
        });
        if state.disconnected {
            return Err(TransferError::Disconnected);
        }
        state.in_queue.pop_front().unwrap_or(Err(TransferError::Stall))
    }

    fn control_out(
        &self,
        request: ControlOut<'_>,
    ) -> Result<(), TransferError> {
        let mut state = self.state();
        state.records.push(ControlRecord {
            direction: Direction::Out,
            control_type: request.control_type,
            recipient: request.recipient,
            request: request.request,
            value: request.value,
            index: request.index,
            length: request.data.len() as u16,
            data: request.data.to_vec(),
            at: Instant::now(),
        });
        if state.disconnected {
            return Err(TransferError::Disconnected);
        }
        state.out_queue.pop_front().unwrap_or(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vendor_in(value: u16) -> ControlIn {
        ControlIn {
            control_type: ControlType::Vendor,
            recipient: Recipient::Device,
            request: 0xff,
            value,
            index: 0,
            length: 128,
        }
    }

    #[test]
    fn test_mock_in_queue() {
        let mock = MockTransport::new();
        mock.queue_in(&[1, 2]);
        mock.queue_in_error(TransferError::Fault);

        assert_eq!(mock.control_in(vendor_in(0)).unwrap(), vec![1, 2]);
        assert!(matches!(
            mock.control_in(vendor_in(0)),
            Err(TransferError::Fault)
        ));
        // queue is empty now
        assert!(matches!(
            mock.control_in(vendor_in(0)),
            Err(TransferError::Stall)
        ));
    }

    #[test]
    fn test_mock_records_shared_between_clones() {
        let mock = MockTransport::new();
        let driver_side = mock.clone();
        driver_side
            .control_out(ControlOut {
                control_type: ControlType::Class,
                recipient: Recipient::Interface,
                request: 1,
                value: 0,
                index: 0,
                data: &[0x21, 0, 0, 0, 8],
            })
            .unwrap();

        let records = mock.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].direction, Direction::Out);
        assert_eq!(records[0].data, vec![0x21, 0, 0, 0, 8]);
        assert_eq!(records[0].length, 5);
    }

    #[test]
    fn test_mock_disconnect() {
        let mock = MockTransport::new();
        mock.queue_in(&[0; 8]);
        mock.disconnect();
        assert!(matches!(
            mock.control_in(vendor_in(0)),
            Err(TransferError::Disconnected)
        ));
    }
}
