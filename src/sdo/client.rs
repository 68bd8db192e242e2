// src/sdo/client.rs
//
// SDO client: issues expedited download/upload requests to a remote
// server and drives the matching toggle-bit state machine on the
// response side. One transfer in flight at a time per instance, like
// the server. Feature-gated: a pure slave deployment never needs it.

use crate::error::abort_code;
use crate::frame::CanFrame;
use crate::types::NodeId;
use alloc::vec::Vec;
use log::{debug, warn};

const SEGMENT_DATA_LEN: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    AwaitInitiateDownload,
    AwaitDownloadSegment,
    AwaitInitiateUpload,
    AwaitUploadSegment,
}

/// Outcome of feeding a response frame (or a timeout) to `SdoClient`.
#[derive(Debug, Clone, PartialEq)]
pub enum SdoClientEvent {
    /// The transfer needs another frame sent; here it is.
    Continue(CanFrame),
    /// The transfer finished. `Ok(data)` for an upload (empty for a
    /// completed download), `Err(abort_code)` on abort or timeout.
    Done(Result<Vec<u8>, u32>),
    /// The frame didn't belong to this transfer; ignored.
    Ignored,
}

/// One SDO client channel, per spec.md Section 4.4: targets a single
/// remote node's SDO server pair and runs one transfer at a time.
pub struct SdoClient {
    pub target_node_id: NodeId,
    pub request_cob_id: u32,
    pub response_cob_id: u32,
    phase: Phase,
    index: u16,
    sub_index: u8,
    toggle: bool,
    buffer: Vec<u8>,
    bytes_done: usize,
    total_size: usize,
    /// Timeout, in timer-wheel ticks, armed by `Node` on every request
    /// sent and read back from Object 0x1300.
    pub timeout_ticks: u32,
    /// Retries remaining for the transfer currently in flight, seeded
    /// from Object 0x1302 (spec.md Section 4.4 supplement).
    retries_remaining: u8,
    pub timer_id: Option<u32>,
    /// Last frame sent for the transfer in flight, so `on_timeout` can
    /// hand it back to `Node` for a retry without `Node` needing to
    /// remember the client's internal protocol state.
    last_request: Option<CanFrame>,
}

impl SdoClient {
    pub fn new(target_node_id: NodeId, request_cob_id: u32, response_cob_id: u32) -> Self {
        Self {
            target_node_id,
            request_cob_id,
            response_cob_id,
            phase: Phase::Idle,
            index: 0,
            sub_index: 0,
            toggle: false,
            buffer: Vec::new(),
            bytes_done: 0,
            total_size: 0,
            timeout_ticks: 1000,
            retries_remaining: 0,
            timer_id: None,
            last_request: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Idle)
    }

    /// Starts a download (write to the remote object). Only expedited
    /// transfers (<=4 bytes) are built as a single frame; larger
    /// payloads are segmented automatically.
    pub fn request_download(
        &mut self,
        index: u16,
        sub_index: u8,
        data: &[u8],
        retries: u8,
    ) -> Result<CanFrame, &'static str> {
        if !self.is_idle() {
            return Err("sdo client busy");
        }
        self.index = index;
        self.sub_index = sub_index;
        self.retries_remaining = retries;
        self.toggle = false;

        let frame = if data.len() <= 4 {
            self.phase = Phase::AwaitInitiateDownload;
            let n = 4 - data.len();
            let cmd = 0x23 | (n as u8) << 2;
            let mut payload = [0u8; 8];
            payload[0] = cmd;
            payload[1..3].copy_from_slice(&index.to_le_bytes());
            payload[3] = sub_index;
            payload[4..4 + data.len()].copy_from_slice(data);
            CanFrame::new_padded(self.request_cob_id, false, &payload)
                .expect("8-byte payload always fits")
        } else {
            self.phase = Phase::AwaitInitiateDownload;
            self.buffer = data.to_vec();
            self.bytes_done = 0;
            self.total_size = data.len();
            let mut payload = [0u8; 8];
            payload[0] = 0x21;
            payload[1..3].copy_from_slice(&index.to_le_bytes());
            payload[3] = sub_index;
            payload[4..8].copy_from_slice(&(data.len() as u32).to_le_bytes());
            CanFrame::new_padded(self.request_cob_id, false, &payload)
                .expect("8-byte payload always fits")
        };
        self.last_request = Some(frame);
        Ok(frame)
    }

    /// Starts an upload (read from the remote object).
    pub fn request_upload(
        &mut self,
        index: u16,
        sub_index: u8,
        retries: u8,
    ) -> Result<CanFrame, &'static str> {
        if !self.is_idle() {
            return Err("sdo client busy");
        }
        self.index = index;
        self.sub_index = sub_index;
        self.retries_remaining = retries;
        self.toggle = false;
        self.phase = Phase::AwaitInitiateUpload;
        let mut payload = [0u8; 8];
        payload[0] = 0x40;
        payload[1..3].copy_from_slice(&index.to_le_bytes());
        payload[3] = sub_index;
        let frame = CanFrame::new_padded(self.request_cob_id, false, &payload)
            .expect("8-byte payload always fits");
        self.last_request = Some(frame);
        Ok(frame)
    }

    /// Feeds one response frame through the client's state machine.
    pub fn handle_frame(&mut self, frame: &CanFrame) -> SdoClientEvent {
        if self.phase == Phase::Idle {
            return SdoClientEvent::Ignored;
        }
        let data = frame.payload();
        if data.is_empty() {
            return SdoClientEvent::Ignored;
        }
        let mut padded = [0u8; 8];
        padded[..data.len().min(8)].copy_from_slice(&data[..data.len().min(8)]);
        let cs = padded[0];

        if cs & 0xE0 == 0x80 {
            let code = u32::from_le_bytes([padded[4], padded[5], padded[6], padded[7]]);
            warn!("sdo client: transfer aborted by server, code {:#010x}", code);
            self.phase = Phase::Idle;
            return SdoClientEvent::Done(Err(code));
        }

        match self.phase {
            Phase::AwaitInitiateDownload => self.on_initiate_download_ack(&padded),
            Phase::AwaitDownloadSegment => self.on_download_segment_ack(&padded),
            Phase::AwaitInitiateUpload => self.on_initiate_upload_response(&padded),
            Phase::AwaitUploadSegment => self.on_upload_segment_response(&padded),
            Phase::Idle => SdoClientEvent::Ignored,
        }
    }

    /// Called by `Node` when the armed timeout fires with no response.
    /// Re-sends the last frame of the transfer in flight if retries
    /// remain (`Node` rearms the timeout timer the same as for any
    /// other `Continue`); gives up and reports a timeout abort once
    /// they are exhausted.
    pub fn on_timeout(&mut self) -> SdoClientEvent {
        if self.retries_remaining > 0 {
            self.retries_remaining -= 1;
            debug!("sdo client: timeout, {} retries left", self.retries_remaining);
            match self.last_request {
                Some(frame) => SdoClientEvent::Continue(frame),
                None => {
                    self.phase = Phase::Idle;
                    SdoClientEvent::Done(Err(abort_code::SDO_TIMEOUT))
                }
            }
        } else {
            self.phase = Phase::Idle;
            SdoClientEvent::Done(Err(abort_code::SDO_TIMEOUT))
        }
    }

    fn on_initiate_download_ack(&mut self, data: &[u8; 8]) -> SdoClientEvent {
        if data[0] != 0x60 {
            self.phase = Phase::Idle;
            return SdoClientEvent::Done(Err(abort_code::COMMAND_SPECIFIER));
        }
        if self.buffer.is_empty() {
            self.phase = Phase::Idle;
            return SdoClientEvent::Done(Ok(Vec::new()));
        }
        self.phase = Phase::AwaitDownloadSegment;
        SdoClientEvent::Continue(self.next_download_segment())
    }

    fn next_download_segment(&mut self) -> CanFrame {
        let remaining = self.total_size - self.bytes_done;
        let len = remaining.min(SEGMENT_DATA_LEN);
        let last = self.bytes_done + len >= self.total_size;
        let n = SEGMENT_DATA_LEN - len;
        let cmd = ((self.toggle as u8) << 4) | ((n as u8) << 1) | (last as u8);
        let mut payload = [0u8; 8];
        payload[0] = cmd;
        payload[1..1 + len].copy_from_slice(&self.buffer[self.bytes_done..self.bytes_done + len]);
        self.bytes_done += len;
        let frame = CanFrame::new_padded(self.request_cob_id, false, &payload)
            .expect("8-byte payload always fits");
        self.last_request = Some(frame);
        frame
    }

    fn on_download_segment_ack(&mut self, data: &[u8; 8]) -> SdoClientEvent {
        let expected_toggle = (self.toggle as u8) << 4;
        if data[0] & 0xE0 != 0x20 || data[0] & 0x10 != expected_toggle {
            self.phase = Phase::Idle;
            return SdoClientEvent::Done(Err(abort_code::TOGGLE_BIT));
        }
        self.toggle = !self.toggle;
        if self.bytes_done >= self.total_size {
            self.phase = Phase::Idle;
            SdoClientEvent::Done(Ok(Vec::new()))
        } else {
            SdoClientEvent::Continue(self.next_download_segment())
        }
    }

    fn on_initiate_upload_response(&mut self, data: &[u8; 8]) -> SdoClientEvent {
        let expedited = data[0] & 0x02 != 0;
        let size_indicated = data[0] & 0x01 != 0;
        if data[0] & 0xE0 != 0x40 {
            self.phase = Phase::Idle;
            return SdoClientEvent::Done(Err(abort_code::COMMAND_SPECIFIER));
        }
        if expedited {
            let n = ((data[0] >> 2) & 0x03) as usize;
            let len = if size_indicated { 4 - n } else { 4 };
            self.phase = Phase::Idle;
            SdoClientEvent::Done(Ok(data[4..4 + len].to_vec()))
        } else {
            self.total_size = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
            self.buffer = Vec::with_capacity(self.total_size);
            self.bytes_done = 0;
            self.phase = Phase::AwaitUploadSegment;
            SdoClientEvent::Continue(self.next_upload_request())
        }
    }

    fn next_upload_request(&mut self) -> CanFrame {
        let cmd = 0x60 | ((self.toggle as u8) << 4);
        let mut payload = [0u8; 8];
        payload[0] = cmd;
        let frame = CanFrame::new_padded(self.request_cob_id, false, &payload)
            .expect("8-byte payload always fits");
        self.last_request = Some(frame);
        frame
    }

    fn on_upload_segment_response(&mut self, data: &[u8; 8]) -> SdoClientEvent {
        let expected_toggle = (self.toggle as u8) << 4;
        if data[0] & 0x10 != expected_toggle {
            self.phase = Phase::Idle;
            return SdoClientEvent::Done(Err(abort_code::TOGGLE_BIT));
        }
        let n = ((data[0] >> 1) & 0x07) as usize;
        let complete = data[0] & 0x01 != 0;
        let len = SEGMENT_DATA_LEN - n;
        self.buffer.extend_from_slice(&data[1..1 + len]);
        self.bytes_done += len;
        self.toggle = !self.toggle;
        if complete {
            self.phase = Phase::Idle;
            SdoClientEvent::Done(Ok(core::mem::take(&mut self.buffer)))
        } else {
            SdoClientEvent::Continue(self.next_upload_request())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::TryFrom;

    fn client() -> SdoClient {
        SdoClient::new(NodeId::try_from(2u8).unwrap(), 0x602, 0x582)
    }

    #[test]
    fn expedited_download_completes_on_ack() {
        let mut c = client();
        let req = c.request_download(0x2000, 0, &[0x34, 0x12], 2).unwrap();
        assert_eq!(req.payload()[0], 0x2B); // expedited, size indicated, n=2
        let ack = CanFrame::new_padded(0x582, false, &[0x60, 0x00, 0x20, 0x00, 0, 0, 0, 0]).unwrap();
        match c.handle_frame(&ack) {
            SdoClientEvent::Done(Ok(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert!(c.is_idle());
    }

    #[test]
    fn upload_completes_expedited() {
        let mut c = client();
        c.request_upload(0x1018, 1, 0).unwrap();
        let resp = CanFrame::new_padded(0x582, false, &[0x4B, 0x18, 0x10, 1, 0xAA, 0, 0, 0]).unwrap();
        match c.handle_frame(&resp) {
            SdoClientEvent::Done(Ok(data)) => assert_eq!(data, alloc::vec![0xAA, 0, 0, 0]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn abort_from_server_reports_code() {
        let mut c = client();
        c.request_upload(0x2000, 0, 0).unwrap();
        let abort =
            CanFrame::new_padded(0x582, false, &[0x80, 0x00, 0x20, 0x00, 0x00, 0x00, 0x06, 0x06])
                .unwrap();
        match c.handle_frame(&abort) {
            SdoClientEvent::Done(Err(code)) => assert_eq!(code, 0x0606_0000),
            other => panic!("unexpected {:?}", other),
        }
        assert!(c.is_idle());
    }
}
