// src/sdo/server.rs
//
// CiA 301 SDO server: expedited, segmented and block transfer, one
// instance per configured server channel (0x1200+). Every method here
// is pure state-machine logic — `Node` owns the COB-ID pair and hands
// received frames in, sending back whatever comes out.

use crate::error::abort_code;
use crate::frame::CanFrame;
use crate::od::{ObjectDictionary, ObjectValue};
use crate::CanOpenError;
use alloc::vec::Vec;
use log::{debug, trace, warn};

const SEGMENT_DATA_LEN: usize = 7;
const DEFAULT_BLOCK_SIZE: u8 = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    SegmentedDownload,
    SegmentedUpload,
    BlockDownload,
    /// Client sent the last block segment; waiting for the 0xC1
    /// "block download end" frame carrying the trailing byte count.
    BlockDownloadEndPending,
    BlockUpload,
}

/// One SDO server channel's transfer state. Idle between transfers;
/// everything else here is scratch state for whichever transfer is
/// currently in progress.
pub struct SdoServer {
    pub request_cob_id: u32,
    pub response_cob_id: u32,
    phase: Phase,
    index: u16,
    sub_index: u8,
    toggle: bool,
    buffer: Vec<u8>,
    total_size: usize,
    bytes_done: usize,
    block_size: u8,
    seq_expected: u8,
    block_has_error: bool,
    block_start_offset: usize,
    last_sent_seq: u8,
    last_segment_valid_bytes: u8,
    final_block: bool,
    /// Set whenever a transfer just committed a value to the
    /// Dictionary. `Node` drains this after every `handle_frame` call
    /// to run whatever side effect the written object's `ObjectTypeKind`
    /// requires, since the Dictionary itself never reaches outside its
    /// own storage.
    last_commit: Option<(u16, u8)>,
}

impl SdoServer {
    pub fn new(request_cob_id: u32, response_cob_id: u32) -> Self {
        Self {
            request_cob_id,
            response_cob_id,
            phase: Phase::Idle,
            index: 0,
            sub_index: 0,
            toggle: false,
            buffer: Vec::new(),
            total_size: 0,
            bytes_done: 0,
            block_size: DEFAULT_BLOCK_SIZE,
            seq_expected: 1,
            block_has_error: false,
            block_start_offset: 0,
            last_sent_seq: 0,
            last_segment_valid_bytes: 7,
            final_block: false,
            last_commit: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Idle)
    }

    /// Takes the (index, sub-index) just written by this server, if
    /// any, clearing it. `Node` calls this right after `handle_frame`.
    pub fn take_last_commit(&mut self) -> Option<(u16, u8)> {
        self.last_commit.take()
    }

    /// Aborts whatever transfer is in progress and returns to idle,
    /// without emitting a frame (used for the idle-timeout case, where
    /// the client has already given up and won't see a reply anyway).
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.buffer.clear();
    }

    /// Processes one inbound frame addressed to `request_cob_id`.
    /// Returns every frame the server wants sent in reply, in order —
    /// zero for a frame that only advances mid-block state, one for
    /// almost everything else, or a whole block's worth of segments
    /// when a block upload starts or resumes.
    pub fn handle_frame(&mut self, frame: &CanFrame, od: &mut ObjectDictionary) -> Vec<CanFrame> {
        let data = frame.payload();
        if data.is_empty() {
            return alloc::vec![self.abort(0, 0, abort_code::GENERAL_ERROR)];
        }
        let mut padded = [0u8; 8];
        padded[..data.len().min(8)].copy_from_slice(&data[..data.len().min(8)]);
        let cs = padded[0];

        if matches!(self.phase, Phase::BlockDownload) {
            return self.continue_block_download(&padded, od);
        }

        match cs & 0xE0 {
            0x80 => {
                trace!("sdo server: client aborted transfer");
                self.reset();
                Vec::new()
            }
            0x20 => alloc::vec![self.handle_initiate_download(&padded, od)],
            0x00 => alloc::vec![self.continue_segmented_download(&padded, od)],
            0x40 => alloc::vec![self.handle_initiate_upload(&padded, od)],
            0x60 => alloc::vec![self.continue_segmented_upload(cs)],
            0xC0 if cs & 0x03 == 0x00 => alloc::vec![self.handle_block_download_initiate(&padded)],
            0xC0 if cs & 0x03 == 0x01 => alloc::vec![self.handle_block_download_end(&padded, od)],
            0xA0 if cs & 0x03 == 0x00 => alloc::vec![self.handle_block_upload_initiate(&padded, od)],
            0xA0 if cs & 0x03 == 0x03 => self.handle_block_upload_start(),
            0xA0 if cs & 0x03 == 0x02 => self.handle_block_upload_ack(&padded),
            0xA0 if cs & 0x03 == 0x01 => {
                self.phase = Phase::Idle;
                Vec::new()
            }
            _ => alloc::vec![self.abort(self.index, self.sub_index, abort_code::COMMAND_SPECIFIER)],
        }
    }

    fn build_frame(&self, cmd: u8, payload: [u8; 7]) -> CanFrame {
        let mut data = [0u8; 8];
        data[0] = cmd;
        data[1..8].copy_from_slice(&payload);
        CanFrame::new_padded(self.response_cob_id, false, &data)
            .expect("8-byte payload always fits")
    }

    fn abort(&mut self, index: u16, sub_index: u8, code: u32) -> CanFrame {
        warn!(
            "sdo server: aborting {:#06x}:{:#04x} code {:#010x}",
            index, sub_index, code
        );
        self.phase = Phase::Idle;
        self.buffer.clear();
        let mut payload = [0u8; 7];
        payload[0..2].copy_from_slice(&index.to_le_bytes());
        payload[2] = sub_index;
        payload[3..7].copy_from_slice(&code.to_le_bytes());
        self.build_frame(0x80, payload)
    }

    fn map_dict_error(err: CanOpenError) -> u32 {
        match err {
            CanOpenError::ObjectNotFound => abort_code::OBJECT_DOES_NOT_EXIST,
            CanOpenError::SubObjectNotFound => abort_code::SUBINDEX_DOES_NOT_EXIST,
            CanOpenError::AccessViolation => abort_code::UNSUPPORTED_ACCESS,
            CanOpenError::SizeMismatch | CanOpenError::TypeMismatch => abort_code::LENGTH_MISMATCH,
            CanOpenError::RangeError => abort_code::VALUE_RANGE_EXCEEDED,
            _ => abort_code::GENERAL_ERROR,
        }
    }

    fn write_value(
        &mut self,
        od: &mut ObjectDictionary,
        index: u16,
        sub_index: u8,
        bytes: &[u8],
    ) -> Result<(), u32> {
        let template = od
            .entry(index, sub_index)
            .ok_or(abort_code::OBJECT_DOES_NOT_EXIST)?
            .value
            .clone();
        let value =
            ObjectValue::deserialize(bytes, &template).map_err(|_| abort_code::LENGTH_MISMATCH)?;
        od.write(index, sub_index, value)
            .map(|_| {
                self.last_commit = Some((index, sub_index));
            })
            .map_err(Self::map_dict_error)
    }

    // --- Download (client writes an object) ---

    fn handle_initiate_download(&mut self, data: &[u8; 8], od: &mut ObjectDictionary) -> CanFrame {
        let expedited = data[0] & 0x02 != 0;
        let size_indicated = data[0] & 0x01 != 0;
        let n = (data[0] >> 2) & 0x03;
        let index = u16::from_le_bytes([data[1], data[2]]);
        let sub_index = data[3];
        self.index = index;
        self.sub_index = sub_index;

        if expedited {
            let len = if size_indicated { 4 - n as usize } else { 4 };
            match self.write_value(od, index, sub_index, &data[4..4 + len]) {
                Ok(()) => {
                    debug!(
                        "sdo server: expedited download {:#06x}:{:#04x}",
                        index, sub_index
                    );
                    let mut payload = [0u8; 7];
                    payload[0..2].copy_from_slice(&index.to_le_bytes());
                    payload[2] = sub_index;
                    self.build_frame(0x60, payload)
                }
                Err(code) => self.abort(index, sub_index, code),
            }
        } else {
            let total = if size_indicated {
                u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize
            } else {
                0
            };
            self.phase = Phase::SegmentedDownload;
            self.buffer = Vec::with_capacity(total);
            self.total_size = total;
            self.bytes_done = 0;
            self.toggle = false;
            let mut payload = [0u8; 7];
            payload[0..2].copy_from_slice(&index.to_le_bytes());
            payload[2] = sub_index;
            self.build_frame(0x60, payload)
        }
    }

    fn continue_segmented_download(
        &mut self,
        data: &[u8; 8],
        od: &mut ObjectDictionary,
    ) -> CanFrame {
        if !matches!(self.phase, Phase::SegmentedDownload) {
            return self.abort(self.index, self.sub_index, abort_code::COMMAND_SPECIFIER);
        }
        let toggle = data[0] & 0x10 != 0;
        if toggle != self.toggle {
            return self.abort(self.index, self.sub_index, abort_code::TOGGLE_BIT);
        }
        let n = (data[0] >> 1) & 0x07;
        let complete = data[0] & 0x01 != 0;
        let len = SEGMENT_DATA_LEN - n as usize;
        self.buffer.extend_from_slice(&data[1..1 + len]);
        self.bytes_done += len;

        let resp_cmd = 0x20 | ((self.toggle as u8) << 4);
        if complete {
            let (index, sub_index) = (self.index, self.sub_index);
            let result = self.write_value(od, index, sub_index, &self.buffer.clone());
            self.phase = Phase::Idle;
            match result {
                Ok(()) => self.build_frame(resp_cmd, [0; 7]),
                Err(code) => self.abort(index, sub_index, code),
            }
        } else {
            let frame = self.build_frame(resp_cmd, [0; 7]);
            self.toggle = !self.toggle;
            frame
        }
    }

    // --- Upload (client reads an object) ---

    fn handle_initiate_upload(&mut self, data: &[u8; 8], od: &mut ObjectDictionary) -> CanFrame {
        let index = u16::from_le_bytes([data[1], data[2]]);
        let sub_index = data[3];
        self.index = index;
        self.sub_index = sub_index;

        match od.read(index, sub_index) {
            Err(e) => self.abort(index, sub_index, Self::map_dict_error(e)),
            Ok(value) => {
                let bytes = value.serialize();
                if bytes.len() <= 4 {
                    let n = 4 - bytes.len();
                    let cmd = 0x43 | ((n as u8) << 2);
                    let mut payload = [0u8; 7];
                    payload[0..2].copy_from_slice(&index.to_le_bytes());
                    payload[2] = sub_index;
                    payload[3..3 + bytes.len()].copy_from_slice(&bytes);
                    self.build_frame(cmd, payload)
                } else {
                    self.phase = Phase::SegmentedUpload;
                    self.total_size = bytes.len();
                    self.bytes_done = 0;
                    self.toggle = false;
                    self.buffer = bytes;
                    let mut payload = [0u8; 7];
                    payload[0..2].copy_from_slice(&index.to_le_bytes());
                    payload[2] = sub_index;
                    payload[3..7].copy_from_slice(&(self.total_size as u32).to_le_bytes());
                    self.build_frame(0x41, payload)
                }
            }
        }
    }

    fn continue_segmented_upload(&mut self, cs: u8) -> CanFrame {
        if !matches!(self.phase, Phase::SegmentedUpload) {
            return self.abort(self.index, self.sub_index, abort_code::COMMAND_SPECIFIER);
        }
        let toggle = cs & 0x10 != 0;
        if toggle != self.toggle {
            return self.abort(self.index, self.sub_index, abort_code::TOGGLE_BIT);
        }
        let remaining = self.total_size - self.bytes_done;
        let len = remaining.min(SEGMENT_DATA_LEN);
        let mut chunk = [0u8; 7];
        chunk[..len].copy_from_slice(&self.buffer[self.bytes_done..self.bytes_done + len]);
        self.bytes_done += len;
        let last = self.bytes_done >= self.total_size;
        let n = SEGMENT_DATA_LEN - len;
        let cmd = ((self.toggle as u8) << 4) | ((n as u8) << 1) | (last as u8);
        self.toggle = !self.toggle;
        if last {
            self.phase = Phase::Idle;
        }
        self.build_frame(cmd, chunk)
    }

    // --- Block download (client writes, bulk) ---

    fn handle_block_download_initiate(&mut self, data: &[u8; 8]) -> CanFrame {
        let size_indicated = data[0] & 0x02 != 0;
        let index = u16::from_le_bytes([data[1], data[2]]);
        let sub_index = data[3];
        let size = if size_indicated {
            u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize
        } else {
            0
        };
        self.index = index;
        self.sub_index = sub_index;
        self.phase = Phase::BlockDownload;
        self.buffer = Vec::with_capacity(size);
        self.total_size = size;
        self.bytes_done = 0;
        self.seq_expected = 1;
        self.block_size = DEFAULT_BLOCK_SIZE;
        self.block_has_error = false;
        let mut payload = [0u8; 7];
        payload[0..2].copy_from_slice(&index.to_le_bytes());
        payload[2] = sub_index;
        payload[3] = self.block_size;
        self.build_frame(0xA0, payload)
    }

    fn continue_block_download(
        &mut self,
        data: &[u8; 8],
        _od: &mut ObjectDictionary,
    ) -> Vec<CanFrame> {
        let seq = data[0] & 0x7F;
        let last = data[0] & 0x80 != 0;

        if seq == self.seq_expected {
            self.buffer.extend_from_slice(&data[1..8]);
            self.bytes_done += 7;
            self.seq_expected += 1;
        } else {
            self.block_has_error = true;
        }

        if !last && self.seq_expected <= self.block_size {
            return Vec::new();
        }

        let ackseq = self.seq_expected.saturating_sub(1).min(self.block_size);
        if self.block_has_error {
            debug!("sdo server: block had a gap, acking only up to seq {}", ackseq);
        }
        self.seq_expected = 1;
        self.block_has_error = false;
        if last {
            self.phase = Phase::BlockDownloadEndPending;
        }
        let mut payload = [0u8; 7];
        payload[0] = ackseq;
        payload[1] = self.block_size;
        alloc::vec![self.build_frame(0xA2, payload)]
    }

    fn handle_block_download_end(&mut self, data: &[u8; 8], od: &mut ObjectDictionary) -> CanFrame {
        if !matches!(self.phase, Phase::BlockDownloadEndPending) {
            return self.abort(self.index, self.sub_index, abort_code::COMMAND_SPECIFIER);
        }
        let unused = ((data[0] >> 2) & 0x07) as usize;
        let total = if self.total_size > 0 {
            self.total_size
        } else {
            self.buffer.len().saturating_sub(unused)
        };
        self.buffer.truncate(total.min(self.buffer.len()));
        let (index, sub_index) = (self.index, self.sub_index);
        let result = self.write_value(od, index, sub_index, &self.buffer.clone());
        self.phase = Phase::Idle;
        match result {
            Ok(()) => self.build_frame(0xA1, [0; 7]),
            Err(code) => self.abort(index, sub_index, code),
        }
    }

    // --- Block upload (server reads, bulk) ---

    fn handle_block_upload_initiate(
        &mut self,
        data: &[u8; 8],
        od: &mut ObjectDictionary,
    ) -> CanFrame {
        let index = u16::from_le_bytes([data[1], data[2]]);
        let sub_index = data[3];
        let requested_block_size = data[4];
        self.index = index;
        self.sub_index = sub_index;

        match od.read(index, sub_index) {
            Err(e) => self.abort(index, sub_index, Self::map_dict_error(e)),
            Ok(value) => {
                let bytes = value.serialize();
                self.total_size = bytes.len();
                self.bytes_done = 0;
                self.buffer = bytes;
                self.block_size = requested_block_size.clamp(1, DEFAULT_BLOCK_SIZE);
                self.block_start_offset = 0;
                self.final_block = false;
                self.phase = Phase::BlockUpload;
                let mut payload = [0u8; 7];
                payload[0..2].copy_from_slice(&index.to_le_bytes());
                payload[2] = sub_index;
                payload[3..7].copy_from_slice(&(self.total_size as u32).to_le_bytes());
                self.build_frame(0xC2, payload)
            }
        }
    }

    /// Client sent 0xA3 ("start upload"): emit the first block's worth
    /// of raw segments.
    fn handle_block_upload_start(&mut self) -> Vec<CanFrame> {
        if !matches!(self.phase, Phase::BlockUpload) {
            return alloc::vec![self.abort(
                self.index,
                self.sub_index,
                abort_code::COMMAND_SPECIFIER
            )];
        }
        self.emit_block_segments(1)
    }

    fn handle_block_upload_ack(&mut self, data: &[u8; 8]) -> Vec<CanFrame> {
        if !matches!(self.phase, Phase::BlockUpload) {
            return alloc::vec![self.abort(
                self.index,
                self.sub_index,
                abort_code::COMMAND_SPECIFIER
            )];
        }
        let ackseq = data[1];
        let new_block_size = data[2];
        if new_block_size > 0 {
            self.block_size = new_block_size;
        }
        if ackseq != self.last_sent_seq {
            warn!("sdo server: block upload resend from seq {}", ackseq + 1);
            return self.emit_block_segments(ackseq + 1);
        }
        if self.final_block {
            let n = 7 - self.last_segment_valid_bytes;
            self.phase = Phase::Idle;
            let payload = [0u8; 7];
            return alloc::vec![self.build_frame(0xA1 | (n << 2), payload)];
        }
        self.block_start_offset += self.block_size as usize * 7;
        self.emit_block_segments(1)
    }

    fn emit_block_segments(&mut self, from_seq: u8) -> Vec<CanFrame> {
        let mut frames = Vec::new();
        let mut seq = from_seq;
        loop {
            let offset = self.block_start_offset + (seq as usize - 1) * 7;
            if offset >= self.total_size || seq > self.block_size {
                break;
            }
            let take = (self.total_size - offset).min(7);
            let last_overall = offset + take >= self.total_size;
            let seq_byte = seq | if last_overall { 0x80 } else { 0 };
            frames.push(self.raw_block_frame(seq_byte, &self.buffer[offset..offset + take]));
            self.last_sent_seq = seq;
            self.last_segment_valid_bytes = take as u8;
            if last_overall {
                self.final_block = true;
                break;
            }
            seq += 1;
        }
        frames
    }

    fn raw_block_frame(&self, seq_byte: u8, chunk: &[u8]) -> CanFrame {
        let mut data = [0u8; 8];
        data[0] = seq_byte;
        data[1..1 + chunk.len()].copy_from_slice(chunk);
        CanFrame::new_padded(self.response_cob_id, false, &data)
            .expect("8-byte payload always fits")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::od::AccessFlags;
    use crate::types::NodeId;
    use core::convert::TryFrom;

    fn dict() -> ObjectDictionary<'static> {
        let mut d = ObjectDictionary::new(NodeId::try_from(1u8).unwrap(), None);
        d.insert(crate::od::ObjectEntry::scalar(
            0x2000,
            0,
            ObjectValue::Unsigned16(0),
            AccessFlags::RW,
        ));
        d.insert(crate::od::ObjectEntry::scalar(
            0x2001,
            0,
            ObjectValue::Domain(alloc::vec![0u8; 20]),
            AccessFlags::RW,
        ));
        d
    }

    #[test]
    fn expedited_download_writes_object_and_acks() {
        let mut server = SdoServer::new(0x601, 0x581);
        let mut d = dict();
        let request =
            CanFrame::new_padded(0x601, false, &[0x2B, 0x00, 0x20, 0x00, 0x34, 0x12, 0, 0])
                .unwrap();
        let resp = server.handle_frame(&request, &mut d);
        assert_eq!(resp.len(), 1);
        assert_eq!(resp[0].payload()[0], 0x60);
        assert_eq!(d.read(0x2000, 0).unwrap(), ObjectValue::Unsigned16(0x1234));
    }

    #[test]
    fn expedited_upload_reads_object() {
        let mut server = SdoServer::new(0x601, 0x581);
        let mut d = dict();
        d.write(0x2000, 0, ObjectValue::Unsigned16(0xBEEF)).unwrap();
        let request =
            CanFrame::new_padded(0x601, false, &[0x40, 0x00, 0x20, 0x00, 0, 0, 0, 0]).unwrap();
        let resp = server.handle_frame(&request, &mut d);
        assert_eq!(resp.len(), 1);
        assert_eq!(resp[0].payload()[0], 0x4B);
        assert_eq!(&resp[0].payload()[4..6], &[0xEF, 0xBE]);
    }

    #[test]
    fn unknown_object_aborts() {
        let mut server = SdoServer::new(0x601, 0x581);
        let mut d = dict();
        let request =
            CanFrame::new_padded(0x601, false, &[0x40, 0x99, 0x99, 0x00, 0, 0, 0, 0]).unwrap();
        let resp = server.handle_frame(&request, &mut d);
        assert_eq!(resp[0].payload()[0], 0x80);
        let code = u32::from_le_bytes(resp[0].payload()[4..8].try_into().unwrap());
        assert_eq!(code, abort_code::OBJECT_DOES_NOT_EXIST);
    }

    #[test]
    fn segmented_download_toggles_and_completes() {
        let mut server = SdoServer::new(0x601, 0x581);
        let mut d = dict();
        let init =
            CanFrame::new_padded(0x601, false, &[0x21, 0x01, 0x20, 0x00, 10, 0, 0, 0]).unwrap();
        let r1 = server.handle_frame(&init, &mut d);
        assert_eq!(r1[0].payload()[0], 0x60);

        let seg1 = CanFrame::new_padded(0x601, false, &[0x00, 1, 2, 3, 4, 5, 6, 7]).unwrap();
        let r2 = server.handle_frame(&seg1, &mut d);
        assert_eq!(r2[0].payload()[0], 0x20); // toggle bit 0 echoed

        let seg2 = CanFrame::new_padded(0x601, false, &[0x15, 8, 9, 0, 0, 0, 0, 0]).unwrap();
        let r3 = server.handle_frame(&seg2, &mut d);
        assert_eq!(r3[0].payload()[0] & 0x10, 0x10); // toggle flipped
        assert_eq!(r3[0].payload()[0] & 0x01, 0x01); // complete ack
        assert_eq!(
            d.read(0x2001, 0).unwrap(),
            ObjectValue::Domain(alloc::vec![1, 2, 3, 4, 5, 6, 7, 8, 9])
        );
    }

    #[test]
    fn mismatched_toggle_aborts_download() {
        let mut server = SdoServer::new(0x601, 0x581);
        let mut d = dict();
        let init =
            CanFrame::new_padded(0x601, false, &[0x21, 0x01, 0x20, 0x00, 10, 0, 0, 0]).unwrap();
        server.handle_frame(&init, &mut d);
        // toggle bit set on the first segment is wrong (should start at 0).
        let bad_seg = CanFrame::new_padded(0x601, false, &[0x10, 1, 2, 3, 4, 5, 6, 7]).unwrap();
        let resp = server.handle_frame(&bad_seg, &mut d);
        assert_eq!(resp[0].payload()[0], 0x80);
        let code = u32::from_le_bytes(resp[0].payload()[4..8].try_into().unwrap());
        assert_eq!(code, abort_code::TOGGLE_BIT);
    }

    #[test]
    fn segmented_upload_splits_across_segments() {
        let mut server = SdoServer::new(0x601, 0x581);
        let mut d = dict();
        d.write(0x2001, 0, ObjectValue::Domain(alloc::vec![1; 10]))
            .unwrap();
        let init =
            CanFrame::new_padded(0x601, false, &[0x40, 0x01, 0x20, 0x00, 0, 0, 0, 0]).unwrap();
        let r1 = server.handle_frame(&init, &mut d);
        assert_eq!(r1[0].payload()[0], 0x41);
        assert_eq!(
            u32::from_le_bytes(r1[0].payload()[3..7].try_into().unwrap()),
            10
        );

        let seg1 = CanFrame::new_padded(0x601, false, &[0x60, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        let r2 = server.handle_frame(&seg1, &mut d);
        assert_eq!(r2[0].payload()[0] & 0x01, 0); // not yet complete

        let seg2 = CanFrame::new_padded(0x601, false, &[0x70, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        let r3 = server.handle_frame(&seg2, &mut d);
        assert_eq!(r3[0].payload()[0] & 0x01, 1); // complete
    }

    #[test]
    fn block_download_accumulates_and_ends() {
        let mut server = SdoServer::new(0x601, 0x581);
        let mut d = dict();
        let init =
            CanFrame::new_padded(0x601, false, &[0xC2, 0x01, 0x20, 0x00, 9, 0, 0, 0]).unwrap();
        let r1 = server.handle_frame(&init, &mut d);
        assert_eq!(r1[0].payload()[0], 0xA0);
        let block_size = r1[0].payload()[4];
        assert!(block_size >= 1);

        let seg1 = CanFrame::new_padded(0x601, false, &[1, 1, 2, 3, 4, 5, 6, 7]).unwrap();
        let r2 = server.handle_frame(&seg1, &mut d);
        assert!(r2.is_empty());

        let seg2 = CanFrame::new_padded(0x601, false, &[0x82, 8, 9, 0, 0, 0, 0, 0]).unwrap();
        let r3 = server.handle_frame(&seg2, &mut d);
        assert_eq!(r3[0].payload()[0], 0xA2);
        assert_eq!(r3[0].payload()[1], 2); // ackseq

        let end = CanFrame::new_padded(0x601, false, &[0xC1 | (5 << 2), 0, 0, 0, 0, 0, 0, 0])
            .unwrap();
        let r4 = server.handle_frame(&end, &mut d);
        assert_eq!(r4[0].payload()[0], 0xA1);
        assert_eq!(
            d.read(0x2001, 0).unwrap(),
            ObjectValue::Domain(alloc::vec![1, 2, 3, 4, 5, 6, 7, 8, 9])
        );
    }
}
