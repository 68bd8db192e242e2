// src/pdo/rpdo.rs
use super::mapping::PdoMapping;
use super::PdoError;
use crate::frame::CobId;
use crate::od::{ObjectDictionary, ObjectValue};

/// One Receive PDO channel (spec.md Section 3 "PDO contexts",
/// Section 4.5 "Reception (RPDO)"). Configured from Objects
/// 0x1400+n (communication) and 0x1600+n (mapping).
#[derive(Debug, Clone)]
pub struct Rpdo {
    pub cob_id: u32,
    pub transmission_type: u8,
    pub mapping: PdoMapping,
    /// Synchronous RPDOs buffer the last received frame and only apply
    /// it to the Dictionary on the next SYNC (spec.md Section 4.5).
    buffered: Option<[u8; 8]>,
}

impl Rpdo {
    pub fn new(cob_id: u32) -> Self {
        Self {
            cob_id,
            transmission_type: 0xFF,
            mapping: PdoMapping::new(),
            buffered: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        !CobId::from_raw(self.cob_id).invalid
    }

    /// True when this RPDO is applied on the next SYNC rather than
    /// immediately on frame arrival (spec.md Section 4.5).
    pub fn is_synchronous(&self) -> bool {
        self.transmission_type <= 0xF0
    }

    /// Validates a received frame's DLC against the mapping's total
    /// byte length (spec.md Section 4.5), then either buffers it (for
    /// a synchronous RPDO) or writes it straight through.
    pub fn receive(
        &mut self,
        payload: &[u8],
        dict: &mut ObjectDictionary,
    ) -> Result<(), PdoError> {
        if payload.len() < self.mapping.total_bytes() {
            return Err(PdoError::PayloadTooSmall);
        }
        let mut buf = [0u8; 8];
        buf[..payload.len().min(8)].copy_from_slice(&payload[..payload.len().min(8)]);
        if self.is_synchronous() {
            self.buffered = Some(buf);
            Ok(())
        } else {
            self.apply(&buf, dict)
        }
    }

    /// Applies a previously buffered frame on SYNC reception (spec.md
    /// Section 4.9 "deliver any buffered synchronous RPDO frames").
    pub fn apply_buffered(&mut self, dict: &mut ObjectDictionary) -> Result<(), PdoError> {
        if let Some(buf) = self.buffered.take() {
            self.apply(&buf, dict)
        } else {
            Ok(())
        }
    }

    fn apply(&self, buf: &[u8; 8], dict: &mut ObjectDictionary) -> Result<(), PdoError> {
        for (offset, entry) in self.mapping.iter_with_offsets() {
            let len = entry.byte_length();
            if offset + len > 8 {
                return Err(PdoError::PayloadTooSmall);
            }
            let template = dict
                .entry(entry.index, entry.sub_index)
                .ok_or(PdoError::ObjectNotFound)?
                .value
                .clone();
            let value = ObjectValue::deserialize(&buf[offset..offset + len], &template)
                .map_err(|_| PdoError::TypeMismatch)?;
            dict.write(entry.index, entry.sub_index, value)
                .map_err(|_| PdoError::TypeMismatch)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::od::{AccessFlags, ObjectEntry};
    use crate::types::NodeId;
    use core::convert::TryFrom;

    fn dict() -> ObjectDictionary<'static> {
        let mut d = ObjectDictionary::new(NodeId::try_from(1u8).unwrap(), None);
        d.insert(ObjectEntry::scalar(
            0x2000,
            0,
            ObjectValue::Unsigned16(0),
            AccessFlags::RW.rw_mappable(),
        ));
        d
    }

    #[test]
    fn async_rpdo_applies_immediately() {
        let mut rpdo = Rpdo::new(0x201);
        rpdo.mapping.set(
            0,
            super::super::mapping::PdoMappingEntry {
                index: 0x2000,
                sub_index: 0,
                length_bits: 16,
            },
        );
        rpdo.mapping.set_len(1);
        let mut d = dict();
        rpdo.receive(&[0x34, 0x12], &mut d).unwrap();
        assert_eq!(d.read(0x2000, 0).unwrap(), ObjectValue::Unsigned16(0x1234));
    }

    #[test]
    fn synchronous_rpdo_buffers_until_sync() {
        let mut rpdo = Rpdo::new(0x201);
        rpdo.transmission_type = 1;
        rpdo.mapping.set(
            0,
            super::super::mapping::PdoMappingEntry {
                index: 0x2000,
                sub_index: 0,
                length_bits: 16,
            },
        );
        rpdo.mapping.set_len(1);
        let mut d = dict();
        rpdo.receive(&[0x34, 0x12], &mut d).unwrap();
        assert_eq!(d.read(0x2000, 0).unwrap(), ObjectValue::Unsigned16(0));
        rpdo.apply_buffered(&mut d).unwrap();
        assert_eq!(d.read(0x2000, 0).unwrap(), ObjectValue::Unsigned16(0x1234));
    }
}
