// src/pdo/tpdo.rs
use super::mapping::PdoMapping;
use super::PdoError;
use crate::frame::CobId;
use crate::od::ObjectDictionary;

/// Transmission-type classes a TPDO can be configured with (CiA 301
/// Section 7.4.7, spec.md Section 4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmissionType {
    /// 0x00: synchronous, sent only once per application-triggered
    /// acyclic event, on the next SYNC.
    SynchronousAcyclic,
    /// 0x01..=0xF0: synchronous, sent every N SYNC events.
    SynchronousCyclic(u8),
    /// 0xFE: asynchronous, manufacturer-specific trigger.
    AsynchronousManufacturer,
    /// 0xFF: asynchronous, event-driven (object change / event timer).
    AsynchronousEvent,
}

impl TransmissionType {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0x00 => Self::SynchronousAcyclic,
            0x01..=0xF0 => Self::SynchronousCyclic(raw),
            0xFE => Self::AsynchronousManufacturer,
            _ => Self::AsynchronousEvent,
        }
    }

    pub fn is_synchronous(&self) -> bool {
        matches!(self, Self::SynchronousAcyclic | Self::SynchronousCyclic(_))
    }
}

/// One Transmit PDO channel (spec.md Section 3 "PDO contexts", Section
/// 4.5 "Transmission (TPDO)"). Configured from Objects 0x1800+n
/// (communication) and 0x1A00+n (mapping).
#[derive(Debug, Clone)]
pub struct Tpdo {
    pub cob_id: u32,
    pub transmission_type: u8,
    pub mapping: PdoMapping,
    /// Inhibit time in units of 100 microseconds (0x1800 sub 3).
    pub inhibit_time_100us: u16,
    /// Event timer period in milliseconds (0x1800 sub 5).
    pub event_timer_ms: u16,
    pub event_pending: bool,
    pub inhibit_active: bool,
    pub event_timer_id: Option<u32>,
    pub inhibit_timer_id: Option<u32>,
}

impl Tpdo {
    pub fn new(cob_id: u32) -> Self {
        Self {
            cob_id,
            transmission_type: 0xFF,
            mapping: PdoMapping::new(),
            inhibit_time_100us: 0,
            event_timer_ms: 0,
            event_pending: false,
            inhibit_active: false,
            event_timer_id: None,
            inhibit_timer_id: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        !CobId::from_raw(self.cob_id).invalid
    }

    pub fn kind(&self) -> TransmissionType {
        TransmissionType::from_raw(self.transmission_type)
    }

    pub fn has_inhibit(&self) -> bool {
        self.inhibit_time_100us > 0
    }

    /// True if this TPDO should transmit on the given (1-based) SYNC
    /// counter value (spec.md Section 4.9).
    pub fn due_at_sync_count(&self, sync_count: u32) -> bool {
        match self.kind() {
            TransmissionType::SynchronousCyclic(n) => sync_count % n as u32 == 0,
            TransmissionType::SynchronousAcyclic => self.event_pending,
            _ => false,
        }
    }

    /// Packs the current value of every mapped object into an 8-byte
    /// CAN payload, returning the number of valid bytes (spec.md
    /// Section 4.5).
    pub fn build_payload(&self, dict: &ObjectDictionary) -> Result<([u8; 8], u8), PdoError> {
        let mut buf = [0u8; 8];
        for (offset, entry) in self.mapping.iter_with_offsets() {
            let len = entry.byte_length();
            if offset + len > 8 {
                return Err(PdoError::Overrun);
            }
            let value = dict
                .read(entry.index, entry.sub_index)
                .map_err(|_| PdoError::ObjectNotFound)?;
            let bytes = value.serialize();
            if bytes.len() != len {
                return Err(PdoError::TypeMismatch);
            }
            buf[offset..offset + len].copy_from_slice(&bytes);
        }
        Ok((buf, self.mapping.total_bytes() as u8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::od::{AccessFlags, ObjectEntry, ObjectValue};
    use crate::pdo::mapping::PdoMappingEntry;
    use crate::types::NodeId;
    use core::convert::TryFrom;

    #[test]
    fn synchronous_cyclic_fires_every_n_syncs() {
        let mut tpdo = Tpdo::new(0x181);
        tpdo.transmission_type = 4;
        assert!(!tpdo.due_at_sync_count(1));
        assert!(!tpdo.due_at_sync_count(3));
        assert!(tpdo.due_at_sync_count(4));
        assert!(tpdo.due_at_sync_count(8));
    }

    #[test]
    fn payload_reflects_current_object_value() {
        let mut dict = ObjectDictionary::new(NodeId::try_from(1u8).unwrap(), None);
        dict.insert(ObjectEntry::scalar(
            0x2000,
            0,
            ObjectValue::Unsigned16(0xAAAA),
            AccessFlags::RW.rw_mappable(),
        ));
        let mut tpdo = Tpdo::new(0x181);
        tpdo.mapping.set(
            0,
            PdoMappingEntry {
                index: 0x2000,
                sub_index: 0,
                length_bits: 16,
            },
        );
        tpdo.mapping.set_len(1);
        let (payload, len) = tpdo.build_payload(&dict).unwrap();
        assert_eq!(len, 2);
        assert_eq!(&payload[0..2], &[0xAA, 0xAA]);
    }
}
