// src/od/predefined.rs
use super::entry::{AccessFlags, ObjectEntry};
use super::object_type::{ObjectTypeKind, PdoDirection};
use super::value::ObjectValue;
use super::ObjectDictionary;
use crate::frame::{
    default_emcy_cob_id, default_rpdo_cob_id, default_sdo_request_cob_id,
    default_sdo_response_cob_id, default_tpdo_cob_id,
};
use crate::types::NodeId;

/// Number of consumer heartbeat guard slots reserved under 0x1016.
pub const MAX_HEARTBEAT_CONSUMERS: u8 = 4;

/// Populates every mandatory communication profile object (CiA 301
/// Section 7.5) a conformant slave must expose, using `node_id` to
/// compute each object's default COB-ID.
pub fn populate_mandatory_objects(dict: &mut ObjectDictionary, node_id: NodeId) {
    let id: u8 = node_id.into();

    dict.insert(ObjectEntry::scalar(
        0x1000,
        0,
        ObjectValue::Unsigned32(0),
        AccessFlags::RO,
    ));

    dict.insert(ObjectEntry::scalar(
        0x1001,
        0,
        ObjectValue::Unsigned8(0),
        AccessFlags::RO,
    ));

    // 0x1003: error history count lives in ErrorHistory, not an entry.

    dict.insert(ObjectEntry::new(
        0x1005,
        0,
        ObjectValue::Unsigned32(crate::types::C_COBID_SYNC_DEFAULT as u32),
        AccessFlags::RW,
        ObjectTypeKind::SyncCobId,
    ));

    dict.insert(ObjectEntry::new(
        0x1006,
        0,
        ObjectValue::Unsigned32(0),
        AccessFlags::RW,
        ObjectTypeKind::SyncCyclePeriod,
    ));

    dict.insert(ObjectEntry::scalar(
        0x1010,
        0,
        ObjectValue::Unsigned8(1),
        AccessFlags::RO,
    ));
    dict.insert(ObjectEntry::new(
        0x1010,
        1,
        ObjectValue::Unsigned32(0),
        AccessFlags::RW,
        ObjectTypeKind::ParaStore,
    ));

    dict.insert(ObjectEntry::scalar(
        0x1011,
        0,
        ObjectValue::Unsigned8(1),
        AccessFlags::RO,
    ));
    dict.insert(ObjectEntry::new(
        0x1011,
        1,
        ObjectValue::Unsigned32(0),
        AccessFlags::RW,
        ObjectTypeKind::ParaRestore,
    ));

    dict.insert(ObjectEntry::scalar(
        0x1014,
        0,
        ObjectValue::Unsigned32(default_emcy_cob_id(id)),
        AccessFlags::RW,
    ));

    dict.insert(ObjectEntry::scalar(
        0x1015,
        0,
        ObjectValue::Unsigned16(0),
        AccessFlags::RW,
    ));

    dict.insert(ObjectEntry::scalar(
        0x1016,
        0,
        ObjectValue::Unsigned8(MAX_HEARTBEAT_CONSUMERS),
        AccessFlags::RO,
    ));
    for sub in 1..=MAX_HEARTBEAT_CONSUMERS {
        dict.insert(ObjectEntry::new(
            0x1016,
            sub,
            ObjectValue::Unsigned32(0),
            AccessFlags::RW,
            ObjectTypeKind::HeartbeatConsumerEntry,
        ));
    }

    dict.insert(ObjectEntry::new(
        0x1017,
        0,
        ObjectValue::Unsigned16(0),
        AccessFlags::RW,
        ObjectTypeKind::HeartbeatProducerTime,
    ));

    dict.insert(ObjectEntry::scalar(
        0x1018,
        0,
        ObjectValue::Unsigned8(4),
        AccessFlags::RO,
    ));
    dict.insert(ObjectEntry::scalar(
        0x1018,
        1,
        ObjectValue::Unsigned32(0),
        AccessFlags::RO,
    ));
    dict.insert(ObjectEntry::scalar(
        0x1018,
        2,
        ObjectValue::Unsigned32(0),
        AccessFlags::RO,
    ));
    dict.insert(ObjectEntry::scalar(
        0x1018,
        3,
        ObjectValue::Unsigned32(0),
        AccessFlags::RO,
    ));
    dict.insert(ObjectEntry::scalar(
        0x1018,
        4,
        ObjectValue::Unsigned32(0),
        AccessFlags::RO,
    ));

    dict.insert(ObjectEntry::scalar(
        0x1200,
        0,
        ObjectValue::Unsigned8(2),
        AccessFlags::RO,
    ));
    dict.insert(ObjectEntry::scalar(
        0x1200,
        1,
        ObjectValue::Unsigned32(default_sdo_request_cob_id(id)),
        AccessFlags::RO,
    ));
    dict.insert(ObjectEntry::scalar(
        0x1200,
        2,
        ObjectValue::Unsigned32(default_sdo_response_cob_id(id)),
        AccessFlags::RO,
    ));
}

/// Adds the communication and mapping parameter objects for one RPDO
/// channel (0-based), at 0x1400+channel / 0x1600+channel.
pub fn add_rpdo_defaults(dict: &mut ObjectDictionary, channel: u8, node_id: NodeId) {
    let id: u8 = node_id.into();
    let comm_index = 0x1400 + channel as u16;
    let map_index = 0x1600 + channel as u16;

    dict.insert(ObjectEntry::scalar(
        comm_index,
        0,
        ObjectValue::Unsigned8(2),
        AccessFlags::RO,
    ));
    dict.insert(ObjectEntry::new(
        comm_index,
        1,
        ObjectValue::Unsigned32(default_rpdo_cob_id(channel, id)),
        AccessFlags::RW,
        ObjectTypeKind::PdoCommCobId {
            channel,
            direction: PdoDirection::Receive,
        },
    ));
    dict.insert(ObjectEntry::new(
        comm_index,
        2,
        ObjectValue::Unsigned8(255),
        AccessFlags::RW,
        ObjectTypeKind::PdoTransmissionType {
            channel,
            direction: PdoDirection::Receive,
        },
    ));

    dict.insert(ObjectEntry::new(
        map_index,
        0,
        ObjectValue::Unsigned8(0),
        AccessFlags::RW,
        ObjectTypeKind::PdoMappingNumber {
            channel,
            direction: PdoDirection::Receive,
        },
    ));
    for sub in 1..=crate::types::C_PDO_MAX_MAPPED_OBJECTS as u8 {
        dict.insert(ObjectEntry::new(
            map_index,
            sub,
            ObjectValue::Unsigned32(0),
            AccessFlags::RW,
            ObjectTypeKind::PdoMappingEntry {
                channel,
                direction: PdoDirection::Receive,
            },
        ));
    }
}

/// Adds the communication and mapping parameter objects for one TPDO
/// channel (0-based), at 0x1800+channel / 0x1A00+channel.
pub fn add_tpdo_defaults(dict: &mut ObjectDictionary, channel: u8, node_id: NodeId) {
    let id: u8 = node_id.into();
    let comm_index = 0x1800 + channel as u16;
    let map_index = 0x1A00 + channel as u16;

    dict.insert(ObjectEntry::scalar(
        comm_index,
        0,
        ObjectValue::Unsigned8(5),
        AccessFlags::RO,
    ));
    dict.insert(ObjectEntry::new(
        comm_index,
        1,
        ObjectValue::Unsigned32(default_tpdo_cob_id(channel, id)),
        AccessFlags::RW,
        ObjectTypeKind::PdoCommCobId {
            channel,
            direction: PdoDirection::Transmit,
        },
    ));
    dict.insert(ObjectEntry::new(
        comm_index,
        2,
        ObjectValue::Unsigned8(255),
        AccessFlags::RW,
        ObjectTypeKind::PdoTransmissionType {
            channel,
            direction: PdoDirection::Transmit,
        },
    ));
    dict.insert(ObjectEntry::new(
        comm_index,
        3,
        ObjectValue::Unsigned16(0),
        AccessFlags::RW,
        ObjectTypeKind::PdoInhibitTime { channel },
    ));
    dict.insert(ObjectEntry::scalar(
        comm_index,
        4,
        ObjectValue::Unsigned8(0),
        AccessFlags::RO,
    ));
    dict.insert(ObjectEntry::new(
        comm_index,
        5,
        ObjectValue::Unsigned16(0),
        AccessFlags::RW,
        ObjectTypeKind::PdoEventTimer { channel },
    ));

    dict.insert(ObjectEntry::new(
        map_index,
        0,
        ObjectValue::Unsigned8(0),
        AccessFlags::RW,
        ObjectTypeKind::PdoMappingNumber {
            channel,
            direction: PdoDirection::Transmit,
        },
    ));
    for sub in 1..=crate::types::C_PDO_MAX_MAPPED_OBJECTS as u8 {
        dict.insert(ObjectEntry::new(
            map_index,
            sub,
            ObjectValue::Unsigned32(0),
            AccessFlags::RW,
            ObjectTypeKind::PdoMappingEntry {
                channel,
                direction: PdoDirection::Transmit,
            },
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::TryFrom;

    #[test]
    fn mandatory_objects_are_present_after_new() {
        let node_id = NodeId::try_from(5u8).unwrap();
        let dict = ObjectDictionary::new(node_id, None);
        assert!(dict.entry(0x1000, 0).is_some());
        assert!(dict.entry(0x1018, 1).is_some());
        assert_eq!(
            dict.read(0x1200, 1).unwrap(),
            ObjectValue::Unsigned32(default_sdo_request_cob_id(5))
        );
    }
}
