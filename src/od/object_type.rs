// src/od/object_type.rs
//
// The original C implementation this design is grounded on (a sibling
// CANopen stack's `co_obj.h`) gives every Object Dictionary entry a type
// descriptor made of four function pointers (Size/Ctrl/Read/Write), each
// taking the *whole* node, not just the object entry — because setting a
// heartbeat producer time arms a timer, and accepting a PDO COB-ID
// reconfigures the PDO engine. A sum type plays the same role here: the
// Dictionary interprets a `Plain` entry entirely on its own, but anything
// that reaches beyond the Dictionary's own storage is tagged, and `Node`
// matches on the tag after a successful write to run the side effect.

/// Identifies which direction a PDO communication-parameter COB-ID
/// belongs to, since transmit and receive COB-IDs validate differently
/// (TPDO COB-IDs may carry the RTR-disallow service flag).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdoDirection {
    Transmit,
    Receive,
}

/// Tags an Object Dictionary entry with the behaviour its type requires
/// beyond plain storage. See module docs for why this mirrors a
/// function-pointer table rather than being folded into `AccessFlags`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectTypeKind {
    /// No side effects: a plain typed scalar, string, or domain buffer.
    Plain,
    /// 0x1003: error history array; sub-index 0 is a clearable count.
    ErrorHistory,
    /// 0x1010/0x1011: accepts only the "save"/"load" signature and
    /// triggers an NVM store/restore cycle rather than storing a value.
    ParaStore,
    ParaRestore,
    /// 0x1017: arming this re-programs the heartbeat producer timer.
    HeartbeatProducerTime,
    /// 0x1016 sub-entries: re-arms one heartbeat consumer guard timer.
    HeartbeatConsumerEntry,
    /// 0x1005: enabling the producer flag arms the SYNC timer.
    SyncCobId,
    /// 0x1006: changing the cycle period re-programs the SYNC timer.
    SyncCyclePeriod,
    /// 0x1400+/0x1800+ sub-index 1: accepting a new COB-ID invalidates
    /// and reconfigures the owning RPDO/TPDO channel.
    PdoCommCobId { channel: u8, direction: PdoDirection },
    /// 0x1800+/0x1400+ sub-index 2: transmission type, re-evaluated by
    /// the PDO engine on the next SYNC or event.
    PdoTransmissionType { channel: u8, direction: PdoDirection },
    /// 0x1800+ sub-index 3: inhibit time, re-read by the TPDO engine.
    PdoInhibitTime { channel: u8 },
    /// 0x1800+ sub-index 5: event timer, re-arms the TPDO's event timer.
    PdoEventTimer { channel: u8 },
    /// 0x1600+/0x1A00+ sub-index 0: number of mapped objects; writing
    /// this rebuilds the channel's mapping-link table.
    PdoMappingNumber { channel: u8, direction: PdoDirection },
    /// 0x1600+/0x1A00+ sub-index 1..=8: one mapping-link entry; writing
    /// this (while mapping is disabled) marks the link table dirty.
    PdoMappingEntry { channel: u8, direction: PdoDirection },
}

impl ObjectTypeKind {
    /// True for the pseudo-objects that reject any value other than
    /// their magic signature (store/restore command objects).
    pub fn is_signature_gated(&self) -> bool {
        matches!(self, Self::ParaStore | Self::ParaRestore)
    }
}
