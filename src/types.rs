use core::convert::TryFrom;

// --- Primitive Types (CiA 301, Section 7.1.2) ---
// These aliases keep Object Dictionary definitions readable and line up
// with the CANopen DS-301 primitive type names.

/// Alias for BOOLEAN.
pub type BOOLEAN = u8;
/// Alias for INTEGER8.
pub type INTEGER8 = i8;
/// Alias for INTEGER16.
pub type INTEGER16 = i16;
/// Alias for INTEGER32.
pub type INTEGER32 = i32;
/// Alias for INTEGER64.
pub type INTEGER64 = i64;
/// Alias for UNSIGNED8.
pub type UNSIGNED8 = u8;
/// Alias for UNSIGNED16.
pub type UNSIGNED16 = u16;
/// Alias for UNSIGNED32.
pub type UNSIGNED32 = u32;
/// Alias for UNSIGNED64.
pub type UNSIGNED64 = u64;
/// Alias for REAL32.
pub type REAL32 = f32;
/// Alias for REAL64.
pub type REAL64 = f64;

/// A CANopen Node ID. Valid range is 1..=127; 0 is reserved for
/// NMT broadcast addressing and is never a node's own identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub UNSIGNED8);

/// Error for invalid Node ID creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeIdError {
    /// Node ID is outside the valid range 1..=127.
    InvalidRange(UNSIGNED8),
}

impl TryFrom<u8> for NodeId {
    type Error = NodeIdError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (1..=127).contains(&value) {
            Ok(NodeId(value))
        } else {
            Err(NodeIdError::InvalidRange(value))
        }
    }
}

impl From<NodeId> for u8 {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

// --- Protocol Constants (CiA 301 default COB-ID formulas) ---

/// Maximum number of data bytes in a classic CAN frame.
pub const C_CAN_MAX_DATA_LEN: usize = 8;

/// Default NMT command CAN identifier (broadcast, addresses all nodes or one).
pub const C_COBID_NMT: u16 = 0x000;

/// Default SYNC CAN identifier.
pub const C_COBID_SYNC_DEFAULT: u16 = 0x080;

/// Default EMCY CAN identifier base (0x080 + NodeId).
pub const C_COBID_EMCY_BASE: u16 = 0x080;

/// Default TPDO n CAN identifier base: 0x180 + n*0x100 + NodeId.
pub const C_COBID_TPDO_BASE: u16 = 0x180;

/// Default RPDO n CAN identifier base: 0x200 + n*0x100 + NodeId.
pub const C_COBID_RPDO_BASE: u16 = 0x200;

/// Default SDO server request (client -> server) CAN identifier base.
pub const C_COBID_SDO_REQUEST_BASE: u16 = 0x600;

/// Default SDO server response (server -> client) CAN identifier base.
pub const C_COBID_SDO_RESPONSE_BASE: u16 = 0x580;

/// Heartbeat / bootup CAN identifier base.
pub const C_COBID_HEARTBEAT_BASE: u16 = 0x700;

/// Maximum number of mapped objects per PDO (CiA 301, Table 74/75).
pub const C_PDO_MAX_MAPPED_OBJECTS: usize = 8;

/// Maximum number of bits mappable into a single PDO payload (8 bytes).
pub const C_PDO_MAX_MAPPED_BITS: u32 = 64;

/// Store-parameters signature; little-endian bytes spell "save".
pub const C_PARA_STORE_SIGNATURE: UNSIGNED32 = 0x6576_6173;

/// Restore-defaults signature; little-endian bytes spell "load".
pub const C_PARA_RESTORE_SIGNATURE: UNSIGNED32 = 0x6461_6F6C;

/// The COB-ID "invalid" flag (bit 31): the channel is not in use.
pub const COBID_INVALID_FLAG: u32 = 1 << 31;

/// The COB-ID service-specific flag (bit 30): RTR-disallowed for TPDO,
/// dynamic-addressing for SDO, producer-enable for SYNC.
pub const COBID_SERVICE_FLAG: u32 = 1 << 30;

/// The COB-ID 29-bit (extended) frame flag (bit 29).
pub const COBID_EXTENDED_FLAG: u32 = 1 << 29;

/// Mask for the CAN-ID bits (28..0) within a COB-ID object entry.
pub const COBID_CANID_MASK: u32 = 0x1FFF_FFFF;
