// src/error.rs
use crate::pdo::PdoError;
use crate::types::NodeIdError;
use core::fmt;

/// Portable, descriptive error type for the CANopen stack.
///
/// Every fallible operation returns one of these variants. Serious but
/// non-fatal errors are additionally latched into `Node::last_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanOpenError {
    // --- Argument errors ---
    /// A supplied Node ID is outside the valid range.
    InvalidNodeId(u8),
    /// A received frame has an invalid DLC for the service it claims.
    InvalidFrameLength,
    /// A buffer supplied by the caller is too short for the operation.
    BufferTooShort,

    // --- Dictionary errors ---
    /// The requested Object Dictionary index does not exist.
    ObjectNotFound,
    /// The requested sub-index does not exist for the given object.
    SubObjectNotFound,
    /// The declared size did not match the object's configured width.
    SizeMismatch,
    /// A read was attempted on a write-only object, or vice versa.
    AccessViolation,
    /// A write would produce a value outside the object's configured range.
    RangeError,
    /// A value's wire type did not match the object's stored type.
    TypeMismatch,

    // --- NMT errors ---
    /// An NMT command or service is not permitted in the current mode.
    WrongNmtMode,

    // --- SDO errors (payload is the CiA 301 abort code) ---
    SdoAbort(u32),

    // --- PDO errors ---
    /// A configured PDO mapping exceeds the 64-bit payload budget.
    PdoMapOverrun,
    /// The mapped object is not flagged PDO-mappable.
    PdoMapNotMappable,

    // --- Driver errors ---
    CanInitError,
    CanEnableError,
    CanSendError,
    CanReadError,
    TimerError,
    NvmError,

    // --- Timer wheel errors ---
    TimerNoFreeAction,
    TimerActionNotFound,

    // --- Storage errors ---
    StorageError(&'static str),
    /// A mandatory object was missing or invalid during validation.
    ValidationError(&'static str),

    /// Internal logic error that should never occur given the crate's
    /// own invariants; surfaced rather than panicking.
    InternalError(&'static str),
}

impl fmt::Display for CanOpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidNodeId(v) => write!(f, "invalid node id: {}", v),
            Self::InvalidFrameLength => write!(f, "invalid frame length for service"),
            Self::BufferTooShort => write!(f, "buffer too short"),
            Self::ObjectNotFound => write!(f, "object dictionary index not found"),
            Self::SubObjectNotFound => write!(f, "object dictionary sub-index not found"),
            Self::SizeMismatch => write!(f, "requested width does not match object size"),
            Self::AccessViolation => write!(f, "access violation (read/write-only mismatch)"),
            Self::RangeError => write!(f, "value out of configured range"),
            Self::TypeMismatch => write!(f, "object value type mismatch"),
            Self::WrongNmtMode => write!(f, "service not permitted in current NMT mode"),
            Self::SdoAbort(code) => write!(f, "SDO transfer aborted with code {:#010X}", code),
            Self::PdoMapOverrun => write!(f, "PDO mapping exceeds 64-bit payload budget"),
            Self::PdoMapNotMappable => write!(f, "object is not PDO-mappable"),
            Self::CanInitError => write!(f, "CAN driver initialisation failed"),
            Self::CanEnableError => write!(f, "CAN driver enable failed"),
            Self::CanSendError => write!(f, "CAN driver send failed (queue full or bus off)"),
            Self::CanReadError => write!(f, "CAN driver read failed"),
            Self::TimerError => write!(f, "timer driver error"),
            Self::NvmError => write!(f, "NVM driver error"),
            Self::TimerNoFreeAction => write!(f, "timer wheel has no free action slots"),
            Self::TimerActionNotFound => write!(f, "timer action id not found"),
            Self::StorageError(s) => write!(f, "storage error: {}", s),
            Self::ValidationError(s) => write!(f, "validation error: {}", s),
            Self::InternalError(s) => write!(f, "internal error: {}", s),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CanOpenError {}

impl From<NodeIdError> for CanOpenError {
    fn from(err: NodeIdError) -> Self {
        match err {
            NodeIdError::InvalidRange(v) => CanOpenError::InvalidNodeId(v),
        }
    }
}

impl From<PdoError> for CanOpenError {
    fn from(err: PdoError) -> Self {
        match err {
            PdoError::ObjectNotFound => CanOpenError::ObjectNotFound,
            PdoError::NotMappable => CanOpenError::PdoMapNotMappable,
            PdoError::Overrun => CanOpenError::PdoMapOverrun,
            PdoError::TypeMismatch => CanOpenError::TypeMismatch,
            PdoError::PayloadTooSmall => CanOpenError::BufferTooShort,
        }
    }
}

impl From<&'static str> for CanOpenError {
    fn from(s: &'static str) -> Self {
        CanOpenError::InternalError(s)
    }
}

// --- CiA 301 SDO abort codes ---
pub mod abort_code {
    pub const TOGGLE_BIT: u32 = 0x0503_0000;
    pub const SDO_TIMEOUT: u32 = 0x0504_0000;
    pub const COMMAND_SPECIFIER: u32 = 0x0504_0001;
    pub const INVALID_BLOCK_SIZE: u32 = 0x0504_0002;
    pub const INVALID_SEQUENCE_NUMBER: u32 = 0x0504_0003;
    pub const CRC_ERROR: u32 = 0x0504_0004;
    pub const UNSUPPORTED_ACCESS: u32 = 0x0601_0000;
    pub const WRITE_ONLY: u32 = 0x0601_0001;
    pub const READ_ONLY: u32 = 0x0601_0002;
    pub const OBJECT_DOES_NOT_EXIST: u32 = 0x0602_0000;
    pub const LENGTH_MISMATCH: u32 = 0x0607_0010;
    pub const LENGTH_TOO_HIGH: u32 = 0x0607_0012;
    pub const LENGTH_TOO_LOW: u32 = 0x0607_0013;
    pub const SUBINDEX_DOES_NOT_EXIST: u32 = 0x0609_0011;
    pub const VALUE_RANGE_EXCEEDED: u32 = 0x0609_0030;
    pub const GENERAL_TRANSFER_ERROR: u32 = 0x0800_0020;
    pub const GENERAL_STORE_ERROR: u32 = 0x0800_0022;
    pub const MAPPING_OBJECT_TOO_LARGE: u32 = 0x0604_0041;
    pub const MAPPING_WOULD_EXCEED_PDO_LENGTH: u32 = 0x0604_0042;
    pub const GENERAL_INCOMPATIBILITY: u32 = 0x0604_0043;
    pub const GENERAL_ERROR: u32 = 0x0800_0000;
}
