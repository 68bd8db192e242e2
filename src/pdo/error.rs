// src/pdo/error.rs
use core::fmt;

/// Errors raised while validating or applying a PDO mapping
/// (spec.md Section 4.2 "PDO mapping entry").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdoError {
    /// A mapping entry points to an object absent from the Dictionary.
    ObjectNotFound,
    /// The referenced object does not carry the PDO-mappable (P) flag.
    NotMappable,
    /// The sum of mapped bit lengths exceeds 64 bits.
    Overrun,
    /// A mapped bit length is not a multiple of 8 for this profile.
    TypeMismatch,
    /// The CAN frame payload is too short for the configured mapping.
    PayloadTooSmall,
}

impl fmt::Display for PdoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ObjectNotFound => write!(f, "PDO mapping references an unknown object"),
            Self::NotMappable => write!(f, "object is not flagged PDO-mappable"),
            Self::Overrun => write!(f, "PDO mapping exceeds 64-bit payload budget"),
            Self::TypeMismatch => write!(f, "mapped bit length is not a multiple of 8"),
            Self::PayloadTooSmall => write!(f, "frame payload too small for configured mapping"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PdoError {}
