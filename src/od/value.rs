// src/od/value.rs
use crate::common::{TimeDifference, TimeOfDay};
use crate::types::{
    INTEGER16, INTEGER32, INTEGER64, INTEGER8, REAL32, REAL64, UNSIGNED16, UNSIGNED32,
    UNSIGNED64, UNSIGNED8,
};
use crate::CanOpenError;
use alloc::{string::String, vec, vec::Vec};

/// Any value that can be stored in an Object Dictionary entry.
///
/// This is the sum-type representation of CiA 301's primitive data types
/// (Section 7.1.2). Every fixed-width numeric variant carries its native
/// Rust type directly; variable-length types carry owned buffers.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectValue {
    Boolean(bool),
    Integer8(INTEGER8),
    Integer16(INTEGER16),
    Integer32(INTEGER32),
    Integer64(INTEGER64),
    Unsigned8(UNSIGNED8),
    Unsigned16(UNSIGNED16),
    Unsigned32(UNSIGNED32),
    Unsigned64(UNSIGNED64),
    Real32(REAL32),
    Real64(REAL64),
    VisibleString(String),
    OctetString(Vec<u8>),
    Domain(Vec<u8>),
    TimeOfDay(TimeOfDay),
    TimeDifference(TimeDifference),
}

impl ObjectValue {
    /// Fixed wire width in bytes for scalar types, or `None` for
    /// variable-length types (string/octet-string/domain).
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            ObjectValue::Boolean(_) | ObjectValue::Integer8(_) | ObjectValue::Unsigned8(_) => {
                Some(1)
            }
            ObjectValue::Integer16(_) | ObjectValue::Unsigned16(_) => Some(2),
            ObjectValue::Integer32(_) | ObjectValue::Unsigned32(_) | ObjectValue::Real32(_) => {
                Some(4)
            }
            ObjectValue::Integer64(_)
            | ObjectValue::Unsigned64(_)
            | ObjectValue::Real64(_)
            | ObjectValue::TimeOfDay(_)
            | ObjectValue::TimeDifference(_) => Some(8),
            ObjectValue::VisibleString(_) | ObjectValue::OctetString(_) | ObjectValue::Domain(_) => {
                None
            }
        }
    }

    /// Current length in bytes of this value's wire representation.
    pub fn len(&self) -> usize {
        match self {
            ObjectValue::VisibleString(s) => s.as_bytes().len(),
            ObjectValue::OctetString(v) | ObjectValue::Domain(v) => v.len(),
            other => other.fixed_width().unwrap_or(0),
        }
    }

    /// Serializes the value into a little-endian byte vector.
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            ObjectValue::Boolean(v) => vec![if *v { 1 } else { 0 }],
            ObjectValue::Integer8(v) => v.to_le_bytes().to_vec(),
            ObjectValue::Integer16(v) => v.to_le_bytes().to_vec(),
            ObjectValue::Integer32(v) => v.to_le_bytes().to_vec(),
            ObjectValue::Integer64(v) => v.to_le_bytes().to_vec(),
            ObjectValue::Unsigned8(v) => v.to_le_bytes().to_vec(),
            ObjectValue::Unsigned16(v) => v.to_le_bytes().to_vec(),
            ObjectValue::Unsigned32(v) => v.to_le_bytes().to_vec(),
            ObjectValue::Unsigned64(v) => v.to_le_bytes().to_vec(),
            ObjectValue::Real32(v) => v.to_le_bytes().to_vec(),
            ObjectValue::Real64(v) => v.to_le_bytes().to_vec(),
            ObjectValue::VisibleString(v) => v.as_bytes().to_vec(),
            ObjectValue::OctetString(v) => v.clone(),
            ObjectValue::Domain(v) => v.clone(),
            ObjectValue::TimeOfDay(t) | ObjectValue::TimeDifference(t) => {
                let mut buf = vec![0u8; 8];
                buf[0..4].copy_from_slice(&t.milliseconds.to_le_bytes());
                buf[4..6].copy_from_slice(&t.days.to_le_bytes());
                buf
            }
        }
    }

    /// Deserializes `data` into a new `ObjectValue` shaped like `template`.
    pub fn deserialize(data: &[u8], template: &ObjectValue) -> Result<ObjectValue, CanOpenError> {
        macro_rules! fixed {
            ($variant:path, $ty:ty) => {
                data.try_into()
                    .map(|b| $variant(<$ty>::from_le_bytes(b)))
                    .map_err(|_| CanOpenError::SizeMismatch)
            };
        }
        match template {
            ObjectValue::Boolean(_) => {
                let b: [u8; 1] = data.try_into().map_err(|_| CanOpenError::SizeMismatch)?;
                Ok(ObjectValue::Boolean(b[0] != 0))
            }
            ObjectValue::Integer8(_) => fixed!(ObjectValue::Integer8, i8),
            ObjectValue::Integer16(_) => fixed!(ObjectValue::Integer16, i16),
            ObjectValue::Integer32(_) => fixed!(ObjectValue::Integer32, i32),
            ObjectValue::Integer64(_) => fixed!(ObjectValue::Integer64, i64),
            ObjectValue::Unsigned8(_) => fixed!(ObjectValue::Unsigned8, u8),
            ObjectValue::Unsigned16(_) => fixed!(ObjectValue::Unsigned16, u16),
            ObjectValue::Unsigned32(_) => fixed!(ObjectValue::Unsigned32, u32),
            ObjectValue::Unsigned64(_) => fixed!(ObjectValue::Unsigned64, u64),
            ObjectValue::Real32(_) => fixed!(ObjectValue::Real32, f32),
            ObjectValue::Real64(_) => fixed!(ObjectValue::Real64, f64),
            ObjectValue::VisibleString(_) => Ok(ObjectValue::VisibleString(
                String::from_utf8(data.to_vec()).map_err(|_| CanOpenError::TypeMismatch)?,
            )),
            ObjectValue::OctetString(_) => Ok(ObjectValue::OctetString(data.to_vec())),
            ObjectValue::Domain(_) => Ok(ObjectValue::Domain(data.to_vec())),
            ObjectValue::TimeOfDay(_) | ObjectValue::TimeDifference(_) => {
                if data.len() != 8 {
                    return Err(CanOpenError::SizeMismatch);
                }
                let milliseconds = u32::from_le_bytes(data[0..4].try_into().unwrap());
                let days = u16::from_le_bytes(data[4..6].try_into().unwrap());
                let t = TimeOfDay { milliseconds, days };
                Ok(if matches!(template, ObjectValue::TimeOfDay(_)) {
                    ObjectValue::TimeOfDay(t)
                } else {
                    ObjectValue::TimeDifference(TimeDifference {
                        milliseconds: t.milliseconds,
                        days: t.days,
                    })
                })
            }
        }
    }

    /// Adds `delta` to a scalar value, wrapping modulo its width. Used for
    /// the N (node-ID-relative) access flag: reads add, writes subtract.
    pub fn wrapping_add_node_id(&self, delta: i32) -> ObjectValue {
        match self {
            ObjectValue::Unsigned8(v) => ObjectValue::Unsigned8(v.wrapping_add(delta as u8)),
            ObjectValue::Unsigned16(v) => ObjectValue::Unsigned16(v.wrapping_add(delta as u16)),
            ObjectValue::Unsigned32(v) => ObjectValue::Unsigned32(v.wrapping_add(delta as u32)),
            ObjectValue::Integer8(v) => ObjectValue::Integer8(v.wrapping_add(delta as i8)),
            ObjectValue::Integer16(v) => ObjectValue::Integer16(v.wrapping_add(delta as i16)),
            ObjectValue::Integer32(v) => ObjectValue::Integer32(v.wrapping_add(delta)),
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_fixed_width_scalar() {
        let template = ObjectValue::Unsigned16(0);
        let original = ObjectValue::Unsigned16(0x1234);
        let bytes = original.serialize();
        let restored = ObjectValue::deserialize(&bytes, &template).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn node_id_adjustment_wraps() {
        let v = ObjectValue::Unsigned8(250);
        assert_eq!(v.wrapping_add_node_id(10), ObjectValue::Unsigned8(4));
    }
}
