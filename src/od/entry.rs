// src/od/entry.rs
use super::value::ObjectValue;

/// Access rights and behavioural flags for one Object Dictionary entry.
///
/// Mirrors the access-right key byte CiA 301 assigns every object:
/// readable, writable, PDO-mappable, node-ID-relative. Kept as a small
/// bitflag-style struct rather than a raw byte so call sites read as
/// intent, not magic numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessFlags {
    pub readable: bool,
    pub writable: bool,
    pub pdo_mappable: bool,
    /// Writing this object should mark every TPDO mapping it through
    /// the link table event-pending (spec.md Section 3's "A" flag).
    pub async_trigger: bool,
    /// Value is added to / subtracted from the Node ID on read/write.
    pub node_id_relative: bool,
}

impl AccessFlags {
    pub const RO: Self = Self {
        readable: true,
        writable: false,
        pdo_mappable: false,
        async_trigger: false,
        node_id_relative: false,
    };
    pub const RW: Self = Self {
        readable: true,
        writable: true,
        pdo_mappable: false,
        async_trigger: false,
        node_id_relative: false,
    };
    pub const CONST: Self = Self {
        readable: true,
        writable: false,
        pdo_mappable: false,
        async_trigger: false,
        node_id_relative: false,
    };

    pub const fn rw_mappable(self) -> Self {
        Self {
            pdo_mappable: true,
            ..self
        }
    }

    /// Marks the object PDO-mappable and flags it to trigger any TPDO
    /// mapping it on every write (the "A" access flag).
    pub const fn rw_async(self) -> Self {
        Self {
            pdo_mappable: true,
            async_trigger: true,
            ..self
        }
    }

    pub const fn node_relative(self) -> Self {
        Self {
            node_id_relative: true,
            ..self
        }
    }
}

/// One entry in the Object Dictionary: a (index, sub-index) addressed
/// value together with its access rights and type-specific behaviour.
#[derive(Debug, Clone)]
pub struct ObjectEntry {
    pub index: u16,
    pub sub_index: u8,
    pub value: ObjectValue,
    pub flags: AccessFlags,
    pub kind: super::object_type::ObjectTypeKind,
}

impl ObjectEntry {
    pub fn new(
        index: u16,
        sub_index: u8,
        value: ObjectValue,
        flags: AccessFlags,
        kind: super::object_type::ObjectTypeKind,
    ) -> Self {
        Self {
            index,
            sub_index,
            value,
            flags,
            kind,
        }
    }

    /// Plain RW/RO scalar entry with no type-specific side effects.
    pub fn scalar(index: u16, sub_index: u8, value: ObjectValue, flags: AccessFlags) -> Self {
        Self::new(index, sub_index, value, flags, super::object_type::ObjectTypeKind::Plain)
    }

    pub fn key(&self) -> (u16, u8) {
        (self.index, self.sub_index)
    }
}
