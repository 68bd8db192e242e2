// src/od/mod.rs
mod entry;
mod error_history;
mod object_type;
mod predefined;
mod value;

pub use entry::{AccessFlags, ObjectEntry};
pub use error_history::ErrorHistory;
pub use object_type::{ObjectTypeKind, PdoDirection};
pub use predefined::MAX_HEARTBEAT_CONSUMERS;
pub use value::ObjectValue;

use crate::hal::NvmInterface;
use crate::types::{NodeId, C_PARA_RESTORE_SIGNATURE, C_PARA_STORE_SIGNATURE};
use crate::CanOpenError;
use alloc::collections::BTreeMap;
use log::{debug, trace, warn};

/// The Object Dictionary: the addressable store of every (index,
/// sub-index) object a node exposes. Created once at startup and
/// mutated only through the typed accessors below.
///
/// Entries whose `ObjectTypeKind` is not `Plain` still write through
/// here unconditionally — `Node` re-checks the entry's kind after a
/// successful write to run whatever side effect (arming a timer,
/// rebuilding a PDO mapping-link table) that type requires.
pub struct ObjectDictionary<'a> {
    entries: BTreeMap<(u16, u8), ObjectEntry>,
    error_history: ErrorHistory,
    nvm: Option<&'a mut dyn NvmInterface>,
    node_id: NodeId,
}

/// NVM byte offset reserved for the parameter-store region. A real
/// deployment would derive per-group offsets from a linker-provided
/// table; one fixed region is sufficient for the single parameter
/// group this stack exposes; multi-group layout is left
/// application-defined.
const NVM_STORE_OFFSET: u32 = 0;

impl<'a> ObjectDictionary<'a> {
    pub fn new(node_id: NodeId, mut nvm: Option<&'a mut dyn NvmInterface>) -> Self {
        if let Some(n) = nvm.as_deref_mut() {
            if let Err(e) = n.init() {
                warn!("nvm init failed: {:?}", e);
            }
        }
        let mut dict = Self {
            entries: BTreeMap::new(),
            error_history: ErrorHistory::new(error_history::DEFAULT_ERROR_HISTORY_DEPTH),
            nvm,
            node_id,
        };
        predefined::populate_mandatory_objects(&mut dict, node_id);
        dict
    }

    /// Inserts or replaces an entry. Used by application setup code and
    /// by `predefined` to seed the mandatory communication profile.
    pub fn insert(&mut self, entry: ObjectEntry) {
        self.entries.insert(entry.key(), entry);
    }

    pub fn entry(&self, index: u16, sub_index: u8) -> Option<&ObjectEntry> {
        self.entries.get(&(index, sub_index))
    }

    pub fn entry_mut(&mut self, index: u16, sub_index: u8) -> Option<&mut ObjectEntry> {
        self.entries.get_mut(&(index, sub_index))
    }

    /// Highest populated sub-index under `index`, for sub-index 0 count
    /// reporting on array/record objects.
    pub fn highest_sub_index(&self, index: u16) -> u8 {
        self.entries
            .range((index, 0)..(index + 1, 0))
            .map(|((_, sub), _)| *sub)
            .max()
            .unwrap_or(0)
    }

    /// Reads an object's current value, applying the node-ID-relative
    /// adjustment (the node-ID-relative access flag) if configured.
    pub fn read(&self, index: u16, sub_index: u8) -> Result<ObjectValue, CanOpenError> {
        if index == 0x1003 {
            let raw = self
                .error_history
                .get(sub_index)
                .ok_or(CanOpenError::SubObjectNotFound)?;
            return Ok(ObjectValue::Unsigned32(raw));
        }
        let entry = self
            .entries
            .get(&(index, sub_index))
            .ok_or(CanOpenError::ObjectNotFound)?;
        if !entry.flags.readable {
            return Err(CanOpenError::AccessViolation);
        }
        if entry.flags.node_id_relative {
            Ok(entry.value.wrapping_add_node_id(self.node_id.0 as i32))
        } else {
            Ok(entry.value.clone())
        }
    }

    /// Writes a new value, enforcing access rights, type match, and
    /// size match before committing. Returns the entry's `ObjectTypeKind`
    /// on success so the caller (`Node`) can run any required side
    /// effect; the Dictionary itself never reaches outside its own
    /// storage.
    pub fn write(
        &mut self,
        index: u16,
        sub_index: u8,
        value: ObjectValue,
    ) -> Result<ObjectTypeKind, CanOpenError> {
        if index == 0x1003 {
            if sub_index != 0 {
                return Err(CanOpenError::AccessViolation);
            }
            self.error_history.clear();
            trace!("error history cleared via 0x1003 write");
            return Ok(ObjectTypeKind::ErrorHistory);
        }

        let entry = self
            .entries
            .get_mut(&(index, sub_index))
            .ok_or(CanOpenError::ObjectNotFound)?;

        if !entry.flags.writable {
            return Err(CanOpenError::AccessViolation);
        }

        if entry.kind.is_signature_gated() {
            let expected = if matches!(entry.kind, ObjectTypeKind::ParaStore) {
                C_PARA_STORE_SIGNATURE
            } else {
                C_PARA_RESTORE_SIGNATURE
            };
            match &value {
                ObjectValue::Unsigned32(v) if *v == expected => {}
                _ => return Err(CanOpenError::RangeError),
            }
            entry.value = value;
            return Ok(entry.kind);
        }

        let incoming = if entry.flags.node_id_relative {
            value.wrapping_add_node_id(-(self.node_id.0 as i32))
        } else {
            value
        };

        match (entry.value.fixed_width(), incoming.fixed_width()) {
            (Some(a), Some(b)) if a != b => return Err(CanOpenError::SizeMismatch),
            (None, None) => {}
            (Some(_), None) | (None, Some(_)) => return Err(CanOpenError::TypeMismatch),
            _ => {}
        }
        if core::mem::discriminant(&entry.value) != core::mem::discriminant(&incoming) {
            return Err(CanOpenError::TypeMismatch);
        }

        entry.value = incoming;
        debug!("wrote object {:#06x}:{:#04x}", index, sub_index);
        Ok(entry.kind)
    }

    /// Adds the communication and mapping parameter objects for one
    /// RPDO channel (0x1400+n / 0x1600+n). Called by `Node` when the
    /// application configures an additional receive channel.
    pub fn add_rpdo_channel(&mut self, channel: u8) {
        predefined::add_rpdo_defaults(self, channel, self.node_id);
    }

    /// Adds the communication and mapping parameter objects for one
    /// TPDO channel (0x1800+n / 0x1A00+n).
    pub fn add_tpdo_channel(&mut self, channel: u8) {
        predefined::add_tpdo_defaults(self, channel, self.node_id);
    }

    /// Pushes a new error into the 0x1003 history, most-recent-first.
    pub fn push_error_history(&mut self, error_code: u16) {
        self.error_history.push(error_code, 0);
    }

    pub fn error_history(&self) -> &ErrorHistory {
        &self.error_history
    }

    /// Serialises every writable, non-command object into the NVM
    /// region.
    pub fn store_parameters(&mut self) -> Result<(), CanOpenError> {
        let nvm = self.nvm.as_deref_mut().ok_or(CanOpenError::NvmError)?;
        let mut buf = alloc::vec::Vec::new();
        for ((index, sub), entry) in self.entries.iter() {
            if matches!(entry.kind, ObjectTypeKind::ParaStore | ObjectTypeKind::ParaRestore) {
                continue;
            }
            if !entry.flags.writable {
                continue;
            }
            let bytes = entry.value.serialize();
            buf.extend_from_slice(&index.to_le_bytes());
            buf.push(*sub);
            buf.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
            buf.extend_from_slice(&bytes);
        }
        nvm.write(NVM_STORE_OFFSET, &buf, buf.len())?;
        warn!("stored {} bytes of parameters to nvm", buf.len());
        Ok(())
    }

    /// Re-reads every stored parameter back from NVM, applying each one
    /// through the normal typed write path so access rights and size
    /// checks still apply.
    pub fn restore_parameters(&mut self) -> Result<(), CanOpenError> {
        let nvm = self.nvm.as_deref_mut().ok_or(CanOpenError::NvmError)?;
        let mut buf = alloc::vec![0u8; 4096];
        let read = nvm.read(NVM_STORE_OFFSET, &mut buf, buf.len())?;
        let mut pos = 0usize;
        while pos + 5 <= read {
            let index = u16::from_le_bytes([buf[pos], buf[pos + 1]]);
            let sub = buf[pos + 2];
            let len = u16::from_le_bytes([buf[pos + 3], buf[pos + 4]]) as usize;
            pos += 5;
            if pos + len > read {
                break;
            }
            if let Some(template) = self.entries.get(&(index, sub)).map(|e| e.value.clone()) {
                if let Ok(value) = ObjectValue::deserialize(&buf[pos..pos + len], &template) {
                    let _ = self.write(index, sub, value);
                }
            }
            pos += len;
        }
        Ok(())
    }
}
