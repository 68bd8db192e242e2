// src/pdo/link.rs
use alloc::vec::Vec;

/// One row of the mapping-link table: an Object mapped with the
/// asynchronous-trigger (A) flag, and which TPDO channel it feeds.
/// Writing such an object walks this table to mark every matching
/// TPDO event-pending (spec.md Section 3 "mapping-link table",
/// Section 4.5 "Object change").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingLink {
    pub index: u16,
    pub sub_index: u8,
    pub tpdo_channel: u8,
}

/// Flat array of `MappingLink` rows, sized at (number of TPDOs x 8)
/// per spec.md Section 4.5, and rebuilt whenever any TPDO's mapping is
/// validated.
#[derive(Debug, Clone, Default)]
pub struct MappingLinkTable {
    links: Vec<MappingLink>,
}

impl MappingLinkTable {
    pub fn new() -> Self {
        Self { links: Vec::new() }
    }

    /// Rebuilds the table's entries for one TPDO channel from its
    /// current mapping, replacing whatever that channel previously
    /// contributed.
    pub fn rebuild_channel(
        &mut self,
        channel: u8,
        mapping: &super::mapping::PdoMapping,
    ) {
        self.links.retain(|l| l.tpdo_channel != channel);
        for (_, entry) in mapping.iter_with_offsets() {
            self.links.push(MappingLink {
                index: entry.index,
                sub_index: entry.sub_index,
                tpdo_channel: channel,
            });
        }
    }

    /// TPDO channels that map the given object, in ascending order
    /// with duplicates removed.
    pub fn channels_for(&self, index: u16, sub_index: u8) -> Vec<u8> {
        let mut channels: Vec<u8> = self
            .links
            .iter()
            .filter(|l| l.index == index && l.sub_index == sub_index)
            .map(|l| l.tpdo_channel)
            .collect();
        channels.sort_unstable();
        channels.dedup();
        channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdo::mapping::{PdoMapping, PdoMappingEntry};

    #[test]
    fn walks_to_every_tpdo_mapping_the_object() {
        let mut table = MappingLinkTable::new();
        let mut mapping0 = PdoMapping::new();
        mapping0.set(
            0,
            PdoMappingEntry {
                index: 0x2000,
                sub_index: 0,
                length_bits: 16,
            },
        );
        mapping0.set_len(1);
        table.rebuild_channel(0, &mapping0);

        let mut mapping1 = PdoMapping::new();
        mapping1.set(
            0,
            PdoMappingEntry {
                index: 0x2000,
                sub_index: 0,
                length_bits: 16,
            },
        );
        mapping1.set_len(1);
        table.rebuild_channel(1, &mapping1);

        assert_eq!(table.channels_for(0x2000, 0), alloc::vec![0, 1]);
        assert!(table.channels_for(0x2001, 0).is_empty());
    }

    #[test]
    fn rebuild_replaces_prior_channel_contents() {
        let mut table = MappingLinkTable::new();
        let mut mapping = PdoMapping::new();
        mapping.set(
            0,
            PdoMappingEntry {
                index: 0x2000,
                sub_index: 0,
                length_bits: 16,
            },
        );
        mapping.set_len(1);
        table.rebuild_channel(0, &mapping);
        table.rebuild_channel(0, &PdoMapping::new());
        assert!(table.channels_for(0x2000, 0).is_empty());
    }
}
