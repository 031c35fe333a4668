//! Item table: the tagfile's pointer substitute.

use veles_common::BinaryReader;

use crate::wire::ItemEntry;
use crate::DecodeError;

/// Combined table of every ITEM entry in the file, in slot order.
///
/// Slot numbers are positions in this table; slot 0 is the conventional
/// null entry.
#[derive(Debug, Default)]
pub struct ItemTable {
    entries: Vec<ItemEntry>,
}

impl ItemTable {
    /// An empty table, for buffers carrying no INDX subtree.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse and append the entries of one ITEM chunk payload.
    pub fn extend_from_payload(&mut self, payload: &[u8]) -> Result<(), DecodeError> {
        let mut reader = BinaryReader::new(payload);
        while !reader.is_empty() {
            self.entries.push(reader.read_struct::<ItemEntry>()?);
        }
        Ok(())
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get an entry by slot number.
    pub fn get(&self, slot: u32) -> Option<&ItemEntry> {
        self.entries.get(slot as usize)
    }

    /// Iterate (slot, entry) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &ItemEntry)> {
        self.entries.iter().enumerate().map(|(i, e)| (i as u32, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entries() {
        let mut payload = Vec::new();
        for (t, o, c) in [(0u32, 0u32, 0u32), (1, 0, 1), (2, 16, 6)] {
            payload.extend_from_slice(&t.to_le_bytes());
            payload.extend_from_slice(&o.to_le_bytes());
            payload.extend_from_slice(&c.to_le_bytes());
        }

        let mut table = ItemTable::empty();
        table.extend_from_payload(&payload).unwrap();

        assert_eq!(table.len(), 3);
        let entry = table.get(2).unwrap();
        // Copy out of the packed struct before asserting.
        let (type_index, data_offset, count) = (entry.type_index, entry.data_offset, entry.count);
        assert_eq!(type_index, 2);
        assert_eq!(data_offset, 16);
        assert_eq!(count, 6);
        assert!(table.get(3).is_none());
    }
}
