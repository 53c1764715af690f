//! The sound archive's string block: a table of item names and a binary
//! lookup trie over them.
//!
//! ```text
//! "STRG" size | ref 0x2400 -> string table | ref 0x2401 -> lookup table
//! string table: count, {0x1F01, offset, length}..., NUL-terminated names
//! lookup table: root, count, {leaf, bit, left, right, string, id}...
//! ```
//!
//! Block references are relative to STRG + 8, string records to the
//! string table's start.

use encoding::all::ISO_8859_1;
use encoding::{DecoderTrap, EncoderTrap, Encoding};

use super::cursor::{Endian, Reader, Writer};
use super::errors::Error;
use super::fourcc::STRG_SIG;
use super::layout::{align_up, to_u32, BLOCK_ALIGN, RECORD_ALIGN};
use super::reference::{ids, Reference, SizedReference, NULL_OFFSET};

const STRING_TABLE_OFFSET: u64 = 0x10;
const NODE_SIZE: u64 = 20;

/// One trie node. Leaves carry `string_index` and `id`; inner nodes carry
/// `bit` and the two children. Unused fields hold all-ones.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TrieNode {
    pub leaf: bool,
    /// Bit to test, counted from the most significant bit of the first
    /// byte of the key.
    pub bit: u16,
    pub left: u32,
    pub right: u32,
    pub string_index: u32,
    pub id: u32,
}

impl TrieNode {
    fn read(r: &mut Reader) -> Result<Self, Error> {
        Ok(TrieNode {
            leaf: r.read_u16()? != 0,
            bit: r.read_u16()?,
            left: r.read_u32()?,
            right: r.read_u32()?,
            string_index: r.read_u32()?,
            id: r.read_u32()?,
        })
    }

    fn write(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_u16(self.leaf as u16)?;
        w.write_u16(self.bit)?;
        w.write_u32(self.left)?;
        w.write_u32(self.right)?;
        w.write_u32(self.string_index)?;
        w.write_u32(self.id)
    }
}

/// Bit `index` of `key`, zero past its end.
pub fn key_bit(key: &[u8], index: u16) -> u8 {
    let byte = (index >> 3) as usize;
    match key.get(byte) {
        Some(b) => (b >> (7 - (index & 7))) & 1,
        None => 0,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTrie {
    pub root: u32,
    pub nodes: Vec<TrieNode>,
}

impl Default for LookupTrie {
    fn default() -> Self {
        LookupTrie {
            root: NULL_OFFSET,
            nodes: vec![],
        }
    }
}

impl LookupTrie {
    fn read(r: &mut Reader) -> Result<Self, Error> {
        let root = r.read_u32()?;
        let count = r.read_u32()?;
        if count as u64 * NODE_SIZE > r.remaining() {
            return Err(Error::TruncatedData {
                at: r.tell(),
                wanted: count as u64 * NODE_SIZE,
                available: r.remaining(),
            });
        }
        let nodes = (0..count)
            .map(|_| TrieNode::read(r))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LookupTrie { root, nodes })
    }

    fn write(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_u32(self.root)?;
        w.write_u32(self.nodes.len() as u32)?;
        for node in &self.nodes {
            node.write(w)?;
        }
        Ok(())
    }

    fn byte_len(&self) -> u64 {
        8 + NODE_SIZE * self.nodes.len() as u64
    }

    /// Build a crit-bit trie over `entries`, where each entry's string
    /// index is its position in the slice. Nodes are numbered in
    /// preorder, so the root is node 0.
    pub fn build<K: AsRef<[u8]>>(entries: &[(K, u32)]) -> Result<Self, Error> {
        let mut keyed: Vec<(&[u8], u32, u32)> = Vec::with_capacity(entries.len());
        for (index, (key, id)) in entries.iter().enumerate() {
            let key = key.as_ref();
            if key.len() * 8 > u16::MAX as usize {
                return Err(Error::InconsistentLayout(format!(
                    "name of {} bytes is too long for the lookup table",
                    key.len()
                )));
            }
            keyed.push((key, index as u32, *id));
        }

        let mut trie = LookupTrie::default();
        if !keyed.is_empty() {
            trie.root = 0;
            trie.insert(&keyed)?;
        }
        Ok(trie)
    }

    fn insert(&mut self, entries: &[(&[u8], u32, u32)]) -> Result<u32, Error> {
        let index = self.nodes.len() as u32;
        if let [(_, string_index, id)] = entries {
            self.nodes.push(TrieNode {
                leaf: true,
                bit: u16::MAX,
                left: NULL_OFFSET,
                right: NULL_OFFSET,
                string_index: *string_index,
                id: *id,
            });
            return Ok(index);
        }

        let longest = entries.iter().map(|e| e.0.len()).max().unwrap_or(0) * 8;
        let bit = (0..longest as u16)
            .find(|bit| {
                let first = key_bit(entries[0].0, *bit);
                entries.iter().any(|e| key_bit(e.0, *bit) != first)
            })
            .ok_or_else(|| {
                Error::InconsistentLayout(format!(
                    "duplicate name {:?} in lookup table",
                    String::from_utf8_lossy(entries[0].0)
                ))
            })?;

        let (zeros, ones): (Vec<_>, Vec<_>) =
            entries.iter().copied().partition(|e| key_bit(e.0, bit) == 0);

        self.nodes.push(TrieNode {
            leaf: false,
            bit,
            left: NULL_OFFSET,
            right: NULL_OFFSET,
            string_index: NULL_OFFSET,
            id: NULL_OFFSET,
        });
        let left = self.insert(&zeros)?;
        let right = self.insert(&ones)?;
        let node = &mut self.nodes[index as usize];
        node.left = left;
        node.right = right;
        Ok(index)
    }

    /// Walk from the root to the leaf `key` selects. The caller still has
    /// to compare the leaf's string with the key.
    pub fn leaf_for(&self, key: &[u8]) -> Option<&TrieNode> {
        let mut node = self.nodes.get(self.root as usize)?;
        // a well-formed trie never revisits a node
        for _ in 0..self.nodes.len() {
            if node.leaf {
                return Some(node);
            }
            let next = if key_bit(key, node.bit) == 1 {
                node.right
            } else {
                node.left
            };
            node = self.nodes.get(next as usize)?;
        }
        None
    }
}

/// The decoded string block. Names and the trie change together through
/// `build` and `push`; a loaded trie is written back as it was read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StringBlock {
    strings: Vec<String>,
    /// Item id of each name; `NULL_OFFSET` for names no leaf points at.
    ids: Vec<u32>,
    lookup: LookupTrie,
}

fn decode_name(raw: &[u8]) -> Result<String, Error> {
    ISO_8859_1
        .decode(raw, DecoderTrap::Strict)
        .map_err(|e| Error::InconsistentLayout(format!("undecodable name: {}", e)))
}

fn encode_name(name: &str) -> Result<Vec<u8>, Error> {
    ISO_8859_1
        .encode(name, EncoderTrap::Strict)
        .map_err(|e| Error::InconsistentLayout(format!("name {:?} cannot be stored: {}", name, e)))
}

impl StringBlock {
    /// Names in the given order plus a fresh lookup trie over them.
    pub fn build(entries: Vec<(String, u32)>) -> Result<Self, Error> {
        let (strings, ids) = entries.into_iter().unzip();
        let mut block = StringBlock {
            strings,
            ids,
            lookup: LookupTrie::default(),
        };
        block.rebuild_lookup()?;
        Ok(block)
    }

    /// Append a name and rebuild the trie.
    pub fn push(&mut self, name: String, id: u32) -> Result<(), Error> {
        self.strings.push(name);
        self.ids.push(id);
        if let Err(e) = self.rebuild_lookup() {
            self.strings.pop();
            self.ids.pop();
            return Err(e);
        }
        Ok(())
    }

    fn rebuild_lookup(&mut self) -> Result<(), Error> {
        let encoded = self
            .encoded_names()?
            .into_iter()
            .zip(self.ids.iter().copied())
            .collect::<Vec<_>>();
        self.lookup = LookupTrie::build(&encoded)?;
        Ok(())
    }

    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    pub fn lookup(&self) -> &LookupTrie {
        &self.lookup
    }

    /// Names paired with their item ids, in table order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.strings
            .iter()
            .map(String::as_str)
            .zip(self.ids.iter().copied())
    }

    /// Decode a complete STRG block, starting with its magic.
    pub fn read(block: &[u8], endian: Endian) -> Result<Self, Error> {
        let mut r = Reader::new(block, endian);
        r.expect_fourcc(STRG_SIG)?;
        let _size = r.read_u32()?;
        let base = r.tell();

        let table_at = Reference::read(&mut r)?
            .expect(&[ids::SAR_STRING_TABLE])?
            .require_within(base, r.len())?;
        let lookup_at = Reference::read(&mut r)?
            .expect(&[ids::SAR_LOOKUP_TABLE])?
            .resolve_within(base, r.len())?;

        r.seek(table_at)?;
        let count = r.read_u32()?;
        if count as u64 * SizedReference::SIZE as u64 > r.remaining() {
            return Err(Error::TruncatedData {
                at: r.tell(),
                wanted: count as u64 * SizedReference::SIZE as u64,
                available: r.remaining(),
            });
        }
        let records = (0..count)
            .map(|_| SizedReference::read(&mut r))
            .collect::<Result<Vec<_>, _>>()?;

        let mut strings = Vec::with_capacity(records.len());
        for record in &records {
            record.reference.expect(&[ids::STRING_DATA])?;
            let (start, end) = record.range_within(table_at, r.len())?;
            // the length counts the terminating NUL
            let raw = &block[start as usize..end as usize];
            let raw = match raw.split_last() {
                Some((&0, name)) => name,
                _ => raw,
            };
            strings.push(decode_name(raw)?);
        }

        let lookup = match lookup_at {
            Some(at) => {
                r.seek(at)?;
                LookupTrie::read(&mut r)?
            }
            None => LookupTrie::default(),
        };

        let mut ids = vec![NULL_OFFSET; strings.len()];
        for leaf in lookup.nodes.iter().filter(|n| n.leaf) {
            if let Some(id) = ids.get_mut(leaf.string_index as usize) {
                *id = leaf.id;
            }
        }

        log::trace!("string block with {} names, {} trie nodes", strings.len(), lookup.nodes.len());
        Ok(StringBlock {
            strings,
            ids,
            lookup,
        })
    }

    /// Item id of `name`, resolved through the lookup trie.
    pub fn find(&self, name: &str) -> Option<u32> {
        let key = encode_name(name).ok()?;
        let leaf = self.lookup.leaf_for(&key)?;
        match self.strings.get(leaf.string_index as usize) {
            Some(found) if found == name => Some(leaf.id),
            _ => None,
        }
    }

    fn encoded_names(&self) -> Result<Vec<Vec<u8>>, Error> {
        self.strings.iter().map(|s| encode_name(s)).collect()
    }

    /// Serialize the whole block, padded to 0x20.
    pub fn to_bytes(&self, endian: Endian) -> Result<Vec<u8>, Error> {
        let names = self.encoded_names()?;
        let records_len = 4 + SizedReference::SIZE as u64 * names.len() as u64;
        let blob_len: u64 = names.iter().map(|n| n.len() as u64 + 1).sum();
        let table_len = align_up(records_len + blob_len, RECORD_ALIGN);
        let lookup_offset = STRING_TABLE_OFFSET + table_len;
        let size = align_up(8 + lookup_offset + self.lookup.byte_len(), BLOCK_ALIGN);

        let mut w = Writer::new(endian);
        w.write_fourcc(STRG_SIG)?;
        w.write_u32(to_u32(size, "string block size")?)?;
        Reference::new(ids::SAR_STRING_TABLE, STRING_TABLE_OFFSET as u32).write(&mut w)?;
        Reference::new(ids::SAR_LOOKUP_TABLE, to_u32(lookup_offset, "lookup table")?)
            .write(&mut w)?;

        w.write_u32(names.len() as u32)?;
        let mut at = records_len;
        for name in &names {
            let len = name.len() as u64 + 1;
            SizedReference::new(
                ids::STRING_DATA,
                to_u32(at, "string offset")?,
                to_u32(len, "string length")?,
            )
            .write(&mut w)?;
            at += len;
        }
        for name in &names {
            w.write_bytes(name)?;
            w.write_u8(0)?;
        }
        w.pad_to(RECORD_ALIGN)?;

        self.lookup.write(&mut w)?;
        w.pad_to(BLOCK_ALIGN)?;

        let bytes = w.into_inner();
        if bytes.len() as u64 != size {
            return Err(Error::InconsistentLayout(format!(
                "string block planned at 0x{:X} bytes, wrote 0x{:X}",
                size,
                bytes.len()
            )));
        }
        Ok(bytes)
    }
}
