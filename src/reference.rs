//! Typed offset records and the identifiers they carry.
//!
//! A reference's offset is relative; what it is relative to depends on
//! where the reference lives, so every resolution takes the anchor as an
//! explicit argument.

use super::cursor::{Reader, Writer};
use super::errors::Error;

/// Offset value marking an absent target.
pub const NULL_OFFSET: u32 = 0xFFFF_FFFF;

pub mod ids {
    pub const BYTE_TABLE: u16 = 0x0100;
    pub const REFERENCE_TABLE: u16 = 0x0101;
    pub const DSP_ADPCM_INFO: u16 = 0x0300;
    pub const IMA_ADPCM_INFO: u16 = 0x0301;
    pub const SAMPLE_DATA: u16 = 0x1F00;
    pub const STRING_DATA: u16 = 0x1F01;

    pub const SAR_STRING_BLOCK: u16 = 0x2000;
    pub const SAR_INFO_BLOCK: u16 = 0x2001;
    pub const SAR_FILE_BLOCK: u16 = 0x2002;
    pub const SAR_STRING_TABLE: u16 = 0x2400;
    pub const SAR_LOOKUP_TABLE: u16 = 0x2401;

    pub const STM_INFO_BLOCK: u16 = 0x4000;
    pub const STM_SEEK_BLOCK: u16 = 0x4001;
    pub const STM_DATA_BLOCK: u16 = 0x4002;
    pub const STM_STREAM_INFO: u16 = 0x4100;
    pub const STM_TRACK_INFO: u16 = 0x4101;
    pub const STM_CHANNEL_INFO: u16 = 0x4102;

    pub const WAR_INFO_BLOCK: u16 = 0x6800;
    pub const WAR_FILE_BLOCK: u16 = 0x6801;

    pub const WAV_INFO_BLOCK: u16 = 0x7000;
    pub const WAV_DATA_BLOCK: u16 = 0x7001;
    pub const WAV_CHANNEL_INFO: u16 = 0x7100;
}

/// `{identifier u16, padding u16, offset u32}`
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Reference {
    pub identifier: u16,
    pub offset: u32,
}

impl Reference {
    pub const SIZE: u32 = 8;

    pub fn new(identifier: u16, offset: u32) -> Self {
        Reference { identifier, offset }
    }

    /// The canonical absent reference: identifier 0, sentinel offset.
    pub fn null() -> Self {
        Reference {
            identifier: 0,
            offset: NULL_OFFSET,
        }
    }

    pub fn is_null(&self) -> bool {
        self.offset == NULL_OFFSET
    }

    /// `anchor + offset`, or `None` when the reference is absent.
    pub fn resolve(&self, anchor: u64) -> Option<u64> {
        if self.is_null() {
            None
        } else {
            Some(anchor + self.offset as u64)
        }
    }

    /// Resolve against `anchor` and check the target lies inside a buffer
    /// of `limit` bytes.
    pub fn resolve_within(&self, anchor: u64, limit: u64) -> Result<Option<u64>, Error> {
        match self.resolve(anchor) {
            Some(at) if at > limit => Err(Error::MalformedReference {
                identifier: self.identifier,
                offset: at,
                reason: "target lies outside the buffer",
            }),
            other => Ok(other),
        }
    }

    /// Like `resolve_within`, but an absent target is an error.
    pub fn require_within(&self, anchor: u64, limit: u64) -> Result<u64, Error> {
        self.resolve_within(anchor, limit)?
            .ok_or(Error::MalformedReference {
                identifier: self.identifier,
                offset: NULL_OFFSET as u64,
                reason: "required target is absent",
            })
    }

    /// Fail unless the identifier is one of `allowed`. Absent references
    /// are accepted whatever their identifier.
    pub fn expect(self, allowed: &[u16]) -> Result<Self, Error> {
        if self.is_null() || allowed.contains(&self.identifier) {
            Ok(self)
        } else {
            Err(Error::MalformedReference {
                identifier: self.identifier,
                offset: self.offset as u64,
                reason: "unexpected identifier",
            })
        }
    }

    pub fn read(r: &mut Reader) -> Result<Self, Error> {
        let identifier = r.read_u16()?;
        let _padding = r.read_u16()?;
        let offset = r.read_u32()?;
        Ok(Reference { identifier, offset })
    }

    pub fn write(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_u16(self.identifier)?;
        w.write_u16(0)?;
        w.write_u32(self.offset)
    }
}

/// A reference followed by the size of its target.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SizedReference {
    pub reference: Reference,
    pub size: u32,
}

impl SizedReference {
    pub const SIZE: u32 = 12;

    pub fn new(identifier: u16, offset: u32, size: u32) -> Self {
        SizedReference {
            reference: Reference::new(identifier, offset),
            size,
        }
    }

    /// Resolve to an absolute `(start, end)` range checked against `limit`.
    pub fn range_within(&self, anchor: u64, limit: u64) -> Result<(u64, u64), Error> {
        let start = self.reference.require_within(anchor, limit)?;
        let end = start + self.size as u64;
        if end > limit {
            return Err(Error::MalformedReference {
                identifier: self.reference.identifier,
                offset: start,
                reason: "sized target runs past the buffer",
            });
        }
        Ok((start, end))
    }

    pub fn read(r: &mut Reader) -> Result<Self, Error> {
        let reference = Reference::read(r)?;
        let size = r.read_u32()?;
        Ok(SizedReference { reference, size })
    }

    pub fn write(&self, w: &mut Writer) -> Result<(), Error> {
        self.reference.write(w)?;
        w.write_u32(self.size)
    }
}

/// `{count u32, references...}`. Offsets inside are relative to the
/// table's own start.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReferenceTable {
    pub references: Vec<Reference>,
}

impl ReferenceTable {
    pub fn byte_len(count: usize) -> u32 {
        4 + Reference::SIZE * count as u32
    }

    pub fn read(r: &mut Reader) -> Result<Self, Error> {
        let count = r.read_u32()?;
        // each entry needs eight bytes; reject absurd counts before allocating
        if count as u64 * Reference::SIZE as u64 > r.remaining() {
            return Err(Error::TruncatedData {
                at: r.tell(),
                wanted: count as u64 * Reference::SIZE as u64,
                available: r.remaining(),
            });
        }
        let references = (0..count)
            .map(|_| Reference::read(r))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ReferenceTable { references })
    }

    pub fn write(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_u32(self.references.len() as u32)?;
        for reference in &self.references {
            reference.write(w)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::Endian;

    #[test]
    fn test_resolve_uses_anchor() {
        let r = Reference::new(ids::STM_STREAM_INFO, 0x18);
        assert_eq!(r.resolve(0x48), Some(0x60));
        assert_eq!(r.resolve(0), Some(0x18));
        assert_eq!(Reference::null().resolve(0x48), None);
    }

    #[test]
    fn test_out_of_bounds_reference() {
        let r = Reference::new(ids::SAMPLE_DATA, 0x100);
        match r.resolve_within(0x10, 0x80) {
            Err(Error::MalformedReference { identifier, .. }) => {
                assert_eq!(identifier, ids::SAMPLE_DATA)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_identifier_check() {
        let r = Reference::new(ids::DSP_ADPCM_INFO, 8);
        assert!(r.expect(&[ids::DSP_ADPCM_INFO, ids::IMA_ADPCM_INFO]).is_ok());
        assert!(r.expect(&[ids::BYTE_TABLE]).is_err());
        assert!(Reference::null().expect(&[ids::BYTE_TABLE]).is_ok());
    }

    #[test]
    fn test_table_layout() {
        let table = ReferenceTable {
            references: vec![
                Reference::new(ids::STM_TRACK_INFO, 0x14),
                Reference::new(ids::STM_TRACK_INFO, 0x24),
            ],
        };
        let mut w = Writer::new(Endian::Little);
        table.write(&mut w).unwrap();
        let bytes = w.into_inner();
        assert_eq!(bytes.len() as u32, ReferenceTable::byte_len(2));
        assert_eq!(&bytes[0..4], &[2, 0, 0, 0]);
        assert_eq!(&bytes[4..6], &[0x01, 0x41]);

        let mut r = Reader::new(&bytes, Endian::Little);
        assert_eq!(ReferenceTable::read(&mut r).unwrap(), table);
    }

    #[test]
    fn test_table_count_past_end() {
        let bytes = [0xFF, 0xFF, 0, 0];
        let mut r = Reader::new(&bytes, Endian::Little);
        assert!(matches!(
            ReferenceTable::read(&mut r),
            Err(Error::TruncatedData { .. })
        ));
    }
}
