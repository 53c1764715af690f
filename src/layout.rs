//! Offset and size planning shared by every container writer.
//!
//! Writers first measure each block body, then `Layout::link` places the
//! blocks behind a header sized for them. The resulting `Layout` is what
//! gets written, so the same model always yields the same bytes.

use std::convert::TryFrom;

use super::errors::Error;
use super::header::{BlockPointer, ContainerHeader, FIXED_HEADER_LEN};
use super::fourcc::FourCC;
use super::cursor::{Endian, Writer};
use super::reference::{SizedReference, NULL_OFFSET};

/// Block and record alignment of streams, waves and wave archives.
pub const BLOCK_ALIGN: u64 = 0x20;
/// Header alignment of sound archives.
pub const SAR_HEADER_ALIGN: u64 = 0x10;
/// Alignment of records inside info blocks.
pub const RECORD_ALIGN: u64 = 0x04;

pub fn align_up(value: u64, alignment: u64) -> u64 {
    match value % alignment {
        0 => value,
        rem => value + alignment - rem,
    }
}

/// Smallest aligned header able to hold `block_count` pointers.
pub fn header_size_for(block_count: usize, alignment: u64) -> u64 {
    align_up(
        FIXED_HEADER_LEN + SizedReference::SIZE as u64 * block_count as u64,
        alignment,
    )
}

/// Serialize into a scratch buffer and report how many bytes it took.
pub fn measure<F>(endian: Endian, write: F) -> Result<u64, Error>
where
    F: FnOnce(&mut Writer) -> Result<(), Error>,
{
    let mut scratch = Writer::new(endian);
    write(&mut scratch)?;
    Ok(scratch.tell())
}

pub(crate) fn to_u32(value: u64, what: &str) -> Result<u32, Error> {
    if value >= NULL_OFFSET as u64 {
        Err(Error::InconsistentLayout(format!(
            "{} 0x{:X} does not fit a 32-bit field",
            what, value
        )))
    } else {
        Ok(value as u32)
    }
}

/// Final placement of a container's blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub header_size: u16,
    pub blocks: Vec<BlockPointer>,
    pub file_size: u32,
}

impl Layout {
    /// Place `blocks` (identifier, measured size) back to back after a
    /// header aligned to `header_alignment`, in the given order.
    pub fn link(header_alignment: u64, blocks: &[(u16, u64)]) -> Result<Self, Error> {
        let header_size = header_size_for(blocks.len(), header_alignment);
        let mut cursor = header_size;
        let mut pointers = Vec::with_capacity(blocks.len());
        for (identifier, size) in blocks {
            pointers.push(BlockPointer {
                identifier: *identifier,
                offset: to_u32(cursor, "block offset")?,
                size: to_u32(*size, "block size")?,
            });
            cursor += size;
        }

        let header_size = u16::try_from(header_size).map_err(|_| {
            Error::InconsistentLayout(format!(
                "header of 0x{:X} bytes for {} blocks does not fit a 16-bit field",
                header_size,
                blocks.len()
            ))
        })?;
        let layout = Layout {
            header_size,
            blocks: pointers,
            file_size: to_u32(cursor, "file size")?,
        };
        log::debug!("linked layout {:?}", layout);
        Ok(layout)
    }

    pub fn block(&self, identifier: u16) -> Result<&BlockPointer, Error> {
        self.blocks
            .iter()
            .find(|b| b.identifier == identifier)
            .ok_or_else(|| {
                Error::InconsistentLayout(format!("no block 0x{:04X} was planned", identifier))
            })
    }

    pub fn header(&self, magic: FourCC, endian: Endian, version: u32) -> ContainerHeader {
        ContainerHeader {
            magic,
            endian,
            header_size: self.header_size,
            version,
            file_size: self.file_size,
            blocks: self.blocks.clone(),
        }
    }

    /// Fail unless a block was written exactly where and as large as it
    /// was planned.
    pub fn check_block(&self, identifier: u16, start: u64, end: u64) -> Result<(), Error> {
        let block = self.block(identifier)?;
        if block.range() != (start, end) {
            return Err(Error::InconsistentLayout(format!(
                "block 0x{:04X} planned at {:?}, written at {:?}",
                identifier,
                block.range(),
                (start, end)
            )));
        }
        Ok(())
    }

    /// Fail unless the serialized buffer is exactly `file_size` long.
    pub fn check_output(&self, bytes: &[u8]) -> Result<(), Error> {
        if bytes.len() as u64 != self.file_size as u64 {
            return Err(Error::InconsistentLayout(format!(
                "planned 0x{:X} bytes, wrote 0x{:X}",
                self.file_size,
                bytes.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 0x20), 0);
        assert_eq!(align_up(1, 0x20), 0x20);
        assert_eq!(align_up(0x20, 0x20), 0x20);
        assert_eq!(align_up(0x2E, 4), 0x30);
    }

    #[test]
    fn test_header_sizes() {
        assert_eq!(header_size_for(3, BLOCK_ALIGN), 0x40);
        assert_eq!(header_size_for(2, BLOCK_ALIGN), 0x40);
        assert_eq!(header_size_for(3, SAR_HEADER_ALIGN), 0x40);
        assert_eq!(header_size_for(4, SAR_HEADER_ALIGN), 0x50);
        assert_eq!(header_size_for(5, SAR_HEADER_ALIGN), 0x50);
    }

    #[test]
    fn test_link_is_cumulative() {
        let layout = Layout::link(BLOCK_ALIGN, &[(0x4000, 0x100), (0x4001, 0x20), (0x4002, 0x60)])
            .unwrap();
        assert_eq!(layout.header_size, 0x40);
        let offsets: Vec<u32> = layout.blocks.iter().map(|b| b.offset).collect();
        assert_eq!(offsets, vec![0x40, 0x140, 0x160]);
        assert_eq!(layout.file_size, 0x1C0);
    }

    #[test]
    fn test_link_rejects_oversize() {
        assert!(Layout::link(BLOCK_ALIGN, &[(0x4000, 0xFFFF_FFFF)]).is_err());
    }

    #[test]
    fn test_header_too_large_for_field() {
        let blocks = vec![(0x2000u16, 0x20u64); 6000];
        assert!(matches!(
            Layout::link(SAR_HEADER_ALIGN, &blocks),
            Err(Error::InconsistentLayout(_))
        ));
    }
}
