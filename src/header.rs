use super::cursor::{Endian, Reader, Writer, BYTE_ORDER_MARK};
use super::errors::Error;
use super::fourcc::FourCC;
use super::reference::{SizedReference, NULL_OFFSET};

/// Bytes before the block pointer table: magic, byte-order mark, header
/// size, version, file size, block count and a reserved half-word.
pub const FIXED_HEADER_LEN: u64 = 20;

/// Where a container declares its byte order.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum OrderSource {
    /// The byte-order mark after the magic decides.
    Mark,
    /// The magic alone decides; the mark is read and ignored.
    Magic,
}

/// The two magics of one container kind and how its byte order is found.
#[derive(Debug, Copy, Clone)]
pub struct Family {
    pub little: FourCC,
    pub big: FourCC,
    pub order: OrderSource,
}

impl Family {
    pub fn magic_for(&self, endian: Endian) -> FourCC {
        match endian {
            Endian::Little => self.little,
            Endian::Big => self.big,
        }
    }
}

/// One entry of the header's block table. `offset` is absolute.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlockPointer {
    pub identifier: u16,
    pub offset: u32,
    pub size: u32,
}

impl BlockPointer {
    pub fn range(&self) -> (u64, u64) {
        let start = self.offset as u64;
        (start, start + self.size as u64)
    }
}

/// The header shared by sound archives, streams, waves and wave archives.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerHeader {
    pub magic: FourCC,
    pub endian: Endian,
    pub header_size: u16,
    pub version: u32,
    pub file_size: u32,
    pub blocks: Vec<BlockPointer>,
}

impl ContainerHeader {
    /// Read the header at the start of `data` and validate every block
    /// pointer against the buffer.
    pub fn read(data: &[u8], family: &Family) -> Result<Self, Error> {
        let mut r = Reader::new(data, Endian::Big);
        let magic = r.read_fourcc()?;
        let magic_endian = if magic == family.little {
            Endian::Little
        } else if magic == family.big {
            Endian::Big
        } else {
            return Err(Error::InvalidMagic { found: magic });
        };

        let mark = r.read_array::<2>()?;
        let endian = match family.order {
            OrderSource::Mark => Endian::from_mark(mark)?,
            OrderSource::Magic => magic_endian,
        };
        r.set_endian(endian);

        let header_size = r.read_u16()?;
        let version = r.read_u32()?;
        let file_size = r.read_u32()?;
        let block_count = r.read_u16()?;
        let _reserved = r.read_u16()?;

        let mut blocks = Vec::with_capacity(block_count as usize);
        for _ in 0..block_count {
            let pointer = SizedReference::read(&mut r)?;
            let (start, _) = pointer.range_within(0, r.len())?;
            blocks.push(BlockPointer {
                identifier: pointer.reference.identifier,
                offset: start as u32,
                size: pointer.size,
            });
        }

        if (header_size as u64) < r.tell() {
            return Err(Error::InconsistentLayout(format!(
                "header size 0x{:X} is smaller than its block table",
                header_size
            )));
        }

        Ok(ContainerHeader {
            magic,
            endian,
            header_size,
            version,
            file_size,
            blocks,
        })
    }

    pub fn block(&self, identifier: u16) -> Option<&BlockPointer> {
        self.blocks.iter().find(|b| b.identifier == identifier)
    }

    pub fn require_block(&self, identifier: u16) -> Result<BlockPointer, Error> {
        self.block(identifier)
            .copied()
            .ok_or(Error::MalformedReference {
                identifier,
                offset: NULL_OFFSET as u64,
                reason: "required block is missing",
            })
    }

    /// Write the header including its zero padding up to `header_size`.
    /// The byte-order mark is always written normalized.
    pub fn write(&self, w: &mut Writer) -> Result<(), Error> {
        let start = w.tell();
        w.write_fourcc(self.magic)?;
        w.write_u16(BYTE_ORDER_MARK)?;
        w.write_u16(self.header_size)?;
        w.write_u32(self.version)?;
        w.write_u32(self.file_size)?;
        w.write_u16(self.blocks.len() as u16)?;
        w.write_u16(0)?;
        for block in &self.blocks {
            SizedReference::new(block.identifier, block.offset, block.size).write(w)?;
        }
        let written = w.tell() - start;
        if written > self.header_size as u64 {
            return Err(Error::InconsistentLayout(format!(
                "block table needs 0x{:X} bytes, header size is 0x{:X}",
                written, self.header_size
            )));
        }
        w.write_zeros(self.header_size as u64 - written)
    }
}
