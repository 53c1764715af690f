//! Sound archives: `CSAR` (little-endian) and `FSAR` (big-endian).
//!
//! Only the string block is decoded. INFO, FILE and any other block are
//! carried as opaque bytes; their internal offsets are relative to the
//! block itself, so moving them whole keeps them valid.

use super::cursor::{Endian, Writer};
use super::errors::Error;
use super::fourcc::{CSAR_SIG, FSAR_SIG};
use super::header::{ContainerHeader, Family, OrderSource};
use super::layout::{Layout, SAR_HEADER_ALIGN};
use super::reference::ids;
use super::strg::StringBlock;

/// The magic alone decides the byte order of a sound archive.
pub const SOUND_ARCHIVE_FAMILY: Family = Family {
    little: CSAR_SIG,
    big: FSAR_SIG,
    order: OrderSource::Magic,
};

/// Version written by `nwtool pack` when none is given.
pub const DEFAULT_SOUND_ARCHIVE_VERSION: u32 = 0x0202_0000;

/// Identifier given to the first misc block rebuilt from loose files.
pub const FIRST_MISC_IDENTIFIER: u16 = 0x2003;

pub const STRG_FILE_NAME: &str = "strg.bin";
pub const INFO_FILE_NAME: &str = "info.bin";
pub const FILE_FILE_NAME: &str = "file.bin";

/// A block this crate does not interpret, kept with its identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiscBlock {
    pub identifier: u16,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SoundArchive {
    pub endian: Endian,
    pub version: u32,
    pub strings: Option<StringBlock>,
    /// The complete INFO block, magic and size included.
    pub info: Vec<u8>,
    /// The complete FILE block, magic and size included.
    pub file: Vec<u8>,
    pub misc: Vec<MiscBlock>,
}

impl SoundArchive {
    pub fn load(data: &[u8]) -> Result<Self, Error> {
        let header = ContainerHeader::read(data, &SOUND_ARCHIVE_FAMILY)?;
        header.require_block(ids::SAR_INFO_BLOCK)?;
        header.require_block(ids::SAR_FILE_BLOCK)?;

        let mut strings = None;
        let mut info = vec![];
        let mut file = vec![];
        let mut misc = vec![];
        for block in &header.blocks {
            let (start, end) = block.range();
            let bytes = &data[start as usize..end as usize];
            log::trace!(
                "block 0x{:04X} at 0x{:X}, 0x{:X} bytes",
                block.identifier,
                start,
                block.size
            );
            match block.identifier {
                ids::SAR_STRING_BLOCK => strings = Some(StringBlock::read(bytes, header.endian)?),
                ids::SAR_INFO_BLOCK => info = bytes.to_vec(),
                ids::SAR_FILE_BLOCK => file = bytes.to_vec(),
                identifier => misc.push(MiscBlock {
                    identifier,
                    bytes: bytes.to_vec(),
                }),
            }
        }

        Ok(SoundArchive {
            endian: header.endian,
            version: header.version,
            strings,
            info,
            file,
            misc,
        })
    }

    /// Item id of `name`, when the archive has a string block.
    pub fn find(&self, name: &str) -> Option<u32> {
        self.strings.as_ref().and_then(|s| s.find(name))
    }

    /// Every block in write order: STRG, INFO, FILE, then misc.
    fn blocks(&self) -> Result<Vec<(u16, Vec<u8>)>, Error> {
        let mut blocks = Vec::with_capacity(3 + self.misc.len());
        if let Some(strings) = &self.strings {
            blocks.push((ids::SAR_STRING_BLOCK, strings.to_bytes(self.endian)?));
        }
        blocks.push((ids::SAR_INFO_BLOCK, self.info.clone()));
        blocks.push((ids::SAR_FILE_BLOCK, self.file.clone()));
        for block in &self.misc {
            blocks.push((block.identifier, block.bytes.clone()));
        }
        Ok(blocks)
    }

    fn link(blocks: &[(u16, Vec<u8>)]) -> Result<Layout, Error> {
        let sizes: Vec<(u16, u64)> = blocks
            .iter()
            .map(|(id, bytes)| (*id, bytes.len() as u64))
            .collect();
        Layout::link(SAR_HEADER_ALIGN, &sizes)
    }

    pub fn plan(&self) -> Result<Layout, Error> {
        Self::link(&self.blocks()?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let blocks = self.blocks()?;
        let layout = Self::link(&blocks)?;

        let mut w = Writer::new(self.endian);
        layout
            .header(
                SOUND_ARCHIVE_FAMILY.magic_for(self.endian),
                self.endian,
                self.version,
            )
            .write(&mut w)?;
        for (identifier, bytes) in &blocks {
            let start = w.tell();
            w.write_bytes(bytes)?;
            layout.check_block(*identifier, start, w.tell())?;
        }

        let bytes = w.into_inner();
        layout.check_output(&bytes)?;
        Ok(bytes)
    }

    /// The archive's blocks as loose files: `strg.bin`, `info.bin`,
    /// `file.bin` and `miscNNNN.bin`.
    pub fn block_files(&self) -> Result<Vec<(String, Vec<u8>)>, Error> {
        let mut files = vec![];
        if let Some(strings) = &self.strings {
            files.push((STRG_FILE_NAME.to_string(), strings.to_bytes(self.endian)?));
        }
        files.push((INFO_FILE_NAME.to_string(), self.info.clone()));
        files.push((FILE_FILE_NAME.to_string(), self.file.clone()));
        for (index, block) in self.misc.iter().enumerate() {
            files.push((format!("misc{:04}.bin", index), block.bytes.clone()));
        }
        Ok(files)
    }

    /// Rebuild an archive from `block_files` output. Misc blocks are
    /// ordered by file name and numbered from `FIRST_MISC_IDENTIFIER`.
    pub fn from_block_files(
        endian: Endian,
        version: u32,
        files: Vec<(String, Vec<u8>)>,
    ) -> Result<Self, Error> {
        let mut strings = None;
        let mut info = None;
        let mut file = None;
        let mut misc = vec![];
        for (name, bytes) in files {
            match name.as_str() {
                STRG_FILE_NAME => strings = Some(StringBlock::read(&bytes, endian)?),
                INFO_FILE_NAME => info = Some(bytes),
                FILE_FILE_NAME => file = Some(bytes),
                other if other.starts_with("misc") => misc.push((name, bytes)),
                other => log::warn!("ignoring unexpected block file {}", other),
            }
        }
        misc.sort_by(|a, b| a.0.cmp(&b.0));

        let missing = |what: &str| Error::InconsistentLayout(format!("no {} given", what));
        Ok(SoundArchive {
            endian,
            version,
            strings,
            info: info.ok_or_else(|| missing(INFO_FILE_NAME))?,
            file: file.ok_or_else(|| missing(FILE_FILE_NAME))?,
            misc: misc
                .into_iter()
                .enumerate()
                .map(|(index, (_, bytes))| MiscBlock {
                    identifier: FIRST_MISC_IDENTIFIER + index as u16,
                    bytes,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_block(magic: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut block = magic.to_vec();
        block.extend_from_slice(&((body.len() + 8) as u32).to_le_bytes());
        block.extend_from_slice(body);
        block
    }

    fn archive() -> SoundArchive {
        SoundArchive {
            endian: Endian::Little,
            version: 0x0202_0000,
            strings: Some(
                StringBlock::build(vec![
                    ("SEQ_MAIN".to_string(), 0x0100_0000),
                    ("STRM_BGM".to_string(), 0x0100_0001),
                ])
                .unwrap(),
            ),
            info: raw_block(b"INFO", &[1; 0x18]),
            file: raw_block(b"FILE", &[2; 0x38]),
            misc: vec![],
        }
    }

    #[test]
    fn test_round_trip() {
        let archive = archive();
        let bytes = archive.to_bytes().unwrap();
        assert_eq!(&bytes[0..4], b"CSAR");
        assert_eq!(u16::from_le_bytes([bytes[6], bytes[7]]), 0x40);
        let loaded = SoundArchive::load(&bytes).unwrap();
        assert_eq!(loaded, archive);
        assert_eq!(loaded.find("STRM_BGM"), Some(0x0100_0001));
        assert_eq!(loaded.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_misc_blocks_follow() {
        let mut archive = archive();
        archive.misc.push(MiscBlock {
            identifier: 0x2010,
            bytes: vec![9; 0x10],
        });
        archive.endian = Endian::Big;
        let bytes = archive.to_bytes().unwrap();
        assert_eq!(&bytes[0..4], b"FSAR");
        // four blocks need a 0x50 header
        assert_eq!(u16::from_be_bytes([bytes[6], bytes[7]]), 0x50);
        assert_eq!(u16::from_be_bytes([bytes[16], bytes[17]]), 4);
        assert_eq!(&bytes[bytes.len() - 0x10..], &[9; 0x10]);
        assert_eq!(SoundArchive::load(&bytes).unwrap(), archive);
    }

    #[test]
    fn test_without_strings() {
        let mut archive = archive();
        archive.strings = None;
        let bytes = archive.to_bytes().unwrap();
        assert_eq!(u16::from_le_bytes([bytes[16], bytes[17]]), 2);
        let loaded = SoundArchive::load(&bytes).unwrap();
        assert_eq!(loaded.strings, None);
        assert_eq!(loaded.find("SEQ_MAIN"), None);
    }

    #[test]
    fn test_block_files() {
        let mut archive = archive();
        archive.misc.push(MiscBlock {
            identifier: FIRST_MISC_IDENTIFIER,
            bytes: vec![3; 4],
        });
        let files = archive.block_files().unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.0.as_str()).collect();
        assert_eq!(names, vec!["strg.bin", "info.bin", "file.bin", "misc0000.bin"]);
        let rebuilt = SoundArchive::from_block_files(Endian::Little, archive.version, files).unwrap();
        assert_eq!(rebuilt, archive);
    }

    #[test]
    fn test_missing_info() {
        let files = vec![(FILE_FILE_NAME.to_string(), vec![0; 8])];
        assert!(SoundArchive::from_block_files(Endian::Little, 0, files).is_err());
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = archive().to_bytes().unwrap();
        bytes[0..4].copy_from_slice(b"CSTM");
        assert!(matches!(SoundArchive::load(&bytes), Err(Error::InvalidMagic { .. })));
    }
}
