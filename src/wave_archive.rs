//! Wave archives: `CWAR` (little-endian) and `FWAR` (big-endian).
//!
//! INFO lists one sized reference per entry, relative to FILE + 8; FILE
//! holds the complete encoded waves, each padded to 0x20.

use super::cursor::{Endian, Reader, Writer};
use super::errors::Error;
use super::fourcc::{FourCC, CWAR_SIG, FILE_SIG, FWAR_SIG, INFO_SIG};
use super::header::{ContainerHeader, Family, OrderSource};
use super::layout::{align_up, to_u32, Layout, BLOCK_ALIGN};
use super::reference::{ids, SizedReference};
use super::wave::{Wave, WAVE_FAMILY};

pub const WAVE_ARCHIVE_FAMILY: Family = Family {
    little: CWAR_SIG,
    big: FWAR_SIG,
    order: OrderSource::Mark,
};

pub const DEFAULT_ARCHIVE_VERSION: u32 = 0x0001_0000;

/// Reserved bytes at the start of FILE, relative to FILE + 8.
const FIRST_ENTRY_OFFSET: u64 = 0x18;

#[derive(Debug, Clone, PartialEq)]
pub struct WaveArchive {
    pub endian: Endian,
    pub version: u32,
    /// Encoded waves, without their alignment padding.
    pub entries: Vec<Vec<u8>>,
}

impl Default for WaveArchive {
    fn default() -> Self {
        WaveArchive {
            endian: Endian::Little,
            version: DEFAULT_ARCHIVE_VERSION,
            entries: vec![],
        }
    }
}

impl WaveArchive {
    pub fn load(data: &[u8]) -> Result<Self, Error> {
        let header = ContainerHeader::read(data, &WAVE_ARCHIVE_FAMILY)?;
        let mut r = Reader::new(data, header.endian);

        let info_block = header.require_block(ids::WAR_INFO_BLOCK)?;
        let file_block = header.require_block(ids::WAR_FILE_BLOCK)?;

        r.seek(info_block.offset as u64)?;
        r.expect_fourcc(INFO_SIG)?;
        let _size = r.read_u32()?;
        let count = r.read_u32()?;
        if count as u64 * SizedReference::SIZE as u64 > r.remaining() {
            return Err(Error::TruncatedData {
                at: r.tell(),
                wanted: count as u64 * SizedReference::SIZE as u64,
                available: r.remaining(),
            });
        }
        let references = (0..count)
            .map(|_| SizedReference::read(&mut r))
            .collect::<Result<Vec<_>, _>>()?;

        r.seek(file_block.offset as u64)?;
        r.expect_fourcc(FILE_SIG)?;
        let _size = r.read_u32()?;
        let anchor = r.tell();

        let mut entries = Vec::with_capacity(references.len());
        for reference in &references {
            reference.reference.expect(&[ids::SAMPLE_DATA])?;
            let (start, end) = reference.range_within(anchor, r.len())?;
            entries.push(data[start as usize..end as usize].to_vec());
        }

        Ok(WaveArchive {
            endian: header.endian,
            version: header.version,
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode entry `index`.
    pub fn wave(&self, index: usize) -> Result<Wave, Error> {
        let entry = self.entries.get(index).ok_or_else(|| {
            Error::InconsistentLayout(format!(
                "archive has {} entries, asked for {}",
                self.entries.len(),
                index
            ))
        })?;
        Wave::load(entry)
    }

    /// Append `wave` encoded in its own byte order; `to_bytes` aligns it
    /// with the archive.
    pub fn push(&mut self, wave: &Wave) -> Result<usize, Error> {
        self.entries.push(wave.to_bytes()?);
        Ok(self.entries.len() - 1)
    }

    /// The entries as they will be written: any wave whose magic says
    /// the other byte order is re-encoded.
    fn normalized_entries(&self) -> Result<Vec<Vec<u8>>, Error> {
        let wanted = WAVE_FAMILY.magic_for(self.endian);
        let mut entries = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let magic = entry
                .get(0..4)
                .map(|m| FourCC::make(&[m[0], m[1], m[2], m[3]]));
            if magic == Some(wanted) {
                entries.push(entry.clone());
            } else {
                let mut wave = Wave::load(entry)?;
                log::debug!("re-encoding {:?} archive entry as {:?}", wave.endian, self.endian);
                wave.endian = self.endian;
                entries.push(wave.to_bytes()?);
            }
        }
        Ok(entries)
    }

    fn info_block_size(count: usize) -> u64 {
        align_up(8 + 4 + SizedReference::SIZE as u64 * count as u64, BLOCK_ALIGN)
    }

    fn entry_offsets(entries: &[Vec<u8>]) -> (Vec<u64>, u64) {
        let mut at = FIRST_ENTRY_OFFSET;
        let mut offsets = Vec::with_capacity(entries.len());
        for entry in entries {
            offsets.push(at);
            at += align_up(entry.len() as u64, BLOCK_ALIGN);
        }
        (offsets, 8 + at)
    }

    pub fn plan(&self) -> Result<Layout, Error> {
        let entries = self.normalized_entries()?;
        Self::link(&entries)
    }

    fn link(entries: &[Vec<u8>]) -> Result<Layout, Error> {
        let (_, file_size) = Self::entry_offsets(entries);
        Layout::link(
            BLOCK_ALIGN,
            &[
                (ids::WAR_INFO_BLOCK, Self::info_block_size(entries.len())),
                (ids::WAR_FILE_BLOCK, file_size),
            ],
        )
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let entries = self.normalized_entries()?;
        let layout = Self::link(&entries)?;
        let (offsets, file_size) = Self::entry_offsets(&entries);

        let mut w = Writer::new(self.endian);
        layout
            .header(
                WAVE_ARCHIVE_FAMILY.magic_for(self.endian),
                self.endian,
                self.version,
            )
            .write(&mut w)?;

        let start = w.tell();
        w.write_fourcc(INFO_SIG)?;
        w.write_u32(to_u32(Self::info_block_size(entries.len()), "info block size")?)?;
        w.write_u32(entries.len() as u32)?;
        for (entry, offset) in entries.iter().zip(offsets.iter()) {
            SizedReference::new(
                ids::SAMPLE_DATA,
                to_u32(*offset, "entry offset")?,
                to_u32(entry.len() as u64, "entry size")?,
            )
            .write(&mut w)?;
        }
        w.pad_to(BLOCK_ALIGN)?;
        layout.check_block(ids::WAR_INFO_BLOCK, start, w.tell())?;

        let start = w.tell();
        w.write_fourcc(FILE_SIG)?;
        w.write_u32(to_u32(file_size, "file block size")?)?;
        w.write_zeros(FIRST_ENTRY_OFFSET)?;
        for entry in &entries {
            w.write_bytes(entry)?;
            w.pad_to(BLOCK_ALIGN)?;
        }
        layout.check_block(ids::WAR_FILE_BLOCK, start, w.tell())?;

        let bytes = w.into_inner();
        layout.check_output(&bytes)?;
        Ok(bytes)
    }
}
