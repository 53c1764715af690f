//! Single waveforms: `CWAV` (little-endian) and `FWAV` (big-endian).
//!
//! Two blocks: INFO holds the playback parameters, a channel reference
//! table and one record per channel with its codec record right behind
//! it; DATA holds the channel buffers back to back, not interleaved.

use super::adpcm::{normalize_pcm16, ChannelCodecInfo, SoundEncoding};
use super::cursor::{Endian, Reader, Writer};
use super::errors::{Error, RecordKind, SkippedRecord};
use super::fourcc::{CWAV_SIG, DATA_SIG, FWAV_SIG, INFO_SIG};
use super::header::{ContainerHeader, Family, OrderSource};
use super::layout::{align_up, to_u32, Layout, BLOCK_ALIGN, RECORD_ALIGN};
use super::reference::{ids, Reference, ReferenceTable};

pub const WAVE_FAMILY: Family = Family {
    little: CWAV_SIG,
    big: FWAV_SIG,
    order: OrderSource::Mark,
};

/// Versions written into newly built waves, per byte order.
pub const DEFAULT_LITTLE_WAVE_VERSION: u32 = 0x0201_0000;
pub const DEFAULT_BIG_WAVE_VERSION: u32 = 0x0001_0100;

/// Offset of the first channel buffer, relative to DATA + 8.
const SAMPLE_DATA_OFFSET: u64 = 0x18;

/// Wave info fields before the channel table, relative to INFO + 8.
const WAVE_INFO_LEN: u64 = 0x14;

/// Sample reference, codec reference and a reserved word.
const CHANNEL_RECORD_LEN: u64 = 0x14;

pub fn default_version(endian: Endian) -> u32 {
    match endian {
        Endian::Little => DEFAULT_LITTLE_WAVE_VERSION,
        Endian::Big => DEFAULT_BIG_WAVE_VERSION,
    }
}

/// A decoded wave. PCM16 buffers are kept little-endian.
#[derive(Debug, Clone, PartialEq)]
pub struct Wave {
    pub endian: Endian,
    pub version: u32,
    pub encoding: SoundEncoding,
    pub looping: bool,
    pub sample_rate: u32,
    pub loop_start: u32,
    pub loop_end: u32,
    pub channels: Vec<ChannelCodecInfo>,
    pub samples: Vec<Vec<u8>>,
}

impl Wave {
    /// A little-endian, non-looping wave whose loop end marks the last
    /// sample.
    pub fn build(
        encoding: SoundEncoding,
        sample_rate: u32,
        channels: Vec<ChannelCodecInfo>,
        samples: Vec<Vec<u8>>,
    ) -> Result<Self, Error> {
        let len = samples.first().map(|c| c.len()).unwrap_or(0) as u64;
        Ok(Wave {
            endian: Endian::Little,
            version: DEFAULT_LITTLE_WAVE_VERSION,
            encoding,
            looping: false,
            sample_rate,
            loop_start: 0,
            loop_end: to_u32(encoding.samples_for_bytes(len), "sample count")?,
            channels,
            samples,
        })
    }

    pub fn load(data: &[u8]) -> Result<Self, Error> {
        let (wave, skipped) = Self::read(data)?;
        for s in &skipped {
            log::warn!("skipped {:?} record {}: {}", s.kind, s.index, s.error);
        }
        Ok(wave)
    }

    /// Decode a wave. A channel whose codec record cannot be read keeps
    /// its samples and is reported as skipped.
    pub fn read(data: &[u8]) -> Result<(Self, Vec<SkippedRecord>), Error> {
        let header = ContainerHeader::read(data, &WAVE_FAMILY)?;
        let mut r = Reader::new(data, header.endian);
        let mut skipped = vec![];

        let info_block = header.require_block(ids::WAV_INFO_BLOCK)?;
        let data_block = header.require_block(ids::WAV_DATA_BLOCK)?;

        r.seek(info_block.offset as u64)?;
        r.expect_fourcc(INFO_SIG)?;
        let _size = r.read_u32()?;
        let encoding = SoundEncoding::from_u8(r.read_u8()?)?;
        let looping = r.read_u8()? != 0;
        let _padding = r.read_u16()?;
        let sample_rate = r.read_u32()?;
        let loop_start = r.read_u32()?;
        let loop_end = r.read_u32()?;
        let _reserved = r.read_u32()?;

        let table_at = r.tell();
        let table = ReferenceTable::read(&mut r)?;

        let mut sample_offsets = Vec::with_capacity(table.references.len());
        let mut channels = Vec::with_capacity(table.references.len());
        for (index, reference) in table.references.iter().enumerate() {
            let at = reference
                .expect(&[ids::WAV_CHANNEL_INFO])?
                .require_within(table_at, r.len())?;
            r.seek(at)?;
            let sample_ref = Reference::read(&mut r)?.expect(&[ids::SAMPLE_DATA])?;
            if sample_ref.is_null() {
                return Err(Error::MalformedReference {
                    identifier: sample_ref.identifier,
                    offset: at,
                    reason: "channel has no sample data",
                });
            }
            sample_offsets.push(sample_ref.offset as u64);

            let codec = Reference::read(&mut r)?;
            match ChannelCodecInfo::read_at(&mut r, encoding, codec, at) {
                Ok(info) => channels.push(info),
                Err(error) => {
                    skipped.push(SkippedRecord {
                        kind: RecordKind::Channel,
                        index,
                        error,
                    });
                    channels.push(ChannelCodecInfo::None);
                }
            }
        }

        r.seek(data_block.offset as u64)?;
        r.expect_fourcc(DATA_SIG)?;
        let data_size = r.read_u32()? as u64;
        let body = r.tell();
        let body_len = data_size.saturating_sub(8);
        if body + body_len > r.len() {
            return Err(Error::TruncatedData {
                at: body,
                wanted: body_len,
                available: r.remaining(),
            });
        }

        // every channel holds as many bytes as the last one
        let channel_len = match sample_offsets.iter().max() {
            Some(last) if *last <= body_len => body_len - last,
            Some(last) => {
                return Err(Error::MalformedReference {
                    identifier: ids::SAMPLE_DATA,
                    offset: body + last,
                    reason: "sample data starts past the data block",
                })
            }
            None => 0,
        };

        let mut samples = Vec::with_capacity(sample_offsets.len());
        for offset in sample_offsets {
            r.seek(body + offset)?;
            let mut buffer = r.read_bytes(channel_len)?;
            if encoding == SoundEncoding::Pcm16 {
                normalize_pcm16(&mut buffer, header.endian);
            }
            samples.push(buffer);
        }

        let wave = Wave {
            endian: header.endian,
            version: header.version,
            encoding,
            looping,
            sample_rate,
            loop_start,
            loop_end,
            channels,
            samples,
        };
        Ok((wave, skipped))
    }

    pub fn channel_len(&self) -> u64 {
        self.samples.first().map(|c| c.len()).unwrap_or(0) as u64
    }

    /// Samples per channel. The buffer length decides unless a shorter,
    /// non-zero loop end is set.
    pub fn sample_count(&self) -> u64 {
        let from_bytes = self.encoding.samples_for_bytes(self.channel_len());
        match self.loop_end as u64 {
            0 => from_bytes,
            end if end <= from_bytes => end,
            _ => from_bytes,
        }
    }

    fn validate(&self) -> Result<(), Error> {
        if self.channels.len() != self.samples.len() {
            return Err(Error::InconsistentLayout(format!(
                "wave holds {} channel records and {} sample buffers",
                self.channels.len(),
                self.samples.len()
            )));
        }
        let len = self.channel_len();
        if self.samples.iter().any(|c| c.len() as u64 != len) {
            return Err(Error::InconsistentLayout(
                "wave channels must hold the same number of bytes".to_string(),
            ));
        }
        for channel in &self.channels {
            channel.check_encoding(self.encoding)?;
        }
        Ok(())
    }

    fn channel_chunk_len(channel: &ChannelCodecInfo) -> u64 {
        CHANNEL_RECORD_LEN + align_up(channel.byte_len(), RECORD_ALIGN)
    }

    fn info_block_size(&self) -> u64 {
        let channels: u64 = self.channels.iter().map(Self::channel_chunk_len).sum();
        let table = ReferenceTable::byte_len(self.channels.len()) as u64;
        align_up(8 + WAVE_INFO_LEN + table + channels, BLOCK_ALIGN)
    }

    fn data_block_size(&self) -> u64 {
        8 + SAMPLE_DATA_OFFSET + self.channel_len() * self.samples.len() as u64
    }

    pub fn plan(&self) -> Result<Layout, Error> {
        self.validate()?;
        Layout::link(
            BLOCK_ALIGN,
            &[
                (ids::WAV_INFO_BLOCK, self.info_block_size()),
                (ids::WAV_DATA_BLOCK, self.data_block_size()),
            ],
        )
    }

    pub fn write(&self, layout: &Layout) -> Result<Vec<u8>, Error> {
        let mut w = Writer::new(self.endian);
        layout
            .header(WAVE_FAMILY.magic_for(self.endian), self.endian, self.version)
            .write(&mut w)?;

        let start = w.tell();
        self.write_info(&mut w)?;
        layout.check_block(ids::WAV_INFO_BLOCK, start, w.tell())?;

        let start = w.tell();
        self.write_data(&mut w)?;
        layout.check_block(ids::WAV_DATA_BLOCK, start, w.tell())?;

        let bytes = w.into_inner();
        layout.check_output(&bytes)?;
        Ok(bytes)
    }

    /// `plan` then `write`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let layout = self.plan()?;
        self.write(&layout)
    }

    fn write_info(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_fourcc(INFO_SIG)?;
        w.write_u32(to_u32(self.info_block_size(), "info block size")?)?;
        w.write_u8(self.encoding as u8)?;
        w.write_u8(self.looping as u8)?;
        w.write_u16(0)?;
        w.write_u32(self.sample_rate)?;
        w.write_u32(self.loop_start)?;
        w.write_u32(self.loop_end)?;
        w.write_u32(0)?;

        let mut at = ReferenceTable::byte_len(self.channels.len()) as u64;
        let mut references = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            references.push(Reference::new(
                ids::WAV_CHANNEL_INFO,
                to_u32(at, "channel record")?,
            ));
            at += Self::channel_chunk_len(channel);
        }
        ReferenceTable { references }.write(w)?;

        let channel_len = self.channel_len();
        for (index, channel) in self.channels.iter().enumerate() {
            let sample_at = SAMPLE_DATA_OFFSET + channel_len * index as u64;
            Reference::new(ids::SAMPLE_DATA, to_u32(sample_at, "sample offset")?).write(w)?;
            match channel.identifier() {
                Some(id) => Reference::new(id, CHANNEL_RECORD_LEN as u32).write(w)?,
                None => Reference::null().write(w)?,
            }
            w.write_u32(0)?;
            channel.write(w)?;
            w.pad_to(RECORD_ALIGN)?;
        }
        w.pad_to(BLOCK_ALIGN)
    }

    fn write_data(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_fourcc(DATA_SIG)?;
        w.write_u32(to_u32(self.data_block_size(), "data block size")?)?;
        w.write_zeros(SAMPLE_DATA_OFFSET)?;
        for channel in &self.samples {
            if self.encoding == SoundEncoding::Pcm16 {
                let mut swapped = channel.clone();
                normalize_pcm16(&mut swapped, self.endian);
                w.write_bytes(&swapped)?;
            } else {
                w.write_bytes(channel)?;
            }
        }
        Ok(())
    }
}
