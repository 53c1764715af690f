//! Streamed audio: `CSTM` (little-endian) and `FSTM` (big-endian).
//!
//! ```text
//! header | INFO (stream info, tracks, channels, ADPCM records) | SEEK | DATA
//! ```
//!
//! Offsets in INFO's own reference list are relative to INFO + 8; track
//! and channel records are relative to their reference table; ADPCM and
//! byte-table records are relative to the record that points at them.

use super::adpcm::{normalize_pcm16, ChannelCodecInfo, SoundEncoding};
use super::cursor::{Endian, Reader, Writer};
use super::errors::{Error, RecordKind, SkippedRecord};
use super::fourcc::{CSTM_SIG, DATA_SIG, FSTM_SIG, INFO_SIG, SEEK_SIG};
use super::header::{ContainerHeader, Family, OrderSource};
use super::interleave::BlockGeometry;
use super::layout::{align_up, measure, to_u32, Layout, BLOCK_ALIGN, RECORD_ALIGN};
use super::reference::{ids, Reference, ReferenceTable};

pub const STREAM_FAMILY: Family = Family {
    little: CSTM_SIG,
    big: FSTM_SIG,
    order: OrderSource::Mark,
};

/// Version written into newly built streams.
pub const DEFAULT_STREAM_VERSION: u32 = 0x0200_0000;

/// Bytes per channel per seek entry (two history samples).
pub const SEEK_ENTRY_SIZE: u32 = 4;

/// Offset of the sample data inside DATA, relative to DATA + 8.
const SAMPLE_DATA_OFFSET: u64 = 0x18;

/// Stream info record, relative to INFO + 8.
const STREAM_INFO_OFFSET: u64 = 0x18;
const STREAM_INFO_LEN: u64 = 0x38;

/// Seek table bytes for a stream geometry: one entry per channel for every
/// block plus one more. `None` when the header's numbers overflow.
pub fn seek_table_len(block_count: u32, seek_size: u32, channels: usize) -> Option<u64> {
    (block_count as u64 + 1)
        .checked_mul(seek_size as u64)?
        .checked_mul(channels as u64)
}

/// Playback parameters and sample block geometry of a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub encoding: SoundEncoding,
    pub looping: bool,
    pub channel_count: u8,
    pub sample_rate: u32,
    pub loop_start: u32,
    pub loop_end: u32,
    pub geometry: BlockGeometry,
    pub seek_size: u32,
    pub seek_interval_sample_count: u32,
}

impl StreamInfo {
    fn read(r: &mut Reader) -> Result<(Self, Reference), Error> {
        let encoding = SoundEncoding::from_u8(r.read_u8()?)?;
        let looping = r.read_u8()? != 0;
        let channel_count = r.read_u8()?;
        let region_count = r.read_u8()?;
        if region_count != 0 {
            log::warn!("ignoring {} stream regions", region_count);
        }
        let sample_rate = r.read_u32()?;
        let loop_start = r.read_u32()?;
        let loop_end = r.read_u32()?;
        let geometry = BlockGeometry {
            block_count: r.read_u32()?,
            block_size: r.read_u32()?,
            block_sample_count: r.read_u32()?,
            last_block_size: r.read_u32()?,
            last_block_sample_count: r.read_u32()?,
            last_block_padded_size: r.read_u32()?,
        };
        let seek_size = r.read_u32()?;
        let seek_interval_sample_count = r.read_u32()?;
        let sample_ref = Reference::read(r)?.expect(&[ids::SAMPLE_DATA])?;

        let info = StreamInfo {
            encoding,
            looping,
            channel_count,
            sample_rate,
            loop_start,
            loop_end,
            geometry,
            seek_size,
            seek_interval_sample_count,
        };
        Ok((info, sample_ref))
    }

    fn write(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_u8(self.encoding as u8)?;
        w.write_u8(self.looping as u8)?;
        w.write_u8(self.channel_count)?;
        w.write_u8(0)?;
        w.write_u32(self.sample_rate)?;
        w.write_u32(self.loop_start)?;
        w.write_u32(self.loop_end)?;
        let g = &self.geometry;
        w.write_u32(g.block_count)?;
        w.write_u32(g.block_size)?;
        w.write_u32(g.block_sample_count)?;
        w.write_u32(g.last_block_size)?;
        w.write_u32(g.last_block_sample_count)?;
        w.write_u32(g.last_block_padded_size)?;
        w.write_u32(self.seek_size)?;
        w.write_u32(self.seek_interval_sample_count)?;
        Reference::new(ids::SAMPLE_DATA, SAMPLE_DATA_OFFSET as u32).write(w)
    }
}

/// A group of channels mixed together on playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub volume: u8,
    pub pan: u8,
    /// Bit 0 is front bypass.
    pub flags: u16,
    /// Indices of the channels this track mixes.
    pub channels: Vec<u8>,
}

impl Track {
    /// The track synthesized for streams that declare none.
    pub fn owning_all(channel_count: usize) -> Self {
        Track {
            volume: 127,
            pan: 64,
            flags: 1,
            channels: (0..channel_count as u8).collect(),
        }
    }

    /// One centered track per pair of channels; an odd last channel gets
    /// a track of its own.
    pub fn stereo_pairs(channel_count: usize) -> Vec<Self> {
        (0..channel_count as u8)
            .collect::<Vec<u8>>()
            .chunks(2)
            .map(|pair| Track {
                volume: 0x7F,
                pan: 0x40,
                flags: 0,
                channels: pair.to_vec(),
            })
            .collect()
    }

    fn read_at(r: &mut Reader, reference: Reference, table_at: u64) -> Result<Self, Error> {
        let at = reference
            .expect(&[ids::STM_TRACK_INFO])?
            .require_within(table_at, r.len())?;
        r.seek(at)?;
        let volume = r.read_u8()?;
        let pan = r.read_u8()?;
        let flags = r.read_u16()?;
        let table = Reference::read(r)?
            .expect(&[ids::BYTE_TABLE])?
            .require_within(at, r.len())?;
        r.seek(table)?;
        let count = r.read_u32()?;
        let channels = r.read_bytes(count as u64)?;
        Ok(Track {
            volume,
            pan,
            flags,
            channels,
        })
    }

    fn write(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_u8(self.volume)?;
        w.write_u8(self.pan)?;
        w.write_u16(self.flags)?;
        Reference::new(ids::BYTE_TABLE, 0x0C).write(w)?;
        w.write_u32(self.channels.len() as u32)?;
        w.write_bytes(&self.channels)?;
        w.pad_to(RECORD_ALIGN)
    }
}

/// A decoded stream. Sample buffers are de-interleaved, one per channel;
/// PCM16 buffers and the seek table are kept little-endian whatever the
/// file's byte order.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    pub endian: Endian,
    pub version: u32,
    pub info: StreamInfo,
    pub tracks: Vec<Track>,
    pub channels: Vec<ChannelCodecInfo>,
    pub seek: Option<Vec<u8>>,
    pub samples: Vec<Vec<u8>>,
}

/// Where `Stream::plan` put everything.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamLayout {
    pub container: Layout,
    info: InfoLayout,
}

/// Record offsets relative to INFO + 8.
#[derive(Debug, Clone, PartialEq)]
struct InfoLayout {
    track_table: u64,
    channel_table: u64,
    tracks: Vec<u64>,
    channels: Vec<u64>,
    codec: Vec<Option<u64>>,
    size: u64,
}

impl Stream {
    /// Decode a stream, dropping unreadable track and channel records
    /// with a warning.
    pub fn load(data: &[u8]) -> Result<Self, Error> {
        let (stream, skipped) = Self::read(data)?;
        for s in &skipped {
            log::warn!("skipped {:?} record {}: {}", s.kind, s.index, s.error);
        }
        Ok(stream)
    }

    /// Decode a stream and report the track and channel records that
    /// could not be read. A skipped channel keeps its samples and loses
    /// its codec record.
    pub fn read(data: &[u8]) -> Result<(Self, Vec<SkippedRecord>), Error> {
        let header = ContainerHeader::read(data, &STREAM_FAMILY)?;
        let mut r = Reader::new(data, header.endian);
        let mut skipped = vec![];

        let info_block = header.require_block(ids::STM_INFO_BLOCK)?;
        let data_block = header.require_block(ids::STM_DATA_BLOCK)?;

        r.seek(info_block.offset as u64)?;
        r.expect_fourcc(INFO_SIG)?;
        let _size = r.read_u32()?;
        let base = r.tell();

        let stream_ref = Reference::read(&mut r)?.expect(&[ids::STM_STREAM_INFO])?;
        let track_ref = Reference::read(&mut r)?.expect(&[ids::REFERENCE_TABLE])?;
        let channel_ref = Reference::read(&mut r)?.expect(&[ids::REFERENCE_TABLE])?;

        r.seek(stream_ref.require_within(base, r.len())?)?;
        let (info, sample_ref) = StreamInfo::read(&mut r)?;
        let channel_count = info.channel_count as usize;

        let mut tracks = match track_ref.resolve_within(base, r.len())? {
            None => vec![],
            Some(table_at) => {
                r.seek(table_at)?;
                let table = ReferenceTable::read(&mut r)?;
                let mut tracks = vec![];
                for (index, reference) in table.references.iter().enumerate() {
                    match Track::read_at(&mut r, *reference, table_at) {
                        Ok(track) => tracks.push(track),
                        Err(error) => skipped.push(SkippedRecord {
                            kind: RecordKind::Track,
                            index,
                            error,
                        }),
                    }
                }
                tracks
            }
        };
        if tracks.is_empty() {
            tracks.push(Track::owning_all(channel_count));
        }

        let table_at = channel_ref.require_within(base, r.len())?;
        r.seek(table_at)?;
        let table = ReferenceTable::read(&mut r)?;
        if table.references.len() != channel_count {
            return Err(Error::InconsistentLayout(format!(
                "stream declares {} channels, channel table lists {}",
                channel_count,
                table.references.len()
            )));
        }
        let mut channels = Vec::with_capacity(channel_count);
        for (index, reference) in table.references.iter().enumerate() {
            match read_channel(&mut r, *reference, table_at, info.encoding) {
                Ok(channel) => channels.push(channel),
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

        let seek = match header.block(ids::STM_SEEK_BLOCK) {
            None => None,
            Some(block) => {
                r.seek(block.offset as u64)?;
                r.expect_fourcc(SEEK_SIG)?;
                let size = r.read_u32()? as u64;
                let mut table = r.read_bytes(size.saturating_sub(8))?;
                // drop block padding
                let entries =
                    seek_table_len(info.geometry.block_count, info.seek_size, channel_count);
                if let Some(entries) = entries.filter(|e| *e > 0 && *e < table.len() as u64) {
                    table.truncate(entries as usize);
                }
                normalize_pcm16(&mut table, header.endian);
                Some(table)
            }
        };

        r.seek(data_block.offset as u64)?;
        r.expect_fourcc(DATA_SIG)?;
        let data_size = r.read_u32()? as u64;
        let data_end = (data_block.offset as u64 + data_size).min(r.len());
        let start = sample_ref.require_within(r.tell(), data_end)?;
        let mut samples = info
            .geometry
            .deinterleave(&data[start as usize..data_end as usize], channel_count)?;
        if info.encoding == SoundEncoding::Pcm16 {
            for channel in samples.iter_mut() {
                normalize_pcm16(channel, header.endian);
            }
        }

        let stream = Stream {
            endian: header.endian,
            version: header.version,
            info,
            tracks,
            channels,
            seek,
            samples,
        };
        Ok((stream, skipped))
    }

    /// Build a stream around de-interleaved channel buffers holding
    /// `total_samples` samples each.
    pub fn build(
        encoding: SoundEncoding,
        sample_rate: u32,
        channels: Vec<ChannelCodecInfo>,
        samples: Vec<Vec<u8>>,
        total_samples: u64,
    ) -> Result<Self, Error> {
        let mut stream = Stream {
            endian: Endian::Little,
            version: DEFAULT_STREAM_VERSION,
            info: StreamInfo {
                encoding,
                looping: false,
                channel_count: samples.len() as u8,
                sample_rate,
                loop_start: 0,
                loop_end: to_u32(total_samples, "sample count")?,
                geometry: BlockGeometry::default(),
                seek_size: SEEK_ENTRY_SIZE,
                seek_interval_sample_count: 0,
            },
            tracks: Track::stereo_pairs(samples.len()),
            channels,
            seek: None,
            samples,
        };
        stream.update_geometry(total_samples)?;
        Ok(stream)
    }

    /// Recompute channel count, block geometry and seek table from the
    /// current sample buffers. ADPCM streams get a zeroed seek table of
    /// `seek_table_len` bytes.
    pub fn update_geometry(&mut self, total_samples: u64) -> Result<(), Error> {
        let channel_len = self.samples.first().map(|c| c.len()).unwrap_or(0) as u64;
        let geometry = BlockGeometry::for_samples(self.info.encoding, total_samples, channel_len)?;
        self.info.channel_count = self.samples.len() as u8;
        self.info.geometry = geometry;
        self.info.seek_size = SEEK_ENTRY_SIZE;
        self.info.seek_interval_sample_count = geometry.block_sample_count;
        self.seek = if self.info.encoding.is_adpcm() {
            let len = seek_table_len(geometry.block_count, SEEK_ENTRY_SIZE, self.samples.len())
                .ok_or_else(|| Error::InconsistentLayout("seek table too large".to_string()))?;
            Some(vec![0u8; len as usize])
        } else {
            None
        };
        Ok(())
    }

    pub fn total_samples(&self) -> u64 {
        self.info.geometry.total_samples()
    }

    /// Tracks as they will be written.
    fn effective_tracks(&self) -> Vec<Track> {
        if self.tracks.is_empty() {
            vec![Track::owning_all(self.samples.len())]
        } else {
            self.tracks.clone()
        }
    }

    fn validate(&self) -> Result<(), Error> {
        let count = self.info.channel_count as usize;
        if self.channels.len() != count || self.samples.len() != count {
            return Err(Error::InconsistentLayout(format!(
                "stream declares {} channels, holds {} channel records and {} sample buffers",
                count,
                self.channels.len(),
                self.samples.len()
            )));
        }
        for channel in &self.channels {
            channel.check_encoding(self.info.encoding)?;
        }
        for track in &self.tracks {
            if let Some(bad) = track.channels.iter().find(|c| **c as usize >= count) {
                return Err(Error::InconsistentLayout(format!(
                    "track mixes channel {} of a {}-channel stream",
                    bad, count
                )));
            }
        }
        let expected = self.info.geometry.channel_len();
        if let Some(c) = self.samples.iter().find(|c| c.len() as u64 != expected) {
            return Err(Error::InconsistentLayout(format!(
                "sample buffer of 0x{:X} bytes, block geometry needs 0x{:X}",
                c.len(),
                expected
            )));
        }
        Ok(())
    }

    fn plan_info(&self, tracks: &[Track]) -> Result<InfoLayout, Error> {
        let mut at = STREAM_INFO_OFFSET + STREAM_INFO_LEN;
        let track_table = at;
        at += ReferenceTable::byte_len(tracks.len()) as u64;
        let channel_table = at;
        at += ReferenceTable::byte_len(self.channels.len()) as u64;

        let mut track_at = Vec::with_capacity(tracks.len());
        for track in tracks {
            track_at.push(at);
            at += measure(self.endian, |w| track.write(w))?;
        }

        let mut channel_at = Vec::with_capacity(self.channels.len());
        for _ in &self.channels {
            channel_at.push(at);
            at += Reference::SIZE as u64;
        }

        let mut codec_at = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            if channel.identifier().is_some() {
                codec_at.push(Some(at));
                at += align_up(measure(self.endian, |w| channel.write(w))?, RECORD_ALIGN);
            } else {
                codec_at.push(None);
            }
        }

        Ok(InfoLayout {
            track_table,
            channel_table,
            tracks: track_at,
            channels: channel_at,
            codec: codec_at,
            size: align_up(8 + at, BLOCK_ALIGN),
        })
    }

    fn seek_block_size(&self) -> Option<u64> {
        self.seek
            .as_ref()
            .map(|table| align_up(8 + table.len() as u64, BLOCK_ALIGN))
    }

    fn data_block_size(&self) -> u64 {
        let payload = self.info.geometry.interleaved_len(self.samples.len());
        align_up(8 + SAMPLE_DATA_OFFSET + payload, BLOCK_ALIGN)
    }

    /// Compute every offset and size of the serialized stream.
    pub fn plan(&self) -> Result<StreamLayout, Error> {
        self.validate()?;
        let info = self.plan_info(&self.effective_tracks())?;

        let mut blocks = vec![(ids::STM_INFO_BLOCK, info.size)];
        if let Some(size) = self.seek_block_size() {
            blocks.push((ids::STM_SEEK_BLOCK, size));
        }
        blocks.push((ids::STM_DATA_BLOCK, self.data_block_size()));

        Ok(StreamLayout {
            container: Layout::link(BLOCK_ALIGN, &blocks)?,
            info,
        })
    }

    /// Serialize according to a layout from `plan`.
    pub fn write(&self, layout: &StreamLayout) -> Result<Vec<u8>, Error> {
        let mut w = Writer::new(self.endian);
        let magic = STREAM_FAMILY.magic_for(self.endian);
        layout
            .container
            .header(magic, self.endian, self.version)
            .write(&mut w)?;

        let start = w.tell();
        self.write_info(&mut w, &layout.info)?;
        layout
            .container
            .check_block(ids::STM_INFO_BLOCK, start, w.tell())?;

        if let Some(table) = &self.seek {
            let start = w.tell();
            let mut table = table.clone();
            normalize_pcm16(&mut table, self.endian);
            w.write_fourcc(SEEK_SIG)?;
            w.write_u32(to_u32(self.seek_block_size().unwrap_or(0), "seek block size")?)?;
            w.write_bytes(&table)?;
            w.pad_to(BLOCK_ALIGN)?;
            layout
                .container
                .check_block(ids::STM_SEEK_BLOCK, start, w.tell())?;
        }

        let start = w.tell();
        self.write_data(&mut w)?;
        layout
            .container
            .check_block(ids::STM_DATA_BLOCK, start, w.tell())?;

        let bytes = w.into_inner();
        layout.container.check_output(&bytes)?;
        Ok(bytes)
    }

    /// `plan` then `write`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let layout = self.plan()?;
        self.write(&layout)
    }

    fn write_info(&self, w: &mut Writer, plan: &InfoLayout) -> Result<(), Error> {
        w.write_fourcc(INFO_SIG)?;
        w.write_u32(to_u32(plan.size, "info block size")?)?;

        Reference::new(ids::STM_STREAM_INFO, STREAM_INFO_OFFSET as u32).write(w)?;
        Reference::new(ids::REFERENCE_TABLE, to_u32(plan.track_table, "track table")?).write(w)?;
        Reference::new(ids::REFERENCE_TABLE, to_u32(plan.channel_table, "channel table")?)
            .write(w)?;
        self.info.write(w)?;

        relative_table(ids::STM_TRACK_INFO, &plan.tracks, plan.track_table)?.write(w)?;
        relative_table(ids::STM_CHANNEL_INFO, &plan.channels, plan.channel_table)?.write(w)?;

        for track in self.effective_tracks() {
            track.write(w)?;
        }
        for ((channel, record_at), codec_at) in self
            .channels
            .iter()
            .zip(plan.channels.iter())
            .zip(plan.codec.iter())
        {
            match (channel.identifier(), codec_at) {
                (Some(id), Some(at)) => {
                    Reference::new(id, to_u32(at - record_at, "codec record")?).write(w)?
                }
                _ => Reference::null().write(w)?,
            }
        }
        for channel in &self.channels {
            if channel.identifier().is_some() {
                channel.write(w)?;
                w.pad_to(RECORD_ALIGN)?;
            }
        }
        w.pad_to(BLOCK_ALIGN)
    }

    fn write_data(&self, w: &mut Writer) -> Result<(), Error> {
        let payload = if self.info.encoding == SoundEncoding::Pcm16 && self.endian == Endian::Big {
            let swapped: Vec<Vec<u8>> = self
                .samples
                .iter()
                .map(|c| {
                    let mut c = c.clone();
                    normalize_pcm16(&mut c, self.endian);
                    c
                })
                .collect();
            self.info.geometry.reinterleave(&swapped)?
        } else {
            self.info.geometry.reinterleave(&self.samples)?
        };

        w.write_fourcc(DATA_SIG)?;
        w.write_u32(to_u32(self.data_block_size(), "data block size")?)?;
        w.write_zeros(SAMPLE_DATA_OFFSET)?;
        w.write_bytes(&payload)?;
        w.pad_to(BLOCK_ALIGN)
    }
}

fn read_channel(
    r: &mut Reader,
    reference: Reference,
    table_at: u64,
    encoding: SoundEncoding,
) -> Result<ChannelCodecInfo, Error> {
    let at = reference
        .expect(&[ids::STM_CHANNEL_INFO])?
        .require_within(table_at, r.len())?;
    r.seek(at)?;
    let codec = Reference::read(r)?;
    ChannelCodecInfo::read_at(r, encoding, codec, at)
}

fn relative_table(identifier: u16, records: &[u64], table_at: u64) -> Result<ReferenceTable, Error> {
    let references = records
        .iter()
        .map(|at| to_u32(at - table_at, "record offset").map(|o| Reference::new(identifier, o)))
        .collect::<Result<Vec<_>, Error>>()?;
    Ok(ReferenceTable { references })
}
