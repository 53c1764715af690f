//! Sample encodings and the per-channel ADPCM state records.
//!
//! Coefficients and history are carried verbatim; nothing here encodes or
//! decodes ADPCM.

use super::cursor::{Endian, Reader, Writer};
use super::errors::Error;
use super::reference::{ids, Reference};

/// Samples per DSP-ADPCM frame.
pub const DSP_SAMPLES_PER_FRAME: u64 = 14;
/// Bytes per DSP-ADPCM frame: one header byte and seven data bytes.
pub const DSP_BYTES_PER_FRAME: u64 = 8;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SoundEncoding {
    Pcm8 = 0,
    Pcm16 = 1,
    DspAdpcm = 2,
    ImaAdpcm = 3,
}

impl SoundEncoding {
    pub fn from_u8(value: u8) -> Result<Self, Error> {
        match value {
            0 => Ok(SoundEncoding::Pcm8),
            1 => Ok(SoundEncoding::Pcm16),
            2 => Ok(SoundEncoding::DspAdpcm),
            3 => Ok(SoundEncoding::ImaAdpcm),
            x => Err(Error::UnsupportedEncoding(format!("encoding code {}", x))),
        }
    }

    pub fn is_adpcm(self) -> bool {
        matches!(self, SoundEncoding::DspAdpcm | SoundEncoding::ImaAdpcm)
    }

    /// Bytes one channel needs to hold `samples` samples.
    pub fn bytes_for_samples(self, samples: u64) -> u64 {
        match self {
            SoundEncoding::Pcm8 => samples,
            SoundEncoding::Pcm16 => samples * 2,
            SoundEncoding::DspAdpcm => {
                let frames = samples / DSP_SAMPLES_PER_FRAME;
                let rem = samples % DSP_SAMPLES_PER_FRAME;
                let tail = if rem > 0 { 1 + (rem + 1) / 2 } else { 0 };
                frames * DSP_BYTES_PER_FRAME + tail
            }
            SoundEncoding::ImaAdpcm => (samples + 1) / 2,
        }
    }

    /// Samples held by `bytes` bytes of one channel.
    pub fn samples_for_bytes(self, bytes: u64) -> u64 {
        match self {
            SoundEncoding::Pcm8 => bytes,
            SoundEncoding::Pcm16 => bytes / 2,
            SoundEncoding::DspAdpcm => {
                let frames = bytes / DSP_BYTES_PER_FRAME;
                let rem = bytes % DSP_BYTES_PER_FRAME;
                let tail = if rem > 1 { (rem - 1) * 2 } else { 0 };
                frames * DSP_SAMPLES_PER_FRAME + tail
            }
            SoundEncoding::ImaAdpcm => bytes * 2,
        }
    }
}

/// Convert a PCM16 buffer between file byte order and the little-endian
/// order kept in memory. The swap is its own inverse.
pub fn normalize_pcm16(buffer: &mut [u8], file_order: Endian) {
    if file_order == Endian::Big {
        for pair in buffer.chunks_exact_mut(2) {
            pair.swap(0, 1);
        }
    }
}

/// DSP-ADPCM decoder state for one channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct DspAdpcmInfo {
    pub coefficients: [i16; 16],
    pub predictor_scale: u16,
    pub yn1: i16,
    pub yn2: i16,
    pub loop_predictor_scale: u16,
    pub loop_yn1: i16,
    pub loop_yn2: i16,
}

impl DspAdpcmInfo {
    /// On disk, including the trailing padding half-word.
    pub const SIZE: u64 = 0x2E;

    pub fn read(r: &mut Reader) -> Result<Self, Error> {
        let mut coefficients = [0i16; 16];
        for c in coefficients.iter_mut() {
            *c = r.read_i16()?;
        }
        let info = DspAdpcmInfo {
            coefficients,
            predictor_scale: r.read_u16()?,
            yn1: r.read_i16()?,
            yn2: r.read_i16()?,
            loop_predictor_scale: r.read_u16()?,
            loop_yn1: r.read_i16()?,
            loop_yn2: r.read_i16()?,
        };
        let _padding = r.read_u16()?;
        Ok(info)
    }

    pub fn write(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_i16_array(&self.coefficients)?;
        w.write_u16(self.predictor_scale)?;
        w.write_i16(self.yn1)?;
        w.write_i16(self.yn2)?;
        w.write_u16(self.loop_predictor_scale)?;
        w.write_i16(self.loop_yn1)?;
        w.write_i16(self.loop_yn2)?;
        w.write_u16(0)
    }
}

/// IMA-ADPCM decoder state for one channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ImaAdpcmInfo {
    pub data: u16,
    pub table_index: u8,
    pub loop_data: u16,
    pub loop_table_index: u8,
}

impl ImaAdpcmInfo {
    pub const SIZE: u64 = 8;

    pub fn read(r: &mut Reader) -> Result<Self, Error> {
        let data = r.read_u16()?;
        let table_index = r.read_u8()?;
        let _pad = r.read_u8()?;
        let loop_data = r.read_u16()?;
        let loop_table_index = r.read_u8()?;
        let _pad = r.read_u8()?;
        Ok(ImaAdpcmInfo {
            data,
            table_index,
            loop_data,
            loop_table_index,
        })
    }

    pub fn write(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_u16(self.data)?;
        w.write_u8(self.table_index)?;
        w.write_u8(0)?;
        w.write_u16(self.loop_data)?;
        w.write_u8(self.loop_table_index)?;
        w.write_u8(0)
    }
}

/// Codec metadata of one channel, selected by the container's encoding.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChannelCodecInfo {
    Dsp(DspAdpcmInfo),
    Ima(ImaAdpcmInfo),
    None,
}

impl Default for ChannelCodecInfo {
    fn default() -> Self {
        ChannelCodecInfo::None
    }
}

impl ChannelCodecInfo {
    /// Read the record `reference` points at, relative to `anchor`.
    /// PCM encodings carry no record and yield `None` whatever the
    /// reference says.
    pub fn read_at(
        r: &mut Reader,
        encoding: SoundEncoding,
        reference: Reference,
        anchor: u64,
    ) -> Result<Self, Error> {
        let expected = match encoding {
            SoundEncoding::DspAdpcm => ids::DSP_ADPCM_INFO,
            SoundEncoding::ImaAdpcm => ids::IMA_ADPCM_INFO,
            _ => return Ok(ChannelCodecInfo::None),
        };
        let reference = reference.expect(&[expected])?;
        let at = match reference.resolve_within(anchor, r.len())? {
            Some(at) => at,
            None => return Ok(ChannelCodecInfo::None),
        };
        r.seek(at)?;
        match encoding {
            SoundEncoding::DspAdpcm => Ok(ChannelCodecInfo::Dsp(DspAdpcmInfo::read(r)?)),
            _ => Ok(ChannelCodecInfo::Ima(ImaAdpcmInfo::read(r)?)),
        }
    }

    pub fn identifier(&self) -> Option<u16> {
        match self {
            ChannelCodecInfo::Dsp(_) => Some(ids::DSP_ADPCM_INFO),
            ChannelCodecInfo::Ima(_) => Some(ids::IMA_ADPCM_INFO),
            ChannelCodecInfo::None => None,
        }
    }

    /// Size on disk, before record alignment.
    pub fn byte_len(&self) -> u64 {
        match self {
            ChannelCodecInfo::Dsp(_) => DspAdpcmInfo::SIZE,
            ChannelCodecInfo::Ima(_) => ImaAdpcmInfo::SIZE,
            ChannelCodecInfo::None => 0,
        }
    }

    pub fn write(&self, w: &mut Writer) -> Result<(), Error> {
        match self {
            ChannelCodecInfo::Dsp(info) => info.write(w),
            ChannelCodecInfo::Ima(info) => info.write(w),
            ChannelCodecInfo::None => Ok(()),
        }
    }

    /// Fail when the record kind disagrees with `encoding`.
    pub fn check_encoding(&self, encoding: SoundEncoding) -> Result<(), Error> {
        let fits = match (self, encoding) {
            (ChannelCodecInfo::Dsp(_), SoundEncoding::DspAdpcm) => true,
            (ChannelCodecInfo::Ima(_), SoundEncoding::ImaAdpcm) => true,
            (ChannelCodecInfo::None, _) => true,
            _ => false,
        };
        if fits {
            Ok(())
        } else {
            Err(Error::InconsistentLayout(format!(
                "{:?} channel record in a {:?} container",
                self.identifier(),
                encoding
            )))
        }
    }
}
