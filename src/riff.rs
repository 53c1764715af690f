//! RIFF/WAVE files holding 8-bit or 16-bit integer PCM.

use std::io::{Cursor, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use dasp_sample::Sample as _; // Expose to_sample()

use super::chunks::{ReadWaveChunks, WriteWaveChunks};
use super::common_format::CommonFormat;
use super::errors::Error;
use super::fmt::WaveFmt;
use super::fourcc::{FourCC, WriteFourCC, FMT__SIG, RIFF_DATA_SIG, RIFF_SIG, WAVE_SIG};
use super::parser::Parser;
use super::sample::Sample;

#[derive(Debug, Clone, PartialEq)]
pub struct Riff {
    pub format: WaveFmt,
    /// Interleaved frames exactly as stored in the `data` chunk.
    pub data: Vec<u8>,
}

impl Riff {
    /// Parse a RIFF file. Chunks other than `fmt ` and `data` are
    /// ignored.
    pub fn load(bytes: &[u8]) -> Result<Self, Error> {
        let chunks = Parser::make(Cursor::new(bytes))?.into_chunk_list()?;

        let mut format = None;
        let mut data = None;
        for chunk in &chunks {
            let end = chunk.start + chunk.length;
            if end > bytes.len() as u64 {
                return Err(Error::TruncatedData {
                    at: chunk.start,
                    wanted: chunk.length,
                    available: (bytes.len() as u64).saturating_sub(chunk.start),
                });
            }
            let body = &bytes[chunk.start as usize..end as usize];
            match chunk.signature {
                FMT__SIG => format = Some(Cursor::new(body).read_wave_fmt(chunk.length)?),
                RIFF_DATA_SIG => data = Some(body.to_vec()),
                other => log::trace!("skipping RIFF chunk {:?}", other),
            }
        }

        let missing = |what: FourCC| {
            Error::InconsistentLayout(format!("RIFF file has no {:?} chunk", what))
        };
        let riff = Riff {
            format: format.ok_or_else(|| missing(FMT__SIG))?,
            data: data.ok_or_else(|| missing(RIFF_DATA_SIG))?,
        };
        riff.check_pcm()?;
        Ok(riff)
    }

    /// Fail unless the file holds 8-bit or 16-bit integer PCM.
    pub fn check_pcm(&self) -> Result<(), Error> {
        let common = self.format.common_format();
        match (common, self.format.bits_per_sample) {
            (CommonFormat::IntegerPCM, 8) | (CommonFormat::IntegerPCM, 16)
                if self.format.channel_count > 0 =>
            {
                Ok(())
            }
            (common, bits) => Err(Error::UnsupportedEncoding(format!(
                "RIFF {:?} with {} bits per sample and {} channels",
                common, bits, self.format.channel_count
            ))),
        }
    }

    pub fn frame_count(&self) -> u64 {
        match self.format.block_alignment {
            0 => 0,
            align => self.data.len() as u64 / align as u64,
        }
    }

    /// De-interleave the frames into one buffer per channel.
    pub fn channels<S: Sample>(&self) -> Result<Vec<Vec<S>>, Error> {
        self.check_pcm()?;
        let channel_count = self.format.channel_count as usize;
        let frames = self.frame_count() as usize;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        let mut reader = Cursor::new(&self.data);

        for _ in 0..frames {
            for channel in channels.iter_mut() {
                let sample: S = match self.format.bits_per_sample {
                    8 => reader.read_u8()?.to_sample(),
                    _ => reader.read_i16::<LittleEndian>()?.to_sample(),
                };
                channel.push(sample);
            }
        }
        Ok(channels)
    }

    /// Interleave `channels` into a new file of `bits_per_sample`-bit
    /// PCM. Every channel must hold the same number of samples.
    pub fn from_channels<S: Sample>(
        sample_rate: u32,
        bits_per_sample: u16,
        channels: &[Vec<S>],
    ) -> Result<Self, Error> {
        if bits_per_sample != 8 && bits_per_sample != 16 {
            return Err(Error::UnsupportedEncoding(format!(
                "{}-bit RIFF output",
                bits_per_sample
            )));
        }
        let frames = channels.first().map(|c| c.len()).unwrap_or(0);
        if channels.iter().any(|c| c.len() != frames) {
            return Err(Error::InconsistentLayout(
                "RIFF channels must hold the same number of samples".to_string(),
            ));
        }

        let format = WaveFmt::new_pcm(sample_rate, bits_per_sample, channels.len() as u16);
        let mut data = Vec::with_capacity(frames * format.block_alignment as usize);
        for frame in 0..frames {
            for channel in channels {
                match bits_per_sample {
                    8 => data.write_u8(channel[frame].to_sample::<u8>())?,
                    _ => data.write_i16::<LittleEndian>(channel[frame].to_sample::<i16>())?,
                }
            }
        }
        Ok(Riff { format, data })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let fmt_len = self.format.byte_len();
        let data_len = self.data.len() as u64;
        let form_len = 4 + 8 + fmt_len + fmt_len % 2 + 8 + data_len + data_len % 2;
        if form_len > u32::MAX as u64 {
            return Err(Error::InconsistentLayout(format!(
                "RIFF form of 0x{:X} bytes",
                form_len
            )));
        }

        let mut w = Cursor::new(Vec::with_capacity(8 + form_len as usize));
        w.write_fourcc(RIFF_SIG)?;
        w.write_u32::<LittleEndian>(form_len as u32)?;
        w.write_fourcc(WAVE_SIG)?;

        w.write_fourcc(FMT__SIG)?;
        w.write_u32::<LittleEndian>(fmt_len as u32)?;
        w.write_wave_fmt(&self.format)?;
        if fmt_len % 2 == 1 {
            w.write_u8(0)?;
        }

        w.write_fourcc(RIFF_DATA_SIG)?;
        w.write_u32::<LittleEndian>(data_len as u32)?;
        w.write_all(&self.data)?;
        if data_len % 2 == 1 {
            w.write_u8(0)?;
        }
        Ok(w.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm16_round_trip() {
        let riff = Riff::from_channels(32000, 16, &[vec![1i16, -1, 300], vec![-2i16, 2, -300]])
            .unwrap();
        assert_eq!(riff.data.len(), 12);
        let bytes = riff.to_bytes().unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(bytes.len(), 12 + 8 + 16 + 8 + 12);

        let loaded = Riff::load(&bytes).unwrap();
        assert_eq!(loaded, riff);
        assert_eq!(loaded.channels::<i16>().unwrap()[1], vec![-2, 2, -300]);
    }

    #[test]
    fn test_pcm8_is_unsigned() {
        let riff = Riff::from_channels(8000, 8, &[vec![0i8, -128, 127]]).unwrap();
        assert_eq!(riff.data, vec![0x80, 0x00, 0xFF]);
        assert_eq!(riff.channels::<i8>().unwrap()[0], vec![0, -128, 127]);
        assert_eq!(riff.channels::<i16>().unwrap()[0][0], 0);
    }

    #[test]
    fn test_odd_data_is_padded() {
        let riff = Riff::from_channels(8000, 8, &[vec![1u8, 2, 3]]).unwrap();
        let bytes = riff.to_bytes().unwrap();
        assert_eq!(bytes.len() % 2, 0);
        assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize, bytes.len() - 8);
        assert_eq!(Riff::load(&bytes).unwrap(), riff);
    }

    #[test]
    fn test_multichannel_is_extensible() {
        let channels = vec![vec![0i16; 4]; 3];
        let riff = Riff::from_channels(48000, 16, &channels).unwrap();
        let loaded = Riff::load(&riff.to_bytes().unwrap()).unwrap();
        assert_eq!(loaded.format.tag, 0xFFFE);
        assert_eq!(loaded.format.common_format(), CommonFormat::IntegerPCM);
        assert_eq!(loaded.channels::<i16>().unwrap().len(), 3);
    }

    #[test]
    fn test_float_rejected() {
        let mut riff = Riff::from_channels(8000, 16, &[vec![0i16; 2]]).unwrap();
        riff.format.tag = 3;
        riff.format.bits_per_sample = 32;
        let bytes = riff.to_bytes().unwrap();
        assert!(matches!(Riff::load(&bytes), Err(Error::UnsupportedEncoding(_))));
    }

    #[test]
    fn test_missing_data() {
        let bytes = b"RIFF\x04\x00\x00\x00WAVE".to_vec();
        assert!(matches!(Riff::load(&bytes), Err(Error::InconsistentLayout(_))));
    }
}
