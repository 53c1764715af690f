//! Standalone mono DSP-ADPCM files, the interchange format of the
//! external ADPCM tool. Always big-endian, 0x60-byte header.

use super::adpcm::{DspAdpcmInfo, SoundEncoding, DSP_SAMPLES_PER_FRAME};
use super::cursor::{Endian, Reader, Writer};
use super::errors::Error;
use super::layout::to_u32;

pub const DSP_HEADER_LEN: u64 = 0x60;

/// Nibbles per 8-byte frame: two header nibbles, fourteen sample nibbles.
const NIBBLES_PER_FRAME: u64 = 16;

/// Nibbles needed for `samples` samples, frame headers included.
pub fn nibbles_for_samples(samples: u64) -> u64 {
    let frames = samples / DSP_SAMPLES_PER_FRAME;
    match samples % DSP_SAMPLES_PER_FRAME {
        0 => frames * NIBBLES_PER_FRAME,
        rem => frames * NIBBLES_PER_FRAME + rem + 2,
    }
}

/// Nibble address of sample `sample`.
pub fn nibble_address(sample: u64) -> u64 {
    (sample / DSP_SAMPLES_PER_FRAME) * NIBBLES_PER_FRAME + sample % DSP_SAMPLES_PER_FRAME + 2
}

#[derive(Debug, Clone, PartialEq)]
pub struct DspFile {
    pub sample_count: u32,
    pub nibble_count: u32,
    pub sample_rate: u32,
    pub looping: bool,
    /// Nibble address of the loop start.
    pub loop_start: u32,
    /// Nibble address of the loop end.
    pub loop_end: u32,
    pub current_address: u32,
    pub info: DspAdpcmInfo,
    pub gain: u16,
    pub channel_count: u16,
    pub block_frame_count: u16,
    pub data: Vec<u8>,
}

impl DspFile {
    /// Wrap one channel of DSP-ADPCM data holding `sample_count` samples.
    pub fn from_channel(
        data: Vec<u8>,
        info: DspAdpcmInfo,
        sample_count: u64,
        sample_rate: u32,
    ) -> Result<Self, Error> {
        let nibbles = nibbles_for_samples(sample_count);
        Ok(DspFile {
            sample_count: to_u32(sample_count, "sample count")?,
            nibble_count: to_u32(nibbles, "nibble count")?,
            sample_rate,
            looping: false,
            loop_start: 2,
            loop_end: to_u32(nibbles.saturating_sub(1), "loop end")?,
            current_address: 2,
            info,
            gain: 0,
            channel_count: 0,
            block_frame_count: 0,
            data,
        })
    }

    /// Loop between two sample positions.
    pub fn set_loop(&mut self, start: u64, end: u64) -> Result<(), Error> {
        self.looping = true;
        self.loop_start = to_u32(nibble_address(start), "loop start")?;
        self.loop_end = to_u32(nibble_address(end.saturating_sub(1)), "loop end")?;
        Ok(())
    }

    pub fn load(bytes: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(bytes, Endian::Big);
        let sample_count = r.read_u32()?;
        let nibble_count = r.read_u32()?;
        let sample_rate = r.read_u32()?;
        let looping = r.read_u16()? != 0;
        let format = r.read_u16()?;
        if format != 0 {
            return Err(Error::UnsupportedEncoding(format!("DSP format {}", format)));
        }
        let loop_start = r.read_u32()?;
        let loop_end = r.read_u32()?;
        let current_address = r.read_u32()?;

        let mut coefficients = [0i16; 16];
        for c in coefficients.iter_mut() {
            *c = r.read_i16()?;
        }
        let gain = r.read_u16()?;
        let info = DspAdpcmInfo {
            coefficients,
            predictor_scale: r.read_u16()?,
            yn1: r.read_i16()?,
            yn2: r.read_i16()?,
            loop_predictor_scale: r.read_u16()?,
            loop_yn1: r.read_i16()?,
            loop_yn2: r.read_i16()?,
        };
        let channel_count = r.read_u16()?;
        let block_frame_count = r.read_u16()?;
        r.seek(DSP_HEADER_LEN)?;

        let data = r.read_bytes((nibble_count as u64 + 1) / 2)?;
        Ok(DspFile {
            sample_count,
            nibble_count,
            sample_rate,
            looping,
            loop_start,
            loop_end,
            current_address,
            info,
            gain,
            channel_count,
            block_frame_count,
            data,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut w = Writer::new(Endian::Big);
        w.write_u32(self.sample_count)?;
        w.write_u32(self.nibble_count)?;
        w.write_u32(self.sample_rate)?;
        w.write_u16(self.looping as u16)?;
        w.write_u16(0)?;
        w.write_u32(self.loop_start)?;
        w.write_u32(self.loop_end)?;
        w.write_u32(self.current_address)?;
        w.write_i16_array(&self.info.coefficients)?;
        w.write_u16(self.gain)?;
        w.write_u16(self.info.predictor_scale)?;
        w.write_i16(self.info.yn1)?;
        w.write_i16(self.info.yn2)?;
        w.write_u16(self.info.loop_predictor_scale)?;
        w.write_i16(self.info.loop_yn1)?;
        w.write_i16(self.info.loop_yn2)?;
        w.write_u16(self.channel_count)?;
        w.write_u16(self.block_frame_count)?;
        w.write_zeros(DSP_HEADER_LEN - w.tell())?;
        w.write_bytes(&self.data)?;
        Ok(w.into_inner())
    }

    /// Data trimmed or zero-filled to the length a game container
    /// expects for `sample_count` samples.
    pub fn channel_data(&self) -> Vec<u8> {
        let len = SoundEncoding::DspAdpcm.bytes_for_samples(self.sample_count as u64) as usize;
        let mut data = self.data.clone();
        data.resize(len, 0);
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nibbles() {
        assert_eq!(nibbles_for_samples(0), 0);
        assert_eq!(nibbles_for_samples(14), 16);
        assert_eq!(nibbles_for_samples(15), 19);
        assert_eq!(nibble_address(0), 2);
        assert_eq!(nibble_address(14), 18);
    }

    #[test]
    fn test_header_layout() {
        let mut info = DspAdpcmInfo::default();
        info.coefficients[0] = -2;
        info.predictor_scale = 0x45;
        let dsp = DspFile::from_channel(vec![0x45, 1, 2, 3, 4, 5, 6, 7], info, 14, 32000).unwrap();
        let bytes = dsp.to_bytes().unwrap();
        assert_eq!(bytes.len(), 0x60 + 8);
        assert_eq!(&bytes[0..4], &[0, 0, 0, 14]);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 16]);
        assert_eq!(&bytes[0x1C..0x1E], &[0xFF, 0xFE]);
        assert_eq!(&bytes[0x3E..0x40], &[0, 0x45]);
        assert_eq!(DspFile::load(&bytes).unwrap(), dsp);
    }

    #[test]
    fn test_loop_addresses() {
        let mut dsp = DspFile::from_channel(vec![0; 16], DspAdpcmInfo::default(), 28, 8000).unwrap();
        dsp.set_loop(14, 28).unwrap();
        let bytes = dsp.to_bytes().unwrap();
        assert_eq!(&bytes[0x0C..0x0E], &[0, 1]);
        assert_eq!(&bytes[0x10..0x14], &[0, 0, 0, 18]);
        assert_eq!(&bytes[0x14..0x18], &[0, 0, 0, 31]);
    }

    #[test]
    fn test_channel_data_length() {
        let dsp = DspFile::from_channel(vec![1; 20], DspAdpcmInfo::default(), 15, 8000).unwrap();
        assert_eq!(dsp.channel_data().len(), 10);
    }

    #[test]
    fn test_truncated_data() {
        let dsp = DspFile::from_channel(vec![0; 8], DspAdpcmInfo::default(), 14, 8000).unwrap();
        let bytes = dsp.to_bytes().unwrap();
        assert!(matches!(
            DspFile::load(&bytes[..0x64]),
            Err(Error::TruncatedData { .. })
        ));
    }
}
