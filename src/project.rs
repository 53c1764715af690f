//! The editor's project file, `CISP`: a flat, always little-endian record
//! of stream parameters, tracks and PCM16 channels with no offsets.
//!
//! ```text
//! "CISP" "STRM" loop u8, channels u8, rate, loop start, loop end,
//!               track count, bytes per channel
//! "TRAC" volume u8, pan u8, flags u16, count u32, channel indices  (per track)
//! seek size u32, seek bytes
//! "CHAN" i16 samples, channel after channel
//! ```

use super::cursor::{Endian, Reader, Writer};
use super::errors::Error;
use super::fourcc::{CHAN_SIG, CISP_SIG, STRM_SIG, TRAC_SIG};
use super::layout::to_u32;
use super::stream::Track;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Project {
    pub looping: bool,
    pub sample_rate: u32,
    pub loop_start: u32,
    pub loop_end: u32,
    pub tracks: Vec<Track>,
    pub channels: Vec<Vec<i16>>,
}

impl Project {
    /// A non-looping project with one track owning every channel.
    pub fn new(sample_rate: u32, channels: Vec<Vec<i16>>) -> Self {
        let samples = channels.first().map(|c| c.len()).unwrap_or(0);
        Project {
            looping: false,
            sample_rate,
            loop_start: 0,
            loop_end: samples as u32,
            tracks: vec![Track::owning_all(channels.len())],
            channels,
        }
    }

    pub fn sample_count(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn load(data: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(data, Endian::Little);
        r.expect_fourcc(CISP_SIG)?;
        r.expect_fourcc(STRM_SIG)?;
        let looping = r.read_u8()? != 0;
        let channel_count = r.read_u8()?;
        let sample_rate = r.read_u32()?;
        let loop_start = r.read_u32()?;
        let loop_end = r.read_u32()?;
        let track_count = r.read_u32()?;
        let channel_size = r.read_u32()? as u64;

        let mut tracks = vec![];
        for _ in 0..track_count {
            r.expect_fourcc(TRAC_SIG)?;
            let volume = r.read_u8()?;
            let pan = r.read_u8()?;
            let flags = r.read_u16()?;
            let count = r.read_u32()?;
            tracks.push(Track {
                volume,
                pan,
                flags,
                channels: r.read_bytes(count as u64)?,
            });
        }

        let seek_size = r.read_u32()?;
        if seek_size != 0 {
            log::warn!("dropping {} bytes of project seek data", seek_size);
        }
        r.skip(seek_size as u64)?;

        r.expect_fourcc(CHAN_SIG)?;
        let channels = (0..channel_count)
            .map(|_| r.read_i16_array((channel_size / 2) as usize))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Project {
            looping,
            sample_rate,
            loop_start,
            loop_end,
            tracks,
            channels,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let samples = self.sample_count();
        if self.channels.iter().any(|c| c.len() != samples) {
            return Err(Error::InconsistentLayout(
                "project channels must hold the same number of samples".to_string(),
            ));
        }
        if self.channels.len() > u8::MAX as usize {
            return Err(Error::InconsistentLayout(format!(
                "{} channels do not fit a project",
                self.channels.len()
            )));
        }

        let mut w = Writer::new(Endian::Little);
        w.write_fourcc(CISP_SIG)?;
        w.write_fourcc(STRM_SIG)?;
        w.write_u8(self.looping as u8)?;
        w.write_u8(self.channels.len() as u8)?;
        w.write_u32(self.sample_rate)?;
        w.write_u32(self.loop_start)?;
        w.write_u32(self.loop_end)?;
        w.write_u32(self.tracks.len() as u32)?;
        w.write_u32(to_u32(samples as u64 * 2, "channel size")?)?;

        for track in &self.tracks {
            w.write_fourcc(TRAC_SIG)?;
            w.write_u8(track.volume)?;
            w.write_u8(track.pan)?;
            w.write_u16(track.flags)?;
            w.write_u32(track.channels.len() as u32)?;
            w.write_bytes(&track.channels)?;
        }

        w.write_u32(0)?;

        w.write_fourcc(CHAN_SIG)?;
        for channel in &self.channels {
            w.write_i16_array(channel)?;
        }
        Ok(w.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut project = Project::new(32000, vec![vec![1, -2, 3], vec![-4, 5, -6]]);
        project.looping = true;
        project.loop_start = 1;
        project.tracks.push(Track {
            volume: 100,
            pan: 0,
            flags: 0,
            channels: vec![1],
        });
        let bytes = project.to_bytes().unwrap();
        assert_eq!(&bytes[0..8], b"CISPSTRM");
        assert_eq!(Project::load(&bytes).unwrap(), project);
    }

    #[test]
    fn test_layout() {
        let project = Project::new(8000, vec![vec![0x0102]]);
        let bytes = project.to_bytes().unwrap();
        // 8 magic + 22 stream + 13 track + 4 seek + 4 CHAN + 2 sample
        assert_eq!(bytes.len(), 53);
        assert_eq!(&bytes[26..30], &[2, 0, 0, 0]);
        assert_eq!(&bytes[bytes.len() - 2..], &[0x02, 0x01]);
    }

    #[test]
    fn test_seek_data_is_dropped() {
        let project = Project::new(8000, vec![vec![7, 8]]);
        let mut bytes = project.to_bytes().unwrap();
        let seek_at = 30 + 13;
        bytes.splice(seek_at..seek_at + 4, vec![2, 0, 0, 0, 0xAA, 0xBB]);
        assert_eq!(Project::load(&bytes).unwrap(), project);
    }

    #[test]
    fn test_wrong_magic() {
        assert!(matches!(
            Project::load(b"CWAVSTRM"),
            Err(Error::InvalidMagic { .. })
        ));
    }

    #[test]
    fn test_truncated() {
        let bytes = Project::new(8000, vec![vec![1, 2, 3]]).to_bytes().unwrap();
        assert!(matches!(
            Project::load(&bytes[..bytes.len() - 1]),
            Err(Error::TruncatedData { .. })
        ));
    }
}
