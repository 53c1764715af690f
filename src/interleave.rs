//! Sample block geometry of streamed audio, and the block (de)interleaver.
//!
//! A stream's DATA block holds `block_count - 1` rounds of one full block
//! per channel, then one last block per channel, each last block followed
//! by zero padding up to `last_block_padded_size`.
//!
//! PCM16 streams always have exactly two blocks: the first holds half the
//! samples (rounded up), the last block the rest.

use super::adpcm::SoundEncoding;
use super::errors::Error;
use super::layout::{align_up, to_u32, BLOCK_ALIGN};

/// Size in bytes of a full sample block in streams built by this crate.
pub const SAMPLE_BLOCK_SIZE: u64 = 0x2000;

/// What the last block holds when the sample count divides evenly by the
/// samples per block.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LastBlockPolicy {
    /// The last block is a full block.
    FullBlock,
    /// A zero-length last block follows the full blocks.
    EmptyBlock,
}

/// Policy used when building new streams.
pub const LAST_BLOCK_POLICY: LastBlockPolicy = LastBlockPolicy::FullBlock;

/// Split `total` samples into `(block_count, last_block_sample_count)`.
pub fn split_samples(total: u64, per_block: u64, policy: LastBlockPolicy) -> (u64, u64) {
    if total == 0 || per_block == 0 {
        return (0, 0);
    }
    let full = total / per_block;
    match (total % per_block, policy) {
        (0, LastBlockPolicy::FullBlock) => (full, per_block),
        (0, LastBlockPolicy::EmptyBlock) => (full + 1, 0),
        (rem, _) => (full + 1, rem),
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct BlockGeometry {
    pub block_count: u32,
    pub block_size: u32,
    pub block_sample_count: u32,
    pub last_block_size: u32,
    pub last_block_sample_count: u32,
    pub last_block_padded_size: u32,
}

impl BlockGeometry {
    /// Geometry for channels of `total_samples` samples stored in
    /// `channel_len` bytes each, using `LAST_BLOCK_POLICY`.
    pub fn for_samples(
        encoding: SoundEncoding,
        total_samples: u64,
        channel_len: u64,
    ) -> Result<Self, Error> {
        Self::for_samples_with(LAST_BLOCK_POLICY, encoding, total_samples, channel_len)
    }

    pub fn for_samples_with(
        policy: LastBlockPolicy,
        encoding: SoundEncoding,
        total_samples: u64,
        channel_len: u64,
    ) -> Result<Self, Error> {
        if encoding == SoundEncoding::Pcm16 && total_samples > 0 {
            return Self::two_blocks(encoding, total_samples, channel_len);
        }
        let per_block = encoding.samples_for_bytes(SAMPLE_BLOCK_SIZE);
        let (block_count, last_samples) = split_samples(total_samples, per_block, policy);
        let full_bytes = block_count.saturating_sub(1) * SAMPLE_BLOCK_SIZE;

        if channel_len < full_bytes || channel_len - full_bytes > SAMPLE_BLOCK_SIZE {
            return Err(Error::InconsistentLayout(format!(
                "{} samples of {:?} cannot occupy 0x{:X} bytes per channel",
                total_samples, encoding, channel_len
            )));
        }
        let last_block_size = channel_len - full_bytes;

        Ok(BlockGeometry {
            block_count: block_count as u32,
            block_size: SAMPLE_BLOCK_SIZE as u32,
            block_sample_count: per_block as u32,
            last_block_size: last_block_size as u32,
            last_block_sample_count: last_samples as u32,
            last_block_padded_size: align_up(last_block_size, BLOCK_ALIGN) as u32,
        })
    }

    fn two_blocks(
        encoding: SoundEncoding,
        total_samples: u64,
        channel_len: u64,
    ) -> Result<Self, Error> {
        let first_samples = (total_samples + 1) / 2;
        let first_size = encoding.bytes_for_samples(first_samples);
        if channel_len < first_size || channel_len - first_size > first_size {
            return Err(Error::InconsistentLayout(format!(
                "{} samples of {:?} cannot occupy 0x{:X} bytes per channel",
                total_samples, encoding, channel_len
            )));
        }
        let last_block_size = channel_len - first_size;

        Ok(BlockGeometry {
            block_count: 2,
            block_size: to_u32(first_size, "block size")?,
            block_sample_count: to_u32(first_samples, "block sample count")?,
            last_block_size: to_u32(last_block_size, "last block size")?,
            last_block_sample_count: to_u32(total_samples - first_samples, "sample count")?,
            last_block_padded_size: to_u32(align_up(last_block_size, BLOCK_ALIGN), "last block")?,
        })
    }

    fn full_rounds(&self) -> usize {
        self.block_count.saturating_sub(1) as usize
    }

    pub fn total_samples(&self) -> u64 {
        if self.block_count == 0 {
            return 0;
        }
        self.full_rounds() as u64 * self.block_sample_count as u64
            + self.last_block_sample_count as u64
    }

    /// De-interleaved length of one channel.
    pub fn channel_len(&self) -> u64 {
        if self.block_count == 0 {
            return 0;
        }
        (self.full_rounds() as u64 * self.block_size as u64)
            .saturating_add(self.last_block_size as u64)
    }

    /// Interleaved length of all channels including last-block padding.
    pub fn interleaved_len(&self, channels: usize) -> u64 {
        if self.block_count == 0 {
            return 0;
        }
        (self.full_rounds() as u64 * self.block_size as u64)
            .saturating_add(self.last_block_padded_size as u64)
            .saturating_mul(channels as u64)
    }

    fn check_padding(&self) -> Result<(), Error> {
        if self.last_block_padded_size < self.last_block_size {
            return Err(Error::InconsistentLayout(format!(
                "last block of 0x{:X} bytes padded to only 0x{:X}",
                self.last_block_size, self.last_block_padded_size
            )));
        }
        Ok(())
    }

    /// Split interleaved sample blocks into one buffer per channel.
    pub fn deinterleave(&self, raw: &[u8], channels: usize) -> Result<Vec<Vec<u8>>, Error> {
        self.check_padding()?;
        if self.block_count == 0 || channels == 0 {
            return Ok(vec![vec![]; channels]);
        }

        let needed = self.interleaved_len(channels);
        if (raw.len() as u64) < needed {
            return Err(Error::TruncatedData {
                at: 0,
                wanted: needed,
                available: raw.len() as u64,
            });
        }
        let mut out = vec![Vec::with_capacity(self.channel_len() as usize); channels];

        let block = self.block_size as usize;
        let mut pos = 0usize;
        for _ in 0..self.full_rounds() {
            for channel in out.iter_mut() {
                channel.extend_from_slice(&raw[pos..pos + block]);
                pos += block;
            }
        }
        let last = self.last_block_size as usize;
        for channel in out.iter_mut() {
            channel.extend_from_slice(&raw[pos..pos + last]);
            pos += self.last_block_padded_size as usize;
        }
        Ok(out)
    }

    /// Inverse of `deinterleave`; last-block padding is written as zeros.
    pub fn reinterleave(&self, channels: &[Vec<u8>]) -> Result<Vec<u8>, Error> {
        self.check_padding()?;
        let expected = self.channel_len();
        if let Some((i, c)) = channels
            .iter()
            .enumerate()
            .find(|(_, c)| c.len() as u64 != expected)
        {
            return Err(Error::InconsistentLayout(format!(
                "channel {} holds 0x{:X} bytes, block geometry needs 0x{:X}",
                i,
                c.len(),
                expected
            )));
        }

        let mut out = Vec::with_capacity(self.interleaved_len(channels.len()) as usize);
        if self.block_count == 0 {
            return Ok(out);
        }
        let block = self.block_size as usize;
        for round in 0..self.full_rounds() {
            for channel in channels {
                out.extend_from_slice(&channel[round * block..(round + 1) * block]);
            }
        }
        let start = self.full_rounds() * block;
        let padding = (self.last_block_padded_size - self.last_block_size) as usize;
        for channel in channels {
            out.extend_from_slice(&channel[start..]);
            out.extend(std::iter::repeat(0u8).take(padding));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(count: u32, size: u32, last: u32, padded: u32) -> BlockGeometry {
        BlockGeometry {
            block_count: count,
            block_size: size,
            block_sample_count: size,
            last_block_size: last,
            last_block_sample_count: last,
            last_block_padded_size: padded,
        }
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }

    #[test]
    fn test_round_robin_assignment() {
        // two channels, blocks of 4, one full round, last block of 2
        let g = geometry(2, 4, 2, 2);
        let raw = vec![1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 4, 4];
        let out = g.deinterleave(&raw, 2).unwrap();
        assert_eq!(out[0], vec![1, 1, 1, 1, 3, 3]);
        assert_eq!(out[1], vec![2, 2, 2, 2, 4, 4]);
    }

    #[test]
    fn test_inverse_law() {
        for channels in 1..=4usize {
            for count in 1..=4u32 {
                for last in [1u32, 5, 16].iter() {
                    let g = geometry(count, 16, *last, *last);
                    let raw = pattern(channels * (16 * (count as usize - 1) + *last as usize));
                    let split = g.deinterleave(&raw, channels).unwrap();
                    assert_eq!(g.reinterleave(&split).unwrap(), raw);
                }
            }
        }
    }

    #[test]
    fn test_padding_is_dropped_and_regenerated() {
        let g = geometry(2, 8, 3, 8);
        let mut raw = pattern(8 * 2);
        raw.extend_from_slice(&[9, 9, 9, 0, 0, 0, 0, 0]);
        raw.extend_from_slice(&[8, 8, 8, 0, 0, 0, 0, 0]);
        let split = g.deinterleave(&raw, 2).unwrap();
        assert_eq!(split[0].len(), 11);
        assert_eq!(&split[1][8..], &[8, 8, 8]);
        assert_eq!(g.reinterleave(&split).unwrap(), raw);
    }

    #[test]
    fn test_single_block_stream() {
        let g = geometry(1, 0x2000, 0x30, 0x40);
        let mut raw = pattern(0x30);
        raw.extend(vec![0u8; 0x10]);
        raw.extend(pattern(0x30).iter().map(|b| b ^ 0xFF));
        raw.extend(vec![0u8; 0x10]);
        let split = g.deinterleave(&raw, 2).unwrap();
        assert_eq!(split[0], pattern(0x30));
        assert_eq!(g.reinterleave(&split).unwrap(), raw);
    }

    #[test]
    fn test_pcm16_two_block_layout() {
        // 0x6001 samples would take seven general blocks
        let g = BlockGeometry::for_samples(SoundEncoding::Pcm16, 0x6001, 0xC002).unwrap();
        assert_eq!(g.block_count, 2);
        assert_eq!(g.block_sample_count, 0x3001);
        assert_eq!(g.block_size, 0x6002);
        assert_eq!(g.last_block_sample_count, 0x3000);
        assert_eq!(g.last_block_size, 0x6000);
        assert_eq!(g.total_samples(), 0x6001);

        let mut raw = pattern(2 * 0x6002);
        raw.extend(pattern(0x6000));
        raw.extend(pattern(0x6000).iter().map(|b| !b));
        let split = g.deinterleave(&raw, 2).unwrap();
        assert_eq!(split[1].len(), 0xC002);
        assert_eq!(&split[1][0x6002..], &raw[2 * 0x6002 + 0x6000..]);
        assert_eq!(g.reinterleave(&split).unwrap(), raw);
    }

    #[test]
    fn test_pcm16_tiny_stream() {
        let g = BlockGeometry::for_samples(SoundEncoding::Pcm16, 1, 2).unwrap();
        assert_eq!((g.block_count, g.block_size, g.last_block_size), (2, 2, 0));
        assert_eq!(g.total_samples(), 1);
        assert!(BlockGeometry::for_samples(SoundEncoding::Pcm16, 10, 8).is_err());
    }

    #[test]
    fn test_huge_geometry_is_truncated_data() {
        let g = geometry(u32::MAX, u32::MAX, 8, 8);
        assert!(matches!(
            g.deinterleave(&[0u8; 64], 255),
            Err(Error::TruncatedData { wanted: u64::MAX, .. })
        ));
    }

    #[test]
    fn test_short_input() {
        let g = geometry(2, 8, 8, 8);
        assert!(matches!(
            g.deinterleave(&[0u8; 20], 2),
            Err(Error::TruncatedData { wanted: 32, .. })
        ));
    }

    #[test]
    fn test_wrong_channel_length() {
        let g = geometry(2, 8, 8, 8);
        assert!(matches!(
            g.reinterleave(&[vec![0u8; 16], vec![0u8; 15]]),
            Err(Error::InconsistentLayout(_))
        ));
    }

    #[test]
    fn test_last_block_policy() {
        assert_eq!(split_samples(0x7000, 0x3800, LastBlockPolicy::FullBlock), (2, 0x3800));
        assert_eq!(split_samples(0x7000, 0x3800, LastBlockPolicy::EmptyBlock), (3, 0));
        assert_eq!(split_samples(0x7001, 0x3800, LastBlockPolicy::FullBlock), (3, 1));
        assert_eq!(split_samples(0, 0x3800, LAST_BLOCK_POLICY), (0, 0));
        assert_eq!(LAST_BLOCK_POLICY, LastBlockPolicy::FullBlock);

        let full = BlockGeometry::for_samples_with(
            LastBlockPolicy::FullBlock,
            SoundEncoding::DspAdpcm,
            0x7000,
            0x4000,
        )
        .unwrap();
        assert_eq!((full.block_count, full.last_block_size), (2, 0x2000));
        assert_eq!(full.total_samples(), 0x7000);

        let empty = BlockGeometry::for_samples_with(
            LastBlockPolicy::EmptyBlock,
            SoundEncoding::DspAdpcm,
            0x7000,
            0x4000,
        )
        .unwrap();
        assert_eq!((empty.block_count, empty.last_block_size), (3, 0));
        assert_eq!(empty.total_samples(), 0x7000);
    }

    #[test]
    fn test_geometry_from_samples() {
        let g = BlockGeometry::for_samples(SoundEncoding::Pcm8, 100, 100).unwrap();
        assert_eq!(g.block_count, 1);
        assert_eq!(g.last_block_size, 100);
        assert_eq!(g.last_block_padded_size, 0x80);
        assert!(BlockGeometry::for_samples(SoundEncoding::Pcm8, 100, 0x2100).is_err());
    }
}
