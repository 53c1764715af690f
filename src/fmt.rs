use uuid::Uuid;

use super::common_format::CommonFormat;

/// Size of the extension written after a WAVEFORMATEXTENSIBLE header.
pub const EXTENSIBLE_CB_SIZE: u16 = 22;

/// Speaker mask naming the first `channel_count` standard positions.
pub fn speaker_mask(channel_count: u16) -> u32 {
    match channel_count {
        0 => 0,
        n if n >= 18 => 0x3_FFFF,
        n => (1u32 << n) - 1,
    }
}

/**
 * Extended Wave Format
 *
 * https://docs.microsoft.com/en-us/windows/win32/api/mmreg/ns-mmreg-waveformatextensible
 */
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WaveFmtExtended {
    /// Valid bits per sample
    pub valid_bits_per_sample: u16,

    /// Speaker assignment of each channel
    pub channel_mask: u32,

    /// Codec GUID, in file byte order
    pub type_guid: Uuid,
}

/**
 * RIFF `fmt ` record.
 *
 * Describes the binary layout of the `data` chunk: sample rate, sample
 * format and channel count.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct WaveFmt {
    /// A tag identifying the codec in use.
    ///
    /// If this is 0xFFFE, the codec is identified by the GUID in
    /// `extended_format`.
    pub tag: u16,

    /// Count of audio channels in each frame
    pub channel_count: u16,

    /// Sample rate of the audio data
    pub sample_rate: u32,

    /// By rule, `block_alignment * sample_rate`
    pub bytes_per_second: u32,

    /// By rule, `channel_count * bits_per_sample / 8`
    pub block_alignment: u16,

    pub bits_per_sample: u16,

    /// Decoded from `trailing` when `tag` is 0xFFFE.
    pub extended_format: Option<WaveFmtExtended>,

    /// Bytes after the 16 fixed fields, kept verbatim. When empty, the
    /// writer derives them from `extended_format`.
    pub trailing: Vec<u8>,
}

impl WaveFmt {
    /// Integer PCM format. More than two channels get an extensible
    /// header.
    pub fn new_pcm(sample_rate: u32, bits_per_sample: u16, channel_count: u16) -> Self {
        let container_bits_per_sample = bits_per_sample + (8 - bits_per_sample % 8) % 8;
        let container_bytes_per_sample = container_bits_per_sample / 8;

        let (tag, extended_format) = if channel_count > 2 {
            let (_, type_guid) = CommonFormat::IntegerPCM.take();
            let extended = WaveFmtExtended {
                valid_bits_per_sample: bits_per_sample,
                channel_mask: speaker_mask(channel_count),
                type_guid,
            };
            (0xFFFE, Some(extended))
        } else {
            (CommonFormat::IntegerPCM.take().0, None)
        };

        WaveFmt {
            tag,
            channel_count,
            sample_rate,
            bytes_per_second: container_bytes_per_sample as u32 * sample_rate * channel_count as u32,
            block_alignment: container_bytes_per_sample * channel_count,
            bits_per_sample: container_bits_per_sample,
            extended_format,
            trailing: vec![],
        }
    }

    pub fn common_format(&self) -> CommonFormat {
        CommonFormat::make(self.tag, self.extended_format.map(|ext| ext.type_guid))
    }

    /// Bytes the record occupies inside its chunk.
    pub fn byte_len(&self) -> u64 {
        16 + match (&self.extended_format, self.trailing.is_empty()) {
            (_, false) => self.trailing.len() as u64,
            (Some(_), true) => 2 + EXTENSIBLE_CB_SIZE as u64,
            (None, true) => 0,
        }
    }
}
