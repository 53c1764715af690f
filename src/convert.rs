//! Conversions between RIFF files, waves, streams and projects.
//!
//! PCM conversions never need a codec. Anything that has to turn
//! DSP-ADPCM into PCM16 or back takes an `Option<&dyn AdpcmCodec>` and
//! fails with `UnsupportedEncoding` when given `None`.

use byteorder::{ByteOrder, LittleEndian};
use dasp_sample::Sample as _;

use super::adpcm::{ChannelCodecInfo, SoundEncoding};
use super::codec::AdpcmCodec;
use super::errors::Error;
use super::project::Project;
use super::riff::Riff;
use super::stream::Stream;
use super::wave::{default_version, Wave};

/// Channel buffers in one of the game encodings, with their codec records.
struct Encoded {
    encoding: SoundEncoding,
    channels: Vec<ChannelCodecInfo>,
    samples: Vec<Vec<u8>>,
    sample_count: u64,
}

fn pcm16_to_bytes(pcm: &[i16]) -> Vec<u8> {
    let mut bytes = vec![0u8; pcm.len() * 2];
    LittleEndian::write_i16_into(pcm, &mut bytes);
    bytes
}

fn pcm16_from_bytes(bytes: &[u8]) -> Vec<i16> {
    let mut pcm = vec![0i16; bytes.len() / 2];
    LittleEndian::read_i16_into(&bytes[..pcm.len() * 2], &mut pcm);
    pcm
}

fn no_codec(what: &str) -> Error {
    Error::UnsupportedEncoding(format!("{} needs an ADPCM codec", what))
}

fn encode_channels(
    pcm: &[Vec<i16>],
    sample_rate: u32,
    encoding: SoundEncoding,
    codec: Option<&dyn AdpcmCodec>,
) -> Result<Encoded, Error> {
    let sample_count = pcm.first().map(|c| c.len()).unwrap_or(0) as u64;
    match encoding {
        SoundEncoding::Pcm16 => Ok(Encoded {
            encoding,
            channels: vec![ChannelCodecInfo::None; pcm.len()],
            samples: pcm.iter().map(|c| pcm16_to_bytes(c)).collect(),
            sample_count,
        }),
        SoundEncoding::Pcm8 => Ok(Encoded {
            encoding,
            channels: vec![ChannelCodecInfo::None; pcm.len()],
            samples: pcm
                .iter()
                .map(|c| c.iter().map(|s| s.to_sample::<i8>() as u8).collect())
                .collect(),
            sample_count,
        }),
        SoundEncoding::DspAdpcm => {
            let codec = codec.ok_or_else(|| no_codec("DSP-ADPCM encoding"))?;
            let mut channels = Vec::with_capacity(pcm.len());
            let mut samples = Vec::with_capacity(pcm.len());
            for channel in pcm {
                let encoded = codec.encode(channel, sample_rate)?;
                channels.push(ChannelCodecInfo::Dsp(encoded.info));
                samples.push(encoded.data);
            }
            Ok(Encoded {
                encoding,
                channels,
                samples,
                sample_count,
            })
        }
        SoundEncoding::ImaAdpcm => Err(Error::UnsupportedEncoding(
            "IMA-ADPCM encoding".to_string(),
        )),
    }
}

fn decode_channels(
    encoding: SoundEncoding,
    channels: &[ChannelCodecInfo],
    samples: &[Vec<u8>],
    sample_count: u64,
    sample_rate: u32,
    codec: Option<&dyn AdpcmCodec>,
) -> Result<Vec<Vec<i16>>, Error> {
    let count = sample_count as usize;
    match encoding {
        SoundEncoding::Pcm16 => Ok(samples
            .iter()
            .map(|c| {
                let mut pcm = pcm16_from_bytes(c);
                pcm.truncate(count);
                pcm
            })
            .collect()),
        SoundEncoding::Pcm8 => Ok(samples
            .iter()
            .map(|c| c.iter().take(count).map(|&b| (b as i8).to_sample::<i16>()).collect())
            .collect()),
        SoundEncoding::DspAdpcm => {
            let codec = codec.ok_or_else(|| no_codec("DSP-ADPCM decoding"))?;
            channels
                .iter()
                .zip(samples)
                .enumerate()
                .map(|(index, (info, data))| match info {
                    ChannelCodecInfo::Dsp(info) => {
                        codec.decode(data, info, sample_count, sample_rate)
                    }
                    _ => Err(Error::InconsistentLayout(format!(
                        "DSP-ADPCM channel {} has no coefficients",
                        index
                    ))),
                })
                .collect()
        }
        SoundEncoding::ImaAdpcm => Err(Error::UnsupportedEncoding(
            "IMA-ADPCM decoding".to_string(),
        )),
    }
}

/// A little-endian PCM wave from an 8-bit or 16-bit RIFF file.
pub fn riff_to_wave(riff: &Riff) -> Result<Wave, Error> {
    riff.check_pcm()?;
    let (encoding, samples): (SoundEncoding, Vec<Vec<u8>>) = match riff.format.bits_per_sample {
        8 => (
            SoundEncoding::Pcm8,
            riff.channels::<i8>()?
                .into_iter()
                .map(|c| c.into_iter().map(|s| s as u8).collect())
                .collect(),
        ),
        _ => (
            SoundEncoding::Pcm16,
            riff.channels::<i16>()?
                .iter()
                .map(|c| pcm16_to_bytes(c))
                .collect::<Vec<_>>(),
        ),
    };
    let channels = vec![ChannelCodecInfo::None; samples.len()];
    Wave::build(encoding, riff.format.sample_rate, channels, samples)
}

pub fn riff_to_stream(riff: &Riff) -> Result<Stream, Error> {
    wave_to_stream(&riff_to_wave(riff)?)
}

pub fn riff_to_project(riff: &Riff) -> Result<Project, Error> {
    Ok(Project::new(riff.format.sample_rate, riff.channels::<i16>()?))
}

/// A stream with the wave's samples, loop points and byte order, one
/// stereo track per pair of channels.
pub fn wave_to_stream(wave: &Wave) -> Result<Stream, Error> {
    let total = wave.sample_count();
    let mut stream = Stream::build(
        wave.encoding,
        wave.sample_rate,
        wave.channels.clone(),
        wave.samples.clone(),
        total,
    )?;
    stream.endian = wave.endian;
    stream.info.looping = wave.looping;
    stream.info.loop_start = wave.loop_start;
    stream.info.loop_end = wave.loop_end;
    Ok(stream)
}

pub fn stream_to_wave(stream: &Stream) -> Result<Wave, Error> {
    let mut wave = Wave::build(
        stream.info.encoding,
        stream.info.sample_rate,
        stream.channels.clone(),
        stream.samples.clone(),
    )?;
    wave.endian = stream.endian;
    wave.version = default_version(stream.endian);
    wave.looping = stream.info.looping;
    wave.loop_start = stream.info.loop_start;
    wave.loop_end = stream.info.loop_end;
    Ok(wave)
}

/// A project with the wave's channels as PCM16 and one track owning
/// every channel.
pub fn wave_to_project(wave: &Wave, codec: Option<&dyn AdpcmCodec>) -> Result<Project, Error> {
    let channels = decode_channels(
        wave.encoding,
        &wave.channels,
        &wave.samples,
        wave.sample_count(),
        wave.sample_rate,
        codec,
    )?;
    let mut project = Project::new(wave.sample_rate, channels);
    project.looping = wave.looping;
    project.loop_start = wave.loop_start;
    project.loop_end = wave.loop_end;
    Ok(project)
}

pub fn stream_to_project(
    stream: &Stream,
    codec: Option<&dyn AdpcmCodec>,
) -> Result<Project, Error> {
    let channels = decode_channels(
        stream.info.encoding,
        &stream.channels,
        &stream.samples,
        stream.total_samples(),
        stream.info.sample_rate,
        codec,
    )?;
    let mut project = Project::new(stream.info.sample_rate, channels);
    if !stream.tracks.is_empty() {
        project.tracks = stream.tracks.clone();
    }
    project.looping = stream.info.looping;
    project.loop_start = stream.info.loop_start;
    project.loop_end = stream.info.loop_end;
    Ok(project)
}

/// Encode a project's channels as `encoding`. The project's tracks are
/// copied as they are.
pub fn project_to_stream(
    project: &Project,
    encoding: SoundEncoding,
    codec: Option<&dyn AdpcmCodec>,
) -> Result<Stream, Error> {
    let encoded = encode_channels(&project.channels, project.sample_rate, encoding, codec)?;
    let mut stream = Stream::build(
        encoded.encoding,
        project.sample_rate,
        encoded.channels,
        encoded.samples,
        encoded.sample_count,
    )?;
    stream.tracks = project.tracks.clone();
    stream.info.looping = project.looping;
    stream.info.loop_start = project.loop_start;
    stream.info.loop_end = project.loop_end;
    Ok(stream)
}

pub fn project_to_wave(
    project: &Project,
    encoding: SoundEncoding,
    codec: Option<&dyn AdpcmCodec>,
) -> Result<Wave, Error> {
    let encoded = encode_channels(&project.channels, project.sample_rate, encoding, codec)?;
    let mut wave = Wave::build(
        encoded.encoding,
        project.sample_rate,
        encoded.channels,
        encoded.samples,
    )?;
    wave.looping = project.looping;
    wave.loop_start = project.loop_start;
    wave.loop_end = project.loop_end;
    Ok(wave)
}

pub fn project_to_riff(project: &Project) -> Result<Riff, Error> {
    Riff::from_channels(project.sample_rate, 16, &project.channels)
}

fn pcm_to_riff(
    encoding: SoundEncoding,
    channels: &[ChannelCodecInfo],
    samples: &[Vec<u8>],
    sample_count: u64,
    sample_rate: u32,
    codec: Option<&dyn AdpcmCodec>,
) -> Result<Riff, Error> {
    if encoding == SoundEncoding::Pcm8 {
        let pcm: Vec<Vec<i8>> = samples
            .iter()
            .map(|c| c.iter().take(sample_count as usize).map(|&b| b as i8).collect())
            .collect();
        return Riff::from_channels(sample_rate, 8, &pcm);
    }
    let pcm = decode_channels(encoding, channels, samples, sample_count, sample_rate, codec)?;
    Riff::from_channels(sample_rate, 16, &pcm)
}

/// PCM8 waves become 8-bit files; everything else becomes 16-bit.
pub fn wave_to_riff(wave: &Wave, codec: Option<&dyn AdpcmCodec>) -> Result<Riff, Error> {
    pcm_to_riff(
        wave.encoding,
        &wave.channels,
        &wave.samples,
        wave.sample_count(),
        wave.sample_rate,
        codec,
    )
}

pub fn stream_to_riff(stream: &Stream, codec: Option<&dyn AdpcmCodec>) -> Result<Riff, Error> {
    pcm_to_riff(
        stream.info.encoding,
        &stream.channels,
        &stream.samples,
        stream.total_samples(),
        stream.info.sample_rate,
        codec,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adpcm::DspAdpcmInfo;
    use crate::codec::EncodedChannel;
    use crate::stream::Track;

    /// Stores PCM16 verbatim in the "ADPCM" buffer so round trips can be
    /// checked without the real tool.
    struct PassThrough;

    impl AdpcmCodec for PassThrough {
        fn encode(&self, pcm: &[i16], _sample_rate: u32) -> Result<EncodedChannel, Error> {
            let mut info = DspAdpcmInfo::default();
            info.coefficients[0] = 0x0800;
            let mut data = pcm16_to_bytes(pcm);
            data.resize(
                SoundEncoding::DspAdpcm.bytes_for_samples(pcm.len() as u64) as usize,
                0,
            );
            Ok(EncodedChannel {
                data,
                info,
                sample_count: pcm.len() as u64,
            })
        }

        fn decode(
            &self,
            adpcm: &[u8],
            _info: &DspAdpcmInfo,
            sample_count: u64,
            _sample_rate: u32,
        ) -> Result<Vec<i16>, Error> {
            let mut pcm = pcm16_from_bytes(adpcm);
            pcm.resize(sample_count as usize, 0);
            Ok(pcm)
        }
    }

    fn ramp(len: usize, step: i16) -> Vec<i16> {
        (0..len as i16).map(|i| i.wrapping_mul(step)).collect()
    }

    #[test]
    fn test_project_tracks_survive_stream() {
        let mut project = Project::new(32000, vec![ramp(100, 3), ramp(100, -3)]);
        project.tracks = vec![Track {
            volume: 100,
            pan: 20,
            flags: 0,
            channels: vec![0, 1],
        }];
        let stream = project_to_stream(&project, SoundEncoding::Pcm16, None).unwrap();
        assert_eq!(stream.info.channel_count, 2);
        assert_eq!(stream.tracks.len(), 1);
        assert_eq!(stream.tracks[0].channels, vec![0, 1]);

        let loaded = Stream::load(&stream.to_bytes().unwrap()).unwrap();
        assert_eq!(loaded.tracks, stream.tracks);
        let back = stream_to_project(&loaded, None).unwrap();
        assert_eq!(back.channels, project.channels);
        assert_eq!(back.tracks, project.tracks);
    }

    #[test]
    fn test_wave_to_stream_pairs_channels() {
        let project = Project::new(22050, vec![ramp(30, 1); 3]);
        let wave = project_to_wave(&project, SoundEncoding::Pcm16, None).unwrap();
        let stream = wave_to_stream(&wave).unwrap();
        assert_eq!(stream.tracks.len(), 2);
        assert_eq!(stream.tracks[0].channels, vec![0, 1]);
        assert_eq!(stream.tracks[1].channels, vec![2]);
        assert_eq!(stream.tracks[0].volume, 0x7F);
        assert_eq!(stream.tracks[0].pan, 0x40);
        assert_eq!(stream.total_samples(), 30);

        let wave2 = stream_to_wave(&stream).unwrap();
        assert_eq!(wave2.samples, wave.samples);
        assert_eq!(wave2.sample_rate, 22050);
    }

    #[test]
    fn test_riff_pcm8_to_wave_is_signed() {
        let riff = Riff::from_channels(8000, 8, &[vec![0i8, -1, 127]]).unwrap();
        let wave = riff_to_wave(&riff).unwrap();
        assert_eq!(wave.encoding, SoundEncoding::Pcm8);
        assert_eq!(wave.samples[0], vec![0x00, 0xFF, 0x7F]);
        assert_eq!(wave_to_riff(&wave, None).unwrap(), riff);
    }

    #[test]
    fn test_riff_pcm16_round_trip() {
        let riff = Riff::from_channels(44100, 16, &[ramp(50, 7), ramp(50, -7)]).unwrap();
        let stream = riff_to_stream(&riff).unwrap();
        assert_eq!(stream.info.encoding, SoundEncoding::Pcm16);
        assert_eq!(stream_to_riff(&stream, None).unwrap(), riff);
        assert_eq!(riff_to_project(&riff).unwrap().channels[1], ramp(50, -7));
    }

    #[test]
    fn test_adpcm_needs_codec() {
        let project = Project::new(32000, vec![ramp(20, 1)]);
        assert!(matches!(
            project_to_stream(&project, SoundEncoding::DspAdpcm, None),
            Err(Error::UnsupportedEncoding(_))
        ));
        let wave = project_to_wave(&project, SoundEncoding::DspAdpcm, Some(&PassThrough)).unwrap();
        assert!(matches!(wave_to_riff(&wave, None), Err(Error::UnsupportedEncoding(_))));
    }

    #[test]
    fn test_adpcm_with_codec() {
        let project = Project::new(32000, vec![ramp(28, 5), ramp(28, -5)]);
        let stream = project_to_stream(&project, SoundEncoding::DspAdpcm, Some(&PassThrough)).unwrap();
        assert_eq!(stream.info.encoding, SoundEncoding::DspAdpcm);
        assert!(matches!(stream.channels[0], ChannelCodecInfo::Dsp(_)));
        assert_eq!(stream.samples[0].len(), 16);
        assert!(stream.seek.is_some());

        let back = stream_to_project(&stream, Some(&PassThrough)).unwrap();
        assert_eq!(back.channels[0][..8], project.channels[0][..8]);
        assert_eq!(back.channels[0].len(), 28);
    }

    #[test]
    fn test_loop_points_carried() {
        let mut project = Project::new(32000, vec![ramp(64, 2)]);
        project.looping = true;
        project.loop_start = 10;
        project.loop_end = 60;
        let wave = project_to_wave(&project, SoundEncoding::Pcm16, None).unwrap();
        assert!(wave.looping);
        assert_eq!((wave.loop_start, wave.loop_end), (10, 60));
        let stream = wave_to_stream(&wave).unwrap();
        assert!(stream.info.looping);
        assert_eq!((stream.info.loop_start, stream.info.loop_end), (10, 60));
    }

    #[test]
    fn test_ima_unsupported() {
        let project = Project::new(32000, vec![ramp(4, 1)]);
        assert!(matches!(
            project_to_wave(&project, SoundEncoding::ImaAdpcm, None),
            Err(Error::UnsupportedEncoding(_))
        ));
    }
}
