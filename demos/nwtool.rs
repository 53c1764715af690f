//! nwtool.rs
//!
//! Inspect, convert and repack sound containers from the command line.
//!
//! ```text
//! nwtool info song.bcstm
//! nwtool convert song.wav song.bcstm --encoding dsp
//! nwtool unpack sound.bcsar blocks/
//! nwtool pack blocks/ sound.bcsar
//! ```
//!
//! DSP-ADPCM conversions run the tool named by `NWAUDIO_DSPADPCM`.

use std::fs;
use std::path::Path;

extern crate nwaudio;
use nwaudio::codec::{AdpcmCodec, CodecConfig, ExternalDspTool};
use nwaudio::convert;
use nwaudio::{
    default_wave_version, Endian, Error, FourCC, Project, Riff, SoundArchive, SoundEncoding,
    Stream, Wave, WaveArchive, DEFAULT_SOUND_ARCHIVE_VERSION,
};

#[macro_use]
extern crate clap;
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};

#[macro_use]
extern crate serde_json;

enum Audio {
    Riff(Riff),
    Wave(Wave),
    Stream(Stream),
    Project(Project),
}

fn magic_of(bytes: &[u8]) -> FourCC {
    let mut magic = [0u8; 4];
    let len = bytes.len().min(4);
    magic[..len].copy_from_slice(&bytes[..len]);
    FourCC::make(&magic)
}

fn load_audio(bytes: &[u8]) -> Result<Audio, Error> {
    match &magic_of(bytes).to_string()[..] {
        "RIFF" => Ok(Audio::Riff(Riff::load(bytes)?)),
        "CWAV" | "FWAV" => Ok(Audio::Wave(Wave::load(bytes)?)),
        "CSTM" | "FSTM" => Ok(Audio::Stream(Stream::load(bytes)?)),
        "CISP" => Ok(Audio::Project(Project::load(bytes)?)),
        _ => Err(Error::InvalidMagic {
            found: magic_of(bytes),
        }),
    }
}

fn info(bytes: &[u8]) -> Result<serde_json::Value, Error> {
    let summary = match &magic_of(bytes).to_string()[..] {
        "CSAR" | "FSAR" => {
            let archive = SoundArchive::load(bytes)?;
            json!({
                "format": "sound archive",
                "endian": format!("{:?}", archive.endian),
                "version": format!("0x{:08X}", archive.version),
                "strings": archive.strings.as_ref().map(|s| s.strings().to_vec()),
                "info_size": archive.info.len(),
                "file_size": archive.file.len(),
                "misc_blocks": archive.misc.len(),
            })
        }
        "CWAR" | "FWAR" => {
            let archive = WaveArchive::load(bytes)?;
            json!({
                "format": "wave archive",
                "endian": format!("{:?}", archive.endian),
                "version": format!("0x{:08X}", archive.version),
                "entry_sizes": archive.entries.iter().map(|e| e.len()).collect::<Vec<_>>(),
            })
        }
        _ => match load_audio(bytes)? {
            Audio::Riff(riff) => json!({
                "format": "riff",
                "channels": riff.format.channel_count,
                "sample_rate": riff.format.sample_rate,
                "bits_per_sample": riff.format.bits_per_sample,
                "frames": riff.frame_count(),
            }),
            Audio::Wave(wave) => json!({
                "format": "wave",
                "endian": format!("{:?}", wave.endian),
                "version": format!("0x{:08X}", wave.version),
                "encoding": format!("{:?}", wave.encoding),
                "channels": wave.samples.len(),
                "sample_rate": wave.sample_rate,
                "samples": wave.sample_count(),
                "looping": wave.looping,
                "loop": [wave.loop_start, wave.loop_end],
            }),
            Audio::Stream(stream) => json!({
                "format": "stream",
                "endian": format!("{:?}", stream.endian),
                "version": format!("0x{:08X}", stream.version),
                "encoding": format!("{:?}", stream.info.encoding),
                "channels": stream.info.channel_count,
                "sample_rate": stream.info.sample_rate,
                "samples": stream.total_samples(),
                "blocks": stream.info.geometry.block_count,
                "looping": stream.info.looping,
                "loop": [stream.info.loop_start, stream.info.loop_end],
                "tracks": stream.tracks.iter().map(|t| t.channels.clone()).collect::<Vec<_>>(),
            }),
            Audio::Project(project) => json!({
                "format": "project",
                "channels": project.channels.len(),
                "sample_rate": project.sample_rate,
                "samples": project.sample_count(),
                "looping": project.looping,
                "loop": [project.loop_start, project.loop_end],
                "tracks": project.tracks.iter().map(|t| t.channels.clone()).collect::<Vec<_>>(),
            }),
        },
    };
    Ok(summary)
}

fn parse_encoding(name: &str) -> Result<SoundEncoding, Error> {
    match name {
        "pcm8" => Ok(SoundEncoding::Pcm8),
        "pcm16" => Ok(SoundEncoding::Pcm16),
        "dsp" => Ok(SoundEncoding::DspAdpcm),
        other => Err(Error::UnsupportedEncoding(other.to_string())),
    }
}

fn to_project(audio: Audio, codec: &dyn AdpcmCodec) -> Result<Project, Error> {
    match audio {
        Audio::Riff(riff) => convert::riff_to_project(&riff),
        Audio::Wave(wave) => convert::wave_to_project(&wave, Some(codec)),
        Audio::Stream(stream) => convert::stream_to_project(&stream, Some(codec)),
        Audio::Project(project) => Ok(project),
    }
}

fn convert_audio(
    audio: Audio,
    target: &str,
    encoding: Option<SoundEncoding>,
    endian: Endian,
    codec: &dyn AdpcmCodec,
) -> Result<Vec<u8>, Error> {
    match target {
        "wav" => match audio {
            Audio::Riff(riff) => riff.to_bytes(),
            Audio::Wave(wave) => convert::wave_to_riff(&wave, Some(codec))?.to_bytes(),
            Audio::Stream(stream) => convert::stream_to_riff(&stream, Some(codec))?.to_bytes(),
            Audio::Project(project) => convert::project_to_riff(&project)?.to_bytes(),
        },
        "cisp" => to_project(audio, codec)?.to_bytes(),
        "bcwav" | "bfwav" => {
            let mut wave = match (audio, encoding) {
                (Audio::Riff(riff), None) => convert::riff_to_wave(&riff)?,
                (Audio::Wave(wave), None) => wave,
                (Audio::Stream(stream), None) => convert::stream_to_wave(&stream)?,
                (audio, encoding) => convert::project_to_wave(
                    &to_project(audio, codec)?,
                    encoding.unwrap_or(SoundEncoding::Pcm16),
                    Some(codec),
                )?,
            };
            wave.version = default_wave_version(endian);
            wave.endian = endian;
            wave.to_bytes()
        }
        "bcstm" | "bfstm" => {
            let mut stream = match (audio, encoding) {
                (Audio::Riff(riff), None) => convert::riff_to_stream(&riff)?,
                (Audio::Wave(wave), None) => convert::wave_to_stream(&wave)?,
                (Audio::Stream(stream), None) => stream,
                (audio, encoding) => convert::project_to_stream(
                    &to_project(audio, codec)?,
                    encoding.unwrap_or(SoundEncoding::Pcm16),
                    Some(codec),
                )?,
            };
            stream.endian = endian;
            stream.to_bytes()
        }
        other => Err(Error::UnsupportedEncoding(format!(
            "unknown output extension {:?}",
            other
        ))),
    }
}

fn extension(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn run_convert(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let input = matches.value_of("INPUT").unwrap_or_default();
    let output = matches.value_of("OUTPUT").unwrap_or_default();
    let encoding = matches.value_of("encoding").map(parse_encoding).transpose()?;
    let target = extension(output);
    let endian = if matches.is_present("big_endian") || target.starts_with("bf") {
        Endian::Big
    } else {
        Endian::Little
    };

    let codec = ExternalDspTool::new(CodecConfig::from_env());
    let audio = load_audio(&fs::read(input)?)?;
    fs::write(output, convert_audio(audio, &target, encoding, endian, &codec)?)?;
    Ok(())
}

fn run_unpack(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let input = matches.value_of("INPUT").unwrap_or_default();
    let dir = Path::new(matches.value_of("DIR").unwrap_or_default());
    let bytes = fs::read(input)?;
    fs::create_dir_all(dir)?;

    let files = match &magic_of(&bytes).to_string()[..] {
        "CWAR" | "FWAR" => {
            let archive = WaveArchive::load(&bytes)?;
            let ext = match archive.endian {
                Endian::Little => "bcwav",
                Endian::Big => "bfwav",
            };
            archive
                .entries
                .iter()
                .enumerate()
                .map(|(i, entry)| (format!("{:04}.{}", i, ext), entry.clone()))
                .collect()
        }
        _ => SoundArchive::load(&bytes)?.block_files()?,
    };
    for (name, data) in files {
        println!("{}", name);
        fs::write(dir.join(name), data)?;
    }
    Ok(())
}

fn run_pack(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let dir = Path::new(matches.value_of("DIR").unwrap_or_default());
    let output = matches.value_of("OUTPUT").unwrap_or_default();
    let endian = if matches.is_present("big_endian") {
        Endian::Big
    } else {
        Endian::Little
    };

    let mut names = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<Result<Vec<_>, _>>()?;
    names.sort();

    let bytes = if extension(output).ends_with("war") {
        let mut archive = WaveArchive {
            endian,
            ..WaveArchive::default()
        };
        for name in names {
            archive.push(&Wave::load(&fs::read(dir.join(&name))?)?)?;
        }
        archive.to_bytes()?
    } else {
        let files = names
            .into_iter()
            .map(|name| fs::read(dir.join(&name)).map(|data| (name, data)))
            .collect::<Result<Vec<_>, _>>()?;
        let version = matches
            .value_of("version")
            .map(|v| u32::from_str_radix(v.trim_start_matches("0x"), 16))
            .transpose()?
            .unwrap_or(DEFAULT_SOUND_ARCHIVE_VERSION);
        SoundArchive::from_block_files(endian, version, files)?.to_bytes()?
    };
    fs::write(output, bytes)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let big_endian = Arg::with_name("big_endian")
        .long("big-endian")
        .short("b")
        .help("Write the big-endian (F-prefixed) variant")
        .takes_value(false);

    let matches = App::new("nwtool")
        .version(crate_version!())
        .author(crate_authors!())
        .about("Inspect, convert and repack NW4C and Cafe sound containers.")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("info")
                .about("Print a JSON summary of a container")
                .arg(Arg::with_name("INPUT").required(true)),
        )
        .subcommand(
            SubCommand::with_name("convert")
                .about("Convert between .wav, .cisp, .bcwav/.bfwav and .bcstm/.bfstm")
                .arg(
                    Arg::with_name("encoding")
                        .long("encoding")
                        .short("e")
                        .help("Re-encode the samples")
                        .possible_values(&["pcm8", "pcm16", "dsp"])
                        .takes_value(true),
                )
                .arg(big_endian.clone())
                .arg(Arg::with_name("INPUT").required(true))
                .arg(Arg::with_name("OUTPUT").required(true)),
        )
        .subcommand(
            SubCommand::with_name("unpack")
                .about("Split a sound archive into its blocks, or a wave archive into its waves")
                .arg(Arg::with_name("INPUT").required(true))
                .arg(Arg::with_name("DIR").required(true)),
        )
        .subcommand(
            SubCommand::with_name("pack")
                .about("Rebuild an archive from a directory written by unpack")
                .arg(big_endian)
                .arg(
                    Arg::with_name("version")
                        .long("version-field")
                        .help("Header version, in hex")
                        .takes_value(true),
                )
                .arg(Arg::with_name("DIR").required(true))
                .arg(Arg::with_name("OUTPUT").required(true)),
        )
        .get_matches();

    match matches.subcommand() {
        ("info", Some(m)) => {
            let bytes = fs::read(m.value_of("INPUT").unwrap_or_default())?;
            println!("{}", serde_json::to_string_pretty(&info(&bytes)?)?);
        }
        ("convert", Some(m)) => run_convert(m)?,
        ("unpack", Some(m)) => run_unpack(m)?,
        ("pack", Some(m)) => run_pack(m)?,
        _ => unreachable!(),
    }
    Ok(())
}
