//! DSP-ADPCM encoding and decoding through an external command line
//! tool. The crate itself never does ADPCM arithmetic.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use super::adpcm::DspAdpcmInfo;
use super::dsp::DspFile;
use super::errors::Error;
use super::riff::Riff;

/// Environment variable naming the tool executable.
pub const TOOL_PATH_VAR: &str = "NWAUDIO_DSPADPCM";
/// Environment variable naming the scratch directory.
pub const WORK_DIR_VAR: &str = "NWAUDIO_WORKDIR";
/// Tool looked up on `PATH` when `TOOL_PATH_VAR` is unset.
pub const DEFAULT_TOOL: &str = "dspadpcm";

/// One channel of DSP-ADPCM data and its decoder state.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedChannel {
    pub data: Vec<u8>,
    pub info: DspAdpcmInfo,
    pub sample_count: u64,
}

/// Converts single channels between PCM16 and DSP-ADPCM.
pub trait AdpcmCodec {
    fn encode(&self, pcm: &[i16], sample_rate: u32) -> Result<EncodedChannel, Error>;

    fn decode(
        &self,
        adpcm: &[u8],
        info: &DspAdpcmInfo,
        sample_count: u64,
        sample_rate: u32,
    ) -> Result<Vec<i16>, Error>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodecConfig {
    pub tool_path: PathBuf,
    pub work_dir: PathBuf,
}

impl CodecConfig {
    pub fn from_env() -> Self {
        CodecConfig {
            tool_path: env::var_os(TOOL_PATH_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TOOL)),
            work_dir: env::var_os(WORK_DIR_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(env::temp_dir),
        }
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig {
            tool_path: PathBuf::from(DEFAULT_TOOL),
            work_dir: env::temp_dir(),
        }
    }
}

/// A private scratch directory under `work_dir`, removed once the tool
/// has run.
fn scratch_dir(work_dir: &Path) -> Result<TempDir, Error> {
    tempfile::Builder::new()
        .prefix("nwaudio")
        .tempdir_in(work_dir)
        .map_err(|e| {
            Error::Codec(format!(
                "cannot create scratch directory in {}: {}",
                work_dir.display(),
                e
            ))
        })
}

fn remove_scratch(dir: TempDir) {
    let path = dir.path().to_path_buf();
    if let Err(e) = dir.close() {
        log::warn!("could not remove {}: {}", path.display(), e);
    }
}

/// Runs the DSP-ADPCM tool, `tool -E in.wav out.dsp` to encode and
/// `tool -D in.dsp out.wav` to decode.
#[derive(Debug, Clone)]
pub struct ExternalDspTool {
    config: CodecConfig,
}

impl ExternalDspTool {
    pub fn new(config: CodecConfig) -> Self {
        ExternalDspTool { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    fn run(&self, mode: &str, input: &Path, output: &Path) -> Result<Vec<u8>, Error> {
        log::debug!(
            "running {} {} {} {}",
            self.config.tool_path.display(),
            mode,
            input.display(),
            output.display()
        );
        let status = Command::new(&self.config.tool_path)
            .arg(mode)
            .arg(input)
            .arg(output)
            .status()
            .map_err(|e| {
                Error::Codec(format!(
                    "cannot run {}: {}",
                    self.config.tool_path.display(),
                    e
                ))
            })?;
        if !status.success() {
            return Err(Error::Codec(format!(
                "{} {} exited with {}",
                self.config.tool_path.display(),
                mode,
                status
            )));
        }
        fs::read(output).map_err(|e| {
            Error::Codec(format!("no output at {}: {}", output.display(), e))
        })
    }
}

impl AdpcmCodec for ExternalDspTool {
    fn encode(&self, pcm: &[i16], sample_rate: u32) -> Result<EncodedChannel, Error> {
        let scratch = scratch_dir(&self.config.work_dir)?;
        let input = scratch.path().join("in.wav");
        let output = scratch.path().join("out.dsp");
        let riff = Riff::from_channels(sample_rate, 16, &[pcm.to_vec()])?;
        fs::write(&input, riff.to_bytes()?)?;

        let dsp = DspFile::load(&self.run("-E", &input, &output)?)?;
        remove_scratch(scratch);
        Ok(EncodedChannel {
            data: dsp.channel_data(),
            info: dsp.info,
            sample_count: dsp.sample_count as u64,
        })
    }

    fn decode(
        &self,
        adpcm: &[u8],
        info: &DspAdpcmInfo,
        sample_count: u64,
        sample_rate: u32,
    ) -> Result<Vec<i16>, Error> {
        let scratch = scratch_dir(&self.config.work_dir)?;
        let input = scratch.path().join("in.dsp");
        let output = scratch.path().join("out.wav");
        let dsp = DspFile::from_channel(adpcm.to_vec(), *info, sample_count, sample_rate)?;
        fs::write(&input, dsp.to_bytes()?)?;

        let riff = Riff::load(&self.run("-D", &input, &output)?)?;
        remove_scratch(scratch);
        let mut channels = riff.channels::<i16>()?;
        if channels.is_empty() {
            return Err(Error::Codec("decoder produced no channels".to_string()));
        }
        let mut pcm = channels.swap_remove(0);
        pcm.truncate(sample_count as usize);
        Ok(pcm)
    }
}
