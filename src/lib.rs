/*!
# nwaudio

Rust Reader/Writer for the sound containers of the NW4C and Cafe audio
libraries, plus the editor project format and plain RIFF WAV files.

## Formats

| Magic | Byte order | Contents |
|---|---|---|
| `CSTM` / `FSTM` | little / big | Streamed audio in interleaved sample blocks, with tracks and a seek table |
| `CWAV` / `FWAV` | little / big | One waveform, channels stored back to back |
| `CWAR` / `FWAR` | little / big | An archive of complete waves, each aligned to 0x20 |
| `CSAR` / `FSAR` | little / big | A sound archive: string table, info and file blocks |
| `CISP` | little | The editor's flat project record of PCM16 channels |
| `RIFF` | little | 8-bit or 16-bit integer PCM WAV |

Every container is read from and written to an in-memory byte buffer.
Loading a file and writing it back yields a file that loads to an equal
model; writing an unmodified model twice yields identical bytes.

```
use nwaudio::{Project, SoundEncoding, Stream};
use nwaudio::convert::project_to_stream;

let project = Project::new(32000, vec![vec![0i16; 64], vec![0i16; 64]]);
let stream = project_to_stream(&project, SoundEncoding::Pcm16, None).unwrap();
let bytes = stream.to_bytes().unwrap();

let loaded = Stream::load(&bytes).unwrap();
assert_eq!(loaded.info.channel_count, 2);
assert_eq!(loaded.total_samples(), 64);
```

## Things that are _not_ in the scope of this package

- ADPCM arithmetic. DSP-ADPCM data is converted to and from PCM by an
  external tool through [`codec::ExternalDspTool`]; any other
  [`codec::AdpcmCodec`] can be plugged in instead.
- Playback, and the editor's beat-id files.

## Resources

- [3DBrew: BCSTM](https://www.3dbrew.org/wiki/BCSTM)
- [3DBrew: BCWAV](https://www.3dbrew.org/wiki/BCWAV)
- [3DBrew: BCSAR](https://www.3dbrew.org/wiki/BCSAR)
- [MSDN WAVEFORMATEXTENSIBLE](https://docs.microsoft.com/en-us/windows/win32/api/mmreg/ns-mmreg-waveformatextensible)
*/

extern crate byteorder;
extern crate encoding;
extern crate uuid;

mod errors;
mod fourcc;

mod cursor;
mod header;
mod layout;
mod reference;

mod adpcm;
mod interleave;

mod sound_archive;
mod stream;
mod strg;
mod wave;
mod wave_archive;

mod dsp;
mod project;

mod chunks;
mod common_format;
mod fmt;
mod parser;
mod riff;
mod sample;

pub mod codec;
pub mod convert;

pub use adpcm::{ChannelCodecInfo, DspAdpcmInfo, ImaAdpcmInfo, SoundEncoding};
pub use common_format::CommonFormat;
pub use cursor::{Endian, Reader, Writer};
pub use dsp::{nibble_address, nibbles_for_samples, DspFile};
pub use errors::{Error, RecordKind, SkippedRecord};
pub use fmt::{WaveFmt, WaveFmtExtended};
pub use fourcc::FourCC;
pub use header::{BlockPointer, ContainerHeader, Family, OrderSource};
pub use interleave::{BlockGeometry, LastBlockPolicy, LAST_BLOCK_POLICY, SAMPLE_BLOCK_SIZE};
pub use layout::{align_up, Layout, BLOCK_ALIGN};
pub use project::Project;
pub use reference::{ids, Reference, ReferenceTable, SizedReference, NULL_OFFSET};
pub use riff::Riff;
pub use sample::Sample;
pub use sound_archive::{
    MiscBlock, SoundArchive, DEFAULT_SOUND_ARCHIVE_VERSION, SOUND_ARCHIVE_FAMILY,
};
pub use stream::{Stream, StreamInfo, StreamLayout, Track, STREAM_FAMILY};
pub use strg::{LookupTrie, StringBlock, TrieNode};
pub use wave::{default_version as default_wave_version, Wave, WAVE_FAMILY};
pub use wave_archive::{WaveArchive, WAVE_ARCHIVE_FAMILY};
