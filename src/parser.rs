use std::io;
use std::io::SeekFrom;
use std::io::{Read, Seek};

use byteorder::{LittleEndian, ReadBytesExt};

use super::errors::Error;
use super::fourcc::{FourCC, ReadFourCC};
use super::fourcc::{RIFF_SIG, WAVE_SIG};

/// Steps of a walk over a RIFF/WAVE form.
#[derive(Debug)]
pub enum Event {
    StartParse,
    ReadHeader { signature: FourCC, length_field: u32 },
    BeginChunk { signature: FourCC, content_start: u64, content_length: u64 },
    Failed { error: Error },
    FinishParse,
}

#[derive(Debug, Copy, Clone)]
enum State {
    New,
    AtFormHeader,
    /// Positioned at a chunk header `at`, `left` bytes of the form remain.
    AtChunk { at: u64, left: u64 },
    Done,
}

/// Walks the chunks of a RIFF/WAVE stream, emitting one event per step.
/// After a `Failed` event the walk ends with `FinishParse`.
pub struct Parser<R: Read + Seek> {
    stream: R,
    state: State,
    failed: bool,
}

/// Where one chunk's content lies in the stream.
pub struct ChunkIteratorItem {
    pub signature: FourCC,
    pub start: u64,
    pub length: u64,
}

impl<R: Read + Seek> Parser<R> {
    pub fn make(mut stream: R) -> Result<Self, Error> {
        stream.seek(SeekFrom::Start(0))?;
        Ok(Parser {
            stream,
            state: State::New,
            failed: false,
        })
    }

    /// Every chunk in order, or the error that stopped the walk.
    pub fn into_chunk_list(self) -> Result<Vec<ChunkIteratorItem>, Error> {
        let mut chunks = vec![];
        for event in self {
            match event {
                Event::BeginChunk {
                    signature,
                    content_start,
                    content_length,
                } => chunks.push(ChunkIteratorItem {
                    signature,
                    start: content_start,
                    length: content_length,
                }),
                Event::Failed { error } => return Err(error),
                _ => (),
            }
        }
        Ok(chunks)
    }

    fn read_form_header(&mut self) -> Result<(Event, State), Error> {
        let signature = self.stream.read_fourcc()?;
        let length_field = self.stream.read_u32::<LittleEndian>()?;
        let form = self.stream.read_fourcc()?;

        if signature != RIFF_SIG {
            return Err(Error::InvalidMagic { found: signature });
        }
        if form != WAVE_SIG {
            return Err(Error::InvalidMagic { found: form });
        }
        Ok((
            Event::ReadHeader {
                signature,
                length_field,
            },
            State::AtChunk {
                at: 12,
                left: (length_field as u64).saturating_sub(4),
            },
        ))
    }

    fn read_chunk_header(&mut self, at: u64, left: u64) -> Result<(Event, State), io::Error> {
        // a trailing fragment too short for a chunk header ends the form
        if left < 8 {
            return Ok((Event::FinishParse, State::Done));
        }

        let signature = self.stream.read_fourcc()?;
        let length = self.stream.read_u32::<LittleEndian>()? as u64;
        // odd-sized chunks carry one pad byte
        let span = 8 + length + length % 2;
        self.stream.seek(SeekFrom::Start(at + span))?;

        Ok((
            Event::BeginChunk {
                signature,
                content_start: at + 8,
                content_length: length,
            },
            State::AtChunk {
                at: at + span,
                left: left.saturating_sub(span),
            },
        ))
    }

    fn step(&mut self) -> Result<(Option<Event>, State), Error> {
        match self.state {
            State::New => Ok((Some(Event::StartParse), State::AtFormHeader)),
            State::AtFormHeader => {
                let (event, state) = self.read_form_header()?;
                Ok((Some(event), state))
            }
            State::AtChunk { at, left } => {
                let (event, state) = self.read_chunk_header(at, left)?;
                Ok((Some(event), state))
            }
            State::Done => Ok((None, State::Done)),
        }
    }
}

impl<R: Read + Seek> Iterator for Parser<R> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        if self.failed {
            self.failed = false;
            self.state = State::Done;
            return Some(Event::FinishParse);
        }
        match self.step() {
            Ok((event, state)) => {
                self.state = state;
                event
            }
            Err(error) => {
                self.failed = true;
                Some(Event::Failed { error })
            }
        }
    }
}
