use std::io::{Read, Write};

use byteorder::LittleEndian;
use byteorder::{ReadBytesExt, WriteBytesExt};
use uuid::Uuid;

use super::errors::Error as ParserError;
use super::fmt::{WaveFmt, WaveFmtExtended, EXTENSIBLE_CB_SIZE};

const EXTENSIBLE_TAG: u16 = 0xFFFE;

pub trait ReadWaveChunks: Read {
    /// Read a `fmt ` record whose chunk is `length` bytes long.
    fn read_wave_fmt(&mut self, length: u64) -> Result<WaveFmt, ParserError>;
}

pub trait WriteWaveChunks: Write {
    fn write_wave_fmt(&mut self, format: &WaveFmt) -> Result<(), ParserError>;
}

impl<T> WriteWaveChunks for T
where
    T: Write,
{
    fn write_wave_fmt(&mut self, format: &WaveFmt) -> Result<(), ParserError> {
        self.write_u16::<LittleEndian>(format.tag)?;
        self.write_u16::<LittleEndian>(format.channel_count)?;
        self.write_u32::<LittleEndian>(format.sample_rate)?;
        self.write_u32::<LittleEndian>(format.bytes_per_second)?;
        self.write_u16::<LittleEndian>(format.block_alignment)?;
        self.write_u16::<LittleEndian>(format.bits_per_sample)?;

        match (&format.extended_format, format.trailing.is_empty()) {
            (_, false) => self.write_all(&format.trailing)?,
            (Some(ext), true) => {
                self.write_u16::<LittleEndian>(EXTENSIBLE_CB_SIZE)?;
                self.write_u16::<LittleEndian>(ext.valid_bits_per_sample)?;
                self.write_u32::<LittleEndian>(ext.channel_mask)?;
                self.write_all(ext.type_guid.as_bytes())?;
            }
            (None, true) => (),
        }
        Ok(())
    }
}

impl<T> ReadWaveChunks for T
where
    T: Read,
{
    fn read_wave_fmt(&mut self, length: u64) -> Result<WaveFmt, ParserError> {
        if length < 16 {
            return Err(ParserError::TruncatedData {
                at: 0,
                wanted: 16,
                available: length,
            });
        }
        let tag = self.read_u16::<LittleEndian>()?;
        let channel_count = self.read_u16::<LittleEndian>()?;
        let sample_rate = self.read_u32::<LittleEndian>()?;
        let bytes_per_second = self.read_u32::<LittleEndian>()?;
        let block_alignment = self.read_u16::<LittleEndian>()?;
        let bits_per_sample = self.read_u16::<LittleEndian>()?;

        let mut trailing = vec![0u8; (length - 16) as usize];
        self.read_exact(&mut trailing)?;

        let extended_format = if tag == EXTENSIBLE_TAG {
            let mut ext = trailing.as_slice();
            let _cb_size = ext.read_u16::<LittleEndian>()?;
            let valid_bits_per_sample = ext.read_u16::<LittleEndian>()?;
            let channel_mask = ext.read_u32::<LittleEndian>()?;
            let mut guid = [0u8; 16];
            ext.read_exact(&mut guid)?;
            Some(WaveFmtExtended {
                valid_bits_per_sample,
                channel_mask,
                type_guid: Uuid::from_slice(&guid)?,
            })
        } else {
            None
        };

        Ok(WaveFmt {
            tag,
            channel_count,
            sample_rate,
            bytes_per_second,
            block_alignment,
            bits_per_sample,
            extended_format,
            trailing,
        })
    }
}
