//! Endian-switchable reader and writer over in-memory buffers.
//!
//! Every container here announces its byte order only after its magic, so
//! the byte order is a mutable property of the cursor rather than a type
//! parameter.

use std::io::{Cursor, Read, Write};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};

use super::errors::Error;
use super::fourcc::FourCC;

/// Byte order of a container.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Endian {
    Little,
    Big,
}

/// The byte-order mark value as written by every writer in this crate.
pub const BYTE_ORDER_MARK: u16 = 0xFEFF;

impl Endian {
    /// Interpret the two raw bytes of a byte-order mark.
    ///
    /// `FE FF` reads back as `0xFEFF` only when interpreted big-endian;
    /// `FF FE` only when interpreted little-endian.
    pub fn from_mark(raw: [u8; 2]) -> Result<Self, Error> {
        match raw {
            [0xFE, 0xFF] => Ok(Endian::Big),
            [0xFF, 0xFE] => Ok(Endian::Little),
            [a, b] => Err(Error::InvalidByteOrderMark(u16::from_be_bytes([a, b]))),
        }
    }
}

macro_rules! read_endian {
    ($self:ident, $method:ident, $width:expr) => {{
        $self.ensure($width)?;
        let value = match $self.endian {
            Endian::Little => $self.inner.$method::<LittleEndian>()?,
            Endian::Big => $self.inner.$method::<BigEndian>()?,
        };
        Ok(value)
    }};
}

/// Reads primitives from a byte slice at an absolute, seekable position.
pub struct Reader<'a> {
    inner: Cursor<&'a [u8]>,
    endian: Endian,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8], endian: Endian) -> Self {
        Reader {
            inner: Cursor::new(data),
            endian,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    /// Length of the underlying buffer.
    pub fn len(&self) -> u64 {
        self.inner.get_ref().len() as u64
    }

    pub fn tell(&self) -> u64 {
        self.inner.position()
    }

    pub fn remaining(&self) -> u64 {
        self.len().saturating_sub(self.tell())
    }

    /// Move to an absolute position. Seeking to the very end is allowed;
    /// beyond it is a truncation.
    pub fn seek(&mut self, pos: u64) -> Result<(), Error> {
        if pos > self.len() {
            return Err(Error::TruncatedData {
                at: pos,
                wanted: 0,
                available: 0,
            });
        }
        self.inner.set_position(pos);
        Ok(())
    }

    pub fn skip(&mut self, count: u64) -> Result<(), Error> {
        self.ensure(count)?;
        self.inner.set_position(self.tell() + count);
        Ok(())
    }

    fn ensure(&self, wanted: u64) -> Result<(), Error> {
        if self.remaining() < wanted {
            Err(Error::TruncatedData {
                at: self.tell(),
                wanted,
                available: self.remaining(),
            })
        } else {
            Ok(())
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, Error> {
        self.ensure(1)?;
        Ok(self.inner.read_u8()?)
    }

    pub fn read_u16(&mut self) -> Result<u16, Error> {
        read_endian!(self, read_u16, 2)
    }

    pub fn read_i16(&mut self) -> Result<i16, Error> {
        read_endian!(self, read_i16, 2)
    }

    pub fn read_u32(&mut self) -> Result<u32, Error> {
        read_endian!(self, read_u32, 4)
    }

    pub fn read_i16_array(&mut self, count: usize) -> Result<Vec<i16>, Error> {
        self.ensure(count as u64 * 2)?;
        (0..count).map(|_| self.read_i16()).collect()
    }

    pub fn read_bytes(&mut self, count: u64) -> Result<Vec<u8>, Error> {
        self.ensure(count)?;
        let mut buf = vec![0u8; count as usize];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        self.ensure(N as u64)?;
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Four raw bytes, independent of the byte order.
    pub fn read_fourcc(&mut self) -> Result<FourCC, Error> {
        Ok(FourCC::from(self.read_array::<4>()?))
    }

    /// Read a tag and fail with `InvalidMagic` unless it is `expected`.
    pub fn expect_fourcc(&mut self, expected: FourCC) -> Result<(), Error> {
        let found = self.read_fourcc()?;
        if found != expected {
            return Err(Error::InvalidMagic { found });
        }
        Ok(())
    }
}

macro_rules! write_endian {
    ($self:ident, $method:ident, $value:expr) => {{
        match $self.endian {
            Endian::Little => $self.inner.$method::<LittleEndian>($value)?,
            Endian::Big => $self.inner.$method::<BigEndian>($value)?,
        };
        Ok(())
    }};
}

/// Appends primitives to a growing buffer.
pub struct Writer {
    inner: Cursor<Vec<u8>>,
    endian: Endian,
}

impl Writer {
    pub fn new(endian: Endian) -> Self {
        Writer {
            inner: Cursor::new(Vec::new()),
            endian,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn tell(&self) -> u64 {
        self.inner.position()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.inner.into_inner()
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), Error> {
        self.inner.write_u8(value)?;
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<(), Error> {
        write_endian!(self, write_u16, value)
    }

    pub fn write_i16(&mut self, value: i16) -> Result<(), Error> {
        write_endian!(self, write_i16, value)
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), Error> {
        write_endian!(self, write_u32, value)
    }

    pub fn write_i16_array(&mut self, values: &[i16]) -> Result<(), Error> {
        for v in values {
            self.write_i16(*v)?;
        }
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.inner.write_all(bytes)?;
        Ok(())
    }

    pub fn write_fourcc(&mut self, fourcc: FourCC) -> Result<(), Error> {
        let buf = fourcc.bytes();
        self.write_bytes(&buf)
    }

    pub fn write_zeros(&mut self, count: u64) -> Result<(), Error> {
        self.write_bytes(&vec![0u8; count as usize])
    }

    /// Zero-fill up to the next multiple of `alignment`.
    pub fn pad_to(&mut self, alignment: u64) -> Result<(), Error> {
        let pos = self.tell();
        let target = super::layout::align_up(pos, alignment);
        self.write_zeros(target - pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_endian_mid_stream() {
        let data = [0x12, 0x34, 0x12, 0x34];
        let mut r = Reader::new(&data, Endian::Big);
        assert_eq!(r.read_u16().unwrap(), 0x1234);
        r.set_endian(Endian::Little);
        assert_eq!(r.read_u16().unwrap(), 0x3412);
    }

    #[test]
    fn test_truncated_read() {
        let data = [0u8; 3];
        let mut r = Reader::new(&data, Endian::Little);
        r.seek(1).unwrap();
        match r.read_u32() {
            Err(Error::TruncatedData {
                at: 1,
                wanted: 4,
                available: 2,
            }) => (),
            other => panic!("unexpected {:?}", other),
        }
        // a failed read leaves the position untouched
        assert_eq!(r.tell(), 1);
    }

    #[test]
    fn test_seek_past_end() {
        let data = [0u8; 8];
        let mut r = Reader::new(&data, Endian::Little);
        assert!(r.seek(8).is_ok());
        assert!(r.seek(9).is_err());
    }

    #[test]
    fn test_byte_order_mark() {
        assert_eq!(Endian::from_mark([0xFE, 0xFF]).unwrap(), Endian::Big);
        assert_eq!(Endian::from_mark([0xFF, 0xFE]).unwrap(), Endian::Little);
        assert!(Endian::from_mark([0x00, 0x00]).is_err());

        let mut w = Writer::new(Endian::Little);
        w.write_u16(BYTE_ORDER_MARK).unwrap();
        assert_eq!(w.into_inner(), vec![0xFF, 0xFE]);
    }

    #[test]
    fn test_pad_to() {
        let mut w = Writer::new(Endian::Big);
        w.write_u8(1).unwrap();
        w.pad_to(0x20).unwrap();
        assert_eq!(w.tell(), 0x20);
        w.pad_to(0x20).unwrap();
        assert_eq!(w.tell(), 0x20);
        let bytes = w.into_inner();
        assert!(bytes[1..].iter().all(|b| *b == 0));
    }
}
