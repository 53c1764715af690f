use std::fmt;
use std::io;

/// A four-character tag.
///
/// Every container in this crate opens with one, and most blocks
/// inside them do too (`INFO`, `DATA`, `fmt `...).
#[derive(Eq, PartialEq, Hash, Copy, Clone)]
pub struct FourCC([u8; 4]);

impl FourCC {
    pub const fn make(tag: &[u8; 4]) -> Self {
        FourCC(*tag)
    }

    pub const fn bytes(self) -> [u8; 4] {
        self.0
    }
}

impl From<[u8; 4]> for FourCC {
    fn from(bytes: [u8; 4]) -> Self {
        FourCC(bytes)
    }
}

/// Non-printable bytes are shown as `.`.
impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            let c = if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC({})", self)
    }
}

impl From<FourCC> for String {
    fn from(tag: FourCC) -> Self {
        tag.to_string()
    }
}

/// Tag reads over any `io::Read`, used by the RIFF chunk walker.
pub trait ReadFourCC: io::Read {
    fn read_fourcc(&mut self) -> io::Result<FourCC> {
        let mut tag = [0u8; 4];
        self.read_exact(&mut tag)?;
        Ok(FourCC(tag))
    }
}

impl<R: io::Read + ?Sized> ReadFourCC for R {}

pub trait WriteFourCC: io::Write {
    fn write_fourcc(&mut self, tag: FourCC) -> io::Result<()> {
        self.write_all(&tag.0)
    }
}

impl<W: io::Write + ?Sized> WriteFourCC for W {}

pub const CSAR_SIG: FourCC = FourCC::make(b"CSAR");
pub const FSAR_SIG: FourCC = FourCC::make(b"FSAR");
pub const CSTM_SIG: FourCC = FourCC::make(b"CSTM");
pub const FSTM_SIG: FourCC = FourCC::make(b"FSTM");
pub const CWAV_SIG: FourCC = FourCC::make(b"CWAV");
pub const FWAV_SIG: FourCC = FourCC::make(b"FWAV");
pub const CWAR_SIG: FourCC = FourCC::make(b"CWAR");
pub const FWAR_SIG: FourCC = FourCC::make(b"FWAR");

pub const STRG_SIG: FourCC = FourCC::make(b"STRG");
pub const INFO_SIG: FourCC = FourCC::make(b"INFO");
pub const FILE_SIG: FourCC = FourCC::make(b"FILE");
pub const SEEK_SIG: FourCC = FourCC::make(b"SEEK");
pub const DATA_SIG: FourCC = FourCC::make(b"DATA");

pub const CISP_SIG: FourCC = FourCC::make(b"CISP");
pub const STRM_SIG: FourCC = FourCC::make(b"STRM");
pub const TRAC_SIG: FourCC = FourCC::make(b"TRAC");
pub const CHAN_SIG: FourCC = FourCC::make(b"CHAN");

pub const RIFF_SIG: FourCC = FourCC::make(b"RIFF");
pub const WAVE_SIG: FourCC = FourCC::make(b"WAVE");
pub const FMT__SIG: FourCC = FourCC::make(b"fmt ");
pub const RIFF_DATA_SIG: FourCC = FourCC::make(b"data");
