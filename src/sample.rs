use dasp_sample::Duplex;

/// Sample types PCM can be converted between: unsigned 8-bit as stored
/// in RIFF files, signed 8-bit as stored in game files, and 16-bit.
pub trait Sample: dasp_sample::Sample + Duplex<u8> + Duplex<i8> + Duplex<i16> {}

impl Sample for u8 {}
impl Sample for i8 {}
impl Sample for i16 {}
