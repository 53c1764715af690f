use uuid::Uuid;

const BASIC_PCM: u16 = 0x0001;
const BASIC_FLOAT: u16 = 0x0003;
const BASIC_EXTENDED: u16 = 0xFFFE;

/* RFC 2361 §4:

 WAVE Format IDs are converted to GUIDs by inserting the hexadecimal
   value of the WAVE Format ID into the XXXXXXXX part of the following
   template: {XXXXXXXX-0000-0010-8000-00AA00389B71}.

 GUIDs are kept in the byte order they have inside a `fmt ` chunk.
*/

const GUID_TEMPLATE: [u8; 16] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xaa, 0x00, 0x38, 0x9b, 0x71,
];

fn uuid_from_basic_tag(tag: u16) -> Uuid {
    let mut bytes = GUID_TEMPLATE;
    bytes[0..2].copy_from_slice(&tag.to_le_bytes());
    Uuid::from_bytes(bytes)
}

/// Sample format of a RIFF file.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum CommonFormat {
    /// Integer linear PCM
    IntegerPCM,

    /// IEEE floating-point linear PCM
    IeeeFloatPCM,

    /// An unknown format identified by a basic format tag.
    UnknownBasic(u16),

    /// An unknown format identified by an extension GUID.
    UnknownExtended(Uuid),
}

impl CommonFormat {
    /// Resolve a tag and GUID to a `CommonFormat`.
    pub fn make(basic: u16, guid: Option<Uuid>) -> Self {
        match (basic, guid) {
            (BASIC_PCM, _) => Self::IntegerPCM,
            (BASIC_FLOAT, _) => Self::IeeeFloatPCM,
            (BASIC_EXTENDED, Some(x)) if x == uuid_from_basic_tag(BASIC_PCM) => Self::IntegerPCM,
            (BASIC_EXTENDED, Some(x)) if x == uuid_from_basic_tag(BASIC_FLOAT) => {
                Self::IeeeFloatPCM
            }
            (BASIC_EXTENDED, Some(x)) => Self::UnknownExtended(x),
            (x, _) => Self::UnknownBasic(x),
        }
    }

    /// The basic tag and the GUID describing this format.
    pub fn take(self) -> (u16, Uuid) {
        match self {
            Self::IntegerPCM => (BASIC_PCM, uuid_from_basic_tag(BASIC_PCM)),
            Self::IeeeFloatPCM => (BASIC_FLOAT, uuid_from_basic_tag(BASIC_FLOAT)),
            Self::UnknownBasic(x) => (x, uuid_from_basic_tag(x)),
            Self::UnknownExtended(x) => (BASIC_EXTENDED, x),
        }
    }
}
