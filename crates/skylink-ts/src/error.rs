/// Errors raised while parsing transport packets and PSI sections.
#[derive(Debug, thiserror::Error)]
pub enum TsError {
    /// The packet is not exactly 188 bytes.
    #[error("invalid packet size ({0} bytes, expected 188)")]
    PacketSize(usize),

    /// The first byte is not 0x47.
    #[error("invalid sync byte 0x{0:02X}")]
    InvalidSync(u8),

    /// Adaptation field control 0b00 is reserved.
    #[error("reserved adaptation field control")]
    ReservedAdaptation,

    /// The adaptation field runs past the end of the packet.
    #[error("adaptation field length {0} exceeds packet")]
    AdaptationOverflow(usize),

    /// A PSI section was expected but the packet does not start one.
    #[error("packet does not start a payload unit")]
    NoPayloadStart,

    /// A section extends past the available bytes.
    #[error("truncated section (needed {needed} bytes, {available} available)")]
    Truncated { needed: usize, available: usize },

    /// The section CRC does not match its contents.
    #[error("section CRC mismatch (stored 0x{stored:08X}, computed 0x{computed:08X})")]
    CrcMismatch { stored: u32, computed: u32 },

    /// The section has a different table id than requested.
    #[error("unexpected table id 0x{actual:02X} (expected 0x{expected:02X})")]
    UnexpectedTable { expected: u8, actual: u8 },
}

pub type Result<T> = std::result::Result<T, TsError>;
