/// Errors raised while building or parsing KLV packets.
#[derive(Debug, thiserror::Error)]
pub enum KlvError {
    /// A telemetry value lies outside the domain of its tag.
    #[error("{field} out of range ({value}, expected {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// A telemetry value is NaN or infinite.
    #[error("{field} is not a finite number")]
    NonFinite { field: &'static str },

    /// A local set item value does not fit the one-byte length field.
    #[error("item value too long for tag {tag} ({len} bytes, max 255)")]
    ItemTooLong { tag: u8, len: usize },

    /// The packet does not start with the UAS local set key.
    #[error("invalid universal key")]
    InvalidKey,

    /// The buffer ends before the structure it announces.
    #[error("truncated packet (needed {needed} bytes, {available} available)")]
    Truncated { needed: usize, available: usize },

    /// The BER length uses a long form this decoder does not accept.
    #[error("unsupported BER length prefix 0x{0:02X}")]
    UnsupportedBerLength(u8),

    /// A known tag carries a value of the wrong size.
    #[error("tag {tag} has length {actual}, expected {expected}")]
    InvalidItemLength {
        tag: u8,
        expected: usize,
        actual: usize,
    },
}

pub type Result<T> = std::result::Result<T, KlvError>;
