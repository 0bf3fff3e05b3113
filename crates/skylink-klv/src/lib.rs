//! KLV telemetry encoding for motion-imagery metadata streams.
//!
//! Every packet is laid out as:
//! - The 16-byte UAS local set universal key
//! - A BER-encoded length of the local set
//! - A sequence of `Tag (1) + Len (1) + Value` items
//!
//! Out-of-domain field values are rejected, never clamped. A sample that
//! fails validation is meant to be dropped by the caller.

pub mod ber;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod sample;
pub mod tag;

pub use ber::{decode_ber_length, encode_ber_length};
pub use decoder::{decode_packet, find_packets, DecodedTelemetry, KlvItem, LocalSet};
pub use encoder::{KlvEncoder, MAX_ITEM_LEN, MIN_PACKET_SIZE};
pub use error::{KlvError, Result};
pub use sample::{GpsPolicy, TelemetryEncoder, TelemetrySample, DEFAULT_ALTITUDE_M};
pub use tag::{KlvTag, UAS_LOCAL_SET_KEY};
