//! Telemetry and video downlink protocol layer.
//!
//! skylink encodes telemetry as MISB-0601-style KLV, carries it in a minimal
//! MPEG transport stream, and moves frames of any size over UDP by splitting
//! them into numbered chunks.
//!
//! # Crate Structure
//!
//! - [`fragment`]: Chunk headers, fragmentation, reassembly, keyframe refresh
//! - [`transport`]: Non-blocking UDP sender and receiver
//! - [`klv`]: KLV local set encoder and decoder (behind `telemetry` feature)
//! - [`ts`]: Transport stream wrapper, PSI tables and demultiplexer (behind
//!   `telemetry` feature)

/// Re-export fragmentation types.
pub mod fragment {
    pub use skylink_fragment::*;
}

/// Re-export datagram transport types.
pub mod transport {
    pub use skylink_transport::*;
}

/// Re-export KLV types (requires `telemetry` feature).
#[cfg(feature = "telemetry")]
pub mod klv {
    pub use skylink_klv::*;
}

/// Re-export transport stream types (requires `telemetry` feature).
#[cfg(feature = "telemetry")]
pub mod ts {
    pub use skylink_ts::*;
}
