//! Minimal MPEG transport stream multiplex for one private data stream.
//!
//! [`TsWrapper`] turns arbitrary payloads into 188-byte transport packets on
//! a fixed PID and periodically injects PAT/PMT so demultiplexers can find the
//! stream without seeing the first packet. The parsing half ([`TsHeader`],
//! [`parse_psi_section`], [`TsDemux`]) exists to inspect and verify what the
//! wrapper produced.

pub mod crc;
pub mod demux;
pub mod error;
pub mod packet;
pub mod psi;
pub mod wrapper;

pub use crc::crc32_mpeg2;
pub use demux::{DemuxStats, TsDemux};
pub use error::{Result, TsError};
pub use packet::{
    packet_payload, TsHeader, HEADER_SIZE, PACKET_SIZE, PAYLOAD_SIZE, STUFFING_BYTE, SYNC_BYTE,
};
pub use psi::{
    build_pat, build_pmt, parse_pat, parse_pmt, parse_psi_section, PatEntry, PmtStream,
    PsiSection,
};
pub use wrapper::{
    TsConfig, TsWrapper, DATA_PID, DEFAULT_TABLE_INTERVAL, PAT_PID, PMT_PID, PROGRAM_NUMBER,
    STREAM_TYPE_PRIVATE_DATA, TRANSPORT_STREAM_ID,
};
