//! Frame fragmentation over datagrams.
//!
//! Two header layouts are supported and must be selected explicitly with
//! [`HeaderFormat`]:
//! - `Frame`: `frame_id u32 | total_chunks u16 | chunk_id u16 | type_tag u8 | reserved u8`
//! - `Stream`: `chunk_id u32 | timestamp_us u64`
//!
//! All integers are big-endian. The receive side never fails on bad input;
//! malformed, stale or evicted data only shows up in counters.

pub mod error;
pub mod fragmenter;
pub mod handoff;
pub mod header;
pub mod keyframe;
pub mod monitor;
pub mod nal;
pub mod reassembler;

#[cfg(feature = "async")]
pub mod codec;

#[cfg(feature = "async")]
pub use codec::ChunkCodec;
pub use error::{FragmentError, Result};
pub use fragmenter::{
    Fragmenter, FragmenterConfig, StreamChunker, StreamChunkerConfig, DEFAULT_MAX_DATAGRAM,
    DEFAULT_STREAM_CHUNK,
};
pub use handoff::{bounded, HandoffReceiver, HandoffSender};
pub use header::{
    Chunk, ChunkHeader, FrameChunk, FrameHeader, HeaderFormat, StreamChunk, StreamHeader,
    FRAME_HEADER_SIZE, STREAM_HEADER_SIZE,
};
pub use keyframe::{
    FramePacer, KeyframeRefresh, PacerConfig, ParameterSetCache, RefreshConfig, VideoScheduler,
    VideoStats, DEFAULT_REFRESH_INTERVAL, DEFAULT_VIDEO_FPS,
};
pub use monitor::{StreamMonitor, StreamStats};
pub use nal::{nal_kind, nal_unit_type, split_annex_b, NalKind};
pub use reassembler::{
    CompletedFrame, Reassembler, ReassemblerConfig, ReassemblyStats, DEFAULT_MAX_TRACKED_FRAMES,
};
