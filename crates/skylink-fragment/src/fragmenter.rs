use bytes::Bytes;
use tracing::debug;

use crate::error::{FragmentError, Result};
use crate::header::{FrameChunk, FrameHeader, StreamChunk, StreamHeader, FRAME_HEADER_SIZE};
use crate::nal::nal_unit_type;

/// Largest datagram the frame sender emits by default.
pub const DEFAULT_MAX_DATAGRAM: usize = 65_000;

/// Default payload bytes per stream chunk.
pub const DEFAULT_STREAM_CHUNK: usize = 60_000;

/// Configuration for [`Fragmenter`].
#[derive(Debug, Clone)]
pub struct FragmenterConfig {
    /// Payload bytes per chunk, excluding the header.
    pub max_chunk_payload: usize,
}

impl FragmenterConfig {
    /// Size chunks so that header plus payload fits in `mtu`.
    pub fn for_mtu(mtu: usize) -> Self {
        Self {
            max_chunk_payload: mtu.saturating_sub(FRAME_HEADER_SIZE),
        }
    }
}

impl Default for FragmenterConfig {
    fn default() -> Self {
        Self::for_mtu(DEFAULT_MAX_DATAGRAM)
    }
}

/// Splits frames into numbered chunks.
///
/// Frame ids start at zero and wrap modulo 2^32.
#[derive(Debug)]
pub struct Fragmenter {
    config: FragmenterConfig,
    next_frame_id: u32,
}

impl Default for Fragmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Fragmenter {
    pub fn new() -> Self {
        Self::with_config(FragmenterConfig::default())
    }

    pub fn with_config(config: FragmenterConfig) -> Self {
        Self {
            config,
            next_frame_id: 0,
        }
    }

    /// Continue numbering from `frame_id`.
    pub fn starting_at(mut self, frame_id: u32) -> Self {
        self.next_frame_id = frame_id;
        self
    }

    pub fn config(&self) -> &FragmenterConfig {
        &self.config
    }

    /// Id the next fragmented frame will carry.
    pub fn next_frame_id(&self) -> u32 {
        self.next_frame_id
    }

    /// Number of chunks a frame of `len` bytes needs.
    pub fn chunk_count(&self, len: usize) -> usize {
        len.div_ceil(self.config.max_chunk_payload.max(1))
    }

    /// Split `frame` into chunks tagged with `type_tag`.
    ///
    /// Chunk payloads are slices of `frame`, so no bytes are copied.
    pub fn fragment(&mut self, frame: impl Into<Bytes>, type_tag: u8) -> Result<Vec<FrameChunk>> {
        let frame = frame.into();
        let max = self.config.max_chunk_payload;
        if max == 0 {
            return Err(FragmentError::ChunkSizeTooSmall);
        }
        if frame.is_empty() {
            return Err(FragmentError::EmptyFrame);
        }
        let total = frame.len().div_ceil(max);
        if total > u16::MAX as usize {
            return Err(FragmentError::TooManyChunks {
                required: total,
                max: u16::MAX as usize,
            });
        }

        let frame_id = self.next_frame_id;
        self.next_frame_id = self.next_frame_id.wrapping_add(1);

        let chunks = (0..total)
            .map(|i| {
                let start = i * max;
                let end = (start + max).min(frame.len());
                FrameChunk {
                    header: FrameHeader {
                        frame_id,
                        total_chunks: total as u16,
                        chunk_id: i as u16,
                        type_tag,
                        reserved: 0,
                    },
                    payload: frame.slice(start..end),
                }
            })
            .collect();

        debug!(frame_id, total, len = frame.len(), type_tag, "fragmented frame");
        Ok(chunks)
    }

    /// Split an Annex-B video frame, tagging chunks with its NAL unit type
    /// (0 when no start code is found).
    pub fn fragment_video(&mut self, frame: impl Into<Bytes>) -> Result<Vec<FrameChunk>> {
        let frame = frame.into();
        let tag = nal_unit_type(&frame).unwrap_or(0);
        self.fragment(frame, tag)
    }
}

/// Configuration for [`StreamChunker`].
#[derive(Debug, Clone)]
pub struct StreamChunkerConfig {
    pub max_chunk_payload: usize,
}

impl Default for StreamChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_payload: DEFAULT_STREAM_CHUNK,
        }
    }
}

/// Cuts a byte stream into sequenced chunks with no frame boundaries.
#[derive(Debug)]
pub struct StreamChunker {
    config: StreamChunkerConfig,
    next_chunk_id: u32,
}

impl Default for StreamChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamChunker {
    pub fn new() -> Self {
        Self::with_config(StreamChunkerConfig::default())
    }

    pub fn with_config(config: StreamChunkerConfig) -> Self {
        Self {
            config,
            next_chunk_id: 0,
        }
    }

    pub fn next_chunk_id(&self) -> u32 {
        self.next_chunk_id
    }

    /// Cut `data` into chunks stamped with `timestamp_us`.
    ///
    /// Every chunk takes the next sequence number. Empty input yields no
    /// chunks.
    pub fn chunk(&mut self, data: impl Into<Bytes>, timestamp_us: u64) -> Result<Vec<StreamChunk>> {
        let data = data.into();
        let max = self.config.max_chunk_payload;
        if max == 0 {
            return Err(FragmentError::ChunkSizeTooSmall);
        }

        let mut chunks = Vec::with_capacity(data.len().div_ceil(max));
        let mut start = 0;
        while start < data.len() {
            let end = (start + max).min(data.len());
            chunks.push(StreamChunk {
                header: StreamHeader {
                    chunk_id: self.next_chunk_id,
                    timestamp_us,
                },
                payload: data.slice(start..end),
            });
            self.next_chunk_id = self.next_chunk_id.wrapping_add(1);
            start = end;
        }
        Ok(chunks)
    }
}
