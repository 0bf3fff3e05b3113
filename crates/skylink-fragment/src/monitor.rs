use bytes::Bytes;
use tracing::{info, warn};

use crate::header::StreamChunk;

/// Counters kept by [`StreamMonitor`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub chunks_received: u64,
    pub bytes_received: u64,
    /// Sequence numbers skipped over.
    pub missing_chunks: u64,
    /// Forward jumps in the sequence.
    pub gaps: u64,
    /// Chunks arriving behind the highest sequence number seen.
    pub late_chunks: u64,
    pub malformed_chunks: u64,
}

/// Sequence tracking for stream-format chunks.
///
/// There is nothing to reassemble: payloads are handed on in arrival order
/// and losses are only counted.
#[derive(Debug, Default)]
pub struct StreamMonitor {
    last_chunk_id: Option<u32>,
    stats: StreamStats,
}

impl StreamMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Parse and record a datagram. Returns the chunk unless it was too short.
    pub fn push_datagram(&mut self, datagram: Bytes) -> Option<StreamChunk> {
        match StreamChunk::from_datagram(datagram) {
            Ok(chunk) => {
                self.observe(&chunk);
                Some(chunk)
            }
            Err(_) => {
                self.stats.malformed_chunks += 1;
                None
            }
        }
    }

    /// Record a parsed chunk.
    pub fn observe(&mut self, chunk: &StreamChunk) {
        let id = chunk.header.chunk_id;
        self.stats.chunks_received += 1;
        self.stats.bytes_received += chunk.payload.len() as u64;

        let Some(last) = self.last_chunk_id else {
            info!(chunk_id = id, len = chunk.payload.len(), "first stream chunk");
            self.last_chunk_id = Some(id);
            return;
        };

        let expected = last.wrapping_add(1);
        let ahead = id.wrapping_sub(expected);
        if ahead == 0 {
            self.last_chunk_id = Some(id);
        } else if ahead < 1 << 31 {
            self.stats.gaps += 1;
            self.stats.missing_chunks += ahead as u64;
            warn!(missing = ahead, got = id, expected, "stream chunks missing");
            self.last_chunk_id = Some(id);
        } else {
            self.stats.late_chunks += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::StreamHeader;

    fn chunk(id: u32) -> StreamChunk {
        StreamChunk {
            header: StreamHeader {
                chunk_id: id,
                timestamp_us: 0,
            },
            payload: Bytes::from_static(b"abcd"),
        }
    }

    #[test]
    fn test_contiguous_sequence() {
        let mut monitor = StreamMonitor::new();
        for id in 0..5 {
            monitor.observe(&chunk(id));
        }
        let stats = monitor.stats();
        assert_eq!(stats.chunks_received, 5);
        assert_eq!(stats.bytes_received, 20);
        assert_eq!(stats.missing_chunks, 0);
    }

    #[test]
    fn test_gap_counts_missing() {
        let mut monitor = StreamMonitor::new();
        monitor.observe(&chunk(0));
        monitor.observe(&chunk(4));
        monitor.observe(&chunk(5));
        assert_eq!(monitor.stats().gaps, 1);
        assert_eq!(monitor.stats().missing_chunks, 3);
    }

    #[test]
    fn test_late_chunk_does_not_rewind() {
        let mut monitor = StreamMonitor::new();
        monitor.observe(&chunk(10));
        monitor.observe(&chunk(12));
        monitor.observe(&chunk(11));
        monitor.observe(&chunk(13));
        let stats = monitor.stats();
        assert_eq!(stats.late_chunks, 1);
        assert_eq!(stats.missing_chunks, 1);
        assert_eq!(stats.gaps, 1);
    }

    #[test]
    fn test_sequence_wraps() {
        let mut monitor = StreamMonitor::new();
        monitor.observe(&chunk(u32::MAX));
        monitor.observe(&chunk(0));
        assert_eq!(monitor.stats().missing_chunks, 0);
        assert_eq!(monitor.stats().late_chunks, 0);
    }

    #[test]
    fn test_short_datagram() {
        let mut monitor = StreamMonitor::new();
        assert!(monitor.push_datagram(Bytes::from_static(&[0; 11])).is_none());
        let wire = chunk(1).to_bytes();
        assert_eq!(monitor.push_datagram(wire).unwrap().header.chunk_id, 1);
        assert_eq!(monitor.stats().malformed_chunks, 1);
    }
}
