use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use tracing::{debug, info};

use crate::header::FrameChunk;

/// Default bound on tracked frame ids.
pub const DEFAULT_MAX_TRACKED_FRAMES: usize = 100;

/// Default distance after which an old id is read as a sender restart.
pub const DEFAULT_RESYNC_DISTANCE: u32 = 1_000;

/// Configuration for [`Reassembler`].
#[derive(Debug, Clone)]
pub struct ReassemblerConfig {
    /// Most partial frames held at once. A new id beyond this evicts the
    /// oldest ids first.
    pub max_tracked_frames: usize,
    /// Partial frames older than this are dropped by
    /// [`Reassembler::evict_expired`]. `None` disables the check.
    pub max_age: Option<Duration>,
    /// A chunk this many ids behind the newest id clears all state and
    /// restarts tracking from its id.
    pub resync_distance: u32,
}

impl Default for ReassemblerConfig {
    fn default() -> Self {
        Self {
            max_tracked_frames: DEFAULT_MAX_TRACKED_FRAMES,
            max_age: None,
            resync_distance: DEFAULT_RESYNC_DISTANCE,
        }
    }
}

/// Counters describing everything the reassembler dropped or produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassemblyStats {
    pub chunks_received: u64,
    pub frames_completed: u64,
    /// Partial frames evicted to make room for newer ids.
    pub frames_evicted: u64,
    /// Partial frames dropped for exceeding `max_age`.
    pub frames_expired: u64,
    /// Datagrams too short for a header, or with impossible chunk numbers.
    pub malformed_chunks: u64,
    /// Chunks that overwrote an already stored chunk.
    pub duplicate_chunks: u64,
    /// Chunks for a new id older than every held frame while the table is
    /// full.
    pub stale_chunks: u64,
    /// Chunks whose total_chunks disagrees with the frame's first chunk.
    pub inconsistent_chunks: u64,
    pub resyncs: u64,
}

/// A frame rebuilt from all of its chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedFrame {
    pub frame_id: u32,
    pub type_tag: u8,
    pub data: Bytes,
}

#[derive(Debug)]
struct Entry {
    total_chunks: u16,
    type_tag: u8,
    first_seen: Instant,
    chunks: BTreeMap<u16, Bytes>,
}

/// Rebuilds frames from chunks arriving in any order.
///
/// At most `max_tracked_frames` partial frames are held; completed frames
/// leave the table at once. Age is serial-number distance from the newest
/// id seen, so eviction order survives the 2^32 wrap. Nothing here blocks
/// or returns an error; every discard is counted in [`ReassemblyStats`].
#[derive(Debug)]
pub struct Reassembler {
    config: ReassemblerConfig,
    entries: BTreeMap<u32, Entry>,
    newest: Option<u32>,
    stats: ReassemblyStats,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reassembler {
    pub fn new() -> Self {
        Self::with_config(ReassemblerConfig::default())
    }

    pub fn with_config(config: ReassemblerConfig) -> Self {
        Self {
            config,
            entries: BTreeMap::new(),
            newest: None,
            stats: ReassemblyStats::default(),
        }
    }

    pub fn config(&self) -> &ReassemblerConfig {
        &self.config
    }

    pub fn stats(&self) -> ReassemblyStats {
        self.stats
    }

    /// Number of partial frames held.
    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    /// Whether a partial frame with this id is held.
    pub fn is_pending(&self, frame_id: u32) -> bool {
        self.entries.contains_key(&frame_id)
    }

    /// Feed one raw datagram.
    pub fn push_datagram(&mut self, datagram: Bytes) -> Option<CompletedFrame> {
        self.push_datagram_at(datagram, Instant::now())
    }

    pub fn push_datagram_at(&mut self, datagram: Bytes, now: Instant) -> Option<CompletedFrame> {
        match FrameChunk::from_datagram(datagram) {
            Ok(chunk) => self.push_at(chunk, now),
            Err(_) => {
                self.stats.chunks_received += 1;
                self.stats.malformed_chunks += 1;
                None
            }
        }
    }

    /// Feed one parsed chunk.
    pub fn push(&mut self, chunk: FrameChunk) -> Option<CompletedFrame> {
        self.push_at(chunk, Instant::now())
    }

    /// Feed one parsed chunk, using `now` as its arrival time.
    pub fn push_at(&mut self, chunk: FrameChunk, now: Instant) -> Option<CompletedFrame> {
        self.stats.chunks_received += 1;
        let header = chunk.header;
        if header.total_chunks == 0 || header.chunk_id >= header.total_chunks {
            self.stats.malformed_chunks += 1;
            debug!(
                frame_id = header.frame_id,
                chunk_id = header.chunk_id,
                total = header.total_chunks,
                "malformed chunk"
            );
            return None;
        }
        if !self.admit(header.frame_id) {
            return None;
        }

        let entry = self.entries.entry(header.frame_id).or_insert_with(|| Entry {
            total_chunks: header.total_chunks,
            type_tag: header.type_tag,
            first_seen: now,
            chunks: BTreeMap::new(),
        });
        if entry.total_chunks != header.total_chunks {
            self.stats.inconsistent_chunks += 1;
            debug!(
                frame_id = header.frame_id,
                expected = entry.total_chunks,
                got = header.total_chunks,
                "chunk disagrees on total_chunks"
            );
            return None;
        }
        if entry.chunks.insert(header.chunk_id, chunk.payload).is_some() {
            self.stats.duplicate_chunks += 1;
        }
        if entry.chunks.len() < entry.total_chunks as usize {
            return None;
        }

        let entry = self.entries.remove(&header.frame_id)?;
        let len = entry.chunks.values().map(Bytes::len).sum();
        let mut data = BytesMut::with_capacity(len);
        for part in entry.chunks.values() {
            data.extend_from_slice(part);
        }
        self.stats.frames_completed += 1;
        debug!(frame_id = header.frame_id, len, "frame complete");

        Some(CompletedFrame {
            frame_id: header.frame_id,
            type_tag: entry.type_tag,
            data: data.freeze(),
        })
    }

    /// Drop partial frames older than `max_age`. Returns how many went.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let Some(max_age) = self.config.max_age else {
            return 0;
        };
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.first_seen) < max_age);
        let expired = before - self.entries.len();
        if expired > 0 {
            self.stats.frames_expired += expired as u64;
            debug!(expired, "expired partial frames");
        }
        expired
    }

    /// Drop all partial frames and forget the newest id.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.newest = None;
    }

    /// Track `frame_id` and make room for it. Returns false when its chunk
    /// must be dropped.
    fn admit(&mut self, frame_id: u32) -> bool {
        let Some(newest) = self.newest else {
            self.newest = Some(frame_id);
            return true;
        };

        if serial_newer(frame_id, newest) {
            self.newest = Some(frame_id);
        } else if newest.wrapping_sub(frame_id) >= self.config.resync_distance {
            info!(frame_id, newest, "frame ids jumped back, resynchronizing");
            self.stats.resyncs += 1;
            self.stats.frames_evicted += self.entries.len() as u64;
            self.entries.clear();
            self.newest = Some(frame_id);
            return true;
        }

        if self.entries.contains_key(&frame_id) {
            return true;
        }
        let limit = self.config.max_tracked_frames.max(1);
        if self.entries.len() >= limit {
            if let Some(oldest) = self.oldest() {
                if serial_newer(oldest, frame_id) {
                    self.stats.stale_chunks += 1;
                    debug!(frame_id, oldest, "chunk older than every held frame");
                    return false;
                }
            }
        }
        self.evict_oldest(limit - 1);
        true
    }

    /// Id furthest behind the newest one.
    fn oldest(&self) -> Option<u32> {
        let newest = self.newest?;
        self.entries
            .keys()
            .copied()
            .max_by_key(|id| newest.wrapping_sub(*id))
    }

    fn evict_oldest(&mut self, keep: usize) {
        let mut evicted = 0u64;
        while self.entries.len() > keep {
            let Some(oldest) = self.oldest() else {
                break;
            };
            self.entries.remove(&oldest);
            evicted += 1;
        }
        if evicted > 0 {
            self.stats.frames_evicted += evicted;
            debug!(evicted, "evicted partial frames");
        }
    }
}

/// RFC 1982 comparison: `a` is newer than `b` when it is less than half the
/// id space ahead.
fn serial_newer(a: u32, b: u32) -> bool {
    a != b && a.wrapping_sub(b) < 1 << 31
}
