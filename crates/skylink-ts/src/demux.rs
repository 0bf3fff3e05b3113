use bytes::{Bytes, BytesMut};
use tracing::warn;

use crate::error::Result;
use crate::packet::packet_payload;

/// Counters kept by [`TsDemux`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemuxStats {
    pub packets: u64,
    pub units: u64,
    pub discontinuities: u64,
    pub dropped_units: u64,
}

/// Collects the payload units of one PID.
///
/// A unit starts at a packet with payload_unit_start set and ends when the
/// next one starts. Trailing stuffing stays in the unit; the payload format
/// decides where its data ends.
#[derive(Debug)]
pub struct TsDemux {
    pid: u16,
    expected_cc: Option<u8>,
    pending: Option<BytesMut>,
    stats: DemuxStats,
}

impl TsDemux {
    pub fn new(pid: u16) -> Self {
        Self {
            pid,
            expected_cc: None,
            pending: None,
            stats: DemuxStats::default(),
        }
    }

    pub fn pid(&self) -> u16 {
        self.pid
    }

    pub fn stats(&self) -> DemuxStats {
        self.stats
    }

    /// Feed one 188-byte packet. Returns a unit completed by this packet.
    ///
    /// Packets for other PIDs are ignored. A continuity gap drops the unit
    /// in progress.
    pub fn push(&mut self, packet: &[u8]) -> Result<Option<Bytes>> {
        let (header, payload) = packet_payload(packet)?;
        if header.pid != self.pid || !header.has_payload() {
            return Ok(None);
        }
        self.stats.packets += 1;

        let cc = header.continuity_counter;
        if let Some(expected) = self.expected_cc {
            if cc != expected {
                self.stats.discontinuities += 1;
                warn!(pid = self.pid, expected, got = cc, "continuity discontinuity");
                if self.pending.take().is_some() {
                    self.stats.dropped_units += 1;
                }
            }
        }
        self.expected_cc = Some((cc + 1) & 0x0F);

        if header.payload_unit_start {
            let done = self.take_unit();
            // Skip the pointer field.
            let body = payload.get(1..).unwrap_or_default();
            self.pending = Some(BytesMut::from(body));
            return Ok(done);
        }

        if let Some(unit) = self.pending.as_mut() {
            unit.extend_from_slice(payload);
        }
        Ok(None)
    }

    /// Flush the unit in progress, if any.
    pub fn finish(&mut self) -> Option<Bytes> {
        self.take_unit()
    }

    fn take_unit(&mut self) -> Option<Bytes> {
        let unit = self.pending.take()?;
        self.stats.units += 1;
        Some(unit.freeze())
    }
}
