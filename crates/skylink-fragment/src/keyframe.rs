use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, info};

use crate::nal::{nal_kind, NalKind};

/// Default period between parameter set resends.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Default target frame rate of the video pacer.
pub const DEFAULT_VIDEO_FPS: u32 = 30;

/// Most recent SPS and the PPS units that followed it.
#[derive(Debug, Clone, Default)]
pub struct ParameterSetCache {
    units: Vec<Bytes>,
}

impl ParameterSetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache `unit` if it is a parameter set. An SPS starts a new set, a
    /// PPS is appended to the current one.
    pub fn observe(&mut self, unit: &Bytes) -> bool {
        match nal_kind(unit) {
            Some(NalKind::Sps) => {
                self.units.clear();
                self.units.push(unit.clone());
                info!(len = unit.len(), "cached SPS");
                true
            }
            Some(NalKind::Pps) => {
                self.units.push(unit.clone());
                info!(len = unit.len(), "cached PPS");
                true
            }
            _ => false,
        }
    }

    pub fn units(&self) -> &[Bytes] {
        &self.units
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Configuration for [`KeyframeRefresh`].
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    pub interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

/// Periodic resend of cached parameter sets for receivers joining late.
#[derive(Debug, Default)]
pub struct KeyframeRefresh {
    config: RefreshConfig,
    cache: ParameterSetCache,
    last_sent: Option<Instant>,
}

impl KeyframeRefresh {
    pub fn new(config: RefreshConfig) -> Self {
        Self {
            config,
            cache: ParameterSetCache::new(),
            last_sent: None,
        }
    }

    pub fn observe(&mut self, unit: &Bytes) -> bool {
        self.cache.observe(unit)
    }

    pub fn cache(&self) -> &ParameterSetCache {
        &self.cache
    }

    /// Cached units to resend at `now`, if the interval has elapsed since
    /// the last resend. The first poll with a non-empty cache always fires.
    pub fn poll(&mut self, now: Instant) -> Option<Vec<Bytes>> {
        if self.cache.is_empty() {
            return None;
        }
        if let Some(last) = self.last_sent {
            if now.saturating_duration_since(last) < self.config.interval {
                return None;
            }
        }
        self.last_sent = Some(now);
        Some(self.cache.units().to_vec())
    }
}

/// Configuration for [`FramePacer`].
#[derive(Debug, Clone)]
pub struct PacerConfig {
    /// Frames per second to let through. Zero disables pacing.
    pub fps: u32,
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            fps: DEFAULT_VIDEO_FPS,
        }
    }
}

/// Drops frames arriving faster than the target rate. Parameter sets always
/// pass and do not count against the rate.
#[derive(Debug)]
pub struct FramePacer {
    interval: Option<Duration>,
    last_admitted: Option<Instant>,
}

impl FramePacer {
    pub fn new(config: PacerConfig) -> Self {
        let interval = (config.fps > 0).then(|| Duration::from_secs(1) / config.fps);
        Self {
            interval,
            last_admitted: None,
        }
    }

    pub fn admit(&mut self, kind: Option<NalKind>, now: Instant) -> bool {
        if kind.is_some_and(NalKind::is_parameter_set) {
            return true;
        }
        let Some(interval) = self.interval else {
            return true;
        };
        if let Some(last) = self.last_admitted {
            if now.saturating_duration_since(last) < interval {
                return false;
            }
        }
        self.last_admitted = Some(now);
        true
    }
}

/// Counters kept by [`VideoScheduler`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoStats {
    pub frames_forwarded: u64,
    pub frames_rate_limited: u64,
    pub parameter_sets: u64,
    pub refreshes: u64,
}

/// Decides which units go out for each encoded frame: parameter sets
/// immediately, other frames subject to pacing and preceded by a cached
/// parameter set resend when one is due.
#[derive(Debug)]
pub struct VideoScheduler {
    pacer: FramePacer,
    refresh: KeyframeRefresh,
    stats: VideoStats,
}

impl VideoScheduler {
    pub fn new(pacer: PacerConfig, refresh: RefreshConfig) -> Self {
        Self {
            pacer: FramePacer::new(pacer),
            refresh: KeyframeRefresh::new(refresh),
            stats: VideoStats::default(),
        }
    }

    pub fn stats(&self) -> VideoStats {
        self.stats
    }

    pub fn refresh(&self) -> &KeyframeRefresh {
        &self.refresh
    }

    /// Units to send, in order, for `frame` arriving at `now`. Empty when
    /// the frame is rate limited.
    pub fn schedule(&mut self, frame: Bytes, now: Instant) -> Vec<Bytes> {
        let kind = nal_kind(&frame);
        if kind.is_some_and(NalKind::is_parameter_set) {
            self.refresh.observe(&frame);
            self.stats.parameter_sets += 1;
            return vec![frame];
        }

        if !self.pacer.admit(kind, now) {
            self.stats.frames_rate_limited += 1;
            return Vec::new();
        }

        let mut out = match self.refresh.poll(now) {
            Some(units) => {
                self.stats.refreshes += 1;
                debug!(units = units.len(), "resending parameter sets");
                units
            }
            None => Vec::new(),
        };
        out.push(frame);
        self.stats.frames_forwarded += 1;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sps(tag: u8) -> Bytes {
        Bytes::from(vec![0, 0, 0, 1, 0x67, tag])
    }

    fn pps(tag: u8) -> Bytes {
        Bytes::from(vec![0, 0, 0, 1, 0x68, tag])
    }

    fn idr() -> Bytes {
        Bytes::from_static(&[0, 0, 0, 1, 0x65, 0x88])
    }

    fn p_frame() -> Bytes {
        Bytes::from_static(&[0, 0, 0, 1, 0x41, 0x9A])
    }

    #[test]
    fn test_cache_sps_replaces_pps_appends() {
        let mut cache = ParameterSetCache::new();
        assert!(cache.observe(&sps(1)));
        assert!(cache.observe(&pps(1)));
        assert!(cache.observe(&pps(2)));
        assert_eq!(cache.units().len(), 3);

        assert!(cache.observe(&sps(2)));
        assert_eq!(cache.units(), &[sps(2)]);
        assert!(!cache.observe(&idr()));
    }

    #[test]
    fn test_refresh_interval() {
        let mut refresh = KeyframeRefresh::new(RefreshConfig::default());
        let t0 = Instant::now();
        assert!(refresh.poll(t0).is_none());

        refresh.observe(&sps(1));
        refresh.observe(&pps(1));
        assert_eq!(refresh.poll(t0).unwrap(), vec![sps(1), pps(1)]);
        assert!(refresh.poll(t0 + Duration::from_secs(4)).is_none());
        assert!(refresh.poll(t0 + Duration::from_secs(5)).is_some());
    }

    #[test]
    fn test_pacer_drops_fast_frames() {
        let mut pacer = FramePacer::new(PacerConfig { fps: 10 });
        let t0 = Instant::now();
        let kind = Some(NalKind::NonIdr);
        assert!(pacer.admit(kind, t0));
        assert!(!pacer.admit(kind, t0 + Duration::from_millis(50)));
        assert!(pacer.admit(kind, t0 + Duration::from_millis(100)));
    }

    #[test]
    fn test_pacer_lets_parameter_sets_through() {
        let mut pacer = FramePacer::new(PacerConfig { fps: 1 });
        let t0 = Instant::now();
        assert!(pacer.admit(Some(NalKind::Idr), t0));
        for ms in [1, 2, 3] {
            let at = t0 + Duration::from_millis(ms);
            assert!(pacer.admit(Some(NalKind::Sps), at));
            assert!(pacer.admit(Some(NalKind::Pps), at));
        }
        assert!(!pacer.admit(Some(NalKind::Idr), t0 + Duration::from_millis(4)));
    }

    #[test]
    fn test_pacer_disabled_at_zero_fps() {
        let mut pacer = FramePacer::new(PacerConfig { fps: 0 });
        let t0 = Instant::now();
        assert!(pacer.admit(None, t0));
        assert!(pacer.admit(None, t0));
    }

    #[test]
    fn test_scheduler_flow() {
        let mut scheduler = VideoScheduler::new(PacerConfig { fps: 30 }, RefreshConfig::default());
        let t0 = Instant::now();

        // Parameter sets go straight out, even back to back.
        assert_eq!(scheduler.schedule(sps(1), t0), vec![sps(1)]);
        assert_eq!(scheduler.schedule(pps(1), t0), vec![pps(1)]);

        // First paced frame carries the initial refresh.
        assert_eq!(
            scheduler.schedule(idr(), t0),
            vec![sps(1), pps(1), idr()]
        );

        // Too soon: dropped.
        assert!(scheduler
            .schedule(p_frame(), t0 + Duration::from_millis(10))
            .is_empty());

        assert_eq!(
            scheduler.schedule(p_frame(), t0 + Duration::from_millis(40)),
            vec![p_frame()]
        );

        // After the refresh interval the cache goes out again.
        let later = t0 + Duration::from_secs(6);
        assert_eq!(
            scheduler.schedule(p_frame(), later),
            vec![sps(1), pps(1), p_frame()]
        );

        let stats = scheduler.stats();
        assert_eq!(stats.parameter_sets, 2);
        assert_eq!(stats.frames_forwarded, 3);
        assert_eq!(stats.frames_rate_limited, 1);
        assert_eq!(stats.refreshes, 2);
    }
}
