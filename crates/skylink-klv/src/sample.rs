use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::encoder::KlvEncoder;
use crate::error::Result;

/// Altitude written under [`GpsPolicy::DefaultAltitude`] by convention.
pub const DEFAULT_ALTITUDE_M: f64 = 10.0;

/// One telemetry reading. Every field except the timestamp may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySample {
    pub timestamp_us: u64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub roll: Option<f64>,
    pub pitch: Option<f64>,
    pub yaw: Option<f64>,
    pub gps_fixed: bool,
    pub horizontal_fov: Option<f64>,
    pub vertical_fov: Option<f64>,
    pub gimbal_roll: Option<f64>,
    pub gimbal_pitch: Option<f64>,
    pub gimbal_yaw: Option<f64>,
    pub sensor_width_mm: Option<f32>,
    pub sensor_height_mm: Option<f32>,
    pub focal_length_mm: Option<f32>,
}

/// How position tags are emitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GpsPolicy {
    /// Write latitude, longitude and altitude only while the receiver has a
    /// fix. Absent fields are skipped.
    RequireFix,
    /// Write whatever position fields are present, fix or not. A missing
    /// altitude is replaced with `altitude_m`.
    DefaultAltitude { altitude_m: f64 },
}

/// Encodes whole samples into KLV packets under a fixed [`GpsPolicy`].
#[derive(Debug, Clone)]
pub struct TelemetryEncoder {
    policy: GpsPolicy,
    encoder: KlvEncoder,
}

impl TelemetryEncoder {
    pub fn new(policy: GpsPolicy) -> Self {
        Self {
            policy,
            encoder: KlvEncoder::new(),
        }
    }

    pub fn policy(&self) -> GpsPolicy {
        self.policy
    }

    /// Encode one sample.
    ///
    /// The first out-of-domain field fails the whole sample; no partial
    /// packet is produced.
    pub fn encode(&mut self, sample: &TelemetrySample) -> Result<Bytes> {
        self.encoder.clear();
        if let Err(err) = self.fill(sample) {
            debug!(%err, timestamp_us = sample.timestamp_us, "rejecting telemetry sample");
            self.encoder.clear();
            return Err(err);
        }
        Ok(self.encoder.pack())
    }

    fn fill(&mut self, sample: &TelemetrySample) -> Result<()> {
        let enc = &mut self.encoder;
        enc.add_timestamp(sample.timestamp_us);
        if let Some(roll) = sample.roll {
            enc.add_roll(roll)?;
        }
        if let Some(pitch) = sample.pitch {
            enc.add_pitch(pitch)?;
        }
        if let Some(yaw) = sample.yaw {
            enc.add_heading(yaw)?;
        }

        let (emit_position, fallback_altitude) = match self.policy {
            GpsPolicy::RequireFix => (sample.gps_fixed, None),
            GpsPolicy::DefaultAltitude { altitude_m } => (true, Some(altitude_m)),
        };
        if emit_position {
            if let Some(lat) = sample.latitude {
                enc.add_latitude(lat)?;
            }
            if let Some(lon) = sample.longitude {
                enc.add_longitude(lon)?;
            }
            if let Some(alt) = sample.altitude.or(fallback_altitude) {
                enc.add_altitude(alt)?;
            }
        }

        if let Some(fov) = sample.horizontal_fov {
            enc.add_horizontal_fov(fov)?;
        }
        if let Some(fov) = sample.vertical_fov {
            enc.add_vertical_fov(fov)?;
        }
        if let Some(deg) = sample.gimbal_roll {
            enc.add_gimbal_roll(deg)?;
        }
        if let Some(deg) = sample.gimbal_pitch {
            enc.add_gimbal_pitch(deg)?;
        }
        if let Some(deg) = sample.gimbal_yaw {
            enc.add_gimbal_yaw(deg)?;
        }
        if let Some(mm) = sample.sensor_width_mm {
            enc.add_sensor_width(mm)?;
        }
        if let Some(mm) = sample.sensor_height_mm {
            enc.add_sensor_height(mm)?;
        }
        if let Some(mm) = sample.focal_length_mm {
            enc.add_focal_length(mm)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{decode_packet, DecodedTelemetry};
    use crate::error::KlvError;
    use proptest::prelude::*;

    fn reference_sample() -> TelemetrySample {
        TelemetrySample {
            timestamp_us: 1_700_000_000_000_000,
            latitude: Some(45.123_456_7),
            longitude: Some(7.123_456_7),
            altitude: Some(123.4),
            roll: Some(1.23),
            pitch: Some(-4.56),
            yaw: Some(180.0),
            gps_fixed: true,
            ..TelemetrySample::default()
        }
    }

    fn decode(packet: &[u8]) -> DecodedTelemetry {
        let (set, used) = decode_packet(packet).unwrap();
        assert_eq!(used, packet.len());
        DecodedTelemetry::from_items(&set.items).unwrap()
    }

    #[test]
    fn test_reference_sample_roundtrip() {
        let mut encoder = TelemetryEncoder::new(GpsPolicy::RequireFix);
        let packet = encoder.encode(&reference_sample()).unwrap();
        let decoded = decode(&packet);

        assert_eq!(decoded.timestamp_us, Some(1_700_000_000_000_000));
        assert!((decoded.latitude.unwrap() - 45.123_456_7).abs() <= 1e-7);
        assert!((decoded.longitude.unwrap() - 7.123_456_7).abs() <= 1e-7);
        assert!((decoded.altitude.unwrap() - 123.4).abs() <= 0.1);
        assert!((decoded.roll.unwrap() - 1.23).abs() <= 0.01);
        assert!((decoded.pitch.unwrap() + 4.56).abs() <= 0.01);
        assert!((decoded.heading.unwrap() - 180.0).abs() <= 0.01);
    }

    #[test]
    fn test_require_fix_skips_position_without_fix() {
        let sample = TelemetrySample {
            gps_fixed: false,
            ..reference_sample()
        };
        let mut encoder = TelemetryEncoder::new(GpsPolicy::RequireFix);
        let decoded = decode(&encoder.encode(&sample).unwrap());

        assert_eq!(decoded.latitude, None);
        assert_eq!(decoded.longitude, None);
        assert_eq!(decoded.altitude, None);
        assert!(decoded.roll.is_some());
    }

    #[test]
    fn test_default_altitude_fills_missing_altitude() {
        let sample = TelemetrySample {
            timestamp_us: 5,
            gps_fixed: false,
            ..TelemetrySample::default()
        };
        let mut encoder = TelemetryEncoder::new(GpsPolicy::DefaultAltitude {
            altitude_m: DEFAULT_ALTITUDE_M,
        });
        let decoded = decode(&encoder.encode(&sample).unwrap());

        assert_eq!(decoded.latitude, None);
        assert!((decoded.altitude.unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_default_altitude_keeps_reported_altitude() {
        let mut encoder = TelemetryEncoder::new(GpsPolicy::DefaultAltitude {
            altitude_m: DEFAULT_ALTITUDE_M,
        });
        let decoded = decode(&encoder.encode(&reference_sample()).unwrap());
        assert!((decoded.altitude.unwrap() - 123.4).abs() <= 0.1);
    }

    #[test]
    fn test_out_of_range_field_rejects_whole_sample() {
        let sample = TelemetrySample {
            pitch: Some(95.0),
            ..reference_sample()
        };
        let mut encoder = TelemetryEncoder::new(GpsPolicy::RequireFix);
        let err = encoder.encode(&sample).unwrap_err();
        assert!(matches!(err, KlvError::OutOfRange { field: "pitch", .. }));

        // The next sample starts from a clean slate.
        let packet = encoder.encode(&reference_sample()).unwrap();
        assert_eq!(decode(&packet).pitch.map(|p| (p * 100.0).round()), Some(-456.0));
    }

    #[test]
    fn test_sample_from_json_with_missing_fields() {
        let sample: TelemetrySample =
            serde_json::from_str(r#"{"timestamp_us": 42, "roll": 2.5}"#).unwrap();
        assert_eq!(sample.timestamp_us, 42);
        assert_eq!(sample.roll, Some(2.5));
        assert_eq!(sample.latitude, None);
        assert!(!sample.gps_fixed);
    }

    proptest! {
        #[test]
        fn prop_in_domain_samples_roundtrip(
            ts in any::<u64>(),
            lat in -90.0f64..=90.0,
            lon in -180.0f64..=180.0,
            alt in 0.0f64..6553.0,
            roll in -180.0f64..=180.0,
            pitch in -90.0f64..=90.0,
            yaw in -359.0f64..=360.0,
            gimbal_yaw in -180.0f64..=180.0,
        ) {
            let sample = TelemetrySample {
                timestamp_us: ts,
                latitude: Some(lat),
                longitude: Some(lon),
                altitude: Some(alt),
                roll: Some(roll),
                pitch: Some(pitch),
                yaw: Some(yaw),
                gps_fixed: true,
                gimbal_yaw: Some(gimbal_yaw),
                ..TelemetrySample::default()
            };
            let mut encoder = TelemetryEncoder::new(GpsPolicy::RequireFix);
            let decoded = decode(&encoder.encode(&sample).unwrap());
            let heading = if yaw < 0.0 { yaw + 360.0 } else { yaw };

            prop_assert_eq!(decoded.timestamp_us, Some(ts));
            prop_assert!((decoded.latitude.unwrap() - lat).abs() <= 1e-7);
            prop_assert!((decoded.longitude.unwrap() - lon).abs() <= 1e-7);
            prop_assert!((decoded.altitude.unwrap() - alt).abs() <= 0.1);
            prop_assert!((decoded.roll.unwrap() - roll).abs() <= 0.01);
            prop_assert!((decoded.pitch.unwrap() - pitch).abs() <= 0.01);
            prop_assert!((decoded.heading.unwrap() - heading).abs() <= 0.01);
            prop_assert!((decoded.gimbal_yaw.unwrap() - gimbal_yaw).abs() <= 1e-6);
        }
    }
}
