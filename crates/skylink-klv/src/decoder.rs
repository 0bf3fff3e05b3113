use serde::{Deserialize, Serialize};

use crate::ber::decode_ber_length;
use crate::error::{KlvError, Result};
use crate::tag::{KlvTag, UAS_LOCAL_SET_KEY};

/// One `Tag + Len + Value` item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KlvItem {
    pub tag: u8,
    pub value: Vec<u8>,
}

/// The items of one decoded packet, in wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalSet {
    pub items: Vec<KlvItem>,
}

/// Decode one packet from the start of `src`.
///
/// Returns the local set and the number of bytes the packet occupied.
/// Trailing bytes after the packet are left alone.
pub fn decode_packet(src: &[u8]) -> Result<(LocalSet, usize)> {
    let key_len = UAS_LOCAL_SET_KEY.len();
    if src.len() < key_len {
        return Err(KlvError::Truncated {
            needed: key_len,
            available: src.len(),
        });
    }
    if src[..key_len] != UAS_LOCAL_SET_KEY {
        return Err(KlvError::InvalidKey);
    }

    let (body_len, ber_len) = decode_ber_length(&src[key_len..])?;
    let start = key_len + ber_len;
    let total = start + body_len;
    if src.len() < total {
        return Err(KlvError::Truncated {
            needed: total,
            available: src.len(),
        });
    }

    let body = &src[start..total];
    let mut items = Vec::new();
    let mut pos = 0;
    while pos < body.len() {
        if body.len() - pos < 2 {
            return Err(KlvError::Truncated {
                needed: start + pos + 2,
                available: total,
            });
        }
        let tag = body[pos];
        let len = body[pos + 1] as usize;
        let value_start = pos + 2;
        if body.len() - value_start < len {
            return Err(KlvError::Truncated {
                needed: start + value_start + len,
                available: total,
            });
        }
        items.push(KlvItem {
            tag,
            value: body[value_start..value_start + len].to_vec(),
        });
        pos = value_start + len;
    }

    Ok((LocalSet { items }, total))
}

/// Scan a capture for consecutive packets, skipping bytes that do not start
/// a decodable packet.
pub fn find_packets(mut buf: &[u8]) -> Vec<LocalSet> {
    let mut sets = Vec::new();
    while buf.len() >= UAS_LOCAL_SET_KEY.len() {
        let Some(offset) = buf
            .windows(UAS_LOCAL_SET_KEY.len())
            .position(|window| window == UAS_LOCAL_SET_KEY)
        else {
            break;
        };
        buf = &buf[offset..];
        match decode_packet(buf) {
            Ok((set, used)) => {
                sets.push(set);
                buf = &buf[used..];
            }
            Err(_) => buf = &buf[1..],
        }
    }
    sets
}

/// Engineering-unit view of a local set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecodedTelemetry {
    pub timestamp_us: Option<u64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub roll: Option<f64>,
    pub pitch: Option<f64>,
    pub heading: Option<f64>,
    pub horizontal_fov: Option<f64>,
    pub vertical_fov: Option<f64>,
    pub gimbal_roll: Option<f64>,
    pub gimbal_pitch: Option<f64>,
    pub gimbal_yaw: Option<f64>,
    pub sensor_width_mm: Option<f32>,
    pub sensor_height_mm: Option<f32>,
    pub focal_length_mm: Option<f32>,
    /// Items with tags outside the supported table.
    pub unknown: Vec<KlvItem>,
}

impl DecodedTelemetry {
    /// Apply the inverse scaling of the tag table. Later items win when a
    /// tag repeats.
    pub fn from_items(items: &[KlvItem]) -> Result<Self> {
        let mut out = Self::default();
        for item in items {
            let Some(tag) = KlvTag::from_u8(item.tag) else {
                out.unknown.push(item.clone());
                continue;
            };
            if item.value.len() != tag.value_len() {
                return Err(KlvError::InvalidItemLength {
                    tag: item.tag,
                    expected: tag.value_len(),
                    actual: item.value.len(),
                });
            }
            let v = item.value.as_slice();
            match tag {
                KlvTag::Timestamp => out.timestamp_us = Some(u64::from_be_bytes(be8(v))),
                KlvTag::Roll => out.roll = Some(i16::from_be_bytes(be2(v)) as f64 / 100.0),
                KlvTag::Pitch => out.pitch = Some(i16::from_be_bytes(be2(v)) as f64 / 100.0),
                KlvTag::Heading => out.heading = Some(u16::from_be_bytes(be2(v)) as f64 / 100.0),
                KlvTag::Latitude => out.latitude = Some(i32::from_be_bytes(be4(v)) as f64 / 1e7),
                KlvTag::Longitude => {
                    out.longitude = Some(i32::from_be_bytes(be4(v)) as f64 / 1e7)
                }
                KlvTag::Altitude => out.altitude = Some(u16::from_be_bytes(be2(v)) as f64 / 10.0),
                KlvTag::HorizontalFov => {
                    out.horizontal_fov = Some(u16::from_be_bytes(be2(v)) as f64 / 100.0)
                }
                KlvTag::VerticalFov => {
                    out.vertical_fov = Some(u16::from_be_bytes(be2(v)) as f64 / 100.0)
                }
                KlvTag::GimbalRoll => {
                    out.gimbal_roll = Some(i32::from_be_bytes(be4(v)) as f64 / 1e6)
                }
                KlvTag::GimbalPitch => {
                    out.gimbal_pitch = Some(i32::from_be_bytes(be4(v)) as f64 / 1e6)
                }
                KlvTag::GimbalYaw => out.gimbal_yaw = Some(i32::from_be_bytes(be4(v)) as f64 / 1e6),
                KlvTag::SensorWidth => out.sensor_width_mm = Some(f32::from_be_bytes(be4(v))),
                KlvTag::SensorHeight => out.sensor_height_mm = Some(f32::from_be_bytes(be4(v))),
                KlvTag::FocalLength => out.focal_length_mm = Some(f32::from_be_bytes(be4(v))),
            }
        }
        Ok(out)
    }
}

// Lengths are checked against `KlvTag::value_len` before these run.
fn be2(v: &[u8]) -> [u8; 2] {
    [v[0], v[1]]
}

fn be4(v: &[u8]) -> [u8; 4] {
    [v[0], v[1], v[2], v[3]]
}

fn be8(v: &[u8]) -> [u8; 8] {
    [v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7]]
}
