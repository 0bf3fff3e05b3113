use bytes::{BufMut, Bytes, BytesMut};

use crate::ber::{ber_length_size, encode_ber_length};
use crate::error::{KlvError, Result};
use crate::tag::{KlvTag, UAS_LOCAL_SET_KEY};

/// Largest value a single local set item can carry.
pub const MAX_ITEM_LEN: usize = 0xFF;

/// Size of a packet with no items: key + one zero length byte.
pub const MIN_PACKET_SIZE: usize = UAS_LOCAL_SET_KEY.len() + 1;

/// Append-only builder for one KLV local set packet.
///
/// Items are kept in insertion order. Each `add_*` call validates its input
/// first and leaves the builder untouched on error.
#[derive(Debug, Clone, Default)]
pub struct KlvEncoder {
    items: BytesMut,
    count: usize,
}

impl KlvEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items added so far.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Drop all items, keeping the allocation.
    pub fn clear(&mut self) {
        self.items.clear();
        self.count = 0;
    }

    /// Append a raw item.
    pub fn push_item(&mut self, tag: u8, value: &[u8]) -> Result<()> {
        if value.len() > MAX_ITEM_LEN {
            return Err(KlvError::ItemTooLong {
                tag,
                len: value.len(),
            });
        }
        self.items.reserve(2 + value.len());
        self.items.put_u8(tag);
        self.items.put_u8(value.len() as u8);
        self.items.put_slice(value);
        self.count += 1;
        Ok(())
    }

    fn push(&mut self, tag: KlvTag, value: &[u8]) {
        debug_assert_eq!(value.len(), tag.value_len());
        self.items.put_u8(tag.as_u8());
        self.items.put_u8(value.len() as u8);
        self.items.put_slice(value);
        self.count += 1;
    }

    pub fn add_timestamp(&mut self, micros: u64) {
        self.push(KlvTag::Timestamp, &micros.to_be_bytes());
    }

    /// Latitude in degrees, [-90, 90].
    pub fn add_latitude(&mut self, deg: f64) -> Result<()> {
        let deg = check_range("latitude", deg, -90.0, 90.0)?;
        let scaled = (deg * 1e7).round() as i32;
        self.push(KlvTag::Latitude, &scaled.to_be_bytes());
        Ok(())
    }

    /// Longitude in degrees, [-180, 180].
    pub fn add_longitude(&mut self, deg: f64) -> Result<()> {
        let deg = check_range("longitude", deg, -180.0, 180.0)?;
        let scaled = (deg * 1e7).round() as i32;
        self.push(KlvTag::Longitude, &scaled.to_be_bytes());
        Ok(())
    }

    /// Altitude in meters.
    ///
    /// Encoded in decimeters truncated to 16 bits, so values at or above
    /// 6553.5 m wrap around.
    pub fn add_altitude(&mut self, meters: f64) -> Result<()> {
        let meters = check_finite("altitude", meters)?;
        let scaled = ((meters * 10.0).round() as i64 & 0xFFFF) as u16;
        self.push(KlvTag::Altitude, &scaled.to_be_bytes());
        Ok(())
    }

    /// Roll in degrees, [-180, 180].
    pub fn add_roll(&mut self, deg: f64) -> Result<()> {
        let deg = check_range("roll", deg, -180.0, 180.0)?;
        let scaled = (deg * 100.0).round() as i16;
        self.push(KlvTag::Roll, &scaled.to_be_bytes());
        Ok(())
    }

    /// Pitch in degrees, [-90, 90].
    pub fn add_pitch(&mut self, deg: f64) -> Result<()> {
        let deg = check_range("pitch", deg, -90.0, 90.0)?;
        let scaled = (deg * 100.0).round() as i16;
        self.push(KlvTag::Pitch, &scaled.to_be_bytes());
        Ok(())
    }

    /// Heading in degrees. Negative values are shifted by 360 first; the
    /// result must lie in [0, 360].
    pub fn add_heading(&mut self, deg: f64) -> Result<()> {
        let deg = check_finite("heading", deg)?;
        let normalized = if deg < 0.0 { deg + 360.0 } else { deg };
        let normalized = check_range("heading", normalized, 0.0, 360.0)?;
        let scaled = (normalized * 100.0).round() as u16;
        self.push(KlvTag::Heading, &scaled.to_be_bytes());
        Ok(())
    }

    /// Horizontal field of view in degrees, [0, 180].
    pub fn add_horizontal_fov(&mut self, deg: f64) -> Result<()> {
        let scaled = fov_hundredths("horizontal_fov", deg)?;
        self.push(KlvTag::HorizontalFov, &scaled.to_be_bytes());
        Ok(())
    }

    /// Vertical field of view in degrees, [0, 180].
    pub fn add_vertical_fov(&mut self, deg: f64) -> Result<()> {
        let scaled = fov_hundredths("vertical_fov", deg)?;
        self.push(KlvTag::VerticalFov, &scaled.to_be_bytes());
        Ok(())
    }

    /// Gimbal roll relative to the platform, [-180, 180].
    pub fn add_gimbal_roll(&mut self, deg: f64) -> Result<()> {
        let scaled = micro_degrees("gimbal_roll", deg, 180.0)?;
        self.push(KlvTag::GimbalRoll, &scaled.to_be_bytes());
        Ok(())
    }

    /// Gimbal pitch relative to the platform, [-90, 90].
    pub fn add_gimbal_pitch(&mut self, deg: f64) -> Result<()> {
        let scaled = micro_degrees("gimbal_pitch", deg, 90.0)?;
        self.push(KlvTag::GimbalPitch, &scaled.to_be_bytes());
        Ok(())
    }

    /// Gimbal yaw relative to the platform, [-180, 180].
    pub fn add_gimbal_yaw(&mut self, deg: f64) -> Result<()> {
        let scaled = micro_degrees("gimbal_yaw", deg, 180.0)?;
        self.push(KlvTag::GimbalYaw, &scaled.to_be_bytes());
        Ok(())
    }

    pub fn add_sensor_width(&mut self, mm: f32) -> Result<()> {
        let mm = check_finite("sensor_width", mm as f64)? as f32;
        self.push(KlvTag::SensorWidth, &mm.to_be_bytes());
        Ok(())
    }

    pub fn add_sensor_height(&mut self, mm: f32) -> Result<()> {
        let mm = check_finite("sensor_height", mm as f64)? as f32;
        self.push(KlvTag::SensorHeight, &mm.to_be_bytes());
        Ok(())
    }

    pub fn add_focal_length(&mut self, mm: f32) -> Result<()> {
        let mm = check_finite("focal_length", mm as f64)? as f32;
        self.push(KlvTag::FocalLength, &mm.to_be_bytes());
        Ok(())
    }

    /// Size of the packet `pack` would produce.
    pub fn packed_len(&self) -> usize {
        UAS_LOCAL_SET_KEY.len() + ber_length_size(self.items.len()) + self.items.len()
    }

    /// Assemble the packet: key, BER length, then the items in order.
    pub fn pack(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(self.packed_len());
        dst.put_slice(&UAS_LOCAL_SET_KEY);
        encode_ber_length(self.items.len(), &mut dst);
        dst.put_slice(&self.items);
        dst.freeze()
    }
}

fn check_finite(field: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(KlvError::NonFinite { field })
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<f64> {
    let value = check_finite(field, value)?;
    if value < min || value > max {
        return Err(KlvError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(value)
}

fn fov_hundredths(field: &'static str, deg: f64) -> Result<u16> {
    let deg = check_range(field, deg, 0.0, 180.0)?;
    Ok((deg * 100.0).round() as u16)
}

fn micro_degrees(field: &'static str, deg: f64, limit: f64) -> Result<i32> {
    let deg = check_range(field, deg, -limit, limit)?;
    Ok((deg * 1e6).round() as i32)
}
