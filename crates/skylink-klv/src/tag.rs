/// UAS local set universal key (16 bytes).
pub const UAS_LOCAL_SET_KEY: [u8; 16] = [
    0x06, 0x0E, 0x2B, 0x34, // SMPTE designator
    0x02, 0x0B, 0x01, 0x01, // registry category + designation
    0x0E, 0x01, 0x03, 0x01, // organization
    0x01, 0x00, 0x00, 0x00, // local set
];

/// Local set tags understood by the encoder and decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum KlvTag {
    /// Microseconds since the Unix epoch, u64.
    Timestamp = 2,
    /// Platform roll, i16 hundredths of a degree.
    Roll = 5,
    /// Platform pitch, i16 hundredths of a degree.
    Pitch = 6,
    /// Platform heading, u16 hundredths of a degree.
    Heading = 7,
    /// Latitude, i32 in 1e-7 degrees.
    Latitude = 13,
    /// Longitude, i32 in 1e-7 degrees.
    Longitude = 14,
    /// Altitude, u16 decimeters.
    Altitude = 15,
    /// Horizontal field of view, u16 hundredths of a degree.
    HorizontalFov = 18,
    /// Vertical field of view, u16 hundredths of a degree.
    VerticalFov = 19,
    /// Gimbal relative roll, i32 microdegrees.
    GimbalRoll = 21,
    /// Gimbal relative pitch, i32 microdegrees.
    GimbalPitch = 22,
    /// Gimbal relative yaw, i32 microdegrees.
    GimbalYaw = 23,
    /// Sensor width in millimeters, f32.
    SensorWidth = 102,
    /// Sensor height in millimeters, f32.
    SensorHeight = 103,
    /// Lens focal length in millimeters, f32.
    FocalLength = 104,
}

impl KlvTag {
    pub fn from_u8(value: u8) -> Option<Self> {
        let tag = match value {
            2 => Self::Timestamp,
            5 => Self::Roll,
            6 => Self::Pitch,
            7 => Self::Heading,
            13 => Self::Latitude,
            14 => Self::Longitude,
            15 => Self::Altitude,
            18 => Self::HorizontalFov,
            19 => Self::VerticalFov,
            21 => Self::GimbalRoll,
            22 => Self::GimbalPitch,
            23 => Self::GimbalYaw,
            102 => Self::SensorWidth,
            103 => Self::SensorHeight,
            104 => Self::FocalLength,
            _ => return None,
        };
        Some(tag)
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Size in bytes of the encoded value.
    pub fn value_len(self) -> usize {
        match self {
            Self::Timestamp => 8,
            Self::Roll
            | Self::Pitch
            | Self::Heading
            | Self::Altitude
            | Self::HorizontalFov
            | Self::VerticalFov => 2,
            Self::Latitude
            | Self::Longitude
            | Self::GimbalRoll
            | Self::GimbalPitch
            | Self::GimbalYaw
            | Self::SensorWidth
            | Self::SensorHeight
            | Self::FocalLength => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Timestamp => "timestamp",
            Self::Roll => "roll",
            Self::Pitch => "pitch",
            Self::Heading => "heading",
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
            Self::Altitude => "altitude",
            Self::HorizontalFov => "horizontal_fov",
            Self::VerticalFov => "vertical_fov",
            Self::GimbalRoll => "gimbal_roll",
            Self::GimbalPitch => "gimbal_pitch",
            Self::GimbalYaw => "gimbal_yaw",
            Self::SensorWidth => "sensor_width",
            Self::SensorHeight => "sensor_height",
            Self::FocalLength => "focal_length",
        }
    }
}
