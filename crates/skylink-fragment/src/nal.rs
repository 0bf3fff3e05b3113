use bytes::Bytes;

/// H.264 NAL unit types the sender distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NalKind {
    NonIdr,
    Idr,
    Sei,
    Sps,
    Pps,
    Aud,
    Other(u8),
}

impl NalKind {
    pub fn from_type(nal_type: u8) -> Self {
        match nal_type & 0x1F {
            1 => Self::NonIdr,
            5 => Self::Idr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::Aud,
            other => Self::Other(other),
        }
    }

    pub fn nal_type(self) -> u8 {
        match self {
            Self::NonIdr => 1,
            Self::Idr => 5,
            Self::Sei => 6,
            Self::Sps => 7,
            Self::Pps => 8,
            Self::Aud => 9,
            Self::Other(t) => t,
        }
    }

    /// SPS and PPS carry decoder initialization parameters.
    pub fn is_parameter_set(self) -> bool {
        matches!(self, Self::Sps | Self::Pps)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::NonIdr => "non-idr",
            Self::Idr => "idr",
            Self::Sei => "sei",
            Self::Sps => "sps",
            Self::Pps => "pps",
            Self::Aud => "aud",
            Self::Other(_) => "other",
        }
    }
}

/// NAL unit type of an Annex-B unit, read after its 4- or 3-byte start code.
pub fn nal_unit_type(data: &[u8]) -> Option<u8> {
    let header = match data {
        [0, 0, 0, 1, header, ..] => *header,
        [0, 0, 1, header, ..] => *header,
        _ => return None,
    };
    Some(header & 0x1F)
}

pub fn nal_kind(data: &[u8]) -> Option<NalKind> {
    nal_unit_type(data).map(NalKind::from_type)
}

/// Split an Annex-B elementary stream into NAL units, start codes included.
///
/// Bytes before the first start code are discarded.
pub fn split_annex_b(stream: &Bytes) -> Vec<Bytes> {
    let data = stream.as_ref();
    let mut starts = Vec::new();
    let mut i = 0;
    while i + 3 <= data.len() {
        if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            let four_byte = i > 0 && data[i - 1] == 0;
            starts.push(if four_byte { i - 1 } else { i });
            i += 3;
        } else {
            i += 1;
        }
    }

    let mut units = Vec::with_capacity(starts.len());
    for (n, start) in starts.iter().enumerate() {
        let end = starts.get(n + 1).copied().unwrap_or(data.len());
        units.push(stream.slice(*start..end));
    }
    units
}
