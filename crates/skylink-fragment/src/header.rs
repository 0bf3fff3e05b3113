use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FragmentError, Result};

/// Frame header: frame_id (4) + total_chunks (2) + chunk_id (2) + type_tag (1) + reserved (1).
pub const FRAME_HEADER_SIZE: usize = 10;

/// Stream header: chunk_id (4) + timestamp_us (8).
pub const STREAM_HEADER_SIZE: usize = 12;

/// Wire layout of a chunk header.
///
/// Nothing on the wire identifies the layout, so both ends must agree on it
/// out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderFormat {
    /// Discrete frames split into numbered chunks.
    Frame,
    /// An undifferentiated byte stream cut into sequenced chunks.
    Stream,
}

impl HeaderFormat {
    pub fn header_size(self) -> usize {
        match self {
            Self::Frame => FRAME_HEADER_SIZE,
            Self::Stream => STREAM_HEADER_SIZE,
        }
    }
}

/// Header of a chunk belonging to a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub frame_id: u32,
    pub total_chunks: u16,
    pub chunk_id: u16,
    /// Payload classification, the NAL unit type for video frames.
    pub type_tag: u8,
    pub reserved: u8,
}

impl FrameHeader {
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_u32(self.frame_id);
        dst.put_u16(self.total_chunks);
        dst.put_u16(self.chunk_id);
        dst.put_u8(self.type_tag);
        dst.put_u8(self.reserved);
    }

    pub fn decode(src: &[u8]) -> Result<Self> {
        if src.len() < FRAME_HEADER_SIZE {
            return Err(FragmentError::HeaderTooShort {
                format: HeaderFormat::Frame,
                len: src.len(),
                need: FRAME_HEADER_SIZE,
            });
        }
        Ok(Self {
            frame_id: u32::from_be_bytes([src[0], src[1], src[2], src[3]]),
            total_chunks: u16::from_be_bytes([src[4], src[5]]),
            chunk_id: u16::from_be_bytes([src[6], src[7]]),
            type_tag: src[8],
            reserved: src[9],
        })
    }
}

/// Header of a chunk cut from a byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    pub chunk_id: u32,
    pub timestamp_us: u64,
}

impl StreamHeader {
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_u32(self.chunk_id);
        dst.put_u64(self.timestamp_us);
    }

    pub fn decode(src: &[u8]) -> Result<Self> {
        if src.len() < STREAM_HEADER_SIZE {
            return Err(FragmentError::HeaderTooShort {
                format: HeaderFormat::Stream,
                len: src.len(),
                need: STREAM_HEADER_SIZE,
            });
        }
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&src[4..12]);
        Ok(Self {
            chunk_id: u32::from_be_bytes([src[0], src[1], src[2], src[3]]),
            timestamp_us: u64::from_be_bytes(ts),
        })
    }
}

/// Either header layout, tagged with its format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkHeader {
    Frame(FrameHeader),
    Stream(StreamHeader),
}

impl ChunkHeader {
    pub fn format(&self) -> HeaderFormat {
        match self {
            Self::Frame(_) => HeaderFormat::Frame,
            Self::Stream(_) => HeaderFormat::Stream,
        }
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Self::Frame(h) => h.encode(dst),
            Self::Stream(h) => h.encode(dst),
        }
    }

    /// Decode a header of the given format from the front of `src`.
    pub fn decode(format: HeaderFormat, src: &[u8]) -> Result<Self> {
        match format {
            HeaderFormat::Frame => FrameHeader::decode(src).map(Self::Frame),
            HeaderFormat::Stream => StreamHeader::decode(src).map(Self::Stream),
        }
    }
}

/// One datagram of a fragmented frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameChunk {
    pub header: FrameHeader,
    pub payload: Bytes,
}

impl FrameChunk {
    pub fn wire_size(&self) -> usize {
        FRAME_HEADER_SIZE + self.payload.len()
    }

    pub fn encode_into(&self, dst: &mut BytesMut) {
        dst.reserve(self.wire_size());
        self.header.encode(dst);
        dst.put_slice(&self.payload);
    }

    /// Serialize to a datagram.
    pub fn to_bytes(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(self.wire_size());
        self.encode_into(&mut dst);
        dst.freeze()
    }

    /// Parse a datagram. The payload shares `datagram`'s storage.
    pub fn from_datagram(datagram: Bytes) -> Result<Self> {
        let header = FrameHeader::decode(&datagram)?;
        Ok(Self {
            header,
            payload: datagram.slice(FRAME_HEADER_SIZE..),
        })
    }
}

/// One datagram of a chunked byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    pub header: StreamHeader,
    pub payload: Bytes,
}

impl StreamChunk {
    pub fn wire_size(&self) -> usize {
        STREAM_HEADER_SIZE + self.payload.len()
    }

    pub fn encode_into(&self, dst: &mut BytesMut) {
        dst.reserve(self.wire_size());
        self.header.encode(dst);
        dst.put_slice(&self.payload);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(self.wire_size());
        self.encode_into(&mut dst);
        dst.freeze()
    }

    pub fn from_datagram(datagram: Bytes) -> Result<Self> {
        let header = StreamHeader::decode(&datagram)?;
        Ok(Self {
            header,
            payload: datagram.slice(STREAM_HEADER_SIZE..),
        })
    }
}

/// A chunk of either format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Frame(FrameChunk),
    Stream(StreamChunk),
}

impl Chunk {
    pub fn from_datagram(format: HeaderFormat, datagram: Bytes) -> Result<Self> {
        match format {
            HeaderFormat::Frame => FrameChunk::from_datagram(datagram).map(Self::Frame),
            HeaderFormat::Stream => StreamChunk::from_datagram(datagram).map(Self::Stream),
        }
    }

    pub fn header(&self) -> ChunkHeader {
        match self {
            Self::Frame(c) => ChunkHeader::Frame(c.header),
            Self::Stream(c) => ChunkHeader::Stream(c.header),
        }
    }

    pub fn payload(&self) -> &Bytes {
        match self {
            Self::Frame(c) => &c.payload,
            Self::Stream(c) => &c.payload,
        }
    }

    pub fn encode_into(&self, dst: &mut BytesMut) {
        match self {
            Self::Frame(c) => c.encode_into(dst),
            Self::Stream(c) => c.encode_into(dst),
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        match self {
            Self::Frame(c) => c.to_bytes(),
            Self::Stream(c) => c.to_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_header_layout() {
        let header = FrameHeader {
            frame_id: 0x0102_0304,
            total_chunks: 3,
            chunk_id: 2,
            type_tag: 5,
            reserved: 0,
        };
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.as_ref(), &[1, 2, 3, 4, 0, 3, 0, 2, 5, 0]);
        assert_eq!(FrameHeader::decode(&buf).unwrap(), header);
    }

    #[test]
    fn test_stream_header_layout() {
        let header = StreamHeader {
            chunk_id: 7,
            timestamp_us: 0x0A0B_0C0D_0E0F_1011,
        };
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(
            buf.as_ref(),
            &[0, 0, 0, 7, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, 0x10, 0x11]
        );
        assert_eq!(StreamHeader::decode(&buf).unwrap(), header);
    }

    #[test]
    fn test_short_datagrams_rejected() {
        assert!(matches!(
            FrameHeader::decode(&[0; 9]),
            Err(FragmentError::HeaderTooShort { len: 9, need: 10, .. })
        ));
        assert!(matches!(
            ChunkHeader::decode(HeaderFormat::Stream, &[0; 11]),
            Err(FragmentError::HeaderTooShort {
                format: HeaderFormat::Stream,
                ..
            })
        ));
    }

    #[test]
    fn test_same_bytes_read_differently_per_format() {
        let datagram = Bytes::from_static(&[0, 0, 0, 1, 0, 2, 0, 1, 7, 0, 0xAA, 0xBB]);
        let frame = Chunk::from_datagram(HeaderFormat::Frame, datagram.clone()).unwrap();
        let stream = Chunk::from_datagram(HeaderFormat::Stream, datagram).unwrap();

        assert_eq!(frame.header().format(), HeaderFormat::Frame);
        assert_eq!(frame.payload().as_ref(), &[0xAA, 0xBB]);
        assert_eq!(stream.header().format(), HeaderFormat::Stream);
        assert!(stream.payload().is_empty());
    }

    #[test]
    fn test_chunk_datagram_roundtrip() {
        let chunk = FrameChunk {
            header: FrameHeader {
                frame_id: 9,
                total_chunks: 1,
                chunk_id: 0,
                type_tag: 1,
                reserved: 0,
            },
            payload: Bytes::from_static(b"payload"),
        };
        let wire = chunk.to_bytes();
        assert_eq!(wire.len(), chunk.wire_size());
        assert_eq!(FrameChunk::from_datagram(wire).unwrap(), chunk);
    }
}
