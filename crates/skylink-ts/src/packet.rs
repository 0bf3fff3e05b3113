use bytes::{BufMut, BytesMut};

use crate::error::{Result, TsError};

/// Transport packet size.
pub const PACKET_SIZE: usize = 188;

/// Transport packet header size.
pub const HEADER_SIZE: usize = 4;

/// Payload bytes available in a packet without adaptation field.
pub const PAYLOAD_SIZE: usize = PACKET_SIZE - HEADER_SIZE;

pub const SYNC_BYTE: u8 = 0x47;

/// Fill byte for unused payload space.
pub const STUFFING_BYTE: u8 = 0xFF;

/// Decoded 4-byte transport packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TsHeader {
    pub transport_error: bool,
    pub payload_unit_start: bool,
    pub pid: u16,
    /// Two-bit adaptation field control (`0b01` = payload only).
    pub adaptation_field_control: u8,
    pub continuity_counter: u8,
}

impl TsHeader {
    /// Header for a payload-only packet.
    pub fn payload_only(pid: u16, payload_unit_start: bool, continuity_counter: u8) -> Self {
        Self {
            transport_error: false,
            payload_unit_start,
            pid: pid & 0x1FFF,
            adaptation_field_control: 0b01,
            continuity_counter: continuity_counter & 0x0F,
        }
    }

    /// Parse the header of a full 188-byte packet.
    pub fn parse(packet: &[u8]) -> Result<Self> {
        if packet.len() != PACKET_SIZE {
            return Err(TsError::PacketSize(packet.len()));
        }
        if packet[0] != SYNC_BYTE {
            return Err(TsError::InvalidSync(packet[0]));
        }
        Ok(Self {
            transport_error: packet[1] & 0x80 != 0,
            payload_unit_start: packet[1] & 0x40 != 0,
            pid: (((packet[1] & 0x1F) as u16) << 8) | packet[2] as u16,
            adaptation_field_control: (packet[3] >> 4) & 0x03,
            continuity_counter: packet[3] & 0x0F,
        })
    }

    pub fn has_payload(&self) -> bool {
        self.adaptation_field_control & 0b01 != 0
    }

    pub(crate) fn write(&self, dst: &mut BytesMut) {
        let mut b1 = ((self.pid >> 8) & 0x1F) as u8;
        if self.transport_error {
            b1 |= 0x80;
        }
        if self.payload_unit_start {
            b1 |= 0x40;
        }
        dst.put_u8(SYNC_BYTE);
        dst.put_u8(b1);
        dst.put_u8((self.pid & 0xFF) as u8);
        dst.put_u8(((self.adaptation_field_control & 0x03) << 4) | (self.continuity_counter & 0x0F));
    }
}

/// Append one packet: header, `body`, then stuffing up to 188 bytes.
///
/// `body` must fit in [`PAYLOAD_SIZE`].
pub(crate) fn write_packet(dst: &mut BytesMut, header: TsHeader, body: &[&[u8]]) {
    let start = dst.len();
    header.write(dst);
    for part in body {
        dst.put_slice(part);
    }
    let used = dst.len() - start;
    debug_assert!(used <= PACKET_SIZE);
    dst.put_bytes(STUFFING_BYTE, PACKET_SIZE - used);
}

/// Payload bytes of a packet, after the header and any adaptation field.
pub fn packet_payload(packet: &[u8]) -> Result<(TsHeader, &[u8])> {
    let header = TsHeader::parse(packet)?;
    let payload = match header.adaptation_field_control {
        0b00 => return Err(TsError::ReservedAdaptation),
        0b01 => &packet[HEADER_SIZE..],
        0b10 => &packet[PACKET_SIZE..],
        _ => {
            let len = packet[HEADER_SIZE] as usize;
            let start = HEADER_SIZE + 1 + len;
            if start > PACKET_SIZE {
                return Err(TsError::AdaptationOverflow(len));
            }
            &packet[start..]
        }
    };
    Ok((header, payload))
}
