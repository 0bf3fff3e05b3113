use bytes::{BufMut, BytesMut};

use crate::crc::crc32_mpeg2;
use crate::error::{Result, TsError};
use crate::packet::packet_payload;

pub const TABLE_ID_PAT: u8 = 0x00;
pub const TABLE_ID_PMT: u8 = 0x02;

/// Version 0, current_next_indicator set, reserved bits high.
const VERSION_BYTE: u8 = 0xC1;

/// Bytes counted by `section_length` before the table body.
const SECTION_HEADER_TAIL: usize = 5;
const CRC_SIZE: usize = 4;

/// One program of a PAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatEntry {
    pub program_number: u16,
    pub pmt_pid: u16,
}

/// One elementary stream of a PMT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmtStream {
    pub stream_type: u8,
    pub pid: u16,
}

/// A long-form PSI section with its CRC already verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsiSection {
    pub table_id: u8,
    pub table_id_extension: u16,
    pub version: u8,
    pub current_next: bool,
    pub section_number: u8,
    pub last_section_number: u8,
    /// Table-specific bytes between the section header and the CRC.
    pub body: Vec<u8>,
    pub crc: u32,
}

fn finish_section(table_id: u8, table_id_extension: u16, body: &[u8]) -> Vec<u8> {
    let section_length = SECTION_HEADER_TAIL + body.len() + CRC_SIZE;
    let mut buf = BytesMut::with_capacity(3 + section_length);
    buf.put_u8(table_id);
    // section_syntax_indicator = 1, '0', reserved = 11
    buf.put_u16(0xB000 | (section_length as u16 & 0x0FFF));
    buf.put_u16(table_id_extension);
    buf.put_u8(VERSION_BYTE);
    buf.put_u8(0); // section_number
    buf.put_u8(0); // last_section_number
    buf.put_slice(body);
    let crc = crc32_mpeg2(&buf);
    buf.put_u32(crc);
    buf.to_vec()
}

/// Build a single-program PAT section, CRC included.
pub fn build_pat(transport_stream_id: u16, program_number: u16, pmt_pid: u16) -> Vec<u8> {
    let mut body = BytesMut::with_capacity(4);
    body.put_u16(program_number);
    body.put_u16(0xE000 | (pmt_pid & 0x1FFF));
    finish_section(TABLE_ID_PAT, transport_stream_id, &body)
}

/// Build a PMT section without descriptors, CRC included.
pub fn build_pmt(program_number: u16, pcr_pid: u16, streams: &[PmtStream]) -> Vec<u8> {
    let mut body = BytesMut::with_capacity(4 + 5 * streams.len());
    body.put_u16(0xE000 | (pcr_pid & 0x1FFF));
    body.put_u16(0xF000); // program_info_length = 0
    for stream in streams {
        body.put_u8(stream.stream_type);
        body.put_u16(0xE000 | (stream.pid & 0x1FFF));
        body.put_u16(0xF000); // ES_info_length = 0
    }
    finish_section(TABLE_ID_PMT, program_number, &body)
}

/// Extract and CRC-check the section starting in `packet`.
pub fn parse_psi_section(packet: &[u8]) -> Result<PsiSection> {
    let (header, payload) = packet_payload(packet)?;
    if !header.payload_unit_start || payload.is_empty() {
        return Err(TsError::NoPayloadStart);
    }

    let start = 1 + payload[0] as usize;
    let section = payload.get(start..).unwrap_or_default();
    if section.len() < 3 {
        return Err(TsError::Truncated {
            needed: start + 3,
            available: payload.len(),
        });
    }
    let section_length = (((section[1] & 0x0F) as usize) << 8) | section[2] as usize;
    let total = 3 + section_length;
    if section_length < SECTION_HEADER_TAIL + CRC_SIZE || section.len() < total {
        return Err(TsError::Truncated {
            needed: start + total.max(3 + SECTION_HEADER_TAIL + CRC_SIZE),
            available: payload.len(),
        });
    }

    let crc_at = total - CRC_SIZE;
    let stored = u32::from_be_bytes([
        section[crc_at],
        section[crc_at + 1],
        section[crc_at + 2],
        section[crc_at + 3],
    ]);
    let computed = crc32_mpeg2(&section[..crc_at]);
    if stored != computed {
        return Err(TsError::CrcMismatch { stored, computed });
    }

    Ok(PsiSection {
        table_id: section[0],
        table_id_extension: u16::from_be_bytes([section[3], section[4]]),
        version: (section[5] >> 1) & 0x1F,
        current_next: section[5] & 0x01 != 0,
        section_number: section[6],
        last_section_number: section[7],
        body: section[8..crc_at].to_vec(),
        crc: stored,
    })
}

fn expect_table(section: &PsiSection, expected: u8) -> Result<()> {
    if section.table_id != expected {
        return Err(TsError::UnexpectedTable {
            expected,
            actual: section.table_id,
        });
    }
    Ok(())
}

/// Program entries of a PAT section.
pub fn parse_pat(section: &PsiSection) -> Result<Vec<PatEntry>> {
    expect_table(section, TABLE_ID_PAT)?;
    if section.body.len() % 4 != 0 {
        return Err(TsError::Truncated {
            needed: section.body.len().next_multiple_of(4),
            available: section.body.len(),
        });
    }
    Ok(section
        .body
        .chunks_exact(4)
        .map(|entry| PatEntry {
            program_number: u16::from_be_bytes([entry[0], entry[1]]),
            pmt_pid: u16::from_be_bytes([entry[2], entry[3]]) & 0x1FFF,
        })
        .collect())
}

/// PCR PID and elementary streams of a PMT section.
pub fn parse_pmt(section: &PsiSection) -> Result<(u16, Vec<PmtStream>)> {
    expect_table(section, TABLE_ID_PMT)?;
    let body = section.body.as_slice();
    if body.len() < 4 {
        return Err(TsError::Truncated {
            needed: 4,
            available: body.len(),
        });
    }
    let pcr_pid = u16::from_be_bytes([body[0], body[1]]) & 0x1FFF;
    let info_len = (u16::from_be_bytes([body[2], body[3]]) & 0x0FFF) as usize;

    let mut pos = 4 + info_len;
    let mut streams = Vec::new();
    while pos < body.len() {
        if body.len() - pos < 5 {
            return Err(TsError::Truncated {
                needed: pos + 5,
                available: body.len(),
            });
        }
        let es_info_len = (u16::from_be_bytes([body[pos + 3], body[pos + 4]]) & 0x0FFF) as usize;
        streams.push(PmtStream {
            stream_type: body[pos],
            pid: u16::from_be_bytes([body[pos + 1], body[pos + 2]]) & 0x1FFF,
        });
        pos += 5 + es_info_len;
    }
    Ok((pcr_pid, streams))
}
