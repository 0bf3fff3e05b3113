use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::packet::{write_packet, TsHeader, PACKET_SIZE, PAYLOAD_SIZE};
use crate::psi::{build_pat, build_pmt, PmtStream};

pub const PAT_PID: u16 = 0x0000;
pub const PMT_PID: u16 = 0x1000;
/// PID of the wrapped private data stream.
pub const DATA_PID: u16 = 0x0100;
/// No PCR is carried.
pub const NULL_PCR_PID: u16 = 0x1FFF;
pub const STREAM_TYPE_PRIVATE_DATA: u8 = 0x06;
pub const PROGRAM_NUMBER: u16 = 1;
pub const TRANSPORT_STREAM_ID: u16 = 1;

/// Default number of `wrap` calls between table injections.
pub const DEFAULT_TABLE_INTERVAL: u64 = 10;

/// Configuration for [`TsWrapper`].
#[derive(Debug, Clone)]
pub struct TsConfig {
    /// PAT/PMT are emitted on the first call and every `table_interval`
    /// calls after that. Zero behaves like one.
    pub table_interval: u64,
}

impl Default for TsConfig {
    fn default() -> Self {
        Self {
            table_interval: DEFAULT_TABLE_INTERVAL,
        }
    }
}

/// Wraps payloads for one private data stream into transport packets.
///
/// Continuity counters and the table schedule belong to the instance, so
/// independent streams need independent wrappers.
#[derive(Debug, Clone)]
pub struct TsWrapper {
    config: TsConfig,
    pat_cc: u8,
    pmt_cc: u8,
    data_cc: u8,
    calls: u64,
    tables_sent: bool,
    pat: Vec<u8>,
    pmt: Vec<u8>,
}

impl Default for TsWrapper {
    fn default() -> Self {
        Self::new()
    }
}

impl TsWrapper {
    pub fn new() -> Self {
        Self::with_config(TsConfig::default())
    }

    pub fn with_config(config: TsConfig) -> Self {
        let pat = build_pat(TRANSPORT_STREAM_ID, PROGRAM_NUMBER, PMT_PID);
        let pmt = build_pmt(
            PROGRAM_NUMBER,
            NULL_PCR_PID,
            &[PmtStream {
                stream_type: STREAM_TYPE_PRIVATE_DATA,
                pid: DATA_PID,
            }],
        );
        Self {
            config,
            pat_cc: 0,
            pmt_cc: 0,
            data_cc: 0,
            calls: 0,
            tables_sent: false,
            pat,
            pmt,
        }
    }

    pub fn config(&self) -> &TsConfig {
        &self.config
    }

    /// Number of non-empty payloads wrapped so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    /// Wrap one payload.
    ///
    /// Output is a whole number of 188-byte packets: PAT and PMT when due,
    /// then the payload packets. An empty payload yields no output and does
    /// not advance the table schedule.
    pub fn wrap(&mut self, payload: &[u8]) -> Bytes {
        if payload.is_empty() {
            return Bytes::new();
        }

        let interval = self.config.table_interval.max(1);
        let with_tables = !self.tables_sent || self.calls % interval == 0;
        let data_packets = 1 + payload.len().saturating_sub(PAYLOAD_SIZE - 1).div_ceil(PAYLOAD_SIZE);
        let packets = data_packets + if with_tables { 2 } else { 0 };
        let mut dst = BytesMut::with_capacity(packets * PACKET_SIZE);

        if with_tables {
            self.write_tables(&mut dst);
        }
        self.write_payload(&mut dst, payload);
        self.calls += 1;

        debug!(
            packets,
            bytes = dst.len(),
            payload = payload.len(),
            "wrapped payload"
        );
        dst.freeze()
    }

    fn write_tables(&mut self, dst: &mut BytesMut) {
        let cc = next_cc(&mut self.pat_cc);
        write_packet(dst, TsHeader::payload_only(PAT_PID, true, cc), &[&[0x00], &self.pat]);
        let cc = next_cc(&mut self.pmt_cc);
        write_packet(dst, TsHeader::payload_only(PMT_PID, true, cc), &[&[0x00], &self.pmt]);
        self.tables_sent = true;
    }

    fn write_payload(&mut self, dst: &mut BytesMut, payload: &[u8]) {
        // The first packet spends one byte on the pointer field.
        let (first, mut rest) = payload.split_at(payload.len().min(PAYLOAD_SIZE - 1));
        let cc = next_cc(&mut self.data_cc);
        write_packet(dst, TsHeader::payload_only(DATA_PID, true, cc), &[&[0x00], first]);

        while !rest.is_empty() {
            let (chunk, tail) = rest.split_at(rest.len().min(PAYLOAD_SIZE));
            let cc = next_cc(&mut self.data_cc);
            write_packet(dst, TsHeader::payload_only(DATA_PID, false, cc), &[chunk]);
            rest = tail;
        }
    }
}

/// Return the current counter and advance it modulo 16.
fn next_cc(counter: &mut u8) -> u8 {
    let cc = *counter;
    *counter = (cc + 1) & 0x0F;
    cc
}
