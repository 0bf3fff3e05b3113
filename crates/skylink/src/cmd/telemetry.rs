use std::fs::File;
use std::io::{BufRead, BufReader};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use skylink_klv::{TelemetryEncoder, TelemetrySample};
use skylink_transport::{DatagramSender, DatagramSink, SenderConfig};
use skylink_ts::TsWrapper;
use tracing::{debug, warn};

use crate::cmd::link::ChunkLink;
use crate::cmd::{resolve_addr, TelemetryArgs};
use crate::exit::{io_error, transport_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{OutputFormat, Report};

pub fn run(args: TelemetryArgs, format: OutputFormat) -> CliResult<i32> {
    let remote = resolve_addr(&args.link.to)?;
    let local = resolve_addr(&args.link.bind)?;
    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) => Box::new(BufReader::new(File::open(path).map_err(|err| {
            io_error(&format!("failed opening {}", path.display()), err)
        })?)),
        None => Box::new(BufReader::new(std::io::stdin())),
    };

    let link = ChunkLink::new(args.link.header.into(), args.link.mtu)?;
    let mut sender = DatagramSender::connect(local, remote, SenderConfig::default())
        .map_err(|err| transport_error("socket setup failed", err))?;

    let mut pipeline = TelemetryPipeline {
        encoder: TelemetryEncoder::new(args.encode.policy()),
        wrapper: args.encode.ts.then(TsWrapper::new),
        link,
        type_tag: args.type_tag,
        counts: SampleCounts::default(),
    };
    let period = (args.rate > 0).then(|| Duration::from_secs(1) / args.rate);

    for line in reader.lines() {
        let line = line.map_err(|err| io_error("failed reading samples", err))?;
        if line.trim().is_empty() {
            continue;
        }
        pipeline.process(&mut sender, &line)?;
        if let Some(period) = period {
            thread::sleep(period);
        }
    }

    let counts = pipeline.counts;
    let mut report = Report::new("telemetry");
    report
        .add("samples_read", counts.read)
        .add("samples_sent", counts.sent)
        .add("samples_rejected", counts.rejected);
    pipeline.link.fill_report(&mut report);
    report.add("send_errors", sender.stats().send_errors);
    report.print(format);

    if counts.sent == 0 && counts.rejected > 0 {
        return Err(CliError::new(DATA_INVALID, "every telemetry sample was rejected"));
    }
    Ok(SUCCESS)
}

#[derive(Debug, Default, Clone, Copy)]
struct SampleCounts {
    read: u64,
    sent: u64,
    rejected: u64,
}

/// JSON line to datagrams: parse, encode, optionally wrap, chunk, send.
struct TelemetryPipeline {
    encoder: TelemetryEncoder,
    wrapper: Option<TsWrapper>,
    link: ChunkLink,
    type_tag: u8,
    counts: SampleCounts,
}

impl TelemetryPipeline {
    /// A malformed or out-of-domain sample is skipped; only send failures
    /// are errors.
    fn process(&mut self, sink: &mut impl DatagramSink, line: &str) -> CliResult<()> {
        self.counts.read += 1;
        let sample: TelemetrySample = match serde_json::from_str(line) {
            Ok(sample) => sample,
            Err(err) => {
                warn!(error = %err, line = self.counts.read, "skipping unparsable sample");
                self.counts.rejected += 1;
                return Ok(());
            }
        };

        let packet = match self.encoder.encode(&sample) {
            Ok(packet) => packet,
            Err(err) => {
                warn!(error = %err, timestamp_us = sample.timestamp_us, "dropping sample");
                self.counts.rejected += 1;
                return Ok(());
            }
        };

        let payload: Bytes = match self.wrapper.as_mut() {
            Some(wrapper) => wrapper.wrap(&packet),
            None => packet,
        };
        debug!(len = payload.len(), timestamp_us = sample.timestamp_us, "sample encoded");
        self.link
            .send(sink, payload, self.type_tag, sample.timestamp_us)?;
        self.counts.sent += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skylink_fragment::{HeaderFormat, Reassembler};
    use skylink_klv::{decode_packet, GpsPolicy};
    use skylink_ts::PACKET_SIZE;

    fn pipeline(ts: bool) -> TelemetryPipeline {
        TelemetryPipeline {
            encoder: TelemetryEncoder::new(GpsPolicy::RequireFix),
            wrapper: ts.then(TsWrapper::new),
            link: ChunkLink::new(HeaderFormat::Frame, 1400).unwrap(),
            type_tag: 0,
            counts: SampleCounts::default(),
        }
    }

    #[test]
    fn bad_samples_are_skipped() {
        let mut pipeline = pipeline(false);
        let mut sink: Vec<Vec<u8>> = Vec::new();
        pipeline.process(&mut sink, "{not json").unwrap();
        pipeline
            .process(&mut sink, r#"{"timestamp_us": 1, "pitch": 120.0}"#)
            .unwrap();
        pipeline
            .process(&mut sink, r#"{"timestamp_us": 2, "roll": 5.0}"#)
            .unwrap();

        assert_eq!(pipeline.counts.read, 3);
        assert_eq!(pipeline.counts.rejected, 2);
        assert_eq!(pipeline.counts.sent, 1);
        assert_eq!(sink.len(), 1);

        let frame = Reassembler::new()
            .push_datagram(Bytes::from(sink.remove(0)))
            .unwrap();
        let (set, _) = decode_packet(&frame.data).unwrap();
        assert_eq!(set.items[0].tag, 2);
    }

    #[test]
    fn ts_wrapped_samples_are_whole_packets() {
        let mut pipeline = pipeline(true);
        let mut sink: Vec<Vec<u8>> = Vec::new();
        pipeline
            .process(&mut sink, r#"{"timestamp_us": 5, "pitch": -3.5}"#)
            .unwrap();

        let frame = Reassembler::new()
            .push_datagram(Bytes::from(sink.remove(0)))
            .unwrap();
        assert_eq!(frame.data.len() % PACKET_SIZE, 0);
        assert_eq!(frame.data[0], 0x47);
    }
}
