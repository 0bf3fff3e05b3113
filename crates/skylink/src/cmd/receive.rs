use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use bytes::Bytes;
use skylink_fragment::{
    bounded, FragmentError, HandoffReceiver, HeaderFormat, Reassembler, ReassemblerConfig,
    StreamMonitor,
};
use skylink_transport::{DatagramReceiver, ReceiverConfig};
use tracing::{info, warn};

use crate::cmd::{parse_duration, resolve_addr, ReceiveArgs};
use crate::exit::{io_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS, TIMEOUT, USAGE};
use crate::output::{OutputFormat, Report};

pub fn run(args: ReceiveArgs, format: OutputFormat) -> CliResult<i32> {
    let addr = resolve_addr(&args.bind)?;
    let deadline = args
        .timeout
        .as_deref()
        .map(parse_duration)
        .transpose()?
        .map(|limit| Instant::now() + limit);
    let max_age = args.max_age.as_deref().map(parse_duration).transpose()?;
    if args.queue == 0 {
        return Err(CliError::new(USAGE, "--queue must be at least 1"));
    }

    let mut intake = Intake::new(
        args.header.into(),
        ReassemblerConfig {
            max_tracked_frames: args.max_tracked,
            max_age,
            ..ReassemblerConfig::default()
        },
    );
    let mut receiver = DatagramReceiver::bind(addr, ReceiverConfig::default())
        .map_err(|err| transport_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let (tx, rx) = bounded::<Bytes>(args.queue);
    let writer = spawn_writer(args.output.clone(), rx)?;

    let mut delivered = 0u64;
    let mut timed_out = false;
    while running.load(Ordering::SeqCst) {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            timed_out = true;
            break;
        }
        intake.expire(Instant::now());

        let Some((datagram, _from)) = receiver
            .recv_datagram()
            .map_err(|err| transport_error("receive failed", err))?
        else {
            continue;
        };
        let Some(payload) = intake.push(datagram) else {
            continue;
        };

        delivered += 1;
        match tx.offer(payload) {
            Ok(()) | Err(FragmentError::QueueFull) => {}
            Err(err) => {
                warn!(error = %err, "writer stopped");
                break;
            }
        }
        if args.count.is_some_and(|count| delivered >= count) {
            break;
        }
    }

    let queue_dropped = tx.dropped();
    drop(tx);
    let written = writer
        .join()
        .map_err(|_| CliError::new(INTERNAL, "writer thread panicked"))?
        .map_err(|err| io_error("write failed", err))?;

    let mut report = Report::new("receive");
    report
        .add("payloads_delivered", delivered)
        .add("queue_dropped", queue_dropped)
        .add("bytes_written", written);
    intake.fill_report(&mut report);
    info!(delivered, written, "receive finished");

    // Payloads own stdout unless they go to a file.
    if args.output.is_some() {
        report.print(format);
    } else {
        eprintln!("{}", report.render(format));
    }

    match args.count {
        Some(count) if timed_out && delivered < count => Ok(TIMEOUT),
        _ => Ok(SUCCESS),
    }
}

/// Receive-side state for the configured header format.
enum Intake {
    Frames(Reassembler),
    Stream(StreamMonitor),
}

impl Intake {
    fn new(format: HeaderFormat, config: ReassemblerConfig) -> Self {
        match format {
            HeaderFormat::Frame => Self::Frames(Reassembler::with_config(config)),
            HeaderFormat::Stream => Self::Stream(StreamMonitor::new()),
        }
    }

    /// Payload ready for the writer, if this datagram produced one.
    fn push(&mut self, datagram: Bytes) -> Option<Bytes> {
        match self {
            Self::Frames(reassembler) => reassembler.push_datagram(datagram).map(|f| f.data),
            Self::Stream(monitor) => monitor.push_datagram(datagram).map(|c| c.payload),
        }
    }

    fn expire(&mut self, now: Instant) {
        if let Self::Frames(reassembler) = self {
            reassembler.evict_expired(now);
        }
    }

    fn fill_report(&self, report: &mut Report) {
        match self {
            Self::Frames(reassembler) => {
                let stats = reassembler.stats();
                report
                    .add("chunks_received", stats.chunks_received)
                    .add("frames_completed", stats.frames_completed)
                    .add("frames_evicted", stats.frames_evicted)
                    .add("frames_expired", stats.frames_expired)
                    .add("malformed_chunks", stats.malformed_chunks)
                    .add("duplicate_chunks", stats.duplicate_chunks)
                    .add("stale_chunks", stats.stale_chunks)
                    .add("inconsistent_chunks", stats.inconsistent_chunks)
                    .add("resyncs", stats.resyncs)
                    .add("frames_pending", reassembler.pending() as u64);
            }
            Self::Stream(monitor) => {
                let stats = monitor.stats();
                report
                    .add("chunks_received", stats.chunks_received)
                    .add("bytes_received", stats.bytes_received)
                    .add("missing_chunks", stats.missing_chunks)
                    .add("gaps", stats.gaps)
                    .add("late_chunks", stats.late_chunks)
                    .add("malformed_chunks", stats.malformed_chunks);
            }
        }
    }
}

fn spawn_writer(
    output: Option<PathBuf>,
    rx: HandoffReceiver<Bytes>,
) -> CliResult<JoinHandle<io::Result<u64>>> {
    let out: Box<dyn Write + Send> = match &output {
        Some(path) => Box::new(BufWriter::new(File::create(path).map_err(|err| {
            io_error(&format!("failed creating {}", path.display()), err)
        })?)),
        None => Box::new(io::stdout()),
    };

    thread::Builder::new()
        .name("skylink-writer".to_string())
        .spawn(move || write_payloads(out, rx))
        .map_err(|err| io_error("failed to start writer thread", err))
}

/// Drain the queue into `out` until every sender is gone.
fn write_payloads(mut out: impl Write, rx: HandoffReceiver<Bytes>) -> io::Result<u64> {
    let mut written = 0u64;
    while let Some(payload) = rx.recv() {
        out.write_all(&payload)?;
        out.flush()?;
        written += payload.len() as u64;
    }
    Ok(written)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use skylink_fragment::{Fragmenter, FragmenterConfig, StreamChunker};

    #[test]
    fn frame_intake_reassembles() {
        let mut intake = Intake::new(HeaderFormat::Frame, ReassemblerConfig::default());
        let mut fragmenter = Fragmenter::with_config(FragmenterConfig {
            max_chunk_payload: 4,
        });
        let chunks = fragmenter.fragment(&b"0123456789"[..], 0).unwrap();

        let mut out = Vec::new();
        for chunk in chunks.iter().rev() {
            out.extend(intake.push(chunk.to_bytes()));
        }
        assert_eq!(out, vec![Bytes::from_static(b"0123456789")]);

        let mut report = Report::new("receive");
        intake.fill_report(&mut report);
        assert_eq!(report.get("frames_completed"), Some(1));
        assert_eq!(report.get("frames_pending"), Some(0));
    }

    #[test]
    fn stream_intake_passes_payloads_through() {
        let mut intake = Intake::new(HeaderFormat::Stream, ReassemblerConfig::default());
        let mut chunker = StreamChunker::new();
        let chunks = chunker.chunk(&b"abc"[..], 1).unwrap();
        assert_eq!(
            intake.push(chunks[0].to_bytes()),
            Some(Bytes::from_static(b"abc"))
        );
        assert_eq!(intake.push(Bytes::from_static(b"short")), None);

        let mut report = Report::new("receive");
        intake.fill_report(&mut report);
        assert_eq!(report.get("malformed_chunks"), Some(1));
    }

    #[test]
    fn writer_drains_queue_in_order() {
        let (tx, rx) = bounded::<Bytes>(4);
        tx.offer(Bytes::from_static(b"ab")).unwrap();
        tx.offer(Bytes::from_static(b"cde")).unwrap();
        drop(tx);

        let mut out = Vec::new();
        assert_eq!(write_payloads(&mut out, rx).unwrap(), 5);
        assert_eq!(out, b"abcde");
    }
}
