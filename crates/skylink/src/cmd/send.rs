use std::fs;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use skylink_fragment::{
    nal_kind, split_annex_b, NalKind, PacerConfig, RefreshConfig, VideoScheduler,
};
use skylink_transport::{DatagramSender, DatagramSink, SenderConfig};
use tracing::info;

use crate::cmd::link::{now_micros, ChunkLink};
use crate::cmd::{parse_duration, resolve_addr, SendArgs};
use crate::exit::{io_error, transport_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{OutputFormat, Report};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let remote = resolve_addr(&args.link.to)?;
    let local = resolve_addr(&args.link.bind)?;
    let data = fs::read(&args.input)
        .map_err(|err| io_error(&format!("failed reading {}", args.input.display()), err))?;
    if data.is_empty() {
        return Err(CliError::new(
            DATA_INVALID,
            format!("{} is empty", args.input.display()),
        ));
    }

    let mut link = ChunkLink::new(args.link.header.into(), args.link.mtu)?;
    let mut sender = DatagramSender::connect(local, remote, SenderConfig::default())
        .map_err(|err| transport_error("socket setup failed", err))?;

    let mut report = Report::new("send");
    if args.video {
        let scheduler = VideoScheduler::new(
            PacerConfig { fps: args.fps },
            RefreshConfig {
                interval: parse_duration(&args.refresh_interval)?,
            },
        );
        let video = send_video(&mut link, &mut sender, scheduler, Bytes::from(data), args.fps)?;
        video.fill_report(&mut report);
    } else {
        link.send(&mut sender, Bytes::from(data), args.type_tag, now_micros())?;
    }

    link.fill_report(&mut report);
    let stats = sender.stats();
    report
        .add("packets_sent", stats.packets_sent)
        .add("bytes_sent", stats.bytes_sent)
        .add("send_errors", stats.send_errors);
    info!(%remote, packets = stats.packets_sent, "send finished");
    report.print(format);

    Ok(SUCCESS)
}

struct VideoReport {
    units: u64,
    stats: skylink_fragment::VideoStats,
}

impl VideoReport {
    fn fill_report(&self, report: &mut Report) {
        report
            .add("nal_units", self.units)
            .add("frames_forwarded", self.stats.frames_forwarded)
            .add("frames_rate_limited", self.stats.frames_rate_limited)
            .add("parameter_sets", self.stats.parameter_sets)
            .add("refreshes", self.stats.refreshes);
    }
}

/// Replay an Annex-B stream unit by unit at `fps`.
fn send_video(
    link: &mut ChunkLink,
    sink: &mut impl DatagramSink,
    mut scheduler: VideoScheduler,
    stream: Bytes,
    fps: u32,
) -> CliResult<VideoReport> {
    let units = split_annex_b(&stream);
    if units.is_empty() {
        return Err(CliError::new(DATA_INVALID, "no Annex-B start codes found"));
    }
    let frame_interval = (fps > 0).then(|| Duration::from_secs(1) / fps);

    let total = units.len() as u64;
    for unit in units {
        let out = scheduler.schedule(unit, Instant::now());
        let paced = out
            .last()
            .is_some_and(|u| !nal_kind(u).is_some_and(NalKind::is_parameter_set));
        for unit in out {
            link.send_video(sink, unit, now_micros())?;
        }
        if let (true, Some(interval)) = (paced, frame_interval) {
            thread::sleep(interval);
        }
    }

    Ok(VideoReport {
        units: total,
        stats: scheduler.stats(),
    })
}
