use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use skylink_fragment::{HeaderFormat, DEFAULT_MAX_DATAGRAM};
use skylink_klv::{GpsPolicy, DEFAULT_ALTITUDE_M};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod klv;
mod link;
pub mod receive;
pub mod send;
pub mod telemetry;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode one telemetry sample as a KLV packet.
    Klv(KlvArgs),
    /// Decode KLV packets from a file.
    Decode(DecodeArgs),
    /// Fragment a file and send it over UDP.
    Send(SendArgs),
    /// Stream telemetry samples over UDP.
    Telemetry(TelemetryArgs),
    /// Receive chunks, reassemble them and write the payloads.
    Receive(ReceiveArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Klv(args) => klv::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Telemetry(args) => telemetry::run(args, format),
        Command::Receive(args) => receive::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Chunk header layout on the wire.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum HeaderArg {
    /// frame_id, total_chunks, chunk_id, type_tag, reserved.
    Frame,
    /// chunk_id and a microsecond timestamp.
    Stream,
}

impl From<HeaderArg> for HeaderFormat {
    fn from(arg: HeaderArg) -> Self {
        match arg {
            HeaderArg::Frame => HeaderFormat::Frame,
            HeaderArg::Stream => HeaderFormat::Stream,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum GpsPolicyArg {
    /// Write position only while the GPS has a fix.
    RequireFix,
    /// Always write position; substitute a default altitude when missing.
    DefaultAltitude,
}

/// Telemetry encoding options shared by `klv` and `telemetry`.
#[derive(Args, Debug, Clone)]
pub struct EncodeOptions {
    /// How position tags are emitted.
    #[arg(long, value_enum, default_value = "require-fix")]
    pub gps_policy: GpsPolicyArg,
    /// Altitude written under --gps-policy default-altitude when none is given.
    #[arg(long, value_name = "METERS", default_value_t = DEFAULT_ALTITUDE_M)]
    pub default_altitude: f64,
    /// Wrap packets in an MPEG transport stream.
    #[arg(long)]
    pub ts: bool,
}

impl EncodeOptions {
    pub fn policy(&self) -> GpsPolicy {
        match self.gps_policy {
            GpsPolicyArg::RequireFix => GpsPolicy::RequireFix,
            GpsPolicyArg::DefaultAltitude => GpsPolicy::DefaultAltitude {
                altitude_m: self.default_altitude,
            },
        }
    }
}

/// UDP destination and chunking options shared by `send` and `telemetry`.
#[derive(Args, Debug, Clone)]
pub struct LinkOptions {
    /// Destination address.
    #[arg(long, env = "SKYLINK_REMOTE", default_value = "127.0.0.1:5600")]
    pub to: String,
    /// Local address to send from.
    #[arg(long, env = "SKYLINK_LOCAL", default_value = "0.0.0.0:0")]
    pub bind: String,
    /// Chunk header layout.
    #[arg(long, value_enum, default_value = "frame")]
    pub header: HeaderArg,
    /// Largest datagram to emit, header included.
    #[arg(long, default_value_t = DEFAULT_MAX_DATAGRAM)]
    pub mtu: usize,
}

#[derive(Args, Debug)]
pub struct KlvArgs {
    /// Sample as a JSON object.
    #[arg(long, conflicts_with = "input")]
    pub sample: Option<String>,
    /// Read the sample from a file instead of stdin.
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,
    /// Write the encoded bytes to a file.
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,
    #[command(flatten)]
    pub encode: EncodeOptions,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// File holding KLV packets or a transport stream capture.
    pub input: PathBuf,
    /// Treat the input as a transport stream.
    #[arg(long)]
    pub ts: bool,
    /// PID carrying KLV when --ts is set (decimal or 0x-prefixed hex).
    #[arg(long, default_value = "0x0100", value_parser = parse_pid)]
    pub pid: u16,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// File to send.
    pub input: PathBuf,
    /// Treat the input as an H.264 Annex-B stream and send it unit by unit.
    #[arg(long)]
    pub video: bool,
    /// Video frames per second; 0 sends as fast as possible.
    #[arg(long, default_value_t = skylink_fragment::DEFAULT_VIDEO_FPS)]
    pub fps: u32,
    /// Parameter set resend interval (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub refresh_interval: String,
    /// Chunk type tag for non-video input with --header frame.
    #[arg(long, default_value_t = 0)]
    pub type_tag: u8,
    #[command(flatten)]
    pub link: LinkOptions,
}

#[derive(Args, Debug)]
pub struct TelemetryArgs {
    /// JSON lines file of samples; stdin when omitted.
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,
    /// Samples per second; 0 sends as fast as possible.
    #[arg(long, default_value_t = 10)]
    pub rate: u32,
    /// Chunk type tag for telemetry frames.
    #[arg(long, default_value_t = 0)]
    pub type_tag: u8,
    #[command(flatten)]
    pub encode: EncodeOptions,
    #[command(flatten)]
    pub link: LinkOptions,
}

#[derive(Args, Debug)]
pub struct ReceiveArgs {
    /// Address to listen on.
    #[arg(long, env = "SKYLINK_BIND", default_value = "0.0.0.0:5600")]
    pub bind: String,
    /// Chunk header layout.
    #[arg(long, value_enum, default_value = "frame")]
    pub header: HeaderArg,
    /// Write payloads to a file instead of stdout.
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,
    /// Exit after N frames (or stream chunks).
    #[arg(long)]
    pub count: Option<u64>,
    /// Stop after this long (e.g. 30s, 500ms).
    #[arg(long)]
    pub timeout: Option<String>,
    /// Partial frames tracked before the oldest is evicted.
    #[arg(long, default_value_t = skylink_fragment::DEFAULT_MAX_TRACKED_FRAMES)]
    pub max_tracked: usize,
    /// Drop partial frames older than this (e.g. 2s).
    #[arg(long)]
    pub max_age: Option<String>,
    /// Payloads queued for the writer before new ones are dropped.
    #[arg(long, default_value_t = 64)]
    pub queue: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

pub(crate) fn resolve_addr(input: &str) -> CliResult<SocketAddr> {
    input
        .to_socket_addrs()
        .map_err(|err| CliError::new(USAGE, format!("invalid address {input}: {err}")))?
        .next()
        .ok_or_else(|| CliError::new(USAGE, format!("address {input} did not resolve")))
}

fn parse_pid(input: &str) -> Result<u16, String> {
    let pid = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => input.parse(),
    }
    .map_err(|err| format!("invalid PID {input}: {err}"))?;
    if pid > 0x1FFF {
        return Err(format!("PID {input} exceeds 13 bits"));
    }
    Ok(pid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn parse_pid_accepts_hex_and_decimal() {
        assert_eq!(parse_pid("0x0100"), Ok(0x0100));
        assert_eq!(parse_pid("4096"), Ok(0x1000));
        assert!(parse_pid("0x2000").is_err());
        assert!(parse_pid("pid").is_err());
    }

    #[test]
    fn resolve_addr_loopback() {
        let addr = resolve_addr("127.0.0.1:5600").unwrap();
        assert_eq!(addr.port(), 5600);
        assert_eq!(resolve_addr("not an address").unwrap_err().code, USAGE);
    }

    #[test]
    fn default_altitude_policy_carries_value() {
        let options = EncodeOptions {
            gps_policy: GpsPolicyArg::DefaultAltitude,
            default_altitude: 42.0,
            ts: false,
        };
        assert_eq!(
            options.policy(),
            GpsPolicy::DefaultAltitude { altitude_m: 42.0 }
        );
    }
}
