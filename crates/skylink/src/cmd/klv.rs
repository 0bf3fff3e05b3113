use std::fs;
use std::io::Read;

use skylink_klv::{TelemetryEncoder, TelemetrySample};
use skylink_ts::TsWrapper;

use crate::cmd::KlvArgs;
use crate::exit::{io_error, klv_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_packet, OutputFormat, Report};

pub fn run(args: KlvArgs, format: OutputFormat) -> CliResult<i32> {
    let json = read_sample_json(&args)?;
    let sample: TelemetrySample = serde_json::from_str(&json)
        .map_err(|err| CliError::new(DATA_INVALID, format!("invalid sample JSON: {err}")))?;

    let mut encoder = TelemetryEncoder::new(args.encode.policy());
    let packet = encoder
        .encode(&sample)
        .map_err(|err| klv_error("encode failed", err))?;

    let (kind, bytes) = if args.encode.ts {
        ("ts", TsWrapper::new().wrap(&packet))
    } else {
        ("klv", packet)
    };

    match &args.output {
        Some(path) => {
            fs::write(path, &bytes)
                .map_err(|err| io_error(&format!("failed writing {}", path.display()), err))?;
            let mut report = Report::new("klv");
            report.add("bytes_written", bytes.len() as u64);
            report.print(format);
        }
        None => print_packet(kind, &bytes, format),
    }

    Ok(SUCCESS)
}

fn read_sample_json(args: &KlvArgs) -> CliResult<String> {
    if let Some(sample) = &args.sample {
        return Ok(sample.clone());
    }
    if let Some(path) = &args.input {
        return fs::read_to_string(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    let mut json = String::new();
    std::io::stdin()
        .read_to_string(&mut json)
        .map_err(|err| io_error("failed reading stdin", err))?;
    Ok(json)
}
