use std::fs;

use bytes::Bytes;
use skylink_klv::{find_packets, DecodedTelemetry};
use skylink_ts::{TsDemux, PACKET_SIZE};
use tracing::{debug, warn};

use crate::cmd::DecodeArgs;
use crate::exit::{io_error, klv_error, ts_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_telemetry, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let data = fs::read(&args.input)
        .map_err(|err| io_error(&format!("failed reading {}", args.input.display()), err))?;

    let units = if args.ts {
        demux(&data, args.pid)?
    } else {
        vec![Bytes::from(data)]
    };

    let mut index = 0usize;
    for unit in &units {
        for set in find_packets(unit) {
            let telemetry = DecodedTelemetry::from_items(&set.items)
                .map_err(|err| klv_error(&format!("packet {index}"), err))?;
            print_telemetry(index, &telemetry, format);
            index += 1;
        }
    }

    if index == 0 {
        return Err(CliError::new(
            DATA_INVALID,
            format!("no KLV packets found in {}", args.input.display()),
        ));
    }
    Ok(SUCCESS)
}

fn demux(data: &[u8], pid: u16) -> CliResult<Vec<Bytes>> {
    if data.len() % PACKET_SIZE != 0 {
        warn!(
            len = data.len(),
            "capture is not a whole number of packets; ignoring the tail"
        );
    }

    let mut demux = TsDemux::new(pid);
    let mut units = Vec::new();
    for packet in data.chunks_exact(PACKET_SIZE) {
        if let Some(unit) = demux
            .push(packet)
            .map_err(|err| ts_error("demux failed", err))?
        {
            units.push(unit);
        }
    }
    units.extend(demux.finish());

    let stats = demux.stats();
    debug!(
        packets = stats.packets,
        units = stats.units,
        discontinuities = stats.discontinuities,
        "demultiplexed capture"
    );
    Ok(units)
}
