use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::{Map, Value};
use skylink_klv::DecodedTelemetry;

const SCHEMA_BASE: &str = "https://schemas.skylink-uav.dev/cli/v1";

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct PacketOutput<'a> {
    schema_id: String,
    kind: &'a str,
    size: usize,
    hex: String,
}

/// Print an encoded packet (KLV, or TS-wrapped KLV).
pub fn print_packet(kind: &str, data: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = PacketOutput {
                schema_id: schema_id("encoded-packet"),
                kind,
                size: data.len(),
                hex: hex(data),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "SIZE", "HEX"])
                .add_row(vec![kind.to_string(), data.len().to_string(), hex(data)]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{kind} size={} {}", data.len(), hex(data)),
        OutputFormat::Raw => print_raw(data),
    }
}

#[derive(Serialize)]
struct TelemetryOutput<'a> {
    schema_id: String,
    index: usize,
    #[serde(flatten)]
    telemetry: &'a DecodedTelemetry,
}

/// Print one decoded packet.
pub fn print_telemetry(index: usize, telemetry: &DecodedTelemetry, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = TelemetryOutput {
                schema_id: schema_id("decoded-telemetry"),
                index,
                telemetry,
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            table.add_row(vec!["packet".to_string(), index.to_string()]);
            for (field, value) in telemetry_fields(telemetry) {
                table.add_row(vec![field, value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            let fields: Vec<String> = telemetry_fields(telemetry)
                .into_iter()
                .map(|(field, value)| format!("{field}={value}"))
                .collect();
            println!("packet={index} {}", fields.join(" "));
        }
    }
}

/// Counter report printed when a command finishes.
#[derive(Debug, Default)]
pub struct Report {
    name: &'static str,
    entries: Vec<(&'static str, u64)>,
}

impl Report {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, key: &'static str, value: u64) -> &mut Self {
        self.entries.push((key, value));
        self
    }

    pub fn get(&self, key: &str) -> Option<u64> {
        self.entries
            .iter()
            .find_map(|(k, v)| (*k == key).then_some(*v))
    }

    pub fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Json => {
                let mut stats = Map::new();
                for (key, value) in &self.entries {
                    stats.insert((*key).to_string(), Value::from(*value));
                }
                let mut out = Map::new();
                out.insert(
                    "schema_id".to_string(),
                    Value::from(schema_id(&format!("{}-report", self.name))),
                );
                out.insert("command".to_string(), Value::from(self.name));
                out.insert("stats".to_string(), Value::Object(stats));
                Value::Object(out).to_string()
            }
            OutputFormat::Table => {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(vec!["COUNTER", "VALUE"]);
                for (key, value) in &self.entries {
                    table.add_row(vec![key.to_string(), value.to_string()]);
                }
                table.to_string()
            }
            OutputFormat::Pretty | OutputFormat::Raw => {
                let fields: Vec<String> = self
                    .entries
                    .iter()
                    .map(|(key, value)| format!("{key}={value}"))
                    .collect();
                format!("{}: {}", self.name, fields.join(" "))
            }
        }
    }

    pub fn print(&self, format: OutputFormat) {
        println!("{}", self.render(format));
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

fn schema_id(name: &str) -> String {
    format!("{SCHEMA_BASE}/{name}.schema.json")
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn telemetry_fields(t: &DecodedTelemetry) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    let mut push = |name: &str, value: Option<String>| {
        if let Some(value) = value {
            fields.push((name.to_string(), value));
        }
    };
    push("timestamp_us", t.timestamp_us.map(|v| v.to_string()));
    push("latitude", t.latitude.map(|v| format!("{v:.7}")));
    push("longitude", t.longitude.map(|v| format!("{v:.7}")));
    push("altitude", t.altitude.map(|v| format!("{v:.1}")));
    push("roll", t.roll.map(|v| format!("{v:.3}")));
    push("pitch", t.pitch.map(|v| format!("{v:.3}")));
    push("heading", t.heading.map(|v| format!("{v:.3}")));
    push("horizontal_fov", t.horizontal_fov.map(|v| format!("{v:.3}")));
    push("vertical_fov", t.vertical_fov.map(|v| format!("{v:.3}")));
    push("gimbal_roll", t.gimbal_roll.map(|v| format!("{v:.3}")));
    push("gimbal_pitch", t.gimbal_pitch.map(|v| format!("{v:.3}")));
    push("gimbal_yaw", t.gimbal_yaw.map(|v| format!("{v:.3}")));
    push("sensor_width_mm", t.sensor_width_mm.map(|v| v.to_string()));
    push("sensor_height_mm", t.sensor_height_mm.map(|v| v.to_string()));
    push("focal_length_mm", t.focal_length_mm.map(|v| v.to_string()));
    for item in &t.unknown {
        fields.push((format!("tag_{}", item.tag), hex(&item.value)));
    }
    fields
}
