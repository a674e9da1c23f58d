use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use wimaxll_frame::Notification;

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

/// One received notification, flattened for printing.
#[derive(Serialize, Debug, PartialEq)]
pub struct EventOutput {
    pub device: String,
    pub pipe: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ifindex: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    pub timestamp: String,
}

impl EventOutput {
    pub fn new(device: &str, pipe: &str, notification: &Notification) -> Self {
        let mut out = Self {
            device: device.to_string(),
            pipe: pipe.to_string(),
            kind: notification.kind_name(),
            ifindex: notification.ifindex(),
            old_state: None,
            new_state: None,
            seq: None,
            code: None,
            payload_size: None,
            payload: None,
            timestamp: now_unix_seconds(),
        };
        match notification {
            Notification::MsgToUser { data, .. } => {
                out.payload_size = Some(data.len());
                out.payload = Some(payload_preview(data));
            }
            Notification::StateChange { old, new, .. } => {
                out.old_state = Some(old.to_string());
                out.new_state = Some(new.to_string());
            }
            Notification::Ack { seq, error } => {
                out.seq = Some(*seq);
                out.code = Some(*error);
            }
            Notification::Other { .. } => {}
        }
        out
    }

    fn summary(&self) -> String {
        match (&self.old_state, &self.new_state, &self.payload, self.code) {
            (Some(old), Some(new), _, _) => format!("{old} -> {new}"),
            (_, _, Some(payload), _) => payload.clone(),
            (_, _, _, Some(code)) => format!("seq={} code={code}", self.seq.unwrap_or(0)),
            _ => String::new(),
        }
    }
}

pub fn print_event(event: &EventOutput, raw_payload: Option<&[u8]>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(event),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DEVICE", "PIPE", "EVENT", "DETAIL"])
                .add_row(vec![
                    event.device.clone(),
                    event.pipe.clone(),
                    event.kind.to_string(),
                    event.summary(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "device={} pipe={} event={} {}",
                event.device,
                event.pipe,
                event.kind,
                event.summary()
            );
        }
        OutputFormat::Raw => match raw_payload {
            Some(data) => print_raw(data),
            None => println!("{}", event.summary()),
        },
    }
}

/// Print `rows` of (key, value) pairs as a two-column table.
pub fn print_table(rows: &[(&str, String)]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["FIELD", "VALUE"]);
    for (key, value) in rows {
        table.add_row(vec![key.to_string(), value.clone()]);
    }
    println!("{table}");
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
