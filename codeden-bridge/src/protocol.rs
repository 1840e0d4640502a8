//! Wire format: one JSON object per line.
//!
//! Requests:  `{"id": 7, "method": "run", "params": {...}}`
//! Responses: `{"id": 7, "ok": ...}` or `{"id": 7, "error": "..."}`
//! Events:    `{"event": "terminal-data", "session": "...", "data": "..."}`

use std::collections::HashMap;
use std::path::PathBuf;

use codeden_core::{RunRequest, TerminalEvent};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outgoing {
    Ok { id: u64, ok: Value },
    Error { id: u64, error: String },
    Event(EventFrame),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum EventFrame {
    TerminalData { session: Uuid, data: String },
    TerminalExit { session: Uuid, code: Option<i32> },
}

/// Turns raw terminal output into text frames.
///
/// A read can end in the middle of a multi-byte character; that tail is held
/// per session until the next chunk completes it, or until the session exits.
#[derive(Debug, Default)]
pub struct EventDecoder {
    carry: HashMap<Uuid, Vec<u8>>,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, event: TerminalEvent) -> Vec<EventFrame> {
        match event {
            TerminalEvent::Output { session, data } => {
                let data = self.push(session, &data);
                if data.is_empty() {
                    return Vec::new();
                }
                vec![EventFrame::TerminalData { session, data }]
            }
            TerminalEvent::Exited { session, code } => {
                let mut frames = Vec::with_capacity(2);
                if let Some(rest) = self.carry.remove(&session) {
                    frames.push(EventFrame::TerminalData {
                        session,
                        data: String::from_utf8_lossy(&rest).into_owned(),
                    });
                }
                frames.push(EventFrame::TerminalExit { session, code });
                frames
            }
        }
    }

    fn push(&mut self, session: Uuid, data: &[u8]) -> String {
        let mut bytes = self.carry.remove(&session).unwrap_or_default();
        bytes.extend_from_slice(data);

        let mut text = String::with_capacity(bytes.len());
        let mut rest = &bytes[..];
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    text.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(bad) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[bad..];
                        }
                        None => {
                            // Incomplete sequence at the end; wait for more
                            self.carry.insert(session, after.to_vec());
                            break;
                        }
                    }
                }
            }
        }
        text
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NameParams {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SaveParams {
    #[serde(default)]
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PathParams {
    #[serde(default, alias = "exe", alias = "file")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WriteParams {
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResizeParams {
    pub cols: u16,
    pub rows: u16,
}

#[derive(Debug, Clone)]
pub enum Method {
    Run(RunRequest),
    RunExe(PathParams),
    TerminalStart,
    TerminalWrite(WriteParams),
    TerminalStop,
    TerminalExport,
    TerminalResize(ResizeParams),
    TerminalSave(NameParams),
    TerminalSaveSilent(NameParams),
    SaveFile(SaveParams),
    SaveFileSilent(SaveParams),
    OpenFile(PathParams),
    Languages,
    Shutdown,
}

fn params<T: DeserializeOwned>(value: Value) -> Result<T, String> {
    // Missing params mean "all defaults"
    let value = if value.is_null() {
        Value::Object(Default::default())
    } else {
        value
    };
    serde_json::from_value(value).map_err(|e| format!("invalid params: {}", e))
}

impl Method {
    pub fn parse(method: &str, value: Value) -> Result<Self, String> {
        let parsed = match method {
            "run" | "run-code" => Method::Run(params(value)?),
            "run-exe" => Method::RunExe(params(value)?),
            "terminal-start" => Method::TerminalStart,
            "terminal-write" => Method::TerminalWrite(params(value)?),
            "terminal-stop" => Method::TerminalStop,
            "terminal-export" => Method::TerminalExport,
            "terminal-resize" => Method::TerminalResize(params(value)?),
            "terminal-save" => Method::TerminalSave(params(value)?),
            "terminal-save-silent" => Method::TerminalSaveSilent(params(value)?),
            "save-file" => Method::SaveFile(params(value)?),
            "save-file-silent" => Method::SaveFileSilent(params(value)?),
            "open-file" => Method::OpenFile(params(value)?),
            "languages" => Method::Languages,
            "shutdown" => Method::Shutdown,
            other => return Err(format!("unknown method: {}", other)),
        };
        Ok(parsed)
    }

    /// Handled in line, in arrival order. Everything else may overlap.
    pub fn is_ordered(&self) -> bool {
        matches!(
            self,
            Method::TerminalStart
                | Method::TerminalWrite(_)
                | Method::TerminalStop
                | Method::TerminalExport
                | Method::TerminalResize(_)
                | Method::Languages
                | Method::Shutdown
        )
    }
}

pub fn encode(message: &Outgoing) -> String {
    serde_json::to_string(message).unwrap_or_else(|e| {
        format!(r#"{{"error":"encode failed: {}"}}"#, e)
    })
}
