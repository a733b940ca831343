//! Engine IPC wire protocol
//!
//! The engine speaks newline-delimited JSON over a local socket: each
//! message is one JSON object terminated by `\n`. Outbound commands are
//! `{"command": [tokens...]}` where tokens are strings, numbers, or
//! booleans. Inbound messages are property-change notifications, an
//! end-of-media marker, or extension messages from engine-side scripts.

use serde::{Deserialize, Serialize};

/// A single command/property token
///
/// Closed tagged union covering every value the engine accepts in command
/// lists and reports in property data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireValue {
    Bool(bool),
    Int(i64),
    Num(f64),
    Str(String),
}

impl WireValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            WireValue::Int(n) => Some(*n as f64),
            WireValue::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            WireValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            WireValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Track ids arrive either as numbers or as the string "no"
    /// (track disabled). Returns None for "no"/"auto".
    pub fn as_track_id(&self) -> Option<i64> {
        match self {
            WireValue::Int(n) => Some(*n),
            WireValue::Num(n) => Some(*n as i64),
            WireValue::Str(s) if s == "no" || s == "auto" => None,
            WireValue::Str(s) => s.parse().ok(),
            WireValue::Bool(_) => None,
        }
    }
}

impl From<&str> for WireValue {
    fn from(s: &str) -> Self {
        WireValue::Str(s.to_string())
    }
}

impl From<String> for WireValue {
    fn from(s: String) -> Self {
        WireValue::Str(s)
    }
}

impl From<f64> for WireValue {
    fn from(n: f64) -> Self {
        WireValue::Num(n)
    }
}

impl From<i64> for WireValue {
    fn from(n: i64) -> Self {
        WireValue::Int(n)
    }
}

impl From<bool> for WireValue {
    fn from(b: bool) -> Self {
        WireValue::Bool(b)
    }
}

/// Outbound command envelope: `{"command": [tokens...]}`
#[derive(Debug, Clone, Serialize)]
pub struct Command {
    pub command: Vec<WireValue>,
}

impl Command {
    pub fn new(tokens: Vec<WireValue>) -> Self {
        Self { command: tokens }
    }

    /// Serialize to one newline-terminated JSON line
    pub fn to_line(&self) -> String {
        // Command is a plain struct of closed types; serialization cannot fail
        let mut line = serde_json::to_string(self).unwrap_or_default();
        line.push('\n');
        line
    }
}

/// Inbound message, one per line
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    /// `{"event": "property-change", "name": ..., "data": ...}`
    PropertyChange {
        name: String,
        data: Option<WireValue>,
    },
    /// `{"event": "end-file"}` — the engine reached end of media
    EndFile,
    /// `{"event": "client-message", "args": [name, ...]}` — engine-side
    /// script extension protocol
    ClientMessage { args: Vec<String> },
    /// Any other event or reply; logged and ignored
    Other,
}

/// Raw inbound JSON shape used for parsing
#[derive(Debug, Deserialize)]
struct RawEngineMessage {
    event: Option<String>,
    name: Option<String>,
    data: Option<WireValue>,
    args: Option<Vec<String>>,
}

/// Parse one line of engine output
///
/// Returns None for lines that are not valid JSON objects (the engine can
/// emit partial lines during shutdown).
pub fn parse_line(line: &str) -> Option<EngineMessage> {
    let raw: RawEngineMessage = serde_json::from_str(line).ok()?;
    let message = match raw.event.as_deref() {
        Some("property-change") => EngineMessage::PropertyChange {
            name: raw.name?,
            data: raw.data,
        },
        Some("end-file") => EngineMessage::EndFile,
        Some("client-message") => EngineMessage::ClientMessage {
            args: raw.args.unwrap_or_default(),
        },
        _ => EngineMessage::Other,
    };
    Some(message)
}

/// Properties observed on every connection
///
/// The set is fixed; observe ids are stable so property-change routing
/// needs no per-connection table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservedProperty {
    Position,
    Duration,
    Pause,
    AudioTrack,
    SubtitleTrack,
    Buffering,
    Volume,
    Mute,
}

impl ObservedProperty {
    pub const ALL: [ObservedProperty; 8] = [
        ObservedProperty::Position,
        ObservedProperty::Duration,
        ObservedProperty::Pause,
        ObservedProperty::AudioTrack,
        ObservedProperty::SubtitleTrack,
        ObservedProperty::Buffering,
        ObservedProperty::Volume,
        ObservedProperty::Mute,
    ];

    /// Engine-side property name
    pub fn name(&self) -> &'static str {
        match self {
            ObservedProperty::Position => "time-pos",
            ObservedProperty::Duration => "duration",
            ObservedProperty::Pause => "pause",
            ObservedProperty::AudioTrack => "aid",
            ObservedProperty::SubtitleTrack => "sid",
            ObservedProperty::Buffering => "paused-for-cache",
            ObservedProperty::Volume => "volume",
            ObservedProperty::Mute => "mute",
        }
    }

    /// Stable observe id sent with the subscription command
    pub fn observe_id(&self) -> i64 {
        match self {
            ObservedProperty::Position => 1,
            ObservedProperty::Duration => 2,
            ObservedProperty::Pause => 3,
            ObservedProperty::AudioTrack => 4,
            ObservedProperty::SubtitleTrack => 5,
            ObservedProperty::Buffering => 6,
            ObservedProperty::Volume => 7,
            ObservedProperty::Mute => 8,
        }
    }

    /// Reverse lookup from the engine-side name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }

    /// The `observe_property` command for this property
    pub fn observe_command(&self) -> Command {
        Command::new(vec![
            WireValue::from("observe_property"),
            WireValue::from(self.observe_id()),
            WireValue::from(self.name()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_serialization() {
        let cmd = Command::new(vec![
            WireValue::from("seek"),
            WireValue::from(42.5),
            WireValue::from("absolute"),
        ]);
        assert_eq!(cmd.to_line(), "{\"command\":[\"seek\",42.5,\"absolute\"]}\n");
    }

    #[test]
    fn test_command_mixed_tokens() {
        let cmd = Command::new(vec![
            WireValue::from("set_property"),
            WireValue::from("pause"),
            WireValue::from(true),
        ]);
        assert_eq!(
            cmd.to_line(),
            "{\"command\":[\"set_property\",\"pause\",true]}\n"
        );
    }

    #[test]
    fn test_parse_property_change() {
        let msg = parse_line(r#"{"event":"property-change","name":"time-pos","data":12.5}"#)
            .unwrap();
        assert_eq!(
            msg,
            EngineMessage::PropertyChange {
                name: "time-pos".to_string(),
                data: Some(WireValue::Num(12.5)),
            }
        );
    }

    #[test]
    fn test_parse_property_change_null_data() {
        let msg = parse_line(r#"{"event":"property-change","name":"duration","data":null}"#)
            .unwrap();
        assert_eq!(
            msg,
            EngineMessage::PropertyChange {
                name: "duration".to_string(),
                data: None,
            }
        );
    }

    #[test]
    fn test_parse_end_file() {
        let msg = parse_line(r#"{"event":"end-file"}"#).unwrap();
        assert_eq!(msg, EngineMessage::EndFile);
    }

    #[test]
    fn test_parse_client_message() {
        let msg =
            parse_line(r#"{"event":"client-message","args":["osc-idlescreen","no"]}"#).unwrap();
        assert_eq!(
            msg,
            EngineMessage::ClientMessage {
                args: vec!["osc-idlescreen".to_string(), "no".to_string()],
            }
        );
    }

    #[test]
    fn test_parse_unknown_event() {
        let msg = parse_line(r#"{"event":"file-loaded"}"#).unwrap();
        assert_eq!(msg, EngineMessage::Other);
    }

    #[test]
    fn test_parse_reply_without_event() {
        // Command replies carry "error"/"data" but no "event"
        let msg = parse_line(r#"{"error":"success","data":null}"#).unwrap();
        assert_eq!(msg, EngineMessage::Other);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_line("not json").is_none());
        assert!(parse_line("").is_none());
    }

    #[test]
    fn test_track_id_parsing() {
        assert_eq!(WireValue::Num(2.0).as_track_id(), Some(2));
        assert_eq!(WireValue::Str("no".to_string()).as_track_id(), None);
        assert_eq!(WireValue::Str("auto".to_string()).as_track_id(), None);
        assert_eq!(WireValue::Str("3".to_string()).as_track_id(), Some(3));
        assert_eq!(WireValue::Bool(false).as_track_id(), None);
    }

    #[test]
    fn test_observed_property_roundtrip() {
        for prop in ObservedProperty::ALL {
            assert_eq!(ObservedProperty::from_name(prop.name()), Some(prop));
        }
        assert_eq!(ObservedProperty::from_name("no-such-prop"), None);
    }

    #[test]
    fn test_observe_ids_unique() {
        let mut ids: Vec<i64> = ObservedProperty::ALL.iter().map(|p| p.observe_id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), ObservedProperty::ALL.len());
    }

    #[test]
    fn test_observe_command_shape() {
        let line = ObservedProperty::Position.observe_command().to_line();
        assert_eq!(line, "{\"command\":[\"observe_property\",1,\"time-pos\"]}\n");
    }
}
