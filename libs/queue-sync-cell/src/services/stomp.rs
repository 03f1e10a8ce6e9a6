//! Minimal STOMP 1.2 frame codec for the queue-update topic.
//!
//! Only the commands a subscribing client sends or receives are modelled.
//! Header values are escaped on every frame except `CONNECT` and
//! `CONNECTED`, which the protocol leaves unescaped.

use std::fmt;

use crate::error::QueueSyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StompCommand {
    Connect,
    Connected,
    Subscribe,
    Unsubscribe,
    Disconnect,
    Message,
    Receipt,
    Error,
}

impl StompCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            StompCommand::Connect => "CONNECT",
            StompCommand::Connected => "CONNECTED",
            StompCommand::Subscribe => "SUBSCRIBE",
            StompCommand::Unsubscribe => "UNSUBSCRIBE",
            StompCommand::Disconnect => "DISCONNECT",
            StompCommand::Message => "MESSAGE",
            StompCommand::Receipt => "RECEIPT",
            StompCommand::Error => "ERROR",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "CONNECT" | "STOMP" => StompCommand::Connect,
            "CONNECTED" => StompCommand::Connected,
            "SUBSCRIBE" => StompCommand::Subscribe,
            "UNSUBSCRIBE" => StompCommand::Unsubscribe,
            "DISCONNECT" => StompCommand::Disconnect,
            "MESSAGE" => StompCommand::Message,
            "RECEIPT" => StompCommand::Receipt,
            "ERROR" => StompCommand::Error,
            _ => return None,
        })
    }

    fn escapes_headers(&self) -> bool {
        !matches!(self, StompCommand::Connect | StompCommand::Connected)
    }
}

impl fmt::Display for StompCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StompFrame {
    pub command: StompCommand,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl StompFrame {
    pub fn new(command: StompCommand) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of `name`; repeated headers keep the earliest entry.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());

        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        if !self.body.is_empty() && self.get("content-length").is_none() {
            out.push_str(&format!("content-length:{}\n", self.body.len()));
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parse one frame. Heart-beats (bare end-of-line) yield `None`.
    pub fn parse(raw: &str) -> Result<Option<StompFrame>, QueueSyncError> {
        let frame = raw.trim_start_matches(['\r', '\n']);
        if frame.is_empty() || frame == "\0" {
            return Ok(None);
        }

        let (head, rest) = split_head(frame)
            .ok_or_else(|| QueueSyncError::Protocol("frame is missing its header terminator".to_string()))?;

        let mut lines = head.split('\n').map(|line| line.trim_end_matches('\r'));
        let command_line = lines.next().unwrap_or_default();
        let command = StompCommand::parse(command_line)
            .ok_or_else(|| QueueSyncError::Protocol(format!("unknown command '{}'", command_line)))?;

        let mut headers = Vec::new();
        for line in lines {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| QueueSyncError::Protocol(format!("malformed header '{}'", line)))?;
            if command.escapes_headers() {
                headers.push((unescape_header(name)?, unescape_header(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let content_length = headers
            .iter()
            .find(|(key, _)| key == "content-length")
            .and_then(|(_, value)| value.trim().parse::<usize>().ok());

        let body = match content_length {
            Some(len) => rest
                .get(..len)
                .ok_or_else(|| QueueSyncError::Protocol(format!("body shorter than content-length {}", len)))?,
            None => rest.split('\0').next().unwrap_or_default(),
        };

        Ok(Some(StompFrame {
            command,
            headers,
            body: body.to_string(),
        }))
    }
}

fn split_head(frame: &str) -> Option<(&str, &str)> {
    let lf = frame.find("\n\n").map(|idx| (idx, 2));
    let crlf = frame.find("\r\n\r\n").map(|idx| (idx, 4));

    let (idx, len) = match (lf, crlf) {
        (Some(a), Some(b)) => if b.0 < a.0 { b } else { a },
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => {
            // a frame with no headers and no body, e.g. "DISCONNECT\n\0"
            let trimmed = frame.trim_end_matches(['\0', '\n', '\r']);
            if trimmed.contains('\n') || trimmed.is_empty() {
                return None;
            }
            return Some((trimmed, ""));
        }
    };

    Some((&frame[..idx], &frame[idx + len..]))
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String, QueueSyncError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(QueueSyncError::Protocol(format!(
                    "invalid header escape '\\{}'",
                    other.map(String::from).unwrap_or_default()
                )))
            }
        }
    }
    Ok(out)
}
