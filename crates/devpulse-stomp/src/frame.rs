// STOMP 1.2 frames
//
//   COMMAND\n
//   header:value\n
//   ...\n
//   \n
//   body\0
//
// Header values are escaped (\\ \n \r \c) in every frame except CONNECT and
// CONNECTED. A body is read up to content-length bytes when the header is
// present, otherwise up to the first NUL. Bare EOLs between frames are
// heart-beats and are skipped.

use thiserror::Error;

pub const CONNECT: &str = "CONNECT";
pub const CONNECTED: &str = "CONNECTED";
pub const SUBSCRIBE: &str = "SUBSCRIBE";
pub const DISCONNECT: &str = "DISCONNECT";
pub const MESSAGE: &str = "MESSAGE";
pub const RECEIPT: &str = "RECEIPT";
pub const ERROR: &str = "ERROR";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame has no command")]
    MissingCommand,

    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),

    #[error("invalid escape sequence in header: {0:?}")]
    InvalidEscape(String),

    #[error("invalid content-length: {0:?}")]
    InvalidContentLength(String),

    #[error("frame is not terminated by NUL")]
    Unterminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StompFrame {
    pub command: String,
    /// In wire order; repeated names are kept, the first one wins on lookup
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl StompFrame {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
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

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// CONNECT for STOMP 1.2 without heart-beating
    pub fn connect(host: &str) -> Self {
        Self::new(CONNECT)
            .with_header("accept-version", "1.2")
            .with_header("host", host)
            .with_header("heart-beat", "0,0")
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self::new(SUBSCRIBE)
            .with_header("id", id)
            .with_header("destination", destination)
            .with_header("ack", "auto")
    }

    pub fn disconnect() -> Self {
        Self::new(DISCONNECT)
    }

    fn escapes_headers(&self) -> bool {
        self.command != CONNECT && self.command != CONNECTED
    }

    /// Wire form, NUL terminator included
    pub fn encode(&self) -> String {
        let escape = self.escapes_headers();
        let mut out = String::with_capacity(self.command.len() + self.body.len() + 64);
        out.push_str(&self.command);
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
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }
}

/// Parse every frame in one WebSocket message
pub fn parse_all(text: &str) -> Result<Vec<StompFrame>, FrameError> {
    let mut frames = Vec::new();
    let mut rest = text;
    loop {
        rest = rest.trim_start_matches(['\r', '\n']);
        if rest.is_empty() {
            return Ok(frames);
        }
        let (frame, remainder) = parse_one(rest)?;
        frames.push(frame);
        rest = remainder;
    }
}

fn parse_one(input: &str) -> Result<(StompFrame, &str), FrameError> {
    let (command, mut rest) = split_line(input).ok_or(FrameError::Unterminated)?;
    if command.is_empty() {
        return Err(FrameError::MissingCommand);
    }
    let mut frame = StompFrame::new(command);
    let escape = frame.escapes_headers();

    loop {
        let (line, remainder) = split_line(rest).ok_or(FrameError::Unterminated)?;
        rest = remainder;
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| FrameError::MalformedHeader(line.to_string()))?;
        let (name, value) = if escape {
            (unescape_header(name)?, unescape_header(value)?)
        } else {
            (name.to_string(), value.to_string())
        };
        frame.headers.push((name, value));
    }

    let (body, remainder) = match frame.header("content-length") {
        Some(raw) => {
            let len: usize = raw
                .trim()
                .parse()
                .map_err(|_| FrameError::InvalidContentLength(raw.to_string()))?;
            let body = rest
                .get(..len)
                .ok_or_else(|| FrameError::InvalidContentLength(raw.to_string()))?;
            let after = &rest[len..];
            let after = after.strip_prefix('\0').ok_or(FrameError::Unterminated)?;
            (body, after)
        }
        None => {
            let end = rest.find('\0').ok_or(FrameError::Unterminated)?;
            (&rest[..end], &rest[end + 1..])
        }
    };
    frame.body = body.to_string();
    Ok((frame, remainder))
}

/// Split off one EOL-terminated line (`\n` or `\r\n`)
fn split_line(input: &str) -> Option<(&str, &str)> {
    let end = input.find('\n')?;
    let line = &input[..end];
    Some((line.strip_suffix('\r').unwrap_or(line), &input[end + 1..]))
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String, FrameError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            _ => return Err(FrameError::InvalidEscape(raw.to_string())),
        }
    }
    Ok(out)
}
