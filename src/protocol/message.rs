use std::{fmt, str::FromStr};

use chrono::NaiveDateTime;

pub const DISCONNECT: &str = "!DISCONNECT";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const FIELD_SEPARATOR: char = ';';

pub type Plate = String;
pub type Timestamp = NaiveDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Entry,
    Exit,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Entry => "ENTRY",
            EventKind::Exit => "EXIT",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Booth identifier exactly as it was received on the wire.
///
/// It is only interpreted as a number when a fee has to be computed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoothId(String);

impl BoothId {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn number(&self) -> Result<i64, std::num::ParseIntError> {
        self.0.trim().parse()
    }
}

impl From<&str> for BoothId {
    fn from(token: &str) -> Self {
        Self(token.into())
    }
}

impl From<u32> for BoothId {
    fn from(id: u32) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for BoothId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub plate: Plate,
    pub timestamp: Timestamp,
    pub booth: BoothId,
}

impl Event {
    pub fn entry(plate: impl Into<Plate>, timestamp: Timestamp, booth: impl Into<BoothId>) -> Self {
        Self {
            kind: EventKind::Entry,
            plate: plate.into(),
            timestamp,
            booth: booth.into(),
        }
    }

    pub fn exit(plate: impl Into<Plate>, timestamp: Timestamp, booth: impl Into<BoothId>) -> Self {
        Self {
            kind: EventKind::Exit,
            plate: plate.into(),
            timestamp,
            booth: booth.into(),
        }
    }
}

// Encodes the event as a single record, without the line terminator
impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}",
            self.kind,
            self.plate,
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.booth,
            sep = FIELD_SEPARATOR
        )
    }
}

impl FromStr for Event {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.trim().split(FIELD_SEPARATOR).collect();
        let [kind, plate, timestamp, booth] = fields[..] else {
            return Err(DecodeError::FieldCount(fields.len()));
        };

        let timestamp = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
            .map_err(|err| DecodeError::Timestamp(timestamp.into(), err))?;

        // type is case insensitive
        let kind = match kind.to_uppercase().as_str() {
            "ENTRY" => EventKind::Entry,
            "EXIT" => EventKind::Exit,
            _ => return Err(DecodeError::UnknownType(kind.into())),
        };

        Ok(Self {
            kind,
            plate: plate.into(),
            timestamp,
            booth: BoothId::new(booth),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Event(Event),
    Disconnect,
}

impl FromStr for Message {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // the control token has no separators, so it must be checked before splitting
        if s.trim() == DISCONNECT {
            return Ok(Self::Disconnect);
        }

        s.parse().map(Self::Event)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Event(event) => event.fmt(f),
            Message::Disconnect => f.write_str(DISCONNECT),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum DecodeError {
    #[error("expected 4 fields, found {0}")]
    FieldCount(usize),

    #[error("invalid timestamp \"{0}\": {1}")]
    Timestamp(String, chrono::ParseError),

    #[error("unknown message type: {0}")]
    UnknownType(String),

    #[error("{0}")]
    Utf8(#[from] std::str::Utf8Error),
}

impl DecodeError {
    /// Returns true if the record is malformed,
    /// as opposed to a well-formed record of an unknown type.
    pub fn is_framing(&self) -> bool {
        !matches!(self, DecodeError::UnknownType(_))
    }
}
