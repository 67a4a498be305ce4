use std::fmt;
use std::net::Ipv4Addr;

#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    Mx,
    A,
    Txt,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mx => f.write_str("MX"),
            Self::A => f.write_str("A"),
            Self::Txt => f.write_str("TXT"),
        }
    }
}

#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MxRecord {
    pub preference: u16,
    pub exchange: String,
}

impl MxRecord {
    pub fn new(preference: u16, exchange: impl Into<String>) -> Self {
        Self {
            preference,
            exchange: exchange.into(),
        }
    }
}

/// Answers for one `(name, type)` query. Each variant only ever holds
/// records of its own type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordSet {
    Mx(Vec<MxRecord>),
    A(Vec<Ipv4Addr>),
    /// One string per TXT record, segments already concatenated.
    Txt(Vec<String>),
}

impl RecordSet {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Mx(records) => records.is_empty(),
            Self::A(records) => records.is_empty(),
            Self::Txt(records) => records.is_empty(),
        }
    }

    pub fn record_type(&self) -> RecordType {
        match self {
            Self::Mx(_) => RecordType::Mx,
            Self::A(_) => RecordType::A,
            Self::Txt(_) => RecordType::Txt,
        }
    }
}

/// Result of [`DnsResolver::resolve`](super::DnsResolver::resolve).
///
/// `TimedOut` is kept apart from `NotFound` for logging only; every helper on
/// the resolver treats both as absence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(RecordSet),
    NotFound,
    TimedOut,
}

impl Resolution {
    pub fn records(&self) -> Option<&RecordSet> {
        match self {
            Self::Found(records) => Some(records),
            Self::NotFound | Self::TimedOut => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}
