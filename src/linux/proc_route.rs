//! Reader for the `/proc/net/route` text table.
//!
//! One header line, then one whitespace separated record per route:
//!
//! ```text
//! Iface  Destination  Gateway  Flags  RefCnt  Use  Metric  Mask  MTU  Window  IRTT
//! ```
//!
//! Addresses and flags are hexadecimal, the address words being the
//! network-order bytes printed as a native-endian integer. The counters
//! are decimal.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use crate::{IfName, ParseTruncation, RecordError, RouteEntry, RouteError};

pub const PROC_NET_ROUTE: &str = "/proc/net/route";

const RTF_UP: u32 = libc::RTF_UP as u32;

/// What to do with a record that cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MalformedLine {
    /// End the listing at the first bad record.
    #[default]
    Stop,
    /// Skip the bad record and keep reading.
    Skip,
}

/// Settings for reading the route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    pub(crate) path: PathBuf,
    pub(crate) on_malformed: MalformedLine,
}
impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(PROC_NET_ROUTE),
            on_malformed: MalformedLine::default(),
        }
    }
}
impl ReaderConfig {
    pub fn path(&self) -> &Path {
        &self.path
    }
    pub fn on_malformed(&self) -> MalformedLine {
        self.on_malformed
    }
    /// Reads the table from another file, e.g. a saved copy.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }
    pub fn with_on_malformed(mut self, on_malformed: MalformedLine) -> Self {
        self.on_malformed = on_malformed;
        self
    }
}

/// Active routes read from the kernel table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteList {
    pub(crate) entries: Vec<RouteEntry>,
    pub(crate) truncation: Option<ParseTruncation>,
    pub(crate) skipped: usize,
}
impl RouteList {
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }
    pub fn into_entries(self) -> Vec<RouteEntry> {
        self.entries
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, RouteEntry> {
        self.entries.iter()
    }
    /// Set when reading stopped at an unparseable or unreadable line; the
    /// listing may then be incomplete.
    pub fn truncation(&self) -> Option<&ParseTruncation> {
        self.truncation.as_ref()
    }
    pub fn is_truncated(&self) -> bool {
        self.truncation.is_some()
    }
    /// Number of unparseable records passed over under [`MalformedLine::Skip`].
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
impl IntoIterator for RouteList {
    type Item = RouteEntry;
    type IntoIter = std::vec::IntoIter<RouteEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
impl<'a> IntoIterator for &'a RouteList {
    type Item = &'a RouteEntry;
    type IntoIter = std::slice::Iter<'a, RouteEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// One parsed record: the entry plus the kernel's route flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ProcRecord {
    pub(crate) entry: RouteEntry,
    pub(crate) flags: u32,
}
impl ProcRecord {
    pub(crate) fn is_up(&self) -> bool {
        self.flags & RTF_UP != 0
    }
}

pub(crate) fn read_route_file(config: &ReaderConfig, max_entries: usize) -> crate::Result<RouteList> {
    let file =
        File::open(&config.path).map_err(|source| RouteError::ResourceUnavailable { source })?;
    Ok(read_routes(
        BufReader::new(file),
        max_entries,
        config.on_malformed,
    ))
}

/// Collects up to `max_entries` active routes from `reader`.
///
/// An empty source, with or without the header line, yields an empty list.
/// Inactive records are dropped and do not count toward `max_entries`.
/// A read error ends the listing like an unparseable record, whatever
/// `on_malformed` says.
pub(crate) fn read_routes<R: BufRead>(
    reader: R,
    max_entries: usize,
    on_malformed: MalformedLine,
) -> RouteList {
    let mut list = RouteList::default();
    let mut lines = reader.split(b'\n');
    let mut line_no = 0;
    loop {
        // the first line is the header
        if line_no > 0 && list.entries.len() >= max_entries {
            break;
        }
        let line = match lines.next() {
            None => break,
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                let truncation = ParseTruncation {
                    line: line_no + 1,
                    cause: RecordError::Io {
                        kind: e.kind(),
                        message: e.to_string(),
                    },
                };
                log::warn!("route table listing truncated: {truncation}");
                list.truncation = Some(truncation);
                break;
            }
        };
        line_no += 1;
        if line_no == 1 {
            continue;
        }
        let record = match std::str::from_utf8(&line) {
            Ok(text) if text.trim().is_empty() => continue,
            Ok(text) => parse_record(text),
            Err(_) => Err(RecordError::NotUtf8),
        };
        match record {
            Ok(record) if record.is_up() => list.entries.push(record.entry),
            Ok(record) => log::trace!("skip inactive route {}", record.entry),
            Err(cause) => {
                let truncation = ParseTruncation {
                    line: line_no,
                    cause,
                };
                match on_malformed {
                    MalformedLine::Stop => {
                        log::warn!("route table listing truncated: {truncation}");
                        list.truncation = Some(truncation);
                        break;
                    }
                    MalformedLine::Skip => {
                        log::warn!("skipping route record: {truncation}");
                        list.skipped += 1;
                    }
                }
            }
        }
    }
    list
}

/// Parses one data line. Fields past the mask are not inspected.
pub(crate) fn parse_record(line: &str) -> Result<ProcRecord, RecordError> {
    let mut fields = line.split_ascii_whitespace();
    let mut next = |name: &'static str| fields.next().ok_or(RecordError::MissingField(name));

    let if_name = next("interface")?;
    let if_name =
        IfName::new(if_name).map_err(|_| RecordError::InvalidInterface(if_name.to_string()))?;
    let destination = parse_addr("destination", next("destination")?)?;
    let next_hop = parse_addr("gateway", next("gateway")?)?;
    let flags = parse_hex("flags", next("flags")?)?;
    for name in ["refcnt", "use", "metric"] {
        parse_decimal(name, next(name)?)?;
    }
    let mask = parse_addr("mask", next("mask")?)?;

    Ok(ProcRecord {
        entry: RouteEntry::new(destination, mask, if_name).with_next_hop(next_hop),
        flags,
    })
}

fn parse_hex(field: &'static str, value: &str) -> Result<u32, RecordError> {
    u32::from_str_radix(value, 16).map_err(|_| RecordError::InvalidHex {
        field,
        value: value.to_string(),
    })
}

fn parse_decimal(field: &'static str, value: &str) -> Result<i64, RecordError> {
    value.parse().map_err(|_| RecordError::InvalidDecimal {
        field,
        value: value.to_string(),
    })
}

fn parse_addr(field: &'static str, value: &str) -> Result<Ipv4Addr, RecordError> {
    parse_hex(field, value).map(|v| Ipv4Addr::from(v.to_ne_bytes()))
}
