//! Splits raw rladmin status output into per-section text blocks.

use std::fmt;
use std::io::BufRead;

use chrono::{DateTime, FixedOffset};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use super::Error;

/// Layout of the report generation time on the second intro line.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f%:z";

static MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z ]+):$").expect("valid marker regex"));

/// Section of the report the splitter is currently inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    /// Before any marker; text is accumulated into the intro.
    None,
    /// `CLUSTER:` or any unrecognized marker; bodies are discarded.
    Cluster,
    Nodes,
    Databases,
    Endpoints,
    Shards,
}

impl Section {
    /// Map a marker label (without the trailing colon) to a section.
    pub fn from_label(label: &str) -> Self {
        match label {
            "CLUSTER NODES" => Self::Nodes,
            "DATABASES" => Self::Databases,
            "ENDPOINTS" => Self::Endpoints,
            "SHARDS" => Self::Shards,
            _ => Self::Cluster,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "intro",
            Self::Cluster => "cluster",
            Self::Nodes => "nodes",
            Self::Databases => "databases",
            Self::Endpoints => "endpoints",
            Self::Shards => "shards",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect a section marker line and return its section.
fn which_section(line: &str) -> Option<Section> {
    MARKER
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|label| Section::from_label(label.as_str()))
}

/// Raw section bodies from one rladmin dump.
#[derive(Debug, Clone, Default)]
pub struct Chunks {
    pub intro: String,
    pub nodes: String,
    pub databases: String,
    pub endpoints: String,
    pub shards: String,
}

impl Chunks {
    /// Scan `input` line by line, buffering each section's body.
    ///
    /// Intro text is cumulative: every flush before a marker is appended,
    /// prefixed with a newline. Named sections keep only their last non-empty
    /// occurrence. Bytes that are not UTF-8 are replaced. Read errors abort
    /// the scan.
    pub fn parse<R: BufRead>(input: R) -> Result<Self, Error> {
        let mut chunks = Self::default();
        let mut current = String::new();
        let mut section = Section::None;

        for raw in input.split(b'\n') {
            let mut raw = raw?;
            if raw.last() == Some(&b'\r') {
                raw.pop();
            }
            let line = String::from_utf8_lossy(&raw);
            if let Some(next) = which_section(&line) {
                trace!(from = %section, to = %next, "section marker");
                chunks.put(std::mem::take(&mut current), section);
                section = next;
            } else {
                current.push_str(&line);
                current.push('\n');
            }
        }
        chunks.put(current, section);

        Ok(chunks)
    }

    fn put(&mut self, data: String, section: Section) {
        if data.is_empty() {
            return;
        }
        match section {
            Section::None => {
                self.intro.push('\n');
                self.intro.push_str(&data);
            }
            Section::Cluster => {}
            Section::Nodes => self.nodes = data,
            Section::Databases => self.databases = data,
            Section::Endpoints => self.endpoints = data,
            Section::Shards => self.shards = data,
        }
    }

    /// Body buffered for a named section.
    pub fn section(&self, section: Section) -> &str {
        match section {
            Section::None => &self.intro,
            Section::Cluster => "",
            Section::Nodes => &self.nodes,
            Section::Databases => &self.databases,
            Section::Endpoints => &self.endpoints,
            Section::Shards => &self.shards,
        }
    }

    /// Parse the report time from the second line of the intro.
    pub fn extract_timestamp(&self) -> Result<DateTime<FixedOffset>, Error> {
        let raw = self.intro.split('\n').nth(1).ok_or(Error::TimestampMissing)?;
        DateTime::parse_from_str(raw.trim_end(), TIMESTAMP_FORMAT).map_err(|source| {
            Error::Timestamp {
                raw: raw.to_string(),
                source,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const DUMP: &str = "\
2024-05-14 13:05:09.471202+02:00
CLUSTER:
OK. Cluster master: 1 (10.0.0.1)

CLUSTER NODES:
NODE:ID  ROLE
*node:1  master

DATABASES:
DB:ID  NAME
db:1   one
ENDPOINTS:
DB:ID  NAME
SHARDS:
DB:ID  ID
db:1   redis:1
";

    #[test]
    fn test_which_section() {
        assert_eq!(which_section("CLUSTER NODES:"), Some(Section::Nodes));
        assert_eq!(which_section("SHARDS:"), Some(Section::Shards));
        assert_eq!(which_section("CLUSTER:"), Some(Section::Cluster));
        assert_eq!(which_section("SOMETHING NEW:"), Some(Section::Cluster));
        assert_eq!(which_section("SHARDS: "), None);
        assert_eq!(which_section("Shards:"), None);
        assert_eq!(which_section("NODE:ID  ROLE"), None);
    }

    #[test]
    fn test_parse_sections() {
        let chunks = Chunks::parse(DUMP.as_bytes()).unwrap();
        assert_eq!(chunks.intro, "\n2024-05-14 13:05:09.471202+02:00\n");
        assert_eq!(chunks.nodes, "NODE:ID  ROLE\n*node:1  master\n\n");
        assert_eq!(chunks.databases, "DB:ID  NAME\ndb:1   one\n");
        assert_eq!(chunks.endpoints, "DB:ID  NAME\n");
        assert_eq!(chunks.shards, "DB:ID  ID\ndb:1   redis:1\n");
        assert_eq!(chunks.section(Section::Cluster), "");
    }

    #[test]
    fn test_repeated_marker_last_wins() {
        let input = "SHARDS:\nfirst\nDATABASES:\nx\nSHARDS:\nsecond\n";
        let chunks = Chunks::parse(input.as_bytes()).unwrap();
        assert_eq!(chunks.shards, "second\n");
        assert_eq!(chunks.databases, "x\n");
    }

    #[test]
    fn test_repeated_marker_empty_body_keeps_earlier() {
        let input = "SHARDS:\nfirst\nSHARDS:\n";
        let chunks = Chunks::parse(input.as_bytes()).unwrap();
        assert_eq!(chunks.shards, "first\n");
    }

    #[test]
    fn test_intro_accumulates_only_before_markers() {
        let input = "line one\nline two\nCLUSTER:\ndropped\n";
        let chunks = Chunks::parse(input.as_bytes()).unwrap();
        assert_eq!(chunks.intro, "\nline one\nline two\n");
    }

    #[test]
    fn test_crlf_lines() {
        let input = "ts\r\nDATABASES:\r\nDB:ID\r\ndb:1\r\n";
        let chunks = Chunks::parse(input.as_bytes()).unwrap();
        assert_eq!(chunks.databases, "DB:ID\ndb:1\n");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut input = b"ts\nDATABASES:\nDB:ID  NAME\ndb:1   caf".to_vec();
        input.extend_from_slice(&[0xe9, b'\n']);
        let chunks = Chunks::parse(input.as_slice()).unwrap();
        assert_eq!(chunks.databases, "DB:ID  NAME\ndb:1   caf\u{fffd}\n");
    }

    #[test]
    fn test_extract_timestamp() {
        let chunks = Chunks::parse(DUMP.as_bytes()).unwrap();
        let ts = chunks.extract_timestamp().unwrap();
        assert_eq!(ts.year(), 2024);
        assert_eq!(ts.hour(), 13);
        assert_eq!(ts.nanosecond(), 471_202_000);
        assert_eq!(ts.offset().local_minus_utc(), 2 * 3600);
    }

    #[test]
    fn test_extract_timestamp_missing() {
        let chunks = Chunks::parse("CLUSTER NODES:\nNODE:ID\n".as_bytes()).unwrap();
        assert!(matches!(
            chunks.extract_timestamp(),
            Err(Error::TimestampMissing)
        ));
    }

    #[test]
    fn test_extract_timestamp_malformed() {
        let chunks = Chunks::parse("yesterday at noon\n".as_bytes()).unwrap();
        assert!(matches!(
            chunks.extract_timestamp(),
            Err(Error::Timestamp { .. })
        ));
    }

    #[test]
    fn test_read_error_propagates() {
        let bytes: &[u8] = &[b'o', b'k', b'\n', 0xff, 0xfe, b'\n'];
        assert!(matches!(Chunks::parse(bytes), Err(Error::Io(_))));
    }
}
