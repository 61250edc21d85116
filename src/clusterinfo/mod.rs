//! Structured model of `rladmin status` output.
//!
//! [`ClusterInfo::parse`] splits a dump into sections, decodes each section's
//! fixed-width table into typed records and assembles one immutable snapshot.
//! Cross-references between records (which shards belong to which database
//! and node) are computed on demand from the snapshot.

pub mod chunks;
pub mod coerce;
pub mod database;
pub mod endpoint;
pub mod node;
pub mod shard;
pub mod table;

use std::io::BufRead;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use chunks::{Chunks, Section};
pub use database::{Database, DatabaseWithNodes, DbNodes, DbShards};
pub use endpoint::Endpoint;
pub use node::Node;
pub use shard::Shard;

use table::DecodeError;

/// Errors that can occur while building a snapshot.
#[derive(Error, Debug)]
pub enum Error {
    #[error("reading rladmin output: {0}")]
    Io(#[from] std::io::Error),

    #[error("timestamp not found in input")]
    TimestampMissing,

    #[error("parsing timestamp '{raw}': {source}")]
    Timestamp {
        raw: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("decoding {section} section: {source}")]
    Section {
        section: Section,
        #[source]
        source: DecodeError,
    },
}

/// Values stamped onto every record of one snapshot.
#[derive(Debug, Clone, Default)]
pub struct Stamp {
    pub key: String,
    pub time_stamp: Option<DateTime<FixedOffset>>,
}

pub(crate) fn render_timestamp(ts: Option<DateTime<FixedOffset>>) -> String {
    ts.map(|t| t.to_rfc3339_opts(SecondsFormat::Micros, true))
        .unwrap_or_default()
}

/// Options controlling how a dump is turned into a snapshot.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Report key stamped on every record.
    pub key: String,
    /// Fail instead of leaving the timestamp unset when it cannot be read.
    pub strict_timestamp: bool,
}

impl ParseOptions {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            strict_timestamp: false,
        }
    }
}

/// One parsed rladmin status report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfo {
    key: String,
    databases: Vec<Database>,
    endpoints: Vec<Endpoint>,
    shards: Vec<Shard>,
    nodes: Vec<Node>,
    time_stamp: Option<DateTime<FixedOffset>>,
}

impl ClusterInfo {
    /// Parse a dump with a lenient timestamp policy.
    pub fn parse<R: BufRead>(key: impl Into<String>, input: R) -> Result<Self, Error> {
        Self::parse_with(&ParseOptions::new(key), input)
    }

    pub fn parse_with<R: BufRead>(opts: &ParseOptions, input: R) -> Result<Self, Error> {
        let chunks = Chunks::parse(input)?;
        Self::from_chunks(opts, &chunks)
    }

    /// Decode already split sections into a snapshot.
    pub fn from_chunks(opts: &ParseOptions, chunks: &Chunks) -> Result<Self, Error> {
        let time_stamp = match chunks.extract_timestamp() {
            Ok(ts) => Some(ts),
            Err(e) if !opts.strict_timestamp => {
                warn!(error = %e, "report timestamp unavailable, leaving it unset");
                None
            }
            Err(e) => return Err(e),
        };

        let stamp = Stamp {
            key: opts.key.clone(),
            time_stamp,
        };

        let endpoints = decode_section(chunks, Section::Endpoints, |b| {
            endpoint::parse_endpoints(b, &stamp)
        })?;
        let databases = decode_section(chunks, Section::Databases, |b| {
            database::parse_databases(b, &stamp)
        })?;
        let shards = decode_section(chunks, Section::Shards, |b| shard::parse_shards(b, &stamp))?;
        let nodes = decode_section(chunks, Section::Nodes, |b| node::parse_nodes(b, &stamp))?;

        info!(
            key = %stamp.key,
            nodes = nodes.len(),
            databases = databases.len(),
            shards = shards.len(),
            endpoints = endpoints.len(),
            "parsed cluster snapshot",
        );

        Ok(Self {
            key: stamp.key,
            databases,
            endpoints,
            shards,
            nodes,
            time_stamp,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn time_stamp(&self) -> Option<DateTime<FixedOffset>> {
        self.time_stamp
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn databases(&self) -> &[Database] {
        &self.databases
    }

    pub fn shards(&self) -> &[Shard] {
        &self.shards
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn database(&self, id: &str) -> Option<&Database> {
        self.databases.iter().find(|db| db.id == id)
    }

    /// Shards of a database ordered by shard id.
    pub fn shards_for_db(&self, db_id: &str) -> Vec<&Shard> {
        shard::for_db(&self.shards, db_id)
    }

    /// Master/replica tallies of a database's shards for every node.
    ///
    /// Every known node gets an entry, zero if it holds none of the
    /// database's shards.
    pub fn node_tally(&self, db_id: &str) -> DbNodes {
        let mut nodes: DbNodes = self
            .nodes
            .iter()
            .map(|n| (n.id.clone(), DbShards::default()))
            .collect();

        for shard in self.shards.iter().filter(|s| s.db_id == db_id) {
            let tally = nodes.entry(shard.node.clone()).or_insert_with(|| {
                debug!(shard = %shard.id, node = %shard.node, "shard on unlisted node");
                DbShards::default()
            });
            tally.count(shard);
        }

        nodes
    }

    /// Total number of shards (masters and replicas) of a database.
    pub fn shard_count(&self, db_id: &str) -> u32 {
        self.node_tally(db_id).values().map(DbShards::total).sum()
    }

    /// Master/replica tally of a database's shards on one node.
    pub fn on_node(&self, db_id: &str, node_id: &str) -> DbShards {
        self.shards
            .iter()
            .filter(|s| s.db_id == db_id && s.node == node_id)
            .fold(DbShards::default(), |mut tally, s| {
                tally.count(s);
                tally
            })
    }

    /// Every database annotated with its per-node shard tallies.
    pub fn databases_with_nodes(&self) -> Vec<DatabaseWithNodes> {
        self.databases
            .iter()
            .map(|db| DatabaseWithNodes {
                database: db.clone(),
                nodes: self.node_tally(&db.id),
            })
            .collect()
    }
}

fn decode_section<T>(
    chunks: &Chunks,
    section: Section,
    parse: impl FnOnce(&str) -> Result<Vec<T>, DecodeError>,
) -> Result<Vec<T>, Error> {
    let records =
        parse(chunks.section(section)).map_err(|source| Error::Section { section, source })?;
    debug!(%section, records = records.len(), "decoded section");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = "\
2024-05-14 13:05:09.471202+00:00
CLUSTER:
OK. Cluster master: 1 (10.0.0.1)

CLUSTER NODES:
NODE:ID  ROLE    SHARDS
*node:1  master  3/10
node:2   slave   1/10
node:3   slave   0/0

DATABASES:
DB:ID  NAME  SHARDS
db:1   one   2
db:2   two   1

ENDPOINTS:
DB:ID  NAME  ID      NODE    ROLE    SSL
db:1   one   ep:1:1  node:1  single  No

SHARDS:
DB:ID  NAME  ID        NODE    ROLE
db:1   one   redis:4   node:2  slave
db:1   one   redis:2   node:1  master
db:2   two   redis:3   node:1  master
db:1   one   redis:1   node:1  master
";

    fn snapshot() -> ClusterInfo {
        ClusterInfo::parse("test", DUMP.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_snapshot() {
        let info = snapshot();
        assert_eq!(info.key(), "test");
        assert_eq!(info.nodes().len(), 3);
        assert_eq!(info.databases().len(), 2);
        assert_eq!(info.endpoints().len(), 1);
        assert_eq!(info.shards().len(), 4);
        assert!(info.time_stamp().is_some());
        assert_eq!(info.nodes()[0].id, "node:1");
        assert!(info.nodes()[2].quorum);
    }

    #[test]
    fn test_stamp_applied_to_every_record() {
        let info = snapshot();
        let ts = info.time_stamp();
        assert!(info.nodes().iter().all(|n| n.key == "test" && n.time_stamp == ts));
        assert!(info.databases().iter().all(|d| d.key == "test" && d.time_stamp == ts));
        assert!(info.shards().iter().all(|s| s.key == "test" && s.time_stamp == ts));
        assert!(info.endpoints().iter().all(|e| e.key == "test" && e.time_stamp == ts));
    }

    #[test]
    fn test_shards_for_db() {
        let info = snapshot();
        let ids: Vec<&str> = info
            .shards_for_db("db:1")
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(ids, vec!["redis:1", "redis:2", "redis:4"]);
    }

    #[test]
    fn test_node_tally() {
        let info = snapshot();
        let tally = info.node_tally("db:1");
        assert_eq!(tally.len(), 3);
        assert_eq!(tally["node:1"], DbShards { masters: 2, replicas: 0 });
        assert_eq!(tally["node:2"], DbShards { masters: 0, replicas: 1 });
        assert_eq!(tally["node:3"], DbShards::default());
        assert_eq!(info.shard_count("db:1"), 3);
        assert_eq!(info.shard_count("db:2"), 1);
        assert_eq!(info.shard_count("db:404"), 0);
    }

    #[test]
    fn test_on_node() {
        let info = snapshot();
        assert_eq!(info.on_node("db:1", "node:1"), DbShards { masters: 2, replicas: 0 });
        assert_eq!(info.on_node("db:1", "node:2"), DbShards { masters: 0, replicas: 1 });
        assert_eq!(info.on_node("db:2", "node:2"), DbShards::default());
    }

    #[test]
    fn test_databases_with_nodes_in_order() {
        let info = snapshot();
        let annotated = info.databases_with_nodes();
        assert_eq!(annotated.len(), 2);
        assert_eq!(annotated[0].database.id, "db:1");
        assert_eq!(annotated[1].database.id, "db:2");
        assert_eq!(annotated[1].occupied_nodes(), vec!["node:1"]);
    }

    #[test]
    fn test_shard_on_unlisted_node_is_counted() {
        let dump = "ts\nCLUSTER NODES:\nNODE:ID\nnode:1\nSHARDS:\nDB:ID  ID   NODE    ROLE\ndb:1   s:1  node:9  master\n";
        let info = ClusterInfo::parse("k", dump.as_bytes()).unwrap();
        let tally = info.node_tally("db:1");
        assert_eq!(tally["node:9"].masters, 1);
        assert_eq!(tally["node:1"], DbShards::default());
    }

    #[test]
    fn test_missing_timestamp_is_lenient_by_default() {
        let dump = "CLUSTER NODES:\nNODE:ID\nnode:1\n";
        let info = ClusterInfo::parse("k", dump.as_bytes()).unwrap();
        assert!(info.time_stamp().is_none());
        assert_eq!(info.nodes().len(), 1);
    }

    #[test]
    fn test_strict_timestamp() {
        let opts = ParseOptions {
            key: "k".to_string(),
            strict_timestamp: true,
        };
        let err = ClusterInfo::parse_with(&opts, "garbage\nCLUSTER NODES:\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Timestamp { .. }));
    }

    #[test]
    fn test_bad_field_aborts_whole_parse() {
        let dump = "ts\nCLUSTER NODES:\nNODE:ID  SHARDS\nnode:1   45/94\nnode:2   45\n";
        let err = ClusterInfo::parse("k", dump.as_bytes()).unwrap_err();
        match err {
            Error::Section { section, source } => {
                assert_eq!(section, Section::Nodes);
                assert!(source.to_string().contains("'45'"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_json_layout() {
        let value = serde_json::to_value(snapshot()).unwrap();
        assert_eq!(value["key"], "test");
        assert_eq!(value["timeStamp"], "2024-05-14T13:05:09.471202Z");
        assert_eq!(value["nodes"].as_array().unwrap().len(), 3);
        assert_eq!(value["shards"][0]["dbId"], "db:1");
    }
}
