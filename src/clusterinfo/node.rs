//! Cluster nodes from the `CLUSTER NODES:` section.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use super::coerce::{parse_u16, Address, MemoryInfo, RamFloat, ShardInfo};
use super::table::{self, text_column, DecodeError, Field, Record};
use super::{render_timestamp, Stamp};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub key: String,
    #[serde(rename = "nodeId")]
    pub id: String,
    pub role: String,
    pub address: Address,
    pub external_address: Address,
    pub host_name: String,
    pub overbooking_depth: RamFloat,
    pub masters: u16,
    pub replicas: u16,
    #[serde(rename = "shards")]
    pub shard_usage: ShardInfo,
    pub cores: u16,
    #[serde(rename = "redisRAM")]
    pub redis_ram: MemoryInfo,
    #[serde(rename = "provisionalRAM")]
    pub provisional_ram: MemoryInfo,
    pub version: String,
    pub sha: String,
    pub rack_id: String,
    pub status: String,
    /// Set for nodes with no shard capacity, which only take part in quorum.
    pub quorum: bool,
    pub time_stamp: Option<DateTime<FixedOffset>>,
}

impl Record for Node {
    const FIELDS: &'static [Field<Self>] = &[
        Field::derived("key", |n| n.key.clone()),
        text_column!("nodeId", "NODE:ID", id),
        text_column!("role", "ROLE", role),
        Field::column(
            "address",
            "ADDRESS",
            "address",
            |n, v| {
                n.address = Address::parse(v)?;
                Ok(())
            },
            |n| n.address.to_string(),
        ),
        Field::column(
            "externalAddress",
            "EXTERNAL_ADDRESS",
            "address",
            |n, v| {
                n.external_address = Address::parse(v)?;
                Ok(())
            },
            |n| n.external_address.to_string(),
        ),
        text_column!("hostName", "HOSTNAME", host_name),
        Field::column(
            "overbookingDepth",
            "OVERBOOKING_DEPTH",
            "memory size",
            |n, v| {
                n.overbooking_depth = RamFloat::parse(v)?;
                Ok(())
            },
            |n| n.overbooking_depth.to_string(),
        ),
        Field::column(
            "masters",
            "MASTERS",
            "uint16",
            |n, v| {
                n.masters = parse_u16(v)?;
                Ok(())
            },
            |n| n.masters.to_string(),
        ),
        Field::column(
            "replicas",
            "SLAVES",
            "uint16",
            |n, v| {
                n.replicas = parse_u16(v)?;
                Ok(())
            },
            |n| n.replicas.to_string(),
        ),
        Field::column(
            "shards",
            "SHARDS",
            "shard counts",
            |n, v| {
                n.shard_usage = ShardInfo::parse(v)?;
                Ok(())
            },
            |n| n.shard_usage.to_string(),
        ),
        Field::column(
            "cores",
            "CORES",
            "uint16",
            |n, v| {
                n.cores = parse_u16(v)?;
                Ok(())
            },
            |n| n.cores.to_string(),
        ),
        Field::column(
            "redisRAM",
            "FREE_RAM",
            "memory info",
            |n, v| {
                n.redis_ram = MemoryInfo::parse(v)?;
                Ok(())
            },
            |n| n.redis_ram.to_string(),
        ),
        Field::column(
            "provisionalRAM",
            "PROVISIONAL_RAM",
            "memory info",
            |n, v| {
                n.provisional_ram = MemoryInfo::parse(v)?;
                Ok(())
            },
            |n| n.provisional_ram.to_string(),
        ),
        text_column!("version", "VERSION", version),
        text_column!("sha", "SHA", sha),
        text_column!("rackId", "RACK-ID", rack_id),
        text_column!("status", "STATUS", status),
        Field::derived("quorum", |n| n.quorum.to_string()),
        Field::derived("timeStamp", |n| render_timestamp(n.time_stamp)),
    ];
}

/// Decode the nodes table and normalize each record.
///
/// The `*` prefix rladmin puts on the node it ran on is stripped.
pub fn parse_nodes(block: &str, stamp: &Stamp) -> Result<Vec<Node>, DecodeError> {
    let mut nodes: Vec<Node> = table::decode(block)?;
    for node in &mut nodes {
        if let Some(id) = node.id.strip_prefix('*') {
            node.id = id.to_string();
        }
        node.quorum = node.shard_usage.max == 0;
        node.key = stamp.key.clone();
        node.time_stamp = stamp.time_stamp;
    }
    Ok(nodes)
}
