//! Databases from the `DATABASES:` section, and their per-node shard view.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use super::coerce::{parse_u16, split_list};
use super::shard::Shard;
use super::table::{self, text_column, DecodeError, Field, Record};
use super::{render_timestamp, Stamp};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Database {
    pub key: String,
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub db_type: String,
    pub status: String,
    #[serde(rename = "shards")]
    pub master_shards: u16,
    pub placement: String,
    pub replication: String,
    pub persistence: String,
    pub endpoints: Vec<String>,
    pub exec_state: String,
    pub exec_state_machine: String,
    pub backup_progress: String,
    pub missing_backup_time: String,
    pub redis_version: String,
    pub time_stamp: Option<DateTime<FixedOffset>>,
}

impl Record for Database {
    const FIELDS: &'static [Field<Self>] = &[
        Field::derived("key", |d| d.key.clone()),
        text_column!("id", "DB:ID", id),
        text_column!("name", "NAME", name),
        text_column!("type", "TYPE", db_type),
        text_column!("status", "STATUS", status),
        Field::column(
            "shards",
            "SHARDS",
            "uint16",
            |d, v| {
                d.master_shards = parse_u16(v)?;
                Ok(())
            },
            |d| d.master_shards.to_string(),
        ),
        text_column!("placement", "PLACEMENT", placement),
        text_column!("replication", "REPLICATION", replication),
        text_column!("persistence", "PERSISTENCE", persistence),
        Field::column(
            "endpoints",
            "ENDPOINT",
            "endpoint list",
            |d, v| {
                d.endpoints = split_list(v);
                Ok(())
            },
            |d| d.endpoints.join("/"),
        ),
        text_column!("execState", "EXEC_STATE", exec_state),
        text_column!("execStateMachine", "EXEC_STATE_MACHINE", exec_state_machine),
        text_column!("backupProgress", "BACKUP_PROGRESS", backup_progress),
        text_column!("missingBackupTime", "MISSING_BACKUP_TIME", missing_backup_time),
        text_column!("redisVersion", "REDIS_VERSION", redis_version),
        Field::derived("timeStamp", |d| render_timestamp(d.time_stamp)),
    ];
}

pub fn parse_databases(block: &str, stamp: &Stamp) -> Result<Vec<Database>, DecodeError> {
    let mut databases: Vec<Database> = table::decode(block)?;
    for db in &mut databases {
        db.key = stamp.key.clone();
        db.time_stamp = stamp.time_stamp;
    }
    Ok(databases)
}

/// Master and replica shard counts of one database on one node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DbShards {
    pub masters: u16,
    pub replicas: u16,
}

impl DbShards {
    /// Add one shard to the master or replica count, saturating at the limit.
    pub fn count(&mut self, shard: &Shard) {
        if shard.is_master() {
            self.masters = self.masters.saturating_add(1);
        } else {
            self.replicas = self.replicas.saturating_add(1);
        }
    }

    pub fn total(&self) -> u32 {
        u32::from(self.masters) + u32::from(self.replicas)
    }
}

/// Per-node shard tallies keyed by node id.
pub type DbNodes = BTreeMap<String, DbShards>;

/// A database annotated with where its shards live. Computed on demand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseWithNodes {
    #[serde(flatten)]
    pub database: Database,
    pub nodes: DbNodes,
}

impl DatabaseWithNodes {
    /// Node ids holding at least one shard, in node-id order.
    pub fn occupied_nodes(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|(_, tally)| tally.total() > 0)
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clusterinfo::shard::MASTER_ROLE;

    const DATABASES: &str = "\
DB:ID        NAME       TYPE   STATUS  SHARDS  PLACEMENT  REPLICATION  PERSISTENCE  ENDPOINT                                EXEC_STATE  EXEC_STATE_MACHINE  BACKUP_PROGRESS  MISSING_BACKUP_TIME  REDIS_VERSION
db:10567021  sudan-02   redis  active  2       sparse     enabled      aof          redis-1.example.com:1/redis-1.alt:1/x   N/A         N/A                 N/A              N/A                  7.2.4
db:2         peru       redis  active  1       dense      disabled     disabled     redis-2.example.com:2                   N/A         N/A                 N/A              N/A                  6.2.13
";

    #[test]
    fn test_parse_databases() {
        let stamp = Stamp {
            key: "k".to_string(),
            time_stamp: None,
        };
        let dbs = parse_databases(DATABASES, &stamp).unwrap();
        assert_eq!(dbs.len(), 2);
        assert_eq!(dbs[0].id, "db:10567021");
        assert_eq!(dbs[0].name, "sudan-02");
        assert_eq!(dbs[0].master_shards, 2);
        assert_eq!(
            dbs[0].endpoints,
            vec!["redis-1.example.com:1", "redis-1.alt:1", "x"]
        );
        assert_eq!(dbs[1].endpoints, vec!["redis-2.example.com:2"]);
        assert_eq!(dbs[1].redis_version, "6.2.13");
        assert_eq!(dbs[1].key, "k");
    }

    #[test]
    fn test_json_field_names() {
        let db = Database {
            id: "db:1".to_string(),
            db_type: "redis".to_string(),
            master_shards: 3,
            ..Default::default()
        };
        let value = serde_json::to_value(&db).unwrap();
        assert_eq!(value["id"], "db:1");
        assert_eq!(value["type"], "redis");
        assert_eq!(value["shards"], 3);
        assert!(value["endpoints"].is_array());
        assert!(value.get("execStateMachine").is_some());
    }

    #[test]
    fn test_count_by_role_saturates() {
        let master = Shard {
            role: MASTER_ROLE.to_string(),
            ..Default::default()
        };
        let replica = Shard {
            role: "slave".to_string(),
            ..Default::default()
        };

        let mut tally = DbShards::default();
        tally.count(&master);
        tally.count(&replica);
        tally.count(&replica);
        assert_eq!(tally, DbShards { masters: 1, replicas: 2 });

        let mut full = DbShards {
            masters: u16::MAX,
            replicas: u16::MAX,
        };
        full.count(&master);
        full.count(&replica);
        assert_eq!(full.masters, u16::MAX);
        assert_eq!(full.replicas, u16::MAX);
        assert_eq!(full.total(), 2 * u32::from(u16::MAX));
    }

    #[test]
    fn test_occupied_nodes() {
        let mut nodes = DbNodes::new();
        nodes.insert("node:2".into(), DbShards { masters: 1, replicas: 0 });
        nodes.insert("node:1".into(), DbShards::default());
        nodes.insert("node:3".into(), DbShards { masters: 0, replicas: 2 });
        let view = DatabaseWithNodes {
            database: Database::default(),
            nodes,
        };
        assert_eq!(view.occupied_nodes(), vec!["node:2", "node:3"]);

        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["nodes"]["node:3"]["replicas"], 2);
        assert!(value.get("id").is_some());
    }
}
