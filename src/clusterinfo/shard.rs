//! Shards from the `SHARDS:` section.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use super::coerce::RamFloat;
use super::table::{self, text_column, DecodeError, Field, Record};
use super::{render_timestamp, Stamp};

/// Role value rladmin prints for master shards; anything else is a replica.
pub const MASTER_ROLE: &str = "master";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Shard {
    pub key: String,
    pub id: String,
    pub db_id: String,
    pub name: String,
    pub node: String,
    pub role: String,
    pub slots: String,
    pub used_memory: RamFloat,
    pub backup_progress: String,
    pub ram_frag: RamFloat,
    pub watchdog_status: String,
    pub status: String,
    pub time_stamp: Option<DateTime<FixedOffset>>,
}

impl Shard {
    pub fn is_master(&self) -> bool {
        self.role == MASTER_ROLE
    }
}

impl Record for Shard {
    const FIELDS: &'static [Field<Self>] = &[
        Field::derived("key", |s| s.key.clone()),
        text_column!("shardid", "ID", id),
        text_column!("dbid", "DB:ID", db_id),
        text_column!("name", "NAME", name),
        text_column!("node", "NODE", node),
        text_column!("role", "ROLE", role),
        text_column!("slots", "SLOTS", slots),
        Field::column(
            "usedMemory",
            "USED_MEMORY",
            "memory size",
            |s, v| {
                s.used_memory = RamFloat::parse(v)?;
                Ok(())
            },
            |s| s.used_memory.to_string(),
        ),
        text_column!("backupProgress", "BACKUP_PROGRESS", backup_progress),
        Field::column(
            "ramFrag",
            "RAM_FRAG",
            "memory size",
            |s, v| {
                s.ram_frag = RamFloat::parse(v)?;
                Ok(())
            },
            |s| s.ram_frag.to_string(),
        ),
        text_column!("watchdogStatus", "WATCHDOG_STATUS", watchdog_status),
        text_column!("status", "STATUS", status),
        Field::derived("timeStamp", |s| render_timestamp(s.time_stamp)),
    ];
}

pub fn parse_shards(block: &str, stamp: &Stamp) -> Result<Vec<Shard>, DecodeError> {
    let mut shards: Vec<Shard> = table::decode(block)?;
    for shard in &mut shards {
        shard.key = stamp.key.clone();
        shard.time_stamp = stamp.time_stamp;
    }
    Ok(shards)
}

/// Shards of one database, stably sorted by shard id.
pub fn for_db<'a>(shards: &'a [Shard], db_id: &str) -> Vec<&'a Shard> {
    let mut matching: Vec<&Shard> = shards.iter().filter(|s| s.db_id == db_id).collect();
    matching.sort_by(|a, b| a.id.cmp(&b.id));
    matching
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHARDS: &str = "\
DB:ID  NAME      ID        NODE    ROLE    SLOTS    USED_MEMORY  BACKUP_PROGRESS  RAM_FRAG  WATCHDOG_STATUS  STATUS
db:1   sudan-02  redis:12  node:1  master  0-16383  2.61MB       N/A              -1.2MB    OK               OK
db:1   sudan-02  redis:11  node:2  slave   0-16383  2.5MB        N/A              300KB     OK               OK

db:2   peru      redis:3   node:1  master  0-16383  1GB          N/A              0B        OK               OK
";

    fn shards() -> Vec<Shard> {
        let stamp = Stamp {
            key: "k".to_string(),
            time_stamp: None,
        };
        parse_shards(SHARDS, &stamp).unwrap()
    }

    #[test]
    fn test_parse_shards() {
        let shards = shards();
        assert_eq!(shards.len(), 3);
        assert_eq!(shards[0].name, "sudan-02");
        assert_eq!(shards[0].id, "redis:12");
        assert_eq!(shards[0].db_id, "db:1");
        assert!(shards[0].is_master());
        assert!(!shards[1].is_master());
        assert!(shards[0].ram_frag.gib() < 0.0);
        assert_eq!(shards[2].used_memory.gib(), 1.0);
    }

    #[test]
    fn test_for_db_sorted_by_id() {
        let shards = shards();
        let ids: Vec<&str> = for_db(&shards, "db:1").iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["redis:11", "redis:12"]);
        assert!(for_db(&shards, "db:404").is_empty());
    }

    #[test]
    fn test_for_db_stable_on_ties() {
        let mk = |id: &str, node: &str| Shard {
            id: id.to_string(),
            db_id: "db:1".to_string(),
            node: node.to_string(),
            ..Default::default()
        };
        let shards = vec![mk("b", "n1"), mk("a", "n2"), mk("b", "n3"), mk("a", "n4")];
        let nodes: Vec<&str> = for_db(&shards, "db:1").iter().map(|s| s.node.as_str()).collect();
        assert_eq!(nodes, vec!["n2", "n4", "n1", "n3"]);
    }

    #[test]
    fn test_json_field_names() {
        let value = serde_json::to_value(&shards()[0]).unwrap();
        assert_eq!(value["dbId"], "db:1");
        assert_eq!(value["usedMemory"], format!("{:.5}", 2.61 / 1024.0));
        assert_eq!(value["watchdogStatus"], "OK");
        assert!(value.get("backupProgress").is_some());
    }
}
