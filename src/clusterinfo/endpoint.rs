//! Database endpoints from the `ENDPOINTS:` section.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use super::coerce::parse_bool;
use super::table::{self, text_column, DecodeError, Field, Record};
use super::{render_timestamp, Stamp};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub key: String,
    pub id: String,
    pub db_id: String,
    pub name: String,
    pub node: String,
    pub role: String,
    pub ssl: bool,
    pub watchdog_status: String,
    pub time_stamp: Option<DateTime<FixedOffset>>,
}

impl Record for Endpoint {
    const FIELDS: &'static [Field<Self>] = &[
        Field::derived("key", |e| e.key.clone()),
        text_column!("endpointId", "ID", id),
        text_column!("dbid", "DB:ID", db_id),
        text_column!("name", "NAME", name),
        text_column!("node", "NODE", node),
        text_column!("endpointRole", "ROLE", role),
        Field::column(
            "ssl",
            "SSL",
            "bool",
            |e, v| {
                e.ssl = parse_bool(v)?;
                Ok(())
            },
            |e| e.ssl.to_string(),
        ),
        text_column!("watchDogStatus", "WATCHDOG_STATUS", watchdog_status),
        Field::derived("timeStamp", |e| render_timestamp(e.time_stamp)),
    ];
}

pub fn parse_endpoints(block: &str, stamp: &Stamp) -> Result<Vec<Endpoint>, DecodeError> {
    let mut endpoints: Vec<Endpoint> = table::decode(block)?;
    for endpoint in &mut endpoints {
        endpoint.key = stamp.key.clone();
        endpoint.time_stamp = stamp.time_stamp;
    }
    Ok(endpoints)
}
