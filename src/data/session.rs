//! Session table rows.
//!
//! The session collaborator returns rows keyed by the collector's column
//! headers. Normalization maps them onto a fixed record, substituting a
//! "not available" sentinel for anything the source omits.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sentinel shown for a field the source did not supply.
pub const NOT_AVAILABLE: &str = "N/A";

/// A raw row as returned by the session service: column header -> value.
pub type RawSessionRow = BTreeMap<String, String>;

/// A normalized session table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub creation_time: String,
    pub username: String,
    pub client_ip: String,
    pub proxy_ip: String,
    pub url: String,
    pub bytes_received: String,
    pub bytes_sent: String,
    pub age: String,
}

/// Canonical collector headers. Some deployments emitted `"Username"` and
/// `"ProxyIP"` instead; those spellings are accepted as legacy aliases only,
/// and the canonical header wins when both are present.
const FIELD_KEYS: [(&str, &[&str]); 8] = [
    ("Creation Time", &[]),
    ("User Name", &["Username"]),
    ("Client IP", &[]),
    ("Proxy IP", &["ProxyIP"]),
    ("URL", &[]),
    ("CL Bytes Received", &[]),
    ("CL Bytes Sent", &[]),
    ("Age(seconds)", &[]),
];

fn field<'a>(row: &'a RawSessionRow, canonical: &str, aliases: &[&str]) -> &'a str {
    row.get(canonical)
        .or_else(|| aliases.iter().find_map(|alias| row.get(*alias)))
        .map(String::as_str)
        .filter(|value| !value.is_empty())
        .unwrap_or(NOT_AVAILABLE)
}

impl SessionRecord {
    /// Normalize one raw row.
    pub fn from_raw(row: &RawSessionRow) -> Self {
        let get = |idx: usize| {
            let (canonical, aliases) = FIELD_KEYS[idx];
            field(row, canonical, aliases).to_string()
        };
        Self {
            creation_time: get(0),
            username: get(1),
            client_ip: get(2),
            proxy_ip: get(3),
            url: get(4),
            bytes_received: get(5),
            bytes_sent: get(6),
            age: get(7),
        }
    }
}
