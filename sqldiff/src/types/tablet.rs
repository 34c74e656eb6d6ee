use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a single tablet (one database process serving a shard) in the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TabletAlias {
    pub cell: String,
    pub uid: u32,
}

impl TabletAlias {
    pub fn new(cell: impl Into<String>, uid: u32) -> Self {
        Self {
            cell: cell.into(),
            uid,
        }
    }
}

impl fmt::Display for TabletAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:010}", self.cell, self.uid)
    }
}

/// Serving role of a tablet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabletType {
    /// Accepts writes for the shard.
    Master,
    /// Serving replica eligible for promotion.
    Replica,
    /// Read-only replica used for batch and offline work.
    Rdonly,
    /// Non-serving replica, out of the serving graph.
    Spare,
    /// Replica reserved by a consistency check and excluded from serving traffic.
    Checker,
}

impl fmt::Display for TabletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TabletType::Master => "master",
            TabletType::Replica => "replica",
            TabletType::Rdonly => "rdonly",
            TabletType::Spare => "spare",
            TabletType::Checker => "checker",
        };

        f.write_str(name)
    }
}

/// Tablet metadata held by the topology directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabletInfo {
    pub alias: TabletAlias,
    pub keyspace: String,
    pub shard: String,
    pub tablet_type: TabletType,
    /// Address of the tablet manager RPC endpoint, e.g. `host:port`.
    pub addr: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_display_pads_uid() {
        assert_eq!(TabletAlias::new("zone1", 42).to_string(), "zone1-0000000042");
    }

    #[test]
    fn tablet_types_display_lowercase() {
        assert_eq!(TabletType::Rdonly.to_string(), "rdonly");
        assert_eq!(TabletType::Checker.to_string(), "checker");
    }
}
