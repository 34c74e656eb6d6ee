use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// One side of the diff: a query run against a replica of a keyspace shard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SourceSpecConfig {
    /// Keyspace holding the data.
    pub keyspace: String,
    /// Shard of the keyspace, e.g. `0` or `-80`.
    pub shard: String,
    /// Query producing rows ordered by the key columns.
    pub sql: String,
}

impl SourceSpecConfig {
    /// Validates the source spec, using `side` to name the offending fields.
    pub fn validate(&self, side: Side) -> Result<(), ValidationError> {
        let [keyspace, shard, sql] = side.field_names();

        if self.keyspace.trim().is_empty() {
            return Err(ValidationError::EmptyField(keyspace));
        }
        if self.shard.trim().is_empty() {
            return Err(ValidationError::EmptyField(shard));
        }
        if self.sql.trim().is_empty() {
            return Err(ValidationError::EmptyField(sql));
        }

        Ok(())
    }
}

/// Which side of the diff a [`SourceSpecConfig`] describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Superset,
    Subset,
}

impl Side {
    fn field_names(&self) -> [&'static str; 3] {
        match self {
            Side::Superset => ["superset.keyspace", "superset.shard", "superset.sql"],
            Side::Subset => ["subset.keyspace", "subset.shard", "subset.sql"],
        }
    }
}
