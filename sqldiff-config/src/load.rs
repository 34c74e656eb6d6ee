use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use crate::environment::Environment;

/// Directory, relative to the working directory, holding the configuration files.
const CONFIGURATION_DIR: &str = "configuration";

/// File read for every environment, before the environment-specific one.
const BASE_FILE_NAME: &str = "base.yaml";

/// Environment variables starting with `APP_` override file values. Nested keys are joined with
/// `__`, e.g. `APP_SUBSET__SHARD` sets `subset.shard`.
const ENV_VAR_PREFIX: &str = "APP";
const ENV_VAR_NESTING: &str = "__";

/// Loads a configuration from `./configuration` in the current working directory.
///
/// Later sources override earlier ones:
/// 1. `configuration/base.yaml`
/// 2. `configuration/{environment}.yaml`, optional, where the environment comes from
///    `APP_ENVIRONMENT`
/// 3. `APP_`-prefixed environment variables
pub fn load_config<T: DeserializeOwned>() -> Result<T, config::ConfigError> {
    let working_dir = std::env::current_dir()
        .map_err(|err| config::ConfigError::Message(format!("no working directory: {err}")))?;

    load_config_from(working_dir.join(CONFIGURATION_DIR))
}

/// Same as [`load_config`] with the YAML files read from `directory`.
pub fn load_config_from<T: DeserializeOwned>(
    directory: impl AsRef<Path>,
) -> Result<T, config::ConfigError> {
    let environment =
        Environment::load().map_err(|err| config::ConfigError::Message(err.to_string()))?;
    let [base_file, environment_file] = config_files(directory.as_ref(), environment);

    config::Config::builder()
        .add_source(config::File::from(base_file))
        .add_source(config::File::from(environment_file).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_VAR_PREFIX)
                .prefix_separator("_")
                .separator(ENV_VAR_NESTING),
        )
        .build()?
        .try_deserialize()
}

fn config_files(directory: &Path, environment: Environment) -> [PathBuf; 2] {
    [
        directory.join(BASE_FILE_NAME),
        directory.join(format!("{environment}.yaml")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::SqlDiffWorkerConfig;

    #[test]
    fn environment_file_follows_the_base_file() {
        let [base, environment] = config_files(Path::new("/etc/sqldiff"), Environment::Staging);

        assert_eq!(base, PathBuf::from("/etc/sqldiff/base.yaml"));
        assert_eq!(environment, PathBuf::from("/etc/sqldiff/staging.yaml"));
    }

    #[test]
    fn worker_config_loads_from_base_file_with_defaults() {
        let directory =
            std::env::temp_dir().join(format!("sqldiff-config-{}", std::process::id()));
        std::fs::create_dir_all(&directory).unwrap();
        std::fs::write(
            directory.join(BASE_FILE_NAME),
            "cell: zone1\n\
             key_column_count: 2\n\
             superset:\n  keyspace: main\n  shard: \"-80\"\n  sql: SELECT id, name FROM users ORDER BY id\n\
             subset:\n  keyspace: lookup\n  shard: \"-80\"\n  sql: SELECT id, name FROM lookup ORDER BY id\n",
        )
        .unwrap();

        let config: SqlDiffWorkerConfig = load_config_from(&directory).unwrap();
        std::fs::remove_dir_all(&directory).unwrap();

        assert_eq!(config.cell, "zone1");
        assert_eq!(config.key_column_count, 2);
        assert_eq!(config.superset.shard, "-80");
        assert_eq!(config.subset.keyspace, "lookup");
        assert_eq!(
            config.settle_interval_ms,
            SqlDiffWorkerConfig::DEFAULT_SETTLE_INTERVAL_MS
        );
        assert!(config.validate().is_ok());
    }
}
