use std::path::{Path, PathBuf};

use thiserror::Error;
use toml::value::Table;
use toml::Value;
use validator::Validate;

use crate::TranscribeConfig;

/// Environment variables starting with this prefix (followed by `__`) override
/// file values, e.g. `TRANSCRIBE_SERVICE__SERVER__PORT=9000`.
pub const CONFIG_PREFIX: &str = "TRANSCRIBE_SERVICE";

const PATH_SEPARATOR: &str = "__";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid override {key}: {reason}")]
    Override { key: String, reason: String },
    #[error("config does not match the expected shape: {0}")]
    Shape(#[from] toml::de::Error),
    #[error("config validation failed: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

/// Load `default.toml`, then `{RUN_ENV}.toml` from `CONFIG_DIR` (`config` when
/// unset), then environment overrides. Missing files are skipped.
pub fn load_config() -> Result<TranscribeConfig, ConfigError> {
    let run_env = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".to_string());
    let dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    load_config_from(Path::new(&dir), &run_env, std::env::vars())
}

pub fn load_config_from(
    dir: &Path,
    run_env: &str,
    vars: impl IntoIterator<Item = (String, String)>,
) -> Result<TranscribeConfig, ConfigError> {
    let mut merged = Table::new();

    for name in ["default".to_string(), run_env.to_string()] {
        let path = dir.join(format!("{name}.toml"));
        if let Some(table) = read_table(&path)? {
            tracing::debug!(path = %path.display(), "merging config file");
            merge_tables(&mut merged, table);
        }
    }

    let prefix = format!("{CONFIG_PREFIX}{PATH_SEPARATOR}");
    let mut overrides: Vec<(String, String)> = vars
        .into_iter()
        .filter(|(key, _)| key.starts_with(&prefix))
        .collect();
    overrides.sort();
    for (key, raw) in overrides {
        apply_override(&mut merged, &key[prefix.len()..], &raw).map_err(|reason| {
            ConfigError::Override {
                key: key.clone(),
                reason,
            }
        })?;
    }

    let config: TranscribeConfig = Value::Table(merged).try_into()?;
    config.validate()?;
    Ok(config)
}

fn read_table(path: &Path) -> Result<Option<Table>, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    toml::from_str::<Table>(&text)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

fn merge_tables(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(existing)), Value::Table(incoming)) => {
                merge_tables(existing, incoming)
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn apply_override(root: &mut Table, path: &str, raw: &str) -> Result<(), String> {
    let segments: Vec<String> = path
        .split(PATH_SEPARATOR)
        .map(|segment| segment.to_ascii_lowercase())
        .collect();
    let Some((leaf, parents)) = segments.split_last() else {
        return Err("empty key path".to_string());
    };
    if leaf.is_empty() || parents.iter().any(String::is_empty) {
        return Err("empty key segment".to_string());
    }

    let mut table = root;
    for segment in parents {
        let entry = table
            .entry(segment.clone())
            .or_insert(Value::Table(Table::new()));
        table = match entry {
            Value::Table(inner) => inner,
            _ => return Err(format!("`{segment}` is not a table")),
        };
    }
    table.insert(leaf.clone(), parse_scalar(raw));
    Ok(())
}

/// Interpret an override as a TOML value (number, bool, array, quoted string),
/// falling back to a bare string.
fn parse_scalar(raw: &str) -> Value {
    toml::from_str::<Table>(&format!("value = {raw}"))
        .ok()
        .and_then(|mut table| table.remove("value"))
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FailurePolicy;

    fn no_env() -> Vec<(String, String)> {
        Vec::new()
    }

    #[test]
    fn missing_files_yield_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(dir.path(), "test", no_env()).unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.service.batch.max_concurrent_files, 2);
    }

    #[test]
    fn env_file_overrides_default_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("default.toml"),
            "[server]\nport = 7000\nhost = \"127.0.0.1\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("test.toml"), "[server]\nport = 7100\n").unwrap();

        let cfg = load_config_from(dir.path(), "test", no_env()).unwrap();
        assert_eq!(cfg.server.port, 7100);
        assert_eq!(cfg.server.host, "127.0.0.1");
    }

    #[test]
    fn environment_variables_override_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("default.toml"), "[server]\nport = 7000\n").unwrap();
        let vars = vec![
            ("TRANSCRIBE_SERVICE__SERVER__PORT".to_string(), "9000".to_string()),
            (
                "TRANSCRIBE_SERVICE__SERVICE__BATCH__FAILURE_POLICY".to_string(),
                "partial".to_string(),
            ),
            (
                "TRANSCRIBE_SERVICE__SERVICE__ALIGNMENT__PRELOAD".to_string(),
                "[\"en\", \"fr\"]".to_string(),
            ),
            ("UNRELATED".to_string(), "1".to_string()),
        ];

        let cfg = load_config_from(dir.path(), "test", vars).unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.service.batch.failure_policy, FailurePolicy::Partial);
        assert_eq!(cfg.service.alignment.preload, vec!["en", "fr"]);
    }

    #[test]
    fn invalid_values_fail_validation() {
        let dir = tempfile::tempdir().unwrap();
        let vars = vec![(
            "TRANSCRIBE_SERVICE__SERVICE__AUDIO__TARGET_SAMPLE_RATE_HZ".to_string(),
            "100".to_string(),
        )];
        let err = load_config_from(dir.path(), "test", vars).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_file_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("default.toml"), "[server\nport = ").unwrap();
        let err = load_config_from(dir.path(), "test", no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
