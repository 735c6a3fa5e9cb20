//! Configuration loading from defaults, TOML files and environment variables

use super::SandboxConfig;
use crate::error::{SandboxError, SandboxResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of environment overrides
const ENV_PREFIX: &str = "RUNBOX_";

/// Source of configuration data
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Built-in defaults
    Default,
    /// A TOML file; replaces everything loaded before it
    File(PathBuf),
    /// `RUNBOX_*` variables; override individual fields
    Environment(HashMap<String, String>),
}

/// Configuration loader with support for multiple sources, applied in order
pub struct ConfigLoader {
    sources: Vec<ConfigSource>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn add_source(mut self, source: ConfigSource) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_defaults(self) -> Self {
        self.add_source(ConfigSource::Default)
    }

    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Self {
        self.add_source(ConfigSource::File(path.as_ref().to_path_buf()))
    }

    /// Snapshot the process environment
    pub fn with_env(self) -> Self {
        let vars = std::env::vars()
            .filter(|(k, _)| k.starts_with(ENV_PREFIX))
            .collect();
        self.add_source(ConfigSource::Environment(vars))
    }

    /// Use an explicit set of variables instead of the process environment
    pub fn with_env_vars<I, K, V>(self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.add_source(ConfigSource::Environment(vars))
    }

    /// Load configuration from all sources and validate it
    pub fn load(self) -> SandboxResult<SandboxConfig> {
        let mut config = SandboxConfig::default();

        for source in &self.sources {
            match source {
                ConfigSource::Default => {
                    tracing::debug!("Loading default sandbox config");
                    config = SandboxConfig::default();
                }
                ConfigSource::File(path) => {
                    tracing::debug!("Loading sandbox config from file: {}", path.display());
                    let text = std::fs::read_to_string(path).map_err(|e| {
                        SandboxError::InvalidConfig(format!(
                            "cannot read {}: {}",
                            path.display(),
                            e
                        ))
                    })?;
                    config = toml::from_str(&text)?;
                }
                ConfigSource::Environment(vars) => {
                    tracing::debug!("Applying {} environment overrides", vars.len());
                    apply_env_overrides(&mut config, vars)?;
                }
            }
        }

        config.validate()?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_env_overrides(
    config: &mut SandboxConfig,
    vars: &HashMap<String, String>,
) -> SandboxResult<()> {
    for (key, value) in vars {
        let Some(name) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        match name {
            "BACKEND" => config.backend = value.clone(),
            "IMAGE" => config.image = value.clone(),
            "PYTHON" => config.python_executable = value.clone(),
            "TIMEOUT" => config.default_timeout = Duration::from_secs(parse_number(key, value)?),
            "MAX_TIMEOUT" => config.max_timeout_secs = parse_number(key, value)?,
            "MEMORY" => config.default_memory_bytes = parse_number(key, value)?,
            "MAX_MEMORY" => config.max_memory_bytes = parse_number(key, value)?,
            "CPU" => {
                config.cpu_limit = value.parse().map_err(|_| {
                    SandboxError::InvalidConfig(format!("{} is not a number: {}", key, value))
                })?
            }
            "TEMP_DIR" => config.temp_dir = PathBuf::from(value),
            "MAX_OUTPUT" => config.max_output_size = parse_number(key, value)? as usize,
            "AUDIT_LOG" => config.audit_log = Some(PathBuf::from(value)),
            "ALLOWED_IMPORTS" => {
                config.allowed_imports = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            }
            _ => tracing::debug!("Ignoring unknown override {}", key),
        }
    }
    Ok(())
}

fn parse_number(key: &str, value: &str) -> SandboxResult<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| SandboxError::InvalidConfig(format!("{} is not an integer: {}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_only() {
        let config = ConfigLoader::new().with_defaults().load().unwrap();
        assert_eq!(config.backend, "local");
    }

    #[test]
    fn test_file_then_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "backend = \"container\"\nimage = \"python:3.12\"").unwrap();

        let config = ConfigLoader::new()
            .with_defaults()
            .with_file(file.path())
            .with_env_vars([("RUNBOX_IMAGE", "python:3.13"), ("RUNBOX_TIMEOUT", "12")])
            .load()
            .unwrap();

        assert_eq!(config.backend, "container");
        assert_eq!(config.image, "python:3.13");
        assert_eq!(config.default_timeout, Duration::from_secs(12));
    }

    #[test]
    fn test_env_allowed_imports() {
        let config = ConfigLoader::new()
            .with_env_vars([("RUNBOX_ALLOWED_IMPORTS", "math, json ,")])
            .load()
            .unwrap();
        assert_eq!(config.allowed_imports, vec!["math", "json"]);
    }

    #[test]
    fn test_bad_env_value() {
        let result = ConfigLoader::new()
            .with_env_vars([("RUNBOX_TIMEOUT", "soon")])
            .load();
        assert!(matches!(result, Err(SandboxError::InvalidConfig(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigLoader::new()
            .with_file("/definitely/not/here/runbox.toml")
            .load();
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_runs_after_merge() {
        let result = ConfigLoader::new()
            .with_env_vars([("RUNBOX_CPU", "0")])
            .load();
        assert!(result.is_err());
    }
}
