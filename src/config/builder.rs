use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use super::cache::ParseCache;
use super::coerce::coerce_mapping;
use super::env::{env_pairs, read_process_env};
use super::materialize::{materialize, FieldStore, MaterializedConfig};
use super::schema::Schema;
use super::source::{merge, restrict_to_schema, Precedence, RawMapping};
use super::ConfigError;

/// Construction-time options of a [`ConfigLoader`].
///
/// Deserializable so the options themselves can come from a TOML table:
///
/// ```
/// use envmap::LoaderOptions;
///
/// let options = LoaderOptions::from_toml_str(
///     r#"
///     envfile = "/etc/app/.env"
///     override = true
///     "#,
/// )?;
/// assert!(options.override_env);
/// assert!(!options.frozen);
/// # Ok::<(), envmap::ConfigError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderOptions {
    /// Env file to read. Must exist when set.
    pub envfile: Option<PathBuf>,
    /// When true, env file values beat process environment values.
    #[serde(rename = "override")]
    pub override_env: bool,
    /// When true, the built config is frozen after population.
    pub frozen: bool,
}

impl LoaderOptions {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Deserialize)
    }
}

/// Builder that materializes a [`Schema`] from an env file and the process
/// environment.
///
/// Only keys declared in the schema are read from either source. By default
/// the process environment wins over the file on a shared key; set
/// [`with_override`](Self::with_override) to flip that.
///
/// ## Example
///
/// ```no_run
/// use envmap::{ConfigLoader, Schema, TypeDescriptor};
///
/// let schema = Schema::new("Telegram")
///     .field("TOKEN", TypeDescriptor::str())
///     .field("ADMINS", TypeDescriptor::set(TypeDescriptor::int()));
///
/// let config = ConfigLoader::new(schema)
///     .with_envfile(".env")
///     .with_frozen(true)
///     .build()?;
///
/// let token = config.get("TOKEN").and_then(|v| v.as_str());
/// # Ok::<(), envmap::ConfigError>(())
/// ```
#[derive(Debug)]
#[must_use = "builders do nothing until .build() is called"]
pub struct ConfigLoader {
    schema: Arc<Schema>,
    options: LoaderOptions,
    cache: Arc<ParseCache>,
    env: Option<RawMapping>,
}

impl ConfigLoader {
    pub fn new(schema: impl Into<Arc<Schema>>) -> Self {
        Self {
            schema: schema.into(),
            options: LoaderOptions::default(),
            cache: ParseCache::global(),
            env: None,
        }
    }

    /// Reads the env file at `path`. Building fails if it doesn't exist.
    pub fn with_envfile(mut self, path: impl AsRef<Path>) -> Self {
        self.options.envfile = Some(path.as_ref().to_path_buf());
        self
    }

    /// When `true`, env file values take precedence over the process environment.
    pub fn with_override(mut self, override_env: bool) -> Self {
        self.options.override_env = override_env;
        self
    }

    /// When `true`, the built config rejects further mutation.
    pub fn with_frozen(mut self, frozen: bool) -> Self {
        self.options.frozen = frozen;
        self
    }

    pub fn with_options(mut self, options: LoaderOptions) -> Self {
        self.options = options;
        self
    }

    /// Uses `cache` instead of the process-wide parse cache.
    pub fn with_cache(mut self, cache: Arc<ParseCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Reads variables from `vars` instead of the process environment.
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Loads, merges and coerces the sources into a new [`MaterializedConfig`].
    pub fn build(self) -> Result<MaterializedConfig, ConfigError> {
        let target = MaterializedConfig::new(Arc::clone(&self.schema));
        self.build_into(target)
    }

    /// Loads, merges and coerces the sources onto an existing target.
    ///
    /// Nothing is written to `target` unless every field resolves and coerces.
    pub fn build_into<T: FieldStore>(self, mut target: T) -> Result<T, ConfigError> {
        let file = match &self.options.envfile {
            Some(path) => restrict_to_schema(self.cache.get_or_load(path)?, &self.schema),
            None => {
                if self.options.override_env {
                    warn!(
                        schema = self.schema.name(),
                        "override requested without an env file, nothing to override"
                    );
                }
                RawMapping::new()
            }
        };

        let env = match &self.env {
            Some(vars) => env_pairs(vars, &self.schema),
            None => env_pairs(&read_process_env(), &self.schema),
        };

        let precedence = Precedence::from_override(self.options.override_env);
        let merged = merge(&file, &env, precedence)?;
        let typed = coerce_mapping(&self.schema, &merged)?;
        materialize(&self.schema, typed, &mut target, self.options.frozen)?;

        debug!(
            schema = self.schema.name(),
            fields = self.schema.len(),
            frozen = self.options.frozen,
            "materialized config"
        );
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::coerce::TypedValue;
    use crate::config::schema::TypeDescriptor;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file
    }

    fn schema() -> Schema {
        Schema::new("App")
            .field("HOST", TypeDescriptor::str())
            .field("PORT", TypeDescriptor::int())
    }

    fn loader() -> ConfigLoader {
        ConfigLoader::new(schema()).with_cache(Arc::new(ParseCache::new(4)))
    }

    #[test]
    fn test_env_wins_by_default() {
        let file = env_file("HOST=file-host\nPORT=1\n");
        let config = loader()
            .with_envfile(file.path())
            .with_env_vars([("PORT", "2")])
            .build()
            .unwrap();

        assert_eq!(config.get("HOST"), Some(&TypedValue::Str("file-host".into())));
        assert_eq!(config.get("PORT"), Some(&TypedValue::Int(2)));
    }

    #[test]
    fn test_override_makes_file_win() {
        let file = env_file("HOST=file-host\nPORT=1\n");
        let config = loader()
            .with_envfile(file.path())
            .with_override(true)
            .with_env_vars([("PORT", "2")])
            .build()
            .unwrap();

        assert_eq!(config.get("PORT"), Some(&TypedValue::Int(1)));
    }

    #[test]
    fn test_missing_envfile() {
        let result = loader()
            .with_envfile("/nonexistent/.env")
            .with_env_vars([("HOST", "h"), ("PORT", "1")])
            .build();

        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_empty_sources() {
        let result = loader().with_env_vars([("UNRELATED", "x")]).build();

        assert!(matches!(result, Err(ConfigError::EmptySources)));
    }

    #[test]
    fn test_file_keys_outside_schema_are_ignored() {
        let file = env_file("HOST=h\nPORT=1\nSECRET=s\n");
        let config = loader()
            .with_envfile(file.path())
            .with_env_vars(Vec::<(String, String)>::new())
            .build()
            .unwrap();

        assert_eq!(config.len(), 2);
        assert!(!config.contains("SECRET"));
    }

    #[test]
    fn test_frozen_option() {
        let config = loader()
            .with_frozen(true)
            .with_env_vars([("HOST", "h"), ("PORT", "1")])
            .build()
            .unwrap();

        assert!(config.is_frozen());
    }

    #[test]
    fn test_with_options() {
        let file = env_file("HOST=h\nPORT=1\n");
        let options = LoaderOptions {
            envfile: Some(file.path().to_path_buf()),
            override_env: true,
            frozen: true,
        };
        let config = loader()
            .with_options(options)
            .with_env_vars([("PORT", "9")])
            .build()
            .unwrap();

        assert_eq!(config.get("PORT"), Some(&TypedValue::Int(1)));
        assert!(config.is_frozen());
    }

    #[test]
    fn test_options_from_toml_defaults() {
        let options = LoaderOptions::from_toml_str("").unwrap();
        assert_eq!(options, LoaderOptions::default());

        let result = LoaderOptions::from_toml_str("unknown = 1");
        assert!(matches!(result, Err(ConfigError::Deserialize(_))));
    }

    struct Recorder {
        writes: Vec<String>,
        frozen: bool,
    }

    impl FieldStore for Recorder {
        fn assign(&mut self, name: &str, _value: TypedValue) -> Result<(), ConfigError> {
            assert!(!self.frozen, "write after freeze");
            self.writes.push(name.to_string());
            Ok(())
        }

        fn freeze(&mut self) {
            self.frozen = true;
        }
    }

    #[test]
    fn test_build_into_custom_target() {
        let recorder = Recorder {
            writes: Vec::new(),
            frozen: false,
        };
        let recorder = loader()
            .with_frozen(true)
            .with_env_vars([("PORT", "1"), ("HOST", "h")])
            .build_into(recorder)
            .unwrap();

        assert_eq!(recorder.writes, ["HOST", "PORT"]);
        assert!(recorder.frozen);
    }

    #[test]
    fn test_coerce_failure_aborts_build() {
        let recorder = Recorder {
            writes: Vec::new(),
            frozen: false,
        };
        let result = loader()
            .with_env_vars([("HOST", "h"), ("PORT", "not-a-number")])
            .build_into(recorder);

        assert!(matches!(result, Err(ConfigError::Coerce { .. })));
    }
}
