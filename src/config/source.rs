use std::collections::BTreeMap;

use tracing::debug;

use super::schema::Schema;
use super::ConfigError;

/// Raw `KEY -> VALUE` strings from one source.
pub type RawMapping = BTreeMap<String, String>;

/// Which source wins when a key is present in both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precedence {
    /// Process environment beats the env file.
    #[default]
    EnvFirst,
    /// The env file beats the process environment.
    FileFirst,
}

impl Precedence {
    pub fn from_override(override_env: bool) -> Self {
        if override_env {
            Precedence::FileFirst
        } else {
            Precedence::EnvFirst
        }
    }
}

/// Keeps only the pairs whose key is declared in `schema`.
pub fn restrict_to_schema(mapping: RawMapping, schema: &Schema) -> RawMapping {
    mapping
        .into_iter()
        .filter(|(key, _)| schema.contains(key))
        .collect()
}

/// Merges the file and environment mappings into a fresh mapping.
///
/// Keys present in only one source are taken from it; on collision the
/// `precedence` decides. Fails when both sources are empty.
pub fn merge(
    file: &RawMapping,
    env: &RawMapping,
    precedence: Precedence,
) -> Result<RawMapping, ConfigError> {
    if file.is_empty() && env.is_empty() {
        return Err(ConfigError::EmptySources);
    }

    let (base, overlay) = match precedence {
        Precedence::EnvFirst => (file, env),
        Precedence::FileFirst => (env, file),
    };

    let mut merged = base.clone();
    merged.extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));

    debug!(
        file_keys = file.len(),
        env_keys = env.len(),
        merged_keys = merged.len(),
        ?precedence,
        "merged config sources"
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TypeDescriptor;

    fn mapping(pairs: &[(&str, &str)]) -> RawMapping {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_file_first_wins_on_collision() {
        let file = mapping(&[("A", "1")]);
        let env = mapping(&[("A", "2")]);

        let merged = merge(&file, &env, Precedence::FileFirst).unwrap();
        assert_eq!(merged, mapping(&[("A", "1")]));
    }

    #[test]
    fn test_env_first_wins_on_collision() {
        let file = mapping(&[("A", "1")]);
        let env = mapping(&[("A", "2")]);

        let merged = merge(&file, &env, Precedence::EnvFirst).unwrap();
        assert_eq!(merged, mapping(&[("A", "2")]));
    }

    #[test]
    fn test_single_source_keys_survive_either_way() {
        let file = mapping(&[("A", "1"), ("B", "file")]);
        let env = mapping(&[("A", "2"), ("C", "env")]);

        for precedence in [Precedence::EnvFirst, Precedence::FileFirst] {
            let merged = merge(&file, &env, precedence).unwrap();
            assert_eq!(merged["B"], "file");
            assert_eq!(merged["C"], "env");
        }
    }

    #[test]
    fn test_empty_sources() {
        let result = merge(&RawMapping::new(), &RawMapping::new(), Precedence::EnvFirst);
        assert!(matches!(result, Err(ConfigError::EmptySources)));
    }

    #[test]
    fn test_merged_does_not_alias_sources() {
        let file = mapping(&[("A", "1")]);
        let env = RawMapping::new();

        let mut merged = merge(&file, &env, Precedence::EnvFirst).unwrap();
        merged.insert("A".into(), "changed".into());
        assert_eq!(file["A"], "1");
    }

    #[test]
    fn test_restrict_to_schema() {
        let schema = Schema::new("App").field("A", TypeDescriptor::str());
        let restricted = restrict_to_schema(mapping(&[("A", "1"), ("PATH", "/bin")]), &schema);
        assert_eq!(restricted, mapping(&[("A", "1")]));
    }

    #[test]
    fn test_precedence_from_override() {
        assert_eq!(Precedence::from_override(true), Precedence::FileFirst);
        assert_eq!(Precedence::from_override(false), Precedence::EnvFirst);
    }
}
