use super::schema::Schema;
use super::source::RawMapping;

/// Snapshot of the process environment.
///
/// Variables whose name or value is not valid unicode are skipped.
pub fn read_process_env() -> RawMapping {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

/// Picks the schema's keys out of an environment snapshot.
///
/// Empty values count as unset.
pub fn env_pairs(env: &RawMapping, schema: &Schema) -> RawMapping {
    schema
        .names()
        .filter_map(|name| {
            env.get(name)
                .filter(|value| !value.is_empty())
                .map(|value| (name.to_string(), value.clone()))
        })
        .collect()
}
