//! Env-file reader.
//!
//! The format is one `KEY=VALUE` pair per line, with no quoting, escaping or
//! comments. Each line is trimmed and split on its first `=`, so values may
//! themselves contain `=`. Blank lines are skipped.

use std::path::Path;

use super::source::RawMapping;
use super::ConfigError;

/// Reads and parses an env file.
///
/// Fails with [`ConfigError::FileNotFound`] if `path` is not an existing file.
pub fn load_raw_pairs(path: &Path) -> Result<RawMapping, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse_raw_pairs(&contents, path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ConfigError::FileNotFound(path.to_path_buf()))
        }
        Err(e) => Err(ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Parses env-file contents. `path` is only used for error reporting.
pub fn parse_raw_pairs(contents: &str, path: &Path) -> Result<RawMapping, ConfigError> {
    let mut pairs = RawMapping::new();

    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| ConfigError::ParseError {
            path: path.to_path_buf(),
            line: index + 1,
            content: line.to_string(),
        })?;
        pairs.insert(key.to_string(), value.to_string());
    }

    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_loads_valid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "TOKEN=abc").unwrap();
        writeln!(file, "LIST=10,11,12").unwrap();

        let pairs = load_raw_pairs(file.path()).unwrap();

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs["TOKEN"], "abc");
        assert_eq!(pairs["LIST"], "10,11,12");
    }

    #[test]
    fn test_missing_file() {
        let result = load_raw_pairs(Path::new("/nonexistent/path/.env"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_splits_on_first_equals_only() {
        let pairs = parse_raw_pairs("DSN=postgres://u@h/db?sslmode=require\n", Path::new(".env")).unwrap();
        assert_eq!(pairs["DSN"], "postgres://u@h/db?sslmode=require");
    }

    #[test]
    fn test_strips_line_endings_and_blank_lines() {
        let pairs = parse_raw_pairs("A=1\r\n\n   \nB=\n", Path::new(".env")).unwrap();
        assert_eq!(pairs["A"], "1");
        assert_eq!(pairs["B"], "");
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn test_line_without_equals() {
        let result = parse_raw_pairs("A=1\nGARBAGE\n", Path::new(".env"));
        assert!(matches!(
            result,
            Err(ConfigError::ParseError { line: 2, ref content, .. }) if content == "GARBAGE"
        ));
    }

    #[test]
    fn test_later_duplicate_wins() {
        let pairs = parse_raw_pairs("A=1\nA=2\n", Path::new(".env")).unwrap();
        assert_eq!(pairs["A"], "2");
    }
}
