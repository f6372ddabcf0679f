//! CLI argument validation functions
//!
//! Custom value parsers for arguments clap cannot validate on its own.

use std::fs;
use std::path::PathBuf;

use serde_json::Value;

use crate::messaging::provider::ProviderKind;

/// Validate that a file path is accessible (exists and is readable)
pub fn validate_config_file_path(path_str: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(format!("Configuration file does not exist: '{}'", path_str));
    }

    if !path.is_file() {
        return Err(format!("Configuration path is not a file: '{}'", path_str));
    }

    match fs::File::open(&path) {
        Ok(_) => Ok(path),
        Err(e) => Err(format!("Cannot read configuration file '{}': {}", path_str, e)),
    }
}

/// Parse a transport provider name
pub fn parse_provider(name: &str) -> Result<ProviderKind, String> {
    name.parse::<ProviderKind>().map_err(|_| {
        format!(
            "Unknown transport provider '{}'. Valid providers are: {}",
            name,
            ProviderKind::ALL.map(|k| k.as_str()).join(", ")
        )
    })
}

/// Parse a `key=value` template variable
///
/// The value is read as JSON when it parses as JSON (`3`, `true`,
/// `["a","b"]`) and taken as a plain string otherwise.
pub fn parse_var(input: &str) -> Result<(String, Value), String> {
    let (key, raw) = input
        .split_once('=')
        .ok_or_else(|| format!("Expected KEY=VALUE, got: '{}'", input))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("Variable name cannot be empty: '{}'", input));
    }

    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_file_path_validation() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        assert_eq!(validate_config_file_path(path).unwrap(), PathBuf::from(path));

        assert!(validate_config_file_path("/definitely/not/here.toml").is_err());

        let dir = tempfile::TempDir::new().unwrap();
        assert!(validate_config_file_path(dir.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_parse_provider() {
        assert_eq!(parse_provider("smtp").unwrap(), ProviderKind::Mail);
        assert_eq!(parse_provider("sendgrid").unwrap(), ProviderKind::SendGrid);
        let err = parse_provider("pigeon").unwrap_err();
        assert!(err.contains("pigeon"));
        assert!(err.contains("mail, sms"));
    }

    #[test]
    fn test_parse_var_values() {
        assert_eq!(parse_var("name=Ada").unwrap(), ("name".to_string(), json!("Ada")));
        assert_eq!(parse_var("count=3").unwrap(), ("count".to_string(), json!(3)));
        assert_eq!(parse_var("vip=true").unwrap(), ("vip".to_string(), json!(true)));
        assert_eq!(
            parse_var("tags=[\"a\",\"b\"]").unwrap(),
            ("tags".to_string(), json!(["a", "b"]))
        );
        // Only the first '=' separates key and value
        assert_eq!(parse_var("expr=a=b").unwrap(), ("expr".to_string(), json!("a=b")));
        assert_eq!(parse_var("empty=").unwrap(), ("empty".to_string(), json!("")));
    }

    #[test]
    fn test_parse_var_invalid() {
        assert!(parse_var("no-separator").is_err());
        assert!(parse_var("=value").is_err());
        assert!(parse_var(" =value").is_err());
    }
}
