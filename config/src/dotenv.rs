//! Parse `.env` into a key-value map (applied to the environment in lib, env wins).

use std::collections::HashMap;
use std::path::Path;

/// Strips surrounding quotes from a value. Double quotes support `\"`;
/// single quotes are stripped verbatim. No multiline values.
fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        return value[1..value.len() - 1].replace("\\\"", "\"");
    }
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value[1..value.len() - 1].to_string();
    }
    value.to_string()
}

/// Lines are KEY=VALUE; empty lines and `#` comments are skipped, keys and
/// values trimmed. A `#` inside a value is kept.
fn parse(content: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            if !key.is_empty() {
                map.insert(key.to_string(), unquote(value.trim()));
            }
        }
    }
    map
}

/// Loads `.env` from `override_dir` (or the current directory) into a map.
/// A missing file is not an error and yields an empty map.
pub fn load_env_map(override_dir: Option<&Path>) -> std::io::Result<HashMap<String, String>> {
    let dir = match override_dir {
        Some(d) => d.to_path_buf(),
        None => match std::env::current_dir() {
            Ok(d) => d,
            Err(_) => return Ok(HashMap::new()),
        },
    };
    let path = dir.join(".env");
    if !path.is_file() {
        return Ok(HashMap::new());
    }
    Ok(parse(&std::fs::read_to_string(path)?))
}
