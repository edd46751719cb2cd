//! Load `.env` and typed `ARCOR2_*` settings for the hub, one place for all
//! env/config, with priority: **existing env > .env**.

mod dotenv;
mod settings;

use std::path::Path;
use thiserror::Error;

pub use settings::Settings;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("read .env: {0}")]
    DotenvRead(std::io::Error),
    #[error("invalid value for {key}: {value}")]
    BadValue { key: String, value: String },
}

/// Loads `.env` (current directory, or `override_dir` if given) and sets
/// environment variables only for keys that are **not** already set, so the
/// process environment always wins. Returns the typed [`Settings`] read from
/// the resulting environment.
pub fn load_and_apply(override_dir: Option<&Path>) -> Result<Settings, LoadError> {
    let dotenv_map = dotenv::load_env_map(override_dir).map_err(LoadError::DotenvRead)?;

    for (key, value) in dotenv_map {
        if std::env::var(&key).is_err() {
            std::env::set_var(key, value);
        }
    }

    Settings::from_env()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn existing_env_wins_over_dotenv() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "CONFIG_TEST_PRIO=from_dotenv\n").unwrap();
        env::set_var("CONFIG_TEST_PRIO", "from_env");
        let _ = load_and_apply(Some(dir.path()));
        assert_eq!(env::var("CONFIG_TEST_PRIO").as_deref(), Ok("from_env"));
        env::remove_var("CONFIG_TEST_PRIO");
    }

    #[test]
    fn dotenv_applied_when_env_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "CONFIG_TEST_FILL=from_dotenv\n").unwrap();
        env::remove_var("CONFIG_TEST_FILL");
        let _ = load_and_apply(Some(dir.path()));
        assert_eq!(env::var("CONFIG_TEST_FILL").as_deref(), Ok("from_dotenv"));
        env::remove_var("CONFIG_TEST_FILL");
    }

    #[test]
    fn no_dotenv_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_and_apply(Some(dir.path())).is_ok());
    }
}
