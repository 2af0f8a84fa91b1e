use std::env;
use std::path::PathBuf;
use taskmill_core::{APP_NAME, CACHE_FILENAME, CONFIG_FILENAME};

/// XDG Base Directory paths for taskmill
pub struct XdgPaths;

impl XdgPaths {
    /// Get XDG_CONFIG_HOME/taskmill or fallback
    pub fn config_dir() -> PathBuf {
        base_dir("XDG_CONFIG_HOME", ".config").join(APP_NAME)
    }

    /// Get XDG_CACHE_HOME/taskmill or fallback
    pub fn cache_dir() -> PathBuf {
        base_dir("XDG_CACHE_HOME", ".cache").join(APP_NAME)
    }

    /// Default location of the configuration file
    pub fn config_file() -> PathBuf {
        Self::config_dir().join(CONFIG_FILENAME)
    }

    /// Default location of the result cache snapshot
    pub fn cache_file() -> PathBuf {
        Self::cache_dir().join(CACHE_FILENAME)
    }
}

fn base_dir(var: &str, home_relative: &str) -> PathBuf {
    env::var(var)
        .ok()
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .map(|home| home.join(home_relative))
                .unwrap_or_else(|| PathBuf::from(home_relative))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn with_var<F: FnOnce()>(key: &str, value: Option<&str>, f: F) {
        let original = env::var(key).ok();
        match value {
            Some(v) => env::set_var(key, v),
            None => env::remove_var(key),
        }
        f();
        match original {
            Some(v) => env::set_var(key, v),
            None => env::remove_var(key),
        }
    }

    #[test]
    #[serial]
    fn test_xdg_paths_with_env() {
        with_var("XDG_CONFIG_HOME", Some("/tmp/config"), || {
            assert_eq!(XdgPaths::config_dir(), PathBuf::from("/tmp/config/taskmill"));
            assert_eq!(
                XdgPaths::config_file(),
                PathBuf::from("/tmp/config/taskmill/config.json")
            );
        });
        with_var("XDG_CACHE_HOME", Some("/tmp/cache"), || {
            assert_eq!(
                XdgPaths::cache_file(),
                PathBuf::from("/tmp/cache/taskmill/cache.json")
            );
        });
    }

    #[test]
    #[serial]
    fn test_empty_var_falls_back_to_home() {
        with_var("XDG_CACHE_HOME", Some(""), || {
            let dir = XdgPaths::cache_dir();
            assert!(dir.ends_with(".cache/taskmill"));
        });
    }
}
