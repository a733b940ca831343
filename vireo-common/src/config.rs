//! Configuration resolution
//!
//! Settings are resolved with a fixed priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file key
//! 4. Compiled default (fallback)

use std::path::PathBuf;

/// Resolve a string setting following the priority order above.
///
/// `file_key` is looked up at the top level of the config file. Returns
/// `default` when no higher-priority source provides a value.
pub fn resolve_setting(
    cli_arg: Option<&str>,
    env_var_name: &str,
    file_key: &str,
    default: &str,
) -> String {
    // Priority 1: Command-line argument
    if let Some(value) = cli_arg {
        return value.to_string();
    }

    // Priority 2: Environment variable
    if let Ok(value) = std::env::var(env_var_name) {
        if !value.is_empty() {
            return value;
        }
    }

    // Priority 3: TOML config file
    if let Some(config_path) = config_file_path() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(value) = config.get(file_key).and_then(|v| v.as_str()) {
                    return value.to_string();
                }
            }
        }
    }

    // Priority 4: Compiled default
    default.to_string()
}

/// Default configuration file path for the platform
///
/// Linux: `~/.config/vireo/config.toml`, falling back to
/// `/etc/vireo/config.toml` when no user config exists.
pub fn config_file_path() -> Option<PathBuf> {
    if cfg!(target_os = "linux") {
        let user_config = dirs::config_dir().map(|d| d.join("vireo").join("config.toml"));
        if let Some(path) = &user_config {
            if path.exists() {
                return user_config;
            }
        }
        let system_config = PathBuf::from("/etc/vireo/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
        user_config
    } else {
        dirs::config_dir().map(|d| d.join("vireo").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_arg_wins() {
        let value = resolve_setting(Some("from-cli"), "VIREO_TEST_UNSET_VAR", "key", "default");
        assert_eq!(value, "from-cli");
    }

    #[test]
    fn test_env_var_beats_default() {
        std::env::set_var("VIREO_TEST_CONFIG_VAR", "from-env");
        let value = resolve_setting(None, "VIREO_TEST_CONFIG_VAR", "key", "default");
        assert_eq!(value, "from-env");
        std::env::remove_var("VIREO_TEST_CONFIG_VAR");
    }

    #[test]
    fn test_default_fallback() {
        let value = resolve_setting(None, "VIREO_TEST_DEFINITELY_UNSET", "no_such_key", "default");
        assert_eq!(value, "default");
    }

    #[test]
    fn test_empty_env_var_ignored() {
        std::env::set_var("VIREO_TEST_EMPTY_VAR", "");
        let value = resolve_setting(None, "VIREO_TEST_EMPTY_VAR", "key", "default");
        assert_eq!(value, "default");
        std::env::remove_var("VIREO_TEST_EMPTY_VAR");
    }
}
