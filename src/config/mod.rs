pub mod schema;

use crate::error::{PluginError, Result};
use schema::AppConfig;
use std::path::Path;
use tracing::debug;

/// Load and parse configuration from a TOML file.
///
/// # Errors
/// Returns `PluginError::ConfigNotFound` if the file doesn't exist,
/// `PluginError::Io` on read errors, `PluginError::TomlParse` on syntax errors,
/// or `PluginError::Config` on validation failures.
pub fn load(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Err(PluginError::ConfigNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    let content = expand_env_vars(&content);
    let config: AppConfig = toml::from_str(&content)?;

    validate(&config)?;
    Ok(config)
}

/// Like [`load`], but a missing file yields the defaults.
///
/// # Errors
/// Same as [`load`], except for `ConfigNotFound`.
pub fn load_or_default(path: &Path) -> Result<AppConfig> {
    match load(path) {
        Err(PluginError::ConfigNotFound(_)) => {
            debug!("no config at {}, using defaults", path.display());
            Ok(AppConfig::default())
        }
        other => other,
    }
}

/// Expand `${VAR}` and `$VAR` patterns in the config string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }

        if chars.peek() == Some(&'{') {
            chars.next();
            let var_name: String = chars.by_ref().take_while(|&c| c != '}').collect();
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    use std::fmt::Write;
                    let _ = write!(result, "${{{var_name}}}");
                }
            }
        } else {
            let mut var_name = String::new();
            while let Some(&c) = chars.peek() {
                if !(c.is_alphanumeric() || c == '_') {
                    break;
                }
                var_name.push(c);
                chars.next();
            }
            if var_name.is_empty() {
                result.push('$');
            } else if let Ok(val) = std::env::var(&var_name) {
                result.push_str(&val);
            } else {
                result.push('$');
                result.push_str(&var_name);
            }
        }
    }

    result
}

/// Validate config constraints.
fn validate(config: &AppConfig) -> Result<()> {
    if config.obs.host.trim().is_empty() {
        return Err(PluginError::Config("obs.host must not be empty".to_string()));
    }

    if config.obs.port == 0 {
        return Err(PluginError::Config("obs.port must be non-zero".to_string()));
    }

    if config.obs.request_timeout_ms == 0 {
        return Err(PluginError::Config(
            "obs.request_timeout_ms must be greater than 0".to_string(),
        ));
    }

    Ok(())
}
