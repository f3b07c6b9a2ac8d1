//! User configuration loading
//!
//! The application may ship an optional config file next to its entry
//! module. Its `window` table is deep-merged over [`WindowConfig::default`]
//! before the window is created.
//!
//! ## Features
//!
//! - Auto-detection of format from file extension (YAML, TOML, JSON, INI, RON, JSON5)
//! - Environment variable substitution (`${VAR}` and `$VAR` syntax)
//! - Deep merge of the user `window` table into the defaults

use config::{Config as Cfg, File, FileFormat};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use std::sync::LazyLock;

use crate::surface::WindowConfig;

static BRACED_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("braced env var pattern is valid")
});

static BARE_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)\b").expect("bare env var pattern is valid")
});

/// Configuration loading error
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parsing error: {0}")]
    Parse(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Contents of the optional user config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserConfig {
    /// Partial [`WindowConfig`], merged over the defaults
    #[serde(default)]
    pub window: Option<serde_json::Value>,
}

/// Detect configuration format from file extension
pub fn detect_format(path: &Path) -> ConfigResult<FileFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| ConfigError::UnsupportedFormat("No file extension found".to_string()))?;

    match ext.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        "toml" => Ok(FileFormat::Toml),
        "json" => Ok(FileFormat::Json),
        "ini" => Ok(FileFormat::Ini),
        "ron" => Ok(FileFormat::Ron),
        "json5" => Ok(FileFormat::Json5),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}

/// Substitute environment variables in a string
///
/// `${VAR_NAME}` is replaced first, then bare `$VAR_NAME`. Unset variables
/// are left as written.
pub fn substitute_env_vars(content: &str) -> String {
    let result = BRACED_VAR.replace_all(content, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    });

    BARE_VAR
        .replace_all(&result, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

/// Parse user config from a string with explicit format
pub fn from_str(content: &str, format: FileFormat) -> ConfigResult<UserConfig> {
    let substituted = substitute_env_vars(content);

    let config = Cfg::builder()
        .add_source(File::from_str(&substituted, format))
        .build()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::Serialization(e.to_string()))
}

/// Load the user config file, if there is one.
///
/// A missing file is not an error and yields `Ok(None)`.
pub fn load_user_config(path: &Path) -> ConfigResult<Option<UserConfig>> {
    if !path.is_file() {
        return Ok(None);
    }

    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    from_str(&content, format).map(Some)
}

/// Recursively merge `overlay` into `base`.
///
/// Objects merge key by key; any other overlay value replaces the base value.
pub fn merge_values(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Build the final window config: defaults, then the user `window` table,
/// then the harness preload script (which always wins).
pub fn resolve_window_config(
    user: Option<&UserConfig>,
    preload: &Path,
) -> ConfigResult<WindowConfig> {
    let mut merged = serde_json::to_value(WindowConfig::default())
        .map_err(|e| ConfigError::Serialization(e.to_string()))?;

    if let Some(window) = user.and_then(|u| u.window.clone()) {
        merge_values(&mut merged, window);
    }

    let config: WindowConfig = serde_json::from_value(merged)
        .map_err(|e| ConfigError::Serialization(e.to_string()))?;

    Ok(config.with_preload(preload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(Path::new("config.yaml")).unwrap(), FileFormat::Yaml);
        assert_eq!(detect_format(Path::new("config.toml")).unwrap(), FileFormat::Toml);
        assert_eq!(detect_format(Path::new("config.json")).unwrap(), FileFormat::Json);
        assert!(detect_format(Path::new("config.js")).is_err());
        assert!(detect_format(Path::new("config")).is_err());
    }

    #[test]
    fn test_substitute_env_vars() {
        // SAFETY: test-local variable name, not read concurrently elsewhere
        unsafe { std::env::set_var("HOTWIRE_TEST_TITLE", "From Env") };

        assert_eq!(
            substitute_env_vars("title = \"${HOTWIRE_TEST_TITLE}\""),
            "title = \"From Env\""
        );
        assert_eq!(substitute_env_vars("$HOTWIRE_TEST_TITLE"), "From Env");
        assert_eq!(
            substitute_env_vars("${HOTWIRE_TEST_SURELY_UNSET}"),
            "${HOTWIRE_TEST_SURELY_UNSET}"
        );
    }

    #[test]
    fn test_missing_config_is_none() {
        let dir = TempDir::new().unwrap();
        let loaded = load_user_config(&dir.path().join("config.toml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_toml_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[window]
title = "Demo"
width = 1280

[window.web_preferences]
sandbox = true
"#,
        )
        .unwrap();

        let user = load_user_config(&path).unwrap().unwrap();
        let config = resolve_window_config(Some(&user), Path::new("/dist/preload.js")).unwrap();

        assert_eq!(config.title, "Demo");
        assert_eq!(config.width, 1280);
        assert_eq!(config.height, 600);
        assert_eq!(
            config.web_preferences.extra.get("sandbox"),
            Some(&serde_json::json!(true))
        );
        assert_eq!(
            config.web_preferences.preload.as_deref(),
            Some(Path::new("/dist/preload.js"))
        );
    }

    #[test]
    fn test_preload_always_wins() {
        let user = UserConfig {
            window: Some(serde_json::json!({
                "web_preferences": { "preload": "/elsewhere.js" }
            })),
        };

        let config = resolve_window_config(Some(&user), Path::new("/dist/preload.js")).unwrap();
        assert_eq!(
            config.web_preferences.preload.as_deref(),
            Some(Path::new("/dist/preload.js"))
        );
    }

    #[test]
    fn test_merge_values_is_deep() {
        let mut base = serde_json::json!({ "a": { "b": 1, "c": 2 }, "d": [1, 2] });
        merge_values(
            &mut base,
            serde_json::json!({ "a": { "c": 3 }, "d": [9], "e": "new" }),
        );

        assert_eq!(
            base,
            serde_json::json!({ "a": { "b": 1, "c": 3 }, "d": [9], "e": "new" })
        );
    }
}
