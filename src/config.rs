//! File configuration for CLI defaults.
//!
//! The file is a flat list of `key = value` lines; strings are double-quoted
//! and `#` starts a comment outside of strings.
//!
//! ```text
//! username = "feeduser"
//! output_dir = "/srv/epf"
//! retries = 8
//! verbosity = "verbose"
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// Config values; unset keys fall back to built-in defaults.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Feed account name.
    pub username: Option<String>,
    /// Feed account password.
    pub password: Option<String>,
    /// Default directory for downloads.
    pub output_dir: Option<PathBuf>,
    /// Re-verify existing files instead of trusting them.
    pub verify_existing: Option<bool>,
    /// Range-fetch retry budget (0..=100).
    pub retries: Option<u32>,
    /// Seconds between range-fetch retries (0..=3600).
    pub retry_wait_secs: Option<u64>,
    /// Text an existing checksum sidecar must contain.
    pub checksum_marker: Option<String>,
    /// TCP connect timeout in seconds (1..=3600).
    pub connect_timeout_secs: Option<u64>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
}

impl std::fmt::Debug for FileConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileConfig")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("output_dir", &self.output_dir)
            .field("verify_existing", &self.verify_existing)
            .field("retries", &self.retries)
            .field("retry_wait_secs", &self.retry_wait_secs)
            .field("checksum_marker", &self.checksum_marker)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("verbosity", &self.verbosity)
            .finish()
    }
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(retries) = self.retries
            && retries > 100
        {
            bail!("Invalid config value for `retries`: {retries}. Expected range: 0..=100");
        }
        if let Some(wait) = self.retry_wait_secs
            && wait > 3600
        {
            bail!("Invalid config value for `retry_wait_secs`: {wait}. Expected range: 0..=3600");
        }
        if let Some(timeout) = self.connect_timeout_secs
            && !(1..=3600).contains(&timeout)
        {
            bail!(
                "Invalid config value for `connect_timeout_secs`: {timeout}. Expected range: 1..=3600"
            );
        }
        if let Some(marker) = &self.checksum_marker
            && marker.is_empty()
        {
            bail!("Invalid config value for `checksum_marker`: must not be empty");
        }
        Ok(())
    }
}

impl std::fmt::Display for VerbositySetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// Returns the stable string label for display output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Verbose => "verbose",
            Self::Quiet => "quiet",
            Self::Debug => "debug",
        }
    }

    /// Log filter used when neither `RUST_LOG` nor a CLI flag decides.
    #[must_use]
    pub fn log_level(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose => "debug",
            Self::Quiet => "error",
            Self::Debug => "trace",
        }
    }
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/epf/config.toml`
/// 2. `$HOME/.config/epf/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join("epf").join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("epf")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config at `explicit`, or at the default path if it exists.
///
/// An explicit path must exist; a missing default file yields defaults.
pub fn load_file_config(explicit: Option<&Path>) -> Result<FileConfig> {
    if let Some(path) = explicit {
        return read_file_config(path);
    }
    match resolve_default_config_path() {
        Some(path) if path.exists() => read_file_config(&path),
        _ => Ok(FileConfig::default()),
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };
        let key = raw_key.trim();
        let value = raw_value.trim();
        let context = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "username" => cfg.username = Some(parse_string_literal(value).with_context(context)?),
            "password" => cfg.password = Some(parse_string_literal(value).with_context(context)?),
            "output_dir" => {
                cfg.output_dir = Some(PathBuf::from(
                    parse_string_literal(value).with_context(context)?,
                ));
            }
            "verify_existing" => {
                cfg.verify_existing = Some(parse_boolean(value).with_context(context)?);
            }
            "retries" => {
                let parsed = parse_integer_u64(value).with_context(context)?;
                let n = u32::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("retries out of range for u32"))?;
                cfg.retries = Some(n);
            }
            "retry_wait_secs" => {
                cfg.retry_wait_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "checksum_marker" => {
                cfg.checksum_marker = Some(parse_string_literal(value).with_context(context)?);
            }
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "verbosity" => {
                let parsed = parse_string_literal(value).with_context(context)?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(|| {
                    format!("Invalid `verbosity` value '{parsed}' on line {line_no}")
                })?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_all_fields() {
        let cfg = parse_config_str(
            r#"
username = "feeduser"
password = "s3cr#t" # quoted hash is kept
output_dir = "/srv/epf"
verify_existing = true
retries = 8
retry_wait_secs = 10
checksum_marker = "tbz"
connect_timeout_secs = 15
verbosity = "verbose"
"#,
        )
        .expect("full config should parse");
        assert_eq!(cfg.username.as_deref(), Some("feeduser"));
        assert_eq!(cfg.password.as_deref(), Some("s3cr#t"));
        assert_eq!(cfg.output_dir, Some(PathBuf::from("/srv/epf")));
        assert_eq!(cfg.verify_existing, Some(true));
        assert_eq!(cfg.retries, Some(8));
        assert_eq!(cfg.retry_wait_secs, Some(10));
        assert_eq!(cfg.checksum_marker.as_deref(), Some("tbz"));
        assert_eq!(cfg.connect_timeout_secs, Some(15));
        assert_eq!(cfg.verbosity, Some(VerbositySetting::Verbose));
    }

    #[test]
    fn test_parse_config_empty_is_default() {
        let cfg = parse_config_str("\n# only a comment\n").expect("empty config should parse");
        assert_eq!(cfg, FileConfig::default());
    }

    #[test]
    fn test_parse_config_rejects_out_of_range_values() {
        let err = parse_config_str("retries = 101").expect_err("retries above range");
        assert!(err.to_string().contains("retries"));

        let err = parse_config_str("retry_wait_secs = 3601").expect_err("wait above range");
        assert!(err.to_string().contains("retry_wait_secs"));

        let err = parse_config_str("connect_timeout_secs = 0").expect_err("timeout below range");
        assert!(err.to_string().contains("connect_timeout_secs"));
    }

    #[test]
    fn test_parse_config_rejects_unquoted_string() {
        let err = parse_config_str("username = feeduser").expect_err("unquoted string");
        assert!(err.to_string().contains("username"));
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_parse_config_rejects_invalid_boolean() {
        let err = parse_config_str("verify_existing = yes").expect_err("invalid boolean expected");
        assert!(err.to_string().contains("verify_existing"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_keys() {
        let err = parse_config_str("\nunknown_key = 123").expect_err("unknown key error expected");
        assert!(err.to_string().contains("Unknown configuration key"));
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_parse_config_rejects_missing_equals() {
        let err = parse_config_str("retries 5").expect_err("syntax error expected");
        assert!(err.to_string().contains("expected key = value"));
    }

    #[test]
    fn test_parse_config_rejects_empty_marker() {
        let err = parse_config_str(r#"checksum_marker = """#).expect_err("empty marker");
        assert!(err.to_string().contains("checksum_marker"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let cfg = parse_config_str(r#"password = "hunter2""#).unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("hunter2"), "password leaked: {rendered}");
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(VerbositySetting::Default.log_level(), "info");
        assert_eq!(VerbositySetting::Quiet.log_level(), "error");
        assert_eq!(VerbositySetting::Debug.as_str(), "debug");
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let err = load_file_config(Some(Path::new("/nonexistent/epf/config.toml")))
            .expect_err("missing explicit file");
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_explicit_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "retries = 2\n").unwrap();
        let cfg = load_file_config(Some(&path)).unwrap();
        assert_eq!(cfg.retries, Some(2));
    }
}
