//! Application configuration loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use docvault_core::ClientConfig;
use docvault_core::search::MAX_SEARCH_PAGE_SIZE;

/// Directory name under the config home.
const APP_DIR: &str = "docvault";

/// `key = value` file configuration. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// API base URL.
    pub base_url: Option<String>,
    /// Connect timeout for every call.
    pub connect_timeout_secs: Option<u64>,
    /// Overall timeout for non-upload calls.
    pub read_timeout_secs: Option<u64>,
    /// Overall timeout for one upload.
    pub upload_timeout_secs: Option<u64>,
    /// Default search page size (1..=100).
    pub search_page_size: Option<u32>,
    /// Listing entries scanned for duplicate names (1..=1000).
    pub duplicate_scan_limit: Option<u32>,
    /// Seconds finished uploads stay listed.
    pub task_retention_secs: Option<u64>,
    /// Seconds between registry sweeps.
    pub sweep_interval_secs: Option<u64>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(base_url) = &self.base_url
            && url::Url::parse(base_url).is_err()
        {
            bail!("Invalid config value for `base_url`: {base_url}. Expected an absolute URL");
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        validate_timeout_secs("upload_timeout_secs", self.upload_timeout_secs)?;
        validate_timeout_secs("task_retention_secs", self.task_retention_secs)?;
        validate_timeout_secs("sweep_interval_secs", self.sweep_interval_secs)?;

        if let Some(size) = self.search_page_size
            && !(1..=MAX_SEARCH_PAGE_SIZE).contains(&size)
        {
            bail!("Invalid config value for `search_page_size`: {size}. Expected range: 1..=100");
        }
        if let Some(limit) = self.duplicate_scan_limit
            && !(1..=1000).contains(&limit)
        {
            bail!(
                "Invalid config value for `duplicate_scan_limit`: {limit}. Expected range: 1..=1000"
            );
        }
        Ok(())
    }

    /// Overlays the values that are set onto `config`.
    pub fn apply_to(&self, config: &mut ClientConfig) {
        if let Some(base_url) = &self.base_url {
            config.base_url.clone_from(base_url);
        }
        if let Some(v) = self.connect_timeout_secs {
            config.connect_timeout_secs = v;
        }
        if let Some(v) = self.read_timeout_secs {
            config.read_timeout_secs = v;
        }
        if let Some(v) = self.upload_timeout_secs {
            config.upload_timeout_secs = v;
        }
        if let Some(v) = self.search_page_size {
            config.search_page_size = v;
        }
        if let Some(v) = self.duplicate_scan_limit {
            config.duplicate_scan_limit = v;
        }
        if let Some(v) = self.task_retention_secs {
            config.task_retention_secs = v;
        }
        if let Some(v) = self.sweep_interval_secs {
            config.sweep_interval_secs = v;
        }
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Resolves the application config directory.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/docvault`
/// 2. `$HOME/.config/docvault`
#[must_use]
pub fn resolve_config_dir() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(APP_DIR));
    }
    let home = env_var_non_empty_os("HOME")?;
    Some(PathBuf::from(home).join(".config").join(APP_DIR))
}

/// Path of `config.toml` in the config directory.
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    resolve_config_dir().map(|dir| dir.join("config.toml"))
}

/// Path of the persisted bearer token.
#[must_use]
pub fn resolve_token_path() -> Option<PathBuf> {
    resolve_config_dir().map(|dir| dir.join("token"))
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path; a missing file yields `None`.
pub fn load_default_file_config() -> Result<Option<FileConfig>> {
    let Some(path) = resolve_default_config_path() else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }
    load_file_config(&path).map(Some)
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        let line_no = line_index + 1;

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let context = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "base_url" => cfg.base_url = Some(parse_string_literal(value).with_context(context)?),
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "read_timeout_secs" => {
                cfg.read_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "upload_timeout_secs" => {
                cfg.upload_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "search_page_size" => {
                cfg.search_page_size = Some(parse_integer_u32(value).with_context(context)?);
            }
            "duplicate_scan_limit" => {
                cfg.duplicate_scan_limit = Some(parse_integer_u32(value).with_context(context)?);
            }
            "task_retention_secs" => {
                cfg.task_retention_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "sweep_interval_secs" => {
                cfg.sweep_interval_secs = Some(parse_integer_u64(value).with_context(context)?);
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

fn parse_integer_u32(raw_value: &str) -> Result<u32> {
    let value = parse_integer_u64(raw_value)?;
    u32::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u32"))
}
