use std::{fmt, fs, ops::RangeInclusive};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Deserialize;

/// How the server obtains authorization decisions.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeciderMode {
    /// In-process policy engine fed from a statement file.
    Embedded,
    /// Decision service sidecar queried over HTTP.
    Http,
    /// Every request is allowed.
    AllowAll,
    /// Every request is denied.
    DenyAll,
    /// No decision provider; all requests are forwarded. Demo only.
    Disabled,
}

impl fmt::Display for DeciderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Embedded => "embedded",
            Self::Http => "http",
            Self::AllowAll => "allow-all",
            Self::DenyAll => "deny-all",
            Self::Disabled => "disabled",
        };
        f.write_str(name)
    }
}

#[derive(Parser, Debug, Clone, Deserialize)]
#[command(name = "carinfoserver")]
#[command(author, version, about, long_about = None)]
pub struct AppConfig {
    #[clap(long)]
    #[arg(short = 'c')]
    #[serde(default)]
    pub config: Option<String>,
    /// Directory where persistent data should be stored.
    #[clap(long, env)]
    #[arg(short = 's', default_value_t = String::from("./"))]
    #[serde(default = "default_storage")]
    pub storage: String,
    #[clap(long, env)]
    #[arg(value_parser = port_in_range, short = 'p', default_value_t = 8123)]
    #[serde(default = "default_port")]
    pub port: u16,
    #[clap(long, env)]
    #[arg(default_value_t = String::from("carlot_server=info"))]
    #[serde(default = "default_rust_log")]
    pub rust_log: String,
    /// Decision provider variant, selected once at startup.
    #[clap(long, env)]
    #[arg(short = 'm', value_enum, default_value_t = DeciderMode::Embedded)]
    #[serde(default = "default_mode")]
    pub mode: DeciderMode,
    /// Statement file for the embedded engine (embedded mode only).
    #[clap(long, env)]
    #[serde(default)]
    pub policy: Option<String>,
    /// URL of the decision service (http mode only).
    #[clap(long, env)]
    #[serde(default)]
    pub decision_url: Option<String>,
    /// Path within the decision result to the allow/deny boolean.
    #[clap(long, env)]
    #[arg(short = 'a', default_value_t = String::from("allowed"))]
    #[serde(default = "default_allow_path")]
    pub allow_path: String,
    /// Seconds between policy file reloads (embedded mode only). Zero
    /// disables reloading.
    #[clap(long, env)]
    #[arg(default_value_t = 60)]
    #[serde(default = "default_refresh_seconds")]
    pub refresh_seconds: u64,
    #[clap(long, env)]
    #[arg(default_value_t = 512)]
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
    /// Enable the /playground web UI.
    #[clap(long, env)]
    #[arg(short = 'g', default_value_t = false)]
    #[serde(default)]
    pub playground: bool,
    #[clap(long, env)]
    #[arg(default_value_t = String::from("*"))]
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

fn default_storage() -> String {
    String::from("./")
}

fn default_rust_log() -> String {
    String::from("carlot_server=info")
}

fn default_port() -> u16 {
    8123
}

fn default_mode() -> DeciderMode {
    DeciderMode::Embedded
}

fn default_allow_path() -> String {
    String::from("allowed")
}

fn default_refresh_seconds() -> u64 {
    60
}

fn default_cache_size() -> usize {
    512
}

fn default_cors_origin() -> String {
    String::from("*")
}

const PORT_RANGE: RangeInclusive<usize> = 1..=65535;

fn port_in_range(s: &str) -> Result<u16, String> {
    let port: usize = s
        .parse()
        .map_err(|_| format!("`{s}` isn't a port number"))?;
    if PORT_RANGE.contains(&port) {
        Ok(port as u16)
    } else {
        Err(format!(
            "port not in range {}-{}",
            PORT_RANGE.start(),
            PORT_RANGE.end()
        ))
    }
}

pub fn load(cfg: &str) -> Result<AppConfig> {
    let content =
        fs::read_to_string(cfg).context("could not read config file")?;
    toml::from_str(&content).context("could not parse config file")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_toml_with_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            mode = "deny-all"
            storage = "/tmp/carlot"
            "#,
        )
        .unwrap();
        assert_eq!(config.mode, DeciderMode::DenyAll);
        assert_eq!(config.storage, "/tmp/carlot");
        assert_eq!(config.port, 8123);
        assert_eq!(config.allow_path, "allowed");
        assert!(!config.playground);
    }

    #[test]
    fn port_bounds() {
        assert!(port_in_range("0").is_err());
        assert!(port_in_range("65536").is_err());
        assert_eq!(port_in_range("8123").unwrap(), 8123);
    }
}
