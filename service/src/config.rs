use anyhow::{anyhow, Context};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON lines in the Cloud Logging shape.
    Stackdriver,
    Text,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stackdriver" | "json" => Ok(LogFormat::Stackdriver),
            "text" | "pretty" => Ok(LogFormat::Text),
            other => Err(anyhow!("unknown log format {other:?}")),
        }
    }
}

/// Process-wide settings, read once at start-up and handed down by value.
#[derive(Debug, Clone)]
pub struct Config {
    pub upload_dir: PathBuf,
    pub addr: SocketAddr,
    pub max_upload_bytes: u64,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Config> {
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
        let upload_dir = lookup("UPLOAD_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .context("UPLOAD_DIR must be set")?;

        let ip: IpAddr = parse_or(&lookup, "BIND_ADDRESS", DEFAULT_BIND_ADDRESS.parse()?)?;
        let port: u16 = parse_or(&lookup, "PORT", DEFAULT_PORT)?;
        let max_upload_bytes = parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;
        let log_format = parse_or(&lookup, "LOG_FORMAT", LogFormat::Stackdriver)?;

        Ok(Config {
            upload_dir,
            addr: SocketAddr::new(ip, port),
            max_upload_bytes,
            log_format,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("invalid {key}={raw:?}: {e}")),
        None => Ok(default),
    }
}
