use std::{path::PathBuf, str::FromStr, time::Duration};

use tracing::warn;
use url::Url;

use crate::sanitize::DEFAULT_TITLE_MAX_LENGTH;

const DEFAULT_PORT: u16 = 10000;
const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 3;
const DEFAULT_DOWNLOAD_TIMEOUT_SECONDS: u64 = 180;
const DEFAULT_LINK_TTL_SECONDS: u64 = 24 * 60 * 60;
const DEFAULT_LINK_MAX_ENTRIES: usize = 10_000;
const DEFAULT_CREDIT: &str = "@AzR_projects";

/// How the on-disk name is chosen when two titles sanitize to the same stem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionPolicy {
    /// `<stem>.<ext>`, replacing any earlier file.
    Overwrite,
    /// `<stem>.<ext>` or `<stem>-<n>.<ext>` with the first free `n`.
    Dedupe,
    /// `<stem>-<random id>.<ext>`.
    #[default]
    Unique,
}

impl FromStr for CollisionPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "dedupe" => Ok(Self::Dedupe),
            "unique" => Ok(Self::Unique),
            other => Err(format!(
                "unknown filename collision policy {other:?} (expected overwrite, dedupe or unique)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub download_dir: PathBuf,
    pub ytdlp_bin: PathBuf,
    pub ytdlp_format: String,
    pub download_timeout: Duration,
    pub max_concurrent_downloads: usize,
    pub title_max_length: usize,
    pub collision_policy: CollisionPolicy,
    pub link_ttl_seconds: u64,
    pub link_max_entries: usize,
    /// Age after which stored files are deleted; `0` keeps them forever.
    pub file_retention_seconds: u64,
    pub serve_by_filename: bool,
    pub public_base_url: Option<String>,
    pub trust_proxy_headers: bool,
    pub allowed_origins: Vec<String>,
    pub credit: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            download_dir: PathBuf::from("downloads"),
            ytdlp_bin: PathBuf::from("yt-dlp"),
            ytdlp_format: "best".to_string(),
            download_timeout: Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECONDS),
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
            title_max_length: DEFAULT_TITLE_MAX_LENGTH,
            collision_policy: CollisionPolicy::default(),
            link_ttl_seconds: DEFAULT_LINK_TTL_SECONDS,
            link_max_entries: DEFAULT_LINK_MAX_ENTRIES,
            file_retention_seconds: 0,
            serve_by_filename: false,
            public_base_url: None,
            trust_proxy_headers: false,
            allowed_origins: Vec::new(),
            credit: DEFAULT_CREDIT.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();

        let collision_policy = match read_string_env("FILENAME_COLLISION_POLICY") {
            Some(value) => value.parse()?,
            None => defaults.collision_policy,
        };

        let public_base_url = read_string_env("PUBLIC_BASE_URL")
            .map(|value| normalize_base_url(&value))
            .transpose()?;

        let allowed_origins = read_string_env("ALLOWED_ORIGINS")
            .map(|value| split_list(&value))
            .unwrap_or_default()
            .iter()
            .map(|origin| {
                normalize_origin(origin).ok_or_else(|| {
                    format!(
                        "invalid origin in ALLOWED_ORIGINS: {origin}. Use values like https://example.com"
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let max_concurrent_downloads = match read_usize_env("MAX_CONCURRENT_DOWNLOADS") {
            Some(0) => {
                warn!("MAX_CONCURRENT_DOWNLOADS=0 is not allowed, using the default");
                defaults.max_concurrent_downloads
            }
            Some(value) => value,
            None => defaults.max_concurrent_downloads,
        };

        Ok(Self {
            bind_addr: resolve_bind_addr(),
            download_dir: read_string_env("DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.download_dir),
            ytdlp_bin: read_string_env("YTDLP_BIN")
                .map(PathBuf::from)
                .unwrap_or(defaults.ytdlp_bin),
            ytdlp_format: read_string_env("YTDLP_FORMAT").unwrap_or(defaults.ytdlp_format),
            download_timeout: read_u64_env("DOWNLOAD_TIMEOUT_SECONDS")
                .filter(|value| *value > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.download_timeout),
            max_concurrent_downloads,
            title_max_length: read_usize_env("TITLE_MAX_LENGTH")
                .filter(|value| *value > 0)
                .unwrap_or(defaults.title_max_length),
            collision_policy,
            link_ttl_seconds: read_u64_env("LINK_TTL_SECONDS")
                .unwrap_or(defaults.link_ttl_seconds),
            link_max_entries: read_usize_env("LINK_MAX_ENTRIES")
                .unwrap_or(defaults.link_max_entries),
            file_retention_seconds: read_u64_env("FILE_RETENTION_SECONDS")
                .unwrap_or(defaults.file_retention_seconds),
            serve_by_filename: read_bool_env("SERVE_BY_FILENAME")
                .unwrap_or(defaults.serve_by_filename),
            public_base_url,
            trust_proxy_headers: read_bool_env("TRUST_PROXY_HEADERS")
                .unwrap_or(defaults.trust_proxy_headers),
            allowed_origins,
            credit: std::env::var("CREDIT").unwrap_or(defaults.credit),
        })
    }
}

fn resolve_bind_addr() -> String {
    if let Some(configured) = read_string_env("APP_ADDR") {
        return configured;
    }

    if let Some(port) = std::env::var("PORT")
        .ok()
        .and_then(|value| value.trim().parse::<u16>().ok())
    {
        return format!("0.0.0.0:{port}");
    }

    format!("0.0.0.0:{DEFAULT_PORT}")
}

/// Accepts an absolute http(s) URL and returns it without a trailing slash.
pub fn normalize_base_url(value: &str) -> Result<String, String> {
    let parsed = Url::parse(value.trim())
        .map_err(|error| format!("invalid PUBLIC_BASE_URL {value:?}: {error}"))?;

    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(format!(
            "invalid PUBLIC_BASE_URL {value:?}: expected something like https://example.com"
        ));
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(format!(
            "invalid PUBLIC_BASE_URL {value:?}: query strings and fragments are not allowed"
        ));
    }

    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

/// Reduces an origin to `scheme://host[:port]`, dropping default ports.
pub fn normalize_origin(value: &str) -> Option<String> {
    let parsed = Url::parse(value).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let scheme = parsed.scheme();
    let default_port = match scheme {
        "http" => 80,
        "https" => 443,
        _ => return None,
    };

    if parsed.path() != "/" || parsed.query().is_some() || parsed.fragment().is_some() {
        return None;
    }

    match parsed.port() {
        Some(port) if port != default_port => Some(format!("{scheme}://{host}:{port}")),
        _ => Some(format!("{scheme}://{host}")),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn read_string_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .and_then(|value| non_empty(&value).map(ToString::to_string))
}

fn read_bool_env(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok()?;
    parse_bool(&value)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn read_usize_env(name: &str) -> Option<usize> {
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
}

fn read_u64_env(name: &str) -> Option<u64> {
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
}

pub fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
