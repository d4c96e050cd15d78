use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::error::ExtractError;

/// Metadata needed to name a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    pub title: String,
    pub ext: String,
}

/// The external tool that resolves platform URLs and downloads media.
#[async_trait]
pub trait MediaExtractor: Send + Sync + 'static {
    /// Looks up title and container extension without downloading.
    async fn probe(&self, url: &str) -> Result<MediaInfo, ExtractError>;

    /// Downloads the media for `url` into exactly `destination`.
    async fn fetch(&self, url: &str, destination: &Path) -> Result<(), ExtractError>;
}

#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    ext: Option<String>,
}

/// [`MediaExtractor`] backed by the yt-dlp command line.
#[derive(Debug, Clone)]
pub struct YtDlp {
    bin: PathBuf,
    format: String,
}

impl YtDlp {
    pub fn new(bin: impl Into<PathBuf>, format: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            format: format.into(),
        }
    }

    fn probe_args(&self, url: &str) -> Vec<String> {
        vec![
            "-J".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "-f".to_string(),
            self.format.clone(),
            url.to_string(),
        ]
    }

    /// `-o` is an output template, so a literal `%` in the path is doubled.
    /// The file's mtime stays at download time for the retention sweep.
    fn fetch_args(&self, url: &str, destination: &Path) -> Vec<String> {
        vec![
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--force-overwrites".to_string(),
            "--no-part".to_string(),
            "--no-mtime".to_string(),
            "-f".to_string(),
            self.format.clone(),
            "-o".to_string(),
            destination.to_string_lossy().replace('%', "%%"),
            url.to_string(),
        ]
    }

    async fn run(&self, args: Vec<String>) -> Result<std::process::Output, ExtractError> {
        debug!("running {:?} {:?}", self.bin, args);

        let output = Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|error| {
                if error.kind() == ErrorKind::NotFound {
                    ExtractError::NotInstalled(self.bin.clone())
                } else {
                    ExtractError::Spawn(error)
                }
            })?;

        if !output.status.success() {
            return Err(ExtractError::Failed {
                status: output.status.to_string(),
                message: run_error_message(&output.stderr),
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl MediaExtractor for YtDlp {
    async fn probe(&self, url: &str) -> Result<MediaInfo, ExtractError> {
        let output = self.run(self.probe_args(url)).await?;
        parse_media_info(&output.stdout)
    }

    async fn fetch(&self, url: &str, destination: &Path) -> Result<(), ExtractError> {
        self.run(self.fetch_args(url, destination)).await.map(|_| ())
    }
}

fn parse_media_info(stdout: &[u8]) -> Result<MediaInfo, ExtractError> {
    let info: YtDlpInfo = serde_json::from_slice(stdout)?;

    Ok(MediaInfo {
        title: info.title.unwrap_or_default(),
        ext: info
            .ext
            .filter(|ext| !ext.trim().is_empty())
            .unwrap_or_else(|| "mp4".to_string()),
    })
}

/// Last non-empty stderr line, which is where yt-dlp puts its `ERROR:`.
fn run_error_message(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
        .unwrap_or("yt-dlp exited without an error message")
        .to_string()
}
