use std::{
    future::Future,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use tokio::{sync::Semaphore, time::timeout};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::{CollisionPolicy, Config},
    error::{DownloadError, ExtractError},
    extractor::MediaExtractor,
    platform::Platform,
    sanitize::{sanitize_extension, sanitize_filename},
};

const FALLBACK_STEM: &str = "video";
const FALLBACK_EXTENSION: &str = "mp4";
const MAX_DEDUPE_SUFFIX: u32 = 10_000;

/// A finished download sitting in the downloads directory.
#[derive(Debug, Clone)]
pub struct StoredMedia {
    pub platform: Platform,
    pub title: String,
    pub filename: String,
    pub path: PathBuf,
}

/// Drives a [`MediaExtractor`] into the downloads directory: classification,
/// naming, concurrency limit and timeouts.
pub struct Downloader {
    extractor: Arc<dyn MediaExtractor>,
    download_dir: PathBuf,
    policy: CollisionPolicy,
    title_max_length: usize,
    call_timeout: Duration,
    permits: Arc<Semaphore>,
}

impl Downloader {
    pub fn new(extractor: Arc<dyn MediaExtractor>, config: &Config) -> Self {
        Self {
            extractor,
            download_dir: config.download_dir.clone(),
            policy: config.collision_policy,
            title_max_length: config.title_max_length,
            call_timeout: config.download_timeout,
            permits: Arc::new(Semaphore::new(config.max_concurrent_downloads.max(1))),
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub async fn download(&self, url: &str) -> Result<StoredMedia, DownloadError> {
        let platform = Platform::classify(url);
        if !platform.is_supported() {
            return Err(DownloadError::UnsupportedPlatform);
        }

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| DownloadError::Storage(std::io::Error::other("download limiter closed")))?;

        let media = self
            .with_timeout("probe", self.extractor.probe(url))
            .await?;

        let stem = Some(sanitize_filename(&media.title, self.title_max_length))
            .filter(|stem| !stem.is_empty())
            .unwrap_or_else(|| FALLBACK_STEM.to_string());
        let ext = sanitize_extension(&media.ext).unwrap_or_else(|| FALLBACK_EXTENSION.to_string());

        let filename = self.claim_filename(&stem, &ext).await?;
        let path = self.download_dir.join(&filename);

        info!("downloading {platform} media {:?} into {:?}", media.title, path);

        if let Err(error) = self.fetch_into(url, &path).await {
            remove_partial(&path).await;
            return Err(error);
        }

        Ok(StoredMedia {
            platform,
            title: media.title,
            filename,
            path,
        })
    }

    async fn fetch_into(&self, url: &str, path: &Path) -> Result<(), DownloadError> {
        self.with_timeout("fetch", self.extractor.fetch(url, path))
            .await?;

        match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => Ok(()),
            Ok(_) => Err(DownloadError::MissingOutput(path.to_path_buf())),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                Err(DownloadError::MissingOutput(path.to_path_buf()))
            }
            Err(error) => Err(DownloadError::Storage(error)),
        }
    }

    async fn with_timeout<T>(
        &self,
        stage: &'static str,
        call: impl Future<Output = Result<T, ExtractError>>,
    ) -> Result<T, DownloadError> {
        match timeout(self.call_timeout, call).await {
            Ok(result) => result.map_err(DownloadError::from),
            Err(_) => Err(DownloadError::Timeout {
                stage,
                seconds: self.call_timeout.as_secs(),
            }),
        }
    }

    async fn claim_filename(&self, stem: &str, ext: &str) -> Result<String, DownloadError> {
        match self.policy {
            CollisionPolicy::Overwrite => Ok(format!("{stem}.{ext}")),
            CollisionPolicy::Unique => {
                let id = Uuid::new_v4().simple().to_string();
                Ok(format!("{stem}-{}.{ext}", &id[..8]))
            }
            CollisionPolicy::Dedupe => self.reserve_deduped(stem, ext).await,
        }
    }

    /// Creates an empty placeholder for the first free `<stem>[-n].<ext>` so
    /// concurrent downloads cannot pick the same name.
    async fn reserve_deduped(&self, stem: &str, ext: &str) -> Result<String, DownloadError> {
        for suffix in 0..MAX_DEDUPE_SUFFIX {
            let candidate = if suffix == 0 {
                format!("{stem}.{ext}")
            } else {
                format!("{stem}-{suffix}.{ext}")
            };

            let created = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.download_dir.join(&candidate))
                .await;

            match created {
                Ok(_) => return Ok(candidate),
                Err(error) if error.kind() == ErrorKind::AlreadyExists => continue,
                Err(error) => return Err(DownloadError::Storage(error)),
            }
        }

        Err(DownloadError::Storage(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free filename left for stem {stem:?}"),
        )))
    }
}

/// yt-dlp side files left next to an interrupted download.
const PARTIAL_SUFFIXES: [&str; 2] = [".part", ".ytdl"];

async fn remove_partial(path: &Path) {
    let mut leftovers = vec![path.to_path_buf()];
    leftovers.extend(PARTIAL_SUFFIXES.iter().map(|suffix| {
        let mut name = path.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    }));

    for leftover in leftovers {
        if let Err(error) = tokio::fs::remove_file(&leftover).await
            && error.kind() != ErrorKind::NotFound
        {
            warn!("could not remove partial download {:?}: {error}", leftover);
        }
    }
}
