// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Document downloads into staging directories

use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

use crate::{DocsortError, Result};

/// What happened to one URL
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Downloaded { path: PathBuf, bytes: u64 },
    AlreadyPresent(PathBuf),
    Failed { url: String, reason: String },
}

/// Per-URL outcomes of a fetch run, in input order
#[derive(Debug, Default)]
pub struct FetchReport {
    pub outcomes: Vec<FetchOutcome>,
}

impl FetchReport {
    pub fn downloaded(&self) -> usize {
        self.outcomes.iter().filter(|o| matches!(o, FetchOutcome::Downloaded { .. })).count()
    }

    pub fn already_present(&self) -> usize {
        self.outcomes.iter().filter(|o| matches!(o, FetchOutcome::AlreadyPresent(_))).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| matches!(o, FetchOutcome::Failed { .. })).count()
    }
}

/// HTTP downloader
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Download every `urls[i]` into `directories[i]`.
    ///
    /// The lists must have the same length; nothing is touched otherwise.
    /// A failing URL is reported and does not stop the others.
    pub async fn fetch_all<P: AsRef<Path>>(&self, urls: &[String], directories: &[P]) -> Result<FetchReport> {
        if urls.len() != directories.len() {
            return Err(DocsortError::LengthMismatch {
                urls: urls.len(),
                directories: directories.len(),
            });
        }

        let mut report = FetchReport::default();
        for (url, directory) in urls.iter().zip(directories) {
            let outcome = self.fetch_one(url, directory.as_ref()).await?;
            report.outcomes.push(outcome);
        }

        info!(
            "Fetch finished: {} downloaded, {} already present, {} failed",
            report.downloaded(),
            report.already_present(),
            report.failed()
        );
        Ok(report)
    }

    /// Download one URL into `directory` unless a file of the same name is
    /// already there. Only directory creation errors are returned as `Err`.
    pub async fn fetch_one(&self, url: &str, directory: &Path) -> Result<FetchOutcome> {
        tokio::fs::create_dir_all(directory).await?;

        let Some(filename) = filename_from_url(url) else {
            error!("Cannot derive a file name from {}", url);
            return Ok(FetchOutcome::Failed {
                url: url.to_string(),
                reason: "URL has no file name".to_string(),
            });
        };

        let path = directory.join(&filename);
        if path.exists() {
            info!("Already present: {:?}", path);
            return Ok(FetchOutcome::AlreadyPresent(path));
        }

        info!("Downloading {} to {:?}", url, path);
        match self.download(url, &path).await {
            Ok(bytes) => {
                info!("Downloaded {:?} ({} bytes)", path, bytes);
                Ok(FetchOutcome::Downloaded { path, bytes })
            }
            Err(e) => {
                error!("Failed to download {}: {}", url, e);
                Ok(FetchOutcome::Failed {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Stream the body into `<path>.part`, renamed into place once complete
    async fn download(&self, url: &str, path: &Path) -> Result<u64> {
        let mut response = self.client.get(url).send().await?.error_for_status()?;

        let partial = partial_path(path);
        let result = async {
            let mut file = tokio::fs::File::create(&partial).await?;
            let mut written = 0u64;
            while let Some(chunk) = response.chunk().await? {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok::<u64, DocsortError>(written)
        }
        .await;

        match result {
            Ok(written) => {
                tokio::fs::rename(&partial, path).await?;
                Ok(written)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                Err(e)
            }
        }
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

/// Local file name for a URL: last path segment with the query string removed
pub fn filename_from_url(url: &str) -> Option<String> {
    let without_query = url.split('?').next().unwrap_or(url);
    let name = without_query.rsplit('/').next().unwrap_or(without_query);
    if name.is_empty() || name == "." || name == ".." || name.contains('\\') {
        None
    } else {
        Some(name.to_string())
    }
}
