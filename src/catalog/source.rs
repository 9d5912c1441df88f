use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use zip::ZipArchive;
use zip::result::ZipError;

use super::CatalogSource;
use super::gtfs::build_catalog;
use crate::error::{Error, Result};
use crate::fetch::{HttpClient, fetch_bytes};
use crate::models::StopMap;

/// Supplemented GTFS: regular schedule plus service changes for the next
/// seven days, refreshed hourly upstream.
pub const GTFS_SUPPLEMENTED_URL: &str = "https://rrgtfsfeeds.s3.amazonaws.com/gtfs_supplemented.zip";

/// Regular GTFS: the base subway schedule, updated a few times a year.
pub const GTFS_REGULAR_URL: &str = "https://rrgtfsfeeds.s3.amazonaws.com/gtfs_subway.zip";

/// Runs a blocking catalog build off the async workers.
async fn build_blocking<F>(build: F) -> Result<StopMap>
where
    F: FnOnce() -> Result<StopMap> + Send + 'static,
{
    tokio::task::spawn_blocking(build)
        .await
        .map_err(|e| Error::Fetch(format!("catalog task failed: {e}")))?
}

/// An extracted GTFS feed on local disk.
#[derive(Debug, Clone)]
pub struct GtfsDirectory {
    path: PathBuf,
}

impl GtfsDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogSource for GtfsDirectory {
    async fn load_catalog(&self) -> Result<StopMap> {
        let dir = self.path.clone();
        build_blocking(move || {
            build_catalog(
                |name| {
                    let path = dir.join(name);
                    let file = File::open(&path).map_err(|e| match e.kind() {
                        std::io::ErrorKind::NotFound => {
                            Error::NotFound(format!("{}: {e}", path.display()))
                        }
                        _ => Error::from(e),
                    })?;
                    Ok(BufReader::new(file))
                },
                Utc::now(),
            )
        })
        .await
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// A zipped GTFS feed downloaded over HTTP.
///
/// URLs are tried in order; the first successful download wins.
#[derive(Clone)]
pub struct GtfsArchive {
    client: Arc<dyn HttpClient>,
    urls: Vec<String>,
}

impl GtfsArchive {
    /// Supplemented feed first, regular feed as fallback.
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self::with_urls(
            client,
            vec![
                GTFS_SUPPLEMENTED_URL.to_string(),
                GTFS_REGULAR_URL.to_string(),
            ],
        )
    }

    pub fn with_urls(client: Arc<dyn HttpClient>, urls: Vec<String>) -> Self {
        Self { client, urls }
    }

    async fn download(&self) -> Result<Vec<u8>> {
        let mut last_err = Error::NotFound("no GTFS archive URLs configured".into());

        for url in &self.urls {
            match fetch_bytes(self.client.as_ref(), url).await {
                Ok(bytes) => {
                    info!(url, bytes = bytes.len(), "Downloaded GTFS archive");
                    return Ok(bytes);
                }
                Err(e) => {
                    warn!(url, error = %e, "Failed to download GTFS archive");
                    last_err = e;
                }
            }
        }

        Err(last_err)
    }
}

/// Upper bound on the buffer reserved up front for one archive entry.
const MAX_PREALLOC: u64 = 64 << 20;

/// Declared sizes come from the archive header and may lie.
fn prealloc_hint(declared: u64) -> usize {
    usize::try_from(declared.min(MAX_PREALLOC)).unwrap_or(0)
}

/// Builds the catalog from an in-memory zip.
pub(crate) fn read_archive(bytes: Vec<u8>, now: DateTime<Utc>) -> Result<StopMap> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    build_catalog(
        |name| {
            let mut file = archive.by_name(name).map_err(|e| match e {
                ZipError::FileNotFound => {
                    Error::NotFound(format!("{name} not found in GTFS archive"))
                }
                other => Error::from(other),
            })?;
            let mut buf = Vec::with_capacity(prealloc_hint(file.size()));
            file.read_to_end(&mut buf)?;
            Ok(Cursor::new(buf))
        },
        now,
    )
}

#[async_trait]
impl CatalogSource for GtfsArchive {
    async fn load_catalog(&self) -> Result<StopMap> {
        let bytes = self.download().await?;
        build_blocking(move || read_archive(bytes, Utc::now())).await
    }

    fn describe(&self) -> String {
        self.urls.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures;
    use crate::fetch::BasicClient;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;
    use std::time::Duration;

    #[tokio::test]
    async fn directory_loads_catalog() {
        let dir = tempfile::tempdir().unwrap();
        fixtures::write_dir(dir.path());

        let stops = GtfsDirectory::new(dir.path()).load_catalog().await.unwrap();
        assert_eq!(stops.len(), 3);
        assert_eq!(stops["127"].routes, vec!["1", "N"]);
    }

    #[tokio::test]
    async fn directory_missing_table_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        fixtures::write_dir(dir.path());
        std::fs::remove_file(dir.path().join("trips.txt")).unwrap();

        let err = GtfsDirectory::new(dir.path()).load_catalog().await.unwrap_err();
        assert!(matches!(err, Error::NotFound(msg) if msg.contains("trips.txt")));
    }

    #[tokio::test]
    async fn missing_directory_is_not_found() {
        let err = GtfsDirectory::new("/nonexistent/gtfs")
            .load_catalog()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn archive_reads_zip() {
        let stops = read_archive(fixtures::zip_bytes(), Utc::now()).unwrap();
        assert_eq!(stops["635"].routes, vec!["N"]);
        assert_eq!(stops["635"].platforms.len(), 1);
    }

    #[test]
    fn garbage_archive_is_a_parse_error() {
        let err = read_archive(b"not a zip".to_vec(), Utc::now()).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn declared_entry_size_is_capped() {
        assert_eq!(prealloc_hint(4096), 4096);
        assert_eq!(prealloc_hint(u64::from(u32::MAX)), MAX_PREALLOC as usize);
        assert_eq!(prealloc_hint(u64::MAX), MAX_PREALLOC as usize);
    }

    /// Serves a failing supplemented feed and a working regular feed.
    async fn serve_archives() -> String {
        let app = Router::new()
            .route(
                "/gtfs_supplemented.zip",
                get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
            )
            .route("/gtfs_subway.zip", get(|| async { fixtures::zip_bytes() }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn archive_falls_back_to_regular_feed() {
        let base = serve_archives().await;
        let client = Arc::new(BasicClient::new(Duration::from_secs(5)).unwrap());
        let archive = GtfsArchive::with_urls(
            client,
            vec![
                format!("{base}/gtfs_supplemented.zip"),
                format!("{base}/gtfs_subway.zip"),
            ],
        );

        let stops = archive.load_catalog().await.unwrap();
        assert_eq!(stops.len(), 3);
    }

    #[tokio::test]
    async fn archive_reports_last_failure() {
        let base = serve_archives().await;
        let client = Arc::new(BasicClient::new(Duration::from_secs(5)).unwrap());
        let archive = GtfsArchive::with_urls(
            client,
            vec![
                format!("{base}/gtfs_supplemented.zip"),
                format!("{base}/missing.zip"),
            ],
        );

        let err = archive.load_catalog().await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
