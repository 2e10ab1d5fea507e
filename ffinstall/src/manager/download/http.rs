//! HTTP-based file downloader.
//!
//! Streams response bodies to disk in fixed-size chunks while reporting
//! percentage and throughput to the caller.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use reqwest::blocking::{Client, Response};
use tracing::{debug, info};

use super::progress::{format_rate, FetchProgress, ProgressRange};
use super::state::DownloadState;
use crate::manager::error::{ManagerError, ManagerResult};
use crate::manager::traits::Fetcher;

/// Default timeout for HTTP requests in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300; // 5 minutes

/// Buffer size for reading/writing during downloads (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// HTTP-based downloader.
///
/// Implements the `Fetcher` trait with:
/// - Streaming writes (the body is never buffered in memory)
/// - Percentage progress when the server announces a length
/// - Throughput samples every 500ms
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
    pub(crate) timeout: Duration,
}

impl HttpDownloader {
    /// Create a new HTTP downloader with the default timeout.
    pub fn new() -> ManagerResult<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a new HTTP downloader with custom timeout.
    pub fn with_timeout(timeout: Duration) -> ManagerResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ffinstall/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ManagerError::InvalidConfig(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client, timeout })
    }

    /// Wrap an already configured client.
    pub fn with_client(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Send a GET request and check the response status.
    fn get(&self, url: &str) -> ManagerResult<Response> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| self.transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ManagerError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }

    fn transport_error(&self, url: &str, e: reqwest::Error) -> ManagerError {
        if e.is_timeout() {
            ManagerError::Timeout {
                url: url.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            ManagerError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }

    /// Create the destination file, including missing parent directories.
    fn prepare_destination(&self, dest: &Path) -> ManagerResult<File> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| ManagerError::CreateDirFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        File::create(dest).map_err(|e| ManagerError::WriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })
    }

    /// Stream the response body to the destination file.
    fn stream_download(
        &self,
        mut response: Response,
        file: File,
        state: &mut DownloadState,
        range: ProgressRange,
        on_progress: &dyn Fn(FetchProgress),
    ) -> ManagerResult<u64> {
        let mut writer = BufWriter::new(file);
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut last_percent = state.percent_in(range);

        if let Some(percent) = last_percent {
            on_progress(FetchProgress::Percent(percent));
        } else {
            on_progress(FetchProgress::Indeterminate);
        }

        loop {
            let bytes_read =
                response
                    .read(&mut buffer)
                    .map_err(|e| ManagerError::DownloadFailed {
                        url: state.url.clone(),
                        reason: format!("Read error: {}", e),
                    })?;

            if bytes_read == 0 {
                break;
            }

            writer
                .write_all(&buffer[..bytes_read])
                .map_err(|e| ManagerError::WriteFailed {
                    path: state.destination.clone(),
                    source: e,
                })?;

            if let Some(rate) = state.record_chunk(bytes_read, Instant::now()) {
                on_progress(FetchProgress::Rate(format_rate(rate)));
            }

            let percent = state.percent_in(range);
            if percent.is_some() && percent != last_percent {
                last_percent = percent;
                if let Some(percent) = percent {
                    on_progress(FetchProgress::Percent(percent));
                }
            }
        }

        writer.flush().map_err(|e| ManagerError::WriteFailed {
            path: state.destination.clone(),
            source: e,
        })?;

        Ok(state.bytes_transferred)
    }
}

impl Fetcher for HttpDownloader {
    fn fetch(
        &self,
        url: &str,
        dest: &Path,
        range: ProgressRange,
        on_progress: &dyn Fn(FetchProgress),
    ) -> ManagerResult<u64> {
        info!(url = %url, dest = %dest.display(), "Starting download");

        let result = self.get(url).and_then(|response| {
            let file = self.prepare_destination(dest)?;
            let mut state =
                DownloadState::new(url, dest, response.content_length(), Instant::now());
            if !state.is_determinate() {
                debug!(url = %url, "Server did not announce a content length");
            }
            self.stream_download(response, file, &mut state, range, on_progress)
        });

        // Clear any rate display whether or not the transfer succeeded
        on_progress(FetchProgress::Idle);

        let bytes = result?;
        info!(
            url = %url,
            bytes,
            "Download completed: {:.2} MB",
            bytes as f64 / 1024.0 / 1024.0
        );
        Ok(bytes)
    }

    fn fetch_text(&self, url: &str) -> ManagerResult<String> {
        let response = self.get(url)?;
        response.text().map_err(|e| self.transport_error(url, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::sync::Mutex;
    use std::thread::{self, JoinHandle};
    use tempfile::TempDir;

    /// Serve a single canned HTTP response on a loopback port.
    fn serve_once(response_head: String, body: Vec<u8>) -> (String, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            loop {
                line.clear();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
            }
            let mut stream = stream;
            stream.write_all(response_head.as_bytes()).unwrap();
            stream.write_all(&body).unwrap();
            stream.flush().unwrap();
        });

        (format!("http://{}/archive.7z", addr), handle)
    }

    fn test_downloader() -> HttpDownloader {
        let client = Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap();
        HttpDownloader::with_client(client, Duration::from_secs(10))
    }

    #[test]
    fn test_http_downloader_new() {
        let downloader = HttpDownloader::new().unwrap();
        assert_eq!(downloader.timeout.as_secs(), DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_http_downloader_with_timeout() {
        let downloader = HttpDownloader::with_timeout(Duration::from_secs(60)).unwrap();
        assert_eq!(downloader.timeout.as_secs(), 60);
    }

    #[test]
    fn test_fetch_streams_body_with_percent_progress() {
        let body = vec![7u8; 200_000];
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        let (url, server) = serve_once(head, body.clone());

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("nested").join("archive.7z");
        let events = Mutex::new(Vec::new());

        let bytes = test_downloader()
            .fetch(&url, &dest, ProgressRange::new(10, 40), &|p: FetchProgress| {
                events.lock().unwrap().push(p)
            })
            .unwrap();
        server.join().unwrap();

        assert_eq!(bytes, body.len() as u64);
        assert_eq!(fs::read(&dest).unwrap(), body);

        let events = events.into_inner().unwrap();
        assert_eq!(events.first(), Some(&FetchProgress::Percent(10)));
        assert!(events.contains(&FetchProgress::Percent(40)));
        assert_eq!(events.last(), Some(&FetchProgress::Idle));
        assert!(!events.contains(&FetchProgress::Indeterminate));
    }

    #[test]
    fn test_fetch_without_length_is_indeterminate() {
        let body = b"no length announced".to_vec();
        let head = "HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n".to_string();
        let (url, server) = serve_once(head, body.clone());

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("archive.7z");
        let events = Mutex::new(Vec::new());

        let bytes = test_downloader()
            .fetch(&url, &dest, ProgressRange::new(10, 40), &|p: FetchProgress| {
                events.lock().unwrap().push(p)
            })
            .unwrap();
        server.join().unwrap();

        assert_eq!(bytes, body.len() as u64);
        let events = events.into_inner().unwrap();
        assert_eq!(events.first(), Some(&FetchProgress::Indeterminate));
        assert!(!events
            .iter()
            .any(|e| matches!(e, FetchProgress::Percent(_))));
        assert_eq!(events.last(), Some(&FetchProgress::Idle));
    }

    #[test]
    fn test_fetch_error_status_is_network_failure() {
        let head =
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string();
        let (url, server) = serve_once(head, Vec::new());

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("archive.7z");
        let events = Mutex::new(Vec::new());

        let result = test_downloader().fetch(&url, &dest, ProgressRange::full(), &|p: FetchProgress| {
            events.lock().unwrap().push(p)
        });
        server.join().unwrap();

        match result {
            Err(ManagerError::HttpStatus { status, .. }) => assert_eq!(status, 404),
            other => panic!("Expected HttpStatus, got {other:?}"),
        }
        assert!(!dest.exists());
        assert_eq!(events.into_inner().unwrap(), vec![FetchProgress::Idle]);
    }

    #[test]
    fn test_fetch_text() {
        let body = b"7.1\n".to_vec();
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        let (url, server) = serve_once(head, body);

        let text = test_downloader().fetch_text(&url).unwrap();
        server.join().unwrap();

        assert_eq!(text, "7.1\n");
    }
}
