// src/api.rs

use std::fmt;

use bytes::Bytes;
use futures_util::TryStreamExt;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::VideoInfo;
use crate::progress::ProgressStream;

/// Errors raised while talking to the download service.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("invalid response payload: {0}")]
    Json(#[from] serde_json::Error),
    /// The server reported a logical failure with its own message.
    #[error("{message}")]
    Server { message: String },
    #[error("the download job was not started")]
    NotStarted,
    #[error("the server did not return a download id")]
    MissingDownloadId,
    #[error("invalid endpoint url")]
    InvalidEndpoint,
}

/// Server-issued token correlating a download job with its progress stream
/// and output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadId(String);

impl DownloadId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DownloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize)]
struct UrlPayload<'a> {
    url: &'a str,
}

#[derive(Deserialize)]
struct InfoResponse {
    status: String,
    message: Option<String>,
    title: Option<String>,
    uploader: Option<String>,
    thumbnail: Option<String>,
    duration: Option<u64>,
}

#[derive(Deserialize)]
struct StartResponse {
    status: String,
    message: Option<String>,
    download_id: Option<String>,
}

/// HTTP client for the video-download service.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
}

impl ApiClient {
    /// Creates a client for the service rooted at `base`.
    pub fn new(base: Url) -> Self {
        let http = Client::builder()
            .user_agent(concat!("vidgrab/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { http, base }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base.join(path).map_err(|_| ApiError::InvalidEndpoint)
    }

    /// `POST /api/get_info` — fetch display metadata for a video URL.
    ///
    /// The server answers logical failures with `status: "error"` and a
    /// message (often alongside a 4xx), so the body is parsed before the
    /// HTTP status is considered.
    pub async fn get_info(&self, url: &str) -> Result<VideoInfo, ApiError> {
        debug!(url, "requesting video info");
        let resp = self
            .http
            .post(self.endpoint("api/get_info")?)
            .json(&UrlPayload { url })
            .send()
            .await?;

        let status = resp.status();
        let body: InfoResponse = match resp.json().await {
            Ok(body) => body,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => return Err(ApiError::Server { message: generic_info_error() }),
        };

        if body.status == "error" {
            return Err(ApiError::Server {
                message: body.message.unwrap_or_else(generic_info_error),
            });
        }

        Ok(VideoInfo {
            title: body.title,
            uploader: body.uploader,
            thumbnail: body.thumbnail,
            duration: body.duration,
        })
    }

    /// `POST /api/download` — kick off a server-side download job.
    ///
    /// Anything other than `status: "started"` with a non-empty id is a
    /// failure; there is nothing to retry.
    pub async fn start_download(&self, url: &str) -> Result<DownloadId, ApiError> {
        debug!(url, "starting download job");
        let resp = self
            .http
            .post(self.endpoint("api/download")?)
            .json(&UrlPayload { url })
            .send()
            .await?;

        let status = resp.status();
        let body: StartResponse = match resp.json().await {
            Ok(body) => body,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => return Err(ApiError::NotStarted),
        };

        if body.status != "started" {
            if let Some(message) = body.message {
                return Err(ApiError::Server { message });
            }
            return Err(ApiError::NotStarted);
        }

        body.download_id
            .filter(|id| !id.is_empty())
            .map(DownloadId)
            .ok_or(ApiError::MissingDownloadId)
    }

    /// `GET /api/progress/{id}` — subscribe to the job's progress stream.
    pub async fn progress_stream(&self, id: &DownloadId) -> Result<ProgressStream, ApiError> {
        debug!(%id, "subscribing to progress stream");
        let resp = self
            .http
            .get(self.endpoint(&format!("api/progress/{id}"))?)
            .send()
            .await?
            .error_for_status()?;

        let bytes = resp.bytes_stream().map_err(ApiError::from);
        Ok(ProgressStream::new(Box::pin(bytes)))
    }

    /// `GET /api/download_file/{id}` — retrieve the finished file.
    pub async fn fetch_file(&self, id: &DownloadId) -> Result<Bytes, ApiError> {
        debug!(%id, "fetching produced file");
        let resp = self
            .http
            .get(self.endpoint(&format!("api/download_file/{id}"))?)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.bytes().await?)
    }
}

fn generic_info_error() -> String {
    "Could not fetch video info".to_string()
}
