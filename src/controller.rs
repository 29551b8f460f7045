// src/controller.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Url;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::history::DownloadHistory;
use crate::models::{sanitize_filename, EventStatus, ProgressEvent, VideoInfo, DEFAULT_FILENAME};
use crate::progress::ProgressStream;
use crate::referral;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("no url was provided")]
    EmptyUrl,
    #[error("the url is not valid")]
    InvalidUrl,
    #[error("this url was already downloaded in this session")]
    AlreadyDownloaded,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("lost connection to the server")]
    ConnectionLost,
    #[error("{0}")]
    Job(String),
    #[error("could not save the file: {0}")]
    Save(#[from] std::io::Error),
}

/// Whether a user control accepts input or is held while a request runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Idle,
    Busy,
}

/// Color coding for inline status text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Visual state of the progress bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressUpdate {
    /// Determinate position, 0.0 to 100.0.
    Percent(f64),
    /// Post-processing, no meaningful percentage.
    Indeterminate,
    Complete,
    Failed,
}

/// Presentation surface the controller drives.
///
/// One method per element the flow touches; implementations render however
/// they like (a terminal here, originally a web page). All errors are
/// reported through [`status`](Self::status)/
/// [`download_status`](Self::download_status), never thrown past the
/// controller.
pub trait View: Send + Sync + 'static {
    fn submit_state(&self, state: ControlState);
    fn download_state(&self, state: ControlState);
    fn status(&self, level: StatusLevel, text: &str);
    fn download_status(&self, level: StatusLevel, text: &str);
    fn clear_download_status(&self);
    fn show_preview(&self, info: &VideoInfo);
    fn hide_preview(&self);
    fn progress(&self, update: ProgressUpdate);
    fn hide_progress(&self);
    /// Opens an unrelated page in the user's browser (referral side effect).
    fn open_external(&self, url: &str);
}

/// Knobs for the controller. The two delays come straight from the service's
/// UI behaviour; tests shrink them.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Directory downloaded files are saved into.
    pub output_dir: PathBuf,
    /// How long the duplicate-download warning stays visible.
    pub duplicate_warning_ttl: Duration,
    /// Delay before the download control resets after a successful save.
    pub reset_delay: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            duplicate_warning_ttl: Duration::from_secs(3),
            reset_delay: Duration::from_secs(2),
        }
    }
}

/// Terminal outcome of one progress subscription.
#[derive(Debug)]
enum StreamOutcome {
    Finished { filename: Option<String> },
    Failed { message: Option<String> },
    Disconnected,
}

/// Drives the whole download flow against one [`View`].
///
/// Holds the session history and at most one live progress subscription,
/// released on every exit path.
pub struct DownloadController<V: View> {
    api: ApiClient,
    view: Arc<V>,
    history: DownloadHistory,
    config: ControllerConfig,
    active: Option<tokio_util::sync::CancellationToken>,
}

impl<V: View> DownloadController<V> {
    pub fn new(api: ApiClient, view: Arc<V>, config: ControllerConfig) -> Self {
        Self {
            api,
            view,
            history: DownloadHistory::new(),
            config,
            active: None,
        }
    }

    pub fn history(&self) -> &DownloadHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut DownloadHistory {
        &mut self.history
    }

    /// Validates the URL and fetches display metadata for it.
    ///
    /// The submit control is re-enabled exactly once when the request
    /// settles, whatever the outcome.
    pub async fn request_metadata(&self, raw: &str) -> Result<VideoInfo, ControllerError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            self.view
                .status(StatusLevel::Warning, "Enter a video URL first!");
            return Err(ControllerError::EmptyUrl);
        }
        let Some(url) = checked_url(trimmed) else {
            self.view.status(
                StatusLevel::Error,
                "That link is not valid. Check it and try again!",
            );
            return Err(ControllerError::InvalidUrl);
        };

        self.view.submit_state(ControlState::Busy);
        self.view.status(StatusLevel::Info, "Fetching video info...");
        self.view.hide_preview();
        self.view.clear_download_status();
        self.view.hide_progress();
        self.view
            .open_external(referral::pick_domain(&mut rand::thread_rng()));

        let result = self.api.get_info(&url).await;
        self.view.submit_state(ControlState::Idle);

        match result {
            Ok(info) => {
                debug!(title = ?info.title, "video info received");
                self.view.show_preview(&info);
                self.view
                    .status(StatusLevel::Success, "Video is ready to download!");
                Ok(info)
            }
            Err(e) => {
                let err = ControllerError::from(e);
                self.view.status(StatusLevel::Error, &error_text(&err));
                Err(err)
            }
        }
    }

    /// Starts a server-side download job for the URL and follows it to the
    /// saved file.
    ///
    /// Re-downloading a URL from this session trips the duplicate guard
    /// without contacting the server; the warning clears itself after
    /// [`ControllerConfig::duplicate_warning_ttl`].
    pub async fn start_download(&mut self, raw: &str) -> Result<PathBuf, ControllerError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            self.view
                .download_status(StatusLevel::Warning, "Enter a video URL first!");
            return Err(ControllerError::EmptyUrl);
        }
        let Some(url) = checked_url(trimmed) else {
            self.view.download_status(
                StatusLevel::Error,
                "That link is not valid. Check it and try again!",
            );
            return Err(ControllerError::InvalidUrl);
        };

        if self.history.contains(&url) {
            self.view
                .download_status(StatusLevel::Warning, "You already downloaded this video!");
            let view = Arc::clone(&self.view);
            let ttl = self.config.duplicate_warning_ttl;
            tokio::spawn(async move {
                tokio::time::sleep(ttl).await;
                view.clear_download_status();
            });
            return Err(ControllerError::AlreadyDownloaded);
        }

        self.view.download_state(ControlState::Busy);
        self.view
            .download_status(StatusLevel::Info, "Processing video...");
        self.view.progress(ProgressUpdate::Percent(0.0));

        match self.run_job(&url).await {
            Ok(path) => {
                info!(path = %path.display(), "video saved");
                Ok(path)
            }
            Err(e) => {
                // Exit path: make sure any open subscription is released.
                if let Some(token) = self.active.take() {
                    token.cancel();
                }
                self.view
                    .download_status(StatusLevel::Error, &error_text(&e));
                self.view.download_state(ControlState::Idle);
                Err(e)
            }
        }
    }

    async fn run_job(&mut self, url: &str) -> Result<PathBuf, ControllerError> {
        let id = self.api.start_download(url).await?;
        info!(%id, "download job started");

        let mut stream = self.api.progress_stream(&id).await?;
        self.active = Some(stream.cancel_handle());
        let outcome = self.pump_events(&mut stream).await;
        stream.close();
        self.active = None;

        match outcome {
            StreamOutcome::Finished { filename } => {
                self.view
                    .download_status(StatusLevel::Info, "Saving video...");
                let bytes = self.api.fetch_file(&id).await?;
                let name = filename
                    .as_deref()
                    .map(sanitize_filename)
                    .unwrap_or_else(|| DEFAULT_FILENAME.to_string());
                let path = self.save_file(&name, &bytes).await?;
                self.history.record(url);
                self.view
                    .download_status(StatusLevel::Success, "Download complete!");

                let view = Arc::clone(&self.view);
                let delay = self.config.reset_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    view.download_state(ControlState::Idle);
                    view.hide_progress();
                });
                Ok(path)
            }
            StreamOutcome::Failed { message } => Err(ControllerError::Job(
                message.unwrap_or_else(|| "Video download failed".to_string()),
            )),
            StreamOutcome::Disconnected => Err(ControllerError::ConnectionLost),
        }
    }

    /// Consumes progress events until a terminal transition.
    async fn pump_events(&self, stream: &mut ProgressStream) -> StreamOutcome {
        while let Some(item) = stream.next().await {
            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "progress stream failed");
                    return StreamOutcome::Disconnected;
                }
            };
            if let Some(outcome) = self.apply_event(&event) {
                return outcome;
            }
        }
        // EOF before a terminal event is a dropped connection.
        StreamOutcome::Disconnected
    }

    /// One step of the progress state machine: updates the view and reports
    /// whether the event was terminal.
    fn apply_event(&self, event: &ProgressEvent) -> Option<StreamOutcome> {
        match event.status {
            EventStatus::Downloading => {
                let pct = event.progress.unwrap_or(0.0).clamp(0.0, 100.0);
                self.view.progress(ProgressUpdate::Percent(pct));
                self.view.download_status(
                    StatusLevel::Info,
                    &format!("Downloading: {}%", pct.round() as u64),
                );
                None
            }
            EventStatus::Processing => {
                self.view.progress(ProgressUpdate::Indeterminate);
                self.view
                    .download_status(StatusLevel::Info, "Processing video...");
                None
            }
            EventStatus::Done => {
                self.view.progress(ProgressUpdate::Complete);
                Some(StreamOutcome::Finished {
                    filename: event.filename.clone(),
                })
            }
            EventStatus::Error => {
                self.view.progress(ProgressUpdate::Failed);
                Some(StreamOutcome::Failed {
                    message: event.message.clone(),
                })
            }
            EventStatus::Other => None,
        }
    }

    async fn save_file(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf, ControllerError> {
        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        let path = self.config.output_dir.join(filename);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }
}

/// Accepts only well-formed http/https URLs. YouTube watch URLs lose
/// everything after the first `&`, matching what the server downloads, so
/// the session history keys stay consistent.
fn checked_url(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let mut url = raw.to_string();
    if url.contains("youtube.com/watch") {
        if let Some((head, _)) = url.split_once('&') {
            url = head.to_string();
        }
    }
    Some(url)
}

fn error_text(err: &ControllerError) -> String {
    match err {
        ControllerError::ConnectionLost => "Lost connection to the server".to_string(),
        ControllerError::Api(ApiError::Network(_)) => {
            "Error: could not reach the server".to_string()
        }
        ControllerError::Api(ApiError::Json(_)) => {
            "Error: the server sent an invalid response".to_string()
        }
        other => format!("Error: {other}"),
    }
}
