// src/models.rs

use serde::{Deserialize, Serialize};

/// Filename used when the server does not supply one with the `done` event.
pub const DEFAULT_FILENAME: &str = "video.mp4";

/// Metadata describing a video, as returned by `POST /api/get_info`.
///
/// Every field is display data; absent fields simply render as hidden.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VideoInfo {
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub thumbnail: Option<String>,
    /// Duration in whole seconds. The server sends `0` for live or
    /// unknown durations, which renders the same as absent.
    pub duration: Option<u64>,
}

impl VideoInfo {
    /// Title to display, falling back to a generic label.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Video")
    }

    /// Human-readable duration, or `None` when it should stay hidden.
    pub fn duration_text(&self) -> Option<String> {
        self.duration.filter(|d| *d > 0).map(format_duration)
    }
}

/// Status tag carried by every progress event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Downloading,
    Processing,
    Done,
    Error,
    /// Any tag this client does not handle (the server emits a transient
    /// `starting` before the first progress hook fires).
    #[serde(other)]
    Other,
}

/// One JSON payload from the progress event stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEvent {
    pub status: EventStatus,
    /// Download percentage, 0.0 to 100.0.
    pub progress: Option<f64>,
    pub message: Option<String>,
    pub filename: Option<String>,
}

/// Formats a duration in seconds as `H:MM:SS`, or `M:SS` when under an hour.
pub fn format_duration(total_secs: u64) -> String {
    let hrs = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    if hrs > 0 {
        format!("{}:{:02}:{:02}", hrs, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}

/// Strips characters that are invalid in filenames, mirroring what the
/// server does before it names the produced file.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        DEFAULT_FILENAME.to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_formats_without_hours() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(59), "0:59");
        assert_eq!(format_duration(60), "1:00");
    }

    #[test]
    fn duration_formats_with_hours() {
        assert_eq!(format_duration(3661), "1:01:01");
        assert_eq!(format_duration(3600), "1:00:00");
        assert_eq!(format_duration(7325), "2:02:05");
    }

    #[test]
    fn zero_duration_stays_hidden() {
        let info = VideoInfo {
            duration: Some(0),
            ..Default::default()
        };
        assert_eq!(info.duration_text(), None);

        let info = VideoInfo {
            duration: Some(95),
            ..Default::default()
        };
        assert_eq!(info.duration_text(), Some("1:35".to_string()));
    }

    #[test]
    fn unknown_status_tags_deserialize_to_other() {
        let event: ProgressEvent =
            serde_json::from_str(r#"{"status":"starting","progress":0.0}"#).unwrap();
        assert_eq!(event.status, EventStatus::Other);

        let event: ProgressEvent =
            serde_json::from_str(r#"{"status":"downloading","progress":42.5}"#).unwrap();
        assert_eq!(event.status, EventStatus::Downloading);
        assert_eq!(event.progress, Some(42.5));
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_filename("clip.mp4"), "clip.mp4");
        assert_eq!(sanitize_filename("a/b\\c:d.mp4"), "a_b_c_d.mp4");
        assert_eq!(sanitize_filename("  "), DEFAULT_FILENAME);
    }
}
