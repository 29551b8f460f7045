pub mod api;
pub mod controller;
pub mod history;
pub mod models;
pub mod progress;
pub mod referral;

/// Convenient type alias exposing common structs.
pub mod prelude {
    pub use crate::api::{ApiClient, ApiError, DownloadId};
    pub use crate::controller::{
        ControlState, ControllerConfig, ControllerError, DownloadController, ProgressUpdate,
        StatusLevel, View,
    };
    pub use crate::history::DownloadHistory;
    pub use crate::models::{format_duration, EventStatus, ProgressEvent, VideoInfo};
    pub use crate::progress::ProgressStream;
}
