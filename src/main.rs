// src/main.rs

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Url;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use vidgrab::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "vidgrab", version, about = "Download videos through a vidgrab server")]
struct Cli {
    /// Base URL of the download service
    #[arg(long, env = "VIDGRAB_API", default_value = "http://127.0.0.1:5000/")]
    api: Url,

    /// Directory downloaded files are saved into
    #[arg(long, short, default_value = ".")]
    output: PathBuf,

    /// Download immediately, without the confirmation prompt
    #[arg(long, short = 'y')]
    yes: bool,

    /// Do not open the sponsor page in a browser
    #[arg(long)]
    no_promo: bool,

    /// Video URLs to download; read interactively when omitted
    urls: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("vidgrab=info".parse()?))
        .init();

    let cli = Cli::parse();
    let api = ApiClient::new(cli.api.clone());
    let view = Arc::new(TerminalView::new(!cli.no_promo));
    let config = ControllerConfig {
        output_dir: cli.output.clone(),
        ..Default::default()
    };
    let mut controller = DownloadController::new(api, Arc::clone(&view), config);

    let mut failures = 0usize;
    if cli.urls.is_empty() {
        loop {
            let Some(url) = prompt("Video URL (empty to quit): ")? else {
                break;
            };
            if url.is_empty() {
                break;
            }
            if run_one(&mut controller, &url, cli.yes).await.is_err() {
                failures += 1;
            }
        }
    } else {
        for url in &cli.urls {
            if run_one(&mut controller, url, cli.yes).await.is_err() {
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{failures} download(s) failed");
    }
    Ok(())
}

/// Metadata preview, optional confirmation, then the download itself.
/// Failures were already reported through the view.
async fn run_one(
    controller: &mut DownloadController<TerminalView>,
    url: &str,
    assume_yes: bool,
) -> Result<()> {
    controller.request_metadata(url).await?;

    if !assume_yes && !confirm("Download this video? [y/N] ")? {
        return Ok(());
    }

    let path = controller.start_download(url).await?;
    println!("Saved to {}", path.display());
    Ok(())
}

fn prompt(msg: &str) -> Result<Option<String>> {
    print!("{msg}");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn confirm(msg: &str) -> Result<bool> {
    Ok(matches!(
        prompt(msg)?.as_deref(),
        Some("y") | Some("Y") | Some("yes")
    ))
}

/// Renders the controller's view calls on the terminal, with an indicatif
/// bar standing in for the progress element.
struct TerminalView {
    bar: Mutex<Option<ProgressBar>>,
    promo_enabled: bool,
}

impl TerminalView {
    fn new(promo_enabled: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            promo_enabled,
        }
    }

    fn say(&self, text: &str) {
        let guard = self.bar.lock().unwrap();
        match guard.as_ref() {
            Some(bar) if !bar.is_finished() => bar.println(text),
            _ => println!("{text}"),
        }
    }

    fn percent_bar() -> ProgressBar {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("[{bar:40.green/white}] {pos:>3}%")
                .expect("progress template is valid")
                .progress_chars("━━╌"),
        );
        bar
    }
}

impl View for TerminalView {
    fn submit_state(&self, state: ControlState) {
        debug!(?state, "submit control");
    }

    fn download_state(&self, state: ControlState) {
        debug!(?state, "download control");
    }

    fn status(&self, level: StatusLevel, text: &str) {
        self.print_level(level, text);
    }

    fn download_status(&self, level: StatusLevel, text: &str) {
        self.print_level(level, text);
    }

    fn clear_download_status(&self) {
        // Terminal output cannot be retracted; the warning just ages out.
    }

    fn show_preview(&self, info: &VideoInfo) {
        self.say("");
        self.say(&format!("  {}", info.display_title()));
        if let Some(uploader) = &info.uploader {
            self.say(&format!("  Source: {uploader}"));
        }
        if let Some(duration) = info.duration_text() {
            self.say(&format!("  Duration: {duration}"));
        }
        if let Some(thumbnail) = &info.thumbnail {
            self.say(&format!("  Thumbnail: {thumbnail}"));
        }
        self.say("");
    }

    fn hide_preview(&self) {}

    fn progress(&self, update: ProgressUpdate) {
        let mut guard = self.bar.lock().unwrap();
        match update {
            ProgressUpdate::Percent(pct) => {
                let bar = guard.get_or_insert_with(Self::percent_bar);
                bar.set_position(pct.round() as u64);
            }
            ProgressUpdate::Indeterminate => {
                if let Some(bar) = guard.as_ref() {
                    bar.set_style(
                        ProgressStyle::with_template("{spinner:.cyan} {msg}")
                            .expect("progress template is valid"),
                    );
                    bar.set_message("processing...");
                    bar.enable_steady_tick(Duration::from_millis(120));
                }
            }
            ProgressUpdate::Complete => {
                if let Some(bar) = guard.take() {
                    bar.set_style(
                        ProgressStyle::with_template("[{bar:40.green/white}] {pos:>3}%")
                            .expect("progress template is valid")
                            .progress_chars("━━╌"),
                    );
                    bar.set_position(100);
                    bar.finish();
                }
            }
            ProgressUpdate::Failed => {
                if let Some(bar) = guard.take() {
                    bar.abandon_with_message("failed");
                }
            }
        }
    }

    fn hide_progress(&self) {
        if let Some(bar) = self.bar.lock().unwrap().take() {
            bar.finish_and_clear();
        }
    }

    fn open_external(&self, url: &str) {
        self.say(&format!("Sponsor: {url}"));
        if self.promo_enabled {
            if let Err(e) = open::that(url) {
                warn!(error = %e, "could not open the sponsor page");
            }
        }
    }
}

impl TerminalView {
    fn print_level(&self, level: StatusLevel, text: &str) {
        match level {
            StatusLevel::Error => self.say(&format!("error: {text}")),
            StatusLevel::Warning => self.say(&format!("warning: {text}")),
            StatusLevel::Info | StatusLevel::Success => self.say(text),
        }
    }
}
