use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::catalog::{PlaybackOrder, ScanOptions};

pub const DEFAULT_IMAGE_SINK: &str = "xvimagesink";
/// Upper bound for every configured delay.
pub const MAX_DELAY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Root directory scanned for images and videos.
    pub media_directory: Option<PathBuf>,
    /// How long each image stays on screen.
    #[serde(with = "humantime_serde")]
    pub image_interval: Duration,
    /// Descend into subdirectories when scanning.
    pub recursive: bool,
    /// Randomize playback order once at startup.
    pub shuffle: bool,
    /// Makes the shuffled order reproducible.
    pub shuffle_seed: Option<u64>,
    /// Pointer idle time before the cursor is hidden again.
    #[serde(with = "humantime_serde")]
    pub cursor_hide_delay: Duration,
    /// How long the window stays always-on-top after being presented.
    #[serde(with = "humantime_serde")]
    pub focus_nudge: Duration,
    /// Overlay-capable sink used for still images.
    pub image_sink: String,
    /// Number of catalog entries logged at startup.
    pub listed_files: usize,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            media_directory: None,
            image_interval: Duration::from_secs(5),
            recursive: false,
            shuffle: false,
            shuffle_seed: None,
            cursor_hide_delay: Duration::from_secs(2),
            focus_nudge: Duration::from_millis(100),
            image_sink: DEFAULT_IMAGE_SINK.to_string(),
            listed_files: 20,
        }
    }
}

impl Configuration {
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let cfg: Self = serde_yaml::from_str(&s).context("failed to parse YAML config")?;
        Ok(cfg)
    }

    pub fn validated(mut self) -> Result<Self> {
        ensure!(
            !self.image_interval.is_zero(),
            "image-interval must be greater than zero"
        );
        ensure!(
            !self.cursor_hide_delay.is_zero(),
            "cursor-hide-delay must be greater than zero"
        );
        for (key, value) in [
            ("image-interval", self.image_interval),
            ("cursor-hide-delay", self.cursor_hide_delay),
            ("focus-nudge", self.focus_nudge),
        ] {
            ensure!(
                value <= MAX_DELAY,
                "{key} must not exceed {}",
                humantime::format_duration(MAX_DELAY)
            );
        }
        self.image_sink = self.image_sink.trim().to_string();
        ensure!(!self.image_sink.is_empty(), "image-sink must not be empty");
        if let Some(dir) = self.media_directory.take() {
            self.media_directory = Some(expand_home(dir));
        }
        Ok(self)
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            recursive: self.recursive,
        }
    }

    pub fn playback_order(&self) -> PlaybackOrder {
        PlaybackOrder::from_flags(self.shuffle, self.shuffle_seed)
    }
}

/// Expand a leading `~` to `$HOME`.
fn expand_home(path: PathBuf) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path;
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path,
    }
}
