//! Directory scanning and playback ordering for the slideshow catalog.

use std::fmt;
use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info, instrument};
use walkdir::{DirEntry, WalkDir};

use crate::error::CatalogError;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif"];
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "avi", "mkv", "mov", "webm", "flv", "wmv", "mpg", "mpeg",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify `path` by its lowercased extension. Unknown suffixes yield `None`.
    #[must_use]
    pub fn classify(path: &Path) -> Option<Self> {
        let ext = lowercase_extension(path)?;
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Video)
        } else {
            None
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => f.write_str("image"),
            Self::Video => f.write_str("video"),
        }
    }
}

pub(crate) fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|s| s.to_str())
        .map(str::to_ascii_lowercase)
}

/// One playable file. The kind is fixed at construction; identity is the path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaItem {
    path: PathBuf,
    kind: MediaKind,
}

impl MediaItem {
    /// Returns `None` when the extension is not a supported image or video.
    pub fn new(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let kind = MediaKind::classify(&path)?;
        Some(Self { path, kind })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }
}

/// Options controlling directory scanning.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Whether to descend into subdirectories.
    pub recursive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOrder {
    /// Sorted by the full path string.
    Sequential,
    /// Uniform random permutation; reproducible when a seed is given.
    Shuffled { seed: Option<u64> },
}

impl PlaybackOrder {
    pub fn from_flags(shuffle: bool, seed: Option<u64>) -> Self {
        if shuffle {
            Self::Shuffled { seed }
        } else {
            Self::Sequential
        }
    }
}

/// Enumerate supported media under `root`.
///
/// # Errors
/// [`CatalogError::BadDir`] when `root` is not a readable directory.
#[instrument(skip(opts), fields(root = %root.display(), recursive = opts.recursive))]
pub fn scan(root: &Path, opts: &ScanOptions) -> Result<Vec<MediaItem>, CatalogError> {
    if !root.is_dir() {
        return Err(CatalogError::BadDir(root.display().to_string()));
    }

    let mut walker = WalkDir::new(root).follow_links(true);
    if !opts.recursive {
        walker = walker.max_depth(1);
    }

    let mut out = Vec::new();
    for entry in walker
        .into_iter()
        .filter_entry(|e| !is_hidden_below_root(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        match MediaItem::new(entry.path()) {
            Some(item) => out.push(item),
            None => debug!(path = %entry.path().display(), "skipping unsupported file"),
        }
    }
    Ok(out)
}

fn is_hidden_below_root(entry: &DirEntry) -> bool {
    // The root itself may be a dot-dir.
    if entry.depth() == 0 {
        return false;
    }
    entry
        .file_name()
        .to_str()
        .is_some_and(|n| n.starts_with('.'))
}

/// The ordered list of playable media discovered at session start.
///
/// Never empty. Read-only once ordered.
#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
    recursive: bool,
    items: Vec<MediaItem>,
    order: PlaybackOrder,
}

impl Catalog {
    /// Scan `root` and apply `order`.
    ///
    /// # Errors
    /// [`CatalogError::EmptyCatalog`] when nothing matched, or any scan error.
    pub fn scan(
        root: &Path,
        opts: &ScanOptions,
        order: PlaybackOrder,
    ) -> Result<Self, CatalogError> {
        let items = scan(root, opts)?;
        let catalog = Self::from_items(root, opts.recursive, items)?;
        Ok(catalog.ordered(order))
    }

    /// Wrap pre-classified items. Items keep the given order until [`Catalog::ordered`].
    ///
    /// # Errors
    /// [`CatalogError::EmptyCatalog`] when `items` is empty.
    pub fn from_items(
        root: impl Into<PathBuf>,
        recursive: bool,
        items: Vec<MediaItem>,
    ) -> Result<Self, CatalogError> {
        let root = root.into();
        if items.is_empty() {
            return Err(CatalogError::EmptyCatalog(root.display().to_string()));
        }
        Ok(Self {
            root,
            recursive,
            items,
            order: PlaybackOrder::Sequential,
        })
    }

    /// Apply exactly one ordering: a path sort or a random permutation.
    #[must_use]
    pub fn ordered(mut self, order: PlaybackOrder) -> Self {
        match order {
            PlaybackOrder::Sequential => {
                self.items
                    .sort_by(|a, b| a.path.as_os_str().cmp(b.path.as_os_str()));
            }
            PlaybackOrder::Shuffled { seed } => {
                let mut rng = match seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_os_rng(),
                };
                self.items.shuffle(&mut rng);
            }
        }
        self.order = order;
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&MediaItem> {
        self.items.get(index)
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn order(&self) -> PlaybackOrder {
        self.order
    }

    /// Path relative to the scanned root when recursive, bare file name otherwise.
    pub fn display_name(&self, item: &MediaItem) -> String {
        let shown = if self.recursive {
            item.path.strip_prefix(&self.root).ok()
        } else {
            item.path.file_name().map(Path::new)
        };
        shown
            .unwrap_or(&item.path)
            .to_string_lossy()
            .into_owned()
    }

    /// Log the first `limit` entries, then a count of the rest.
    pub fn log_listing(&self, limit: usize) {
        info!(count = self.len(), root = %self.root.display(), "found media files");
        for item in self.items.iter().take(limit) {
            info!("  - {} ({})", self.display_name(item), item.kind);
        }
        if self.len() > limit {
            info!("  ... and {} more files", self.len() - limit);
        }
        if matches!(self.order, PlaybackOrder::Shuffled { .. }) {
            info!("playback order: shuffled");
        }
    }
}
