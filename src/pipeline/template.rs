//! Closed set of pipeline shapes, selected by media kind and container.

use crate::catalog::{MediaItem, MediaKind, lowercase_extension};

/// Container detail that changes how a file must be played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerHint {
    /// AVI, usually carrying MJPEG. The automatic player crashes on these.
    Avi,
    /// JPEG stills, which carry EXIF orientation the parser can expose.
    Jpeg,
    Other,
}

impl ContainerHint {
    pub fn of(item: &MediaItem) -> Self {
        match lowercase_extension(item.path()).as_deref() {
            Some("avi") => Self::Avi,
            Some("jpg" | "jpeg") => Self::Jpeg,
            _ => Self::Other,
        }
    }
}

/// One processing stage in an explicit chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FileSource,
    AviDemux,
    JpegParse,
    JpegDecode,
    /// Format-sniffing decoder.
    AutoDecode,
    VideoConvert,
    /// Applies the rotation recorded in the image's metadata.
    OrientationFlip,
    VideoScale,
    /// Pins raw RGB between scale and freeze.
    RgbCaps,
    /// Repeats the decoded frame as an endless static stream.
    ImageFreeze,
    /// Overlay-capable sink that accepts a window handle.
    OverlaySink,
    AutoVideoSink,
}

impl Stage {
    /// Stages whose source pads only appear once data has been inspected.
    pub fn has_dynamic_src(self) -> bool {
        matches!(self, Self::AviDemux | Self::AutoDecode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineTemplate {
    /// Self-assembling player that resolves demux, decode and sink itself.
    Automatic,
    Chain(&'static [Stage]),
}

pub const AVI_VIDEO_CHAIN: &[Stage] = &[
    Stage::FileSource,
    Stage::AviDemux,
    Stage::JpegDecode,
    Stage::VideoConvert,
    Stage::AutoVideoSink,
];

pub const JPEG_IMAGE_CHAIN: &[Stage] = &[
    Stage::FileSource,
    Stage::JpegParse,
    Stage::JpegDecode,
    Stage::VideoConvert,
    Stage::OrientationFlip,
    Stage::VideoScale,
    Stage::RgbCaps,
    Stage::ImageFreeze,
    Stage::VideoConvert,
    Stage::OverlaySink,
];

pub const GENERIC_IMAGE_CHAIN: &[Stage] = &[
    Stage::FileSource,
    Stage::AutoDecode,
    Stage::VideoConvert,
    Stage::OrientationFlip,
    Stage::VideoScale,
    Stage::RgbCaps,
    Stage::ImageFreeze,
    Stage::VideoConvert,
    Stage::OverlaySink,
];

impl PipelineTemplate {
    pub fn lookup(kind: MediaKind, container: ContainerHint) -> Self {
        match (kind, container) {
            (MediaKind::Video, ContainerHint::Avi) => Self::Chain(AVI_VIDEO_CHAIN),
            (MediaKind::Video, _) => Self::Automatic,
            (MediaKind::Image, ContainerHint::Jpeg) => Self::Chain(JPEG_IMAGE_CHAIN),
            (MediaKind::Image, _) => Self::Chain(GENERIC_IMAGE_CHAIN),
        }
    }

    pub fn for_item(item: &MediaItem) -> Self {
        Self::lookup(item.kind(), ContainerHint::of(item))
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::Automatic => "automatic",
            Self::Chain(stages) if *stages == AVI_VIDEO_CHAIN => "avi-mjpeg",
            Self::Chain(stages) if *stages == JPEG_IMAGE_CHAIN => "jpeg-still",
            Self::Chain(_) => "still",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(path: &str) -> PipelineTemplate {
        PipelineTemplate::for_item(&MediaItem::new(path).unwrap())
    }

    #[test]
    fn avi_uses_the_explicit_mjpeg_chain() {
        assert_eq!(template("/m/clip.avi"), PipelineTemplate::Chain(AVI_VIDEO_CHAIN));
        assert_eq!(template("/m/CLIP.AVI"), PipelineTemplate::Chain(AVI_VIDEO_CHAIN));
    }

    #[test]
    fn other_videos_use_the_automatic_player() {
        for path in ["a.mp4", "a.mkv", "a.mov", "a.webm", "a.MPG"] {
            assert_eq!(template(path), PipelineTemplate::Automatic, "{path}");
        }
    }

    #[test]
    fn images_freeze_after_orientation_and_scale() {
        for path in ["a.jpg", "a.png", "a.gif"] {
            let PipelineTemplate::Chain(stages) = template(path) else {
                panic!("{path} should use an explicit chain");
            };
            let flip = stages.iter().position(|s| *s == Stage::OrientationFlip).unwrap();
            let scale = stages.iter().position(|s| *s == Stage::VideoScale).unwrap();
            let freeze = stages.iter().position(|s| *s == Stage::ImageFreeze).unwrap();
            assert!(flip < scale && scale < freeze, "{path}");
            assert_eq!(stages.last(), Some(&Stage::OverlaySink));
        }
        assert_eq!(template("a.JPEG"), PipelineTemplate::Chain(JPEG_IMAGE_CHAIN));
        assert_eq!(template("a.bmp"), PipelineTemplate::Chain(GENERIC_IMAGE_CHAIN));
    }
}
