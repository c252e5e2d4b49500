//! GStreamer implementation of the media engine.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_video as gst_video;
use gstreamer_video::prelude::*;
use tracing::{debug, warn};

use crate::catalog::MediaItem;
use crate::error::LoadError;
use crate::events::{PipelineEvent, PipelineEvents, PipelineState, SurfaceHandle};
use crate::pipeline::{MediaEngine, Pipeline, PipelineTemplate, Stage};

pub struct GstEngine {
    image_sink: String,
}

impl GstEngine {
    /// Initialize GStreamer. `image_sink` names the overlay sink for stills.
    pub fn new(image_sink: impl Into<String>) -> Result<Self> {
        gst::init().context("failed to initialize GStreamer")?;
        if gst::Registry::get().find_plugin("playback").is_none() {
            warn!("GStreamer playback plugin not found; video playback may not work");
            warn!("install it with: sudo apt-get install gstreamer1.0-plugins-base");
        }
        Ok(Self {
            image_sink: image_sink.into(),
        })
    }

    fn make_stage(&self, stage: Stage, path: &Path) -> Result<gst::Element, LoadError> {
        let built = match stage {
            Stage::FileSource => gst::ElementFactory::make("filesrc")
                .property("location", path.to_string_lossy().into_owned())
                .build(),
            Stage::AviDemux => gst::ElementFactory::make("avidemux").build(),
            Stage::JpegParse => gst::ElementFactory::make("jpegparse").build(),
            Stage::JpegDecode => gst::ElementFactory::make("jpegdec").build(),
            Stage::AutoDecode => gst::ElementFactory::make("decodebin").build(),
            Stage::VideoConvert => gst::ElementFactory::make("videoconvert").build(),
            Stage::OrientationFlip => gst::ElementFactory::make("videoflip")
                .property_from_str("method", "automatic")
                .build(),
            Stage::VideoScale => gst::ElementFactory::make("videoscale").build(),
            Stage::RgbCaps => gst::ElementFactory::make("capsfilter")
                .property(
                    "caps",
                    gst::Caps::builder("video/x-raw")
                        .field("format", "RGB")
                        .build(),
                )
                .build(),
            Stage::ImageFreeze => gst::ElementFactory::make("imagefreeze").build(),
            Stage::OverlaySink => gst::ElementFactory::make(self.image_sink.as_str())
                .name("sink")
                .build()
                .inspect(|sink| {
                    if sink.find_property("force-aspect-ratio").is_some() {
                        sink.set_property("force-aspect-ratio", true);
                    }
                }),
            Stage::AutoVideoSink => gst::ElementFactory::make("autovideosink")
                .name("sink")
                .build(),
        };
        built.map_err(|err| LoadError::Build(format!("{stage:?}: {err}")))
    }

    fn build_chain(&self, stages: &[Stage], path: &Path) -> Result<gst::Element, LoadError> {
        let pipeline = gst::Pipeline::new();
        let elements = stages
            .iter()
            .map(|stage| self.make_stage(*stage, path))
            .collect::<Result<Vec<_>, _>>()?;
        pipeline
            .add_many(elements.iter())
            .map_err(|err| LoadError::Build(err.to_string()))?;

        for (stage, pair) in stages.iter().zip(elements.windows(2)) {
            let (upstream, downstream) = (&pair[0], &pair[1]);
            if stage.has_dynamic_src() {
                link_on_pad_added(upstream, downstream);
            } else {
                upstream
                    .link(downstream)
                    .map_err(|err| LoadError::Build(format!("{stage:?}: {err}")))?;
            }
        }
        Ok(pipeline.upcast())
    }

    fn build_automatic(&self, path: &Path) -> Result<gst::Element, LoadError> {
        let absolute = std::path::absolute(path).map_err(|err| LoadError::Build(err.to_string()))?;
        let uri = gst::glib::filename_to_uri(&absolute, None)
            .map_err(|err| LoadError::Build(err.to_string()))?;
        gst::ElementFactory::make("playbin")
            .name("player")
            .property("uri", uri.as_str())
            .build()
            .map_err(|err| LoadError::Build(format!("playbin: {err}")))
    }
}

fn link_on_pad_added(upstream: &gst::Element, downstream: &gst::Element) {
    let downstream = downstream.downgrade();
    upstream.connect_pad_added(move |_, pad| {
        let Some(downstream) = downstream.upgrade() else {
            return;
        };
        let Some(sink_pad) = downstream.static_pad("sink") else {
            return;
        };
        if sink_pad.is_linked() {
            return;
        }
        // Demuxers also expose audio pads; those simply fail to link.
        if let Err(err) = pad.link(&sink_pad) {
            debug!(pad = %pad.name(), error = ?err, "dynamic pad not linked");
        }
    });
}

impl MediaEngine for GstEngine {
    type Pipeline = GstPipeline;

    fn build(
        &self,
        template: PipelineTemplate,
        item: &MediaItem,
        events: PipelineEvents,
    ) -> Result<GstPipeline, LoadError> {
        let element = match template {
            PipelineTemplate::Automatic => self.build_automatic(item.path())?,
            PipelineTemplate::Chain(stages) => self.build_chain(stages, item.path())?,
        };
        let bus = element
            .bus()
            .ok_or_else(|| LoadError::Build("pipeline has no bus".into()))?;

        let overlay_target = Arc::new(Mutex::new(None::<gst::Element>));
        {
            let overlay_target = overlay_target.clone();
            let top = element.downgrade();
            bus.set_sync_handler(move |_, msg| {
                if let Some(event) = translate(msg, &top, &overlay_target) {
                    events.emit(event);
                }
                gst::BusSyncReply::Drop
            });
        }

        Ok(GstPipeline {
            element,
            bus,
            overlay_target,
        })
    }
}

/// Runs on GStreamer streaming threads; only converts and posts.
fn translate(
    msg: &gst::Message,
    top: &gst::glib::WeakRef<gst::Element>,
    overlay_target: &Mutex<Option<gst::Element>>,
) -> Option<PipelineEvent> {
    use gst::MessageView;

    if gst_video::is_video_overlay_prepare_window_handle_message(msg) {
        let source = msg
            .src()
            .and_then(|src| src.clone().downcast::<gst::Element>().ok())?;
        *overlay_target.lock().unwrap_or_else(PoisonError::into_inner) = Some(source);
        return Some(PipelineEvent::SurfaceReadyRequest);
    }

    match msg.view() {
        MessageView::Eos(..) => Some(PipelineEvent::EndOfStream),
        MessageView::Error(err) => Some(PipelineEvent::Error {
            message: err.error().to_string(),
            debug: err.debug().map(|d| d.to_string()),
        }),
        MessageView::Buffering(buffering) => {
            let percent = buffering.percent().clamp(0, 100);
            Some(PipelineEvent::Buffering(u8::try_from(percent).unwrap_or(100)))
        }
        MessageView::StateChanged(change) => {
            let top = top.upgrade()?;
            let from_top = msg
                .src()
                .is_some_and(|src| src == top.upcast_ref::<gst::Object>());
            from_top.then(|| PipelineEvent::StateChanged {
                from: map_state(change.old()),
                to: map_state(change.current()),
            })
        }
        _ => None,
    }
}

fn map_state(state: gst::State) -> PipelineState {
    match state {
        gst::State::Ready => PipelineState::Ready,
        gst::State::Paused => PipelineState::Paused,
        gst::State::Playing => PipelineState::Playing,
        _ => PipelineState::Null,
    }
}

pub struct GstPipeline {
    element: gst::Element,
    bus: gst::Bus,
    overlay_target: Arc<Mutex<Option<gst::Element>>>,
}

impl Pipeline for GstPipeline {
    fn play(&self) -> Result<(), LoadError> {
        self.element
            .set_state(gst::State::Playing)
            .map(|_| ())
            .map_err(|err| LoadError::StartFailed(err.to_string()))
    }

    fn set_paused(&self, paused: bool) {
        let target = if paused {
            gst::State::Paused
        } else {
            gst::State::Playing
        };
        if let Err(err) = self.element.set_state(target) {
            warn!(?target, error = %err, "buffering state change failed");
        }
    }

    fn attach_surface(&self, surface: SurfaceHandle) {
        let target = self
            .overlay_target
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(target) = target else {
            debug!("no sink has requested a surface");
            return;
        };
        match target.dynamic_cast_ref::<gst_video::VideoOverlay>() {
            // SAFETY: the handle is a live native window owned by the shell,
            // which outlives every pipeline.
            Some(overlay) => unsafe { overlay.set_window_handle(surface.0) },
            None => warn!(sink = %target.name(), "sink does not accept a window handle"),
        }
    }

    fn shutdown(self) -> Result<()> {
        self.bus.unset_sync_handler();
        let stopped = self.element.set_state(gst::State::Null);
        // Block until the pipeline is fully stopped.
        let (settled, _, _) = self.element.state(gst::ClockTime::NONE);
        self.overlay_target
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        stopped.context("failed to stop pipeline")?;
        settled.context("pipeline did not settle after stop")?;
        Ok(())
    }
}
