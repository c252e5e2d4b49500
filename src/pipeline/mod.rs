//! Pipeline lifecycle: at most one pipeline alive, full teardown before the
//! next one is built.

#[cfg(feature = "gstreamer")]
pub mod gst;
pub mod template;

use tracing::{debug, info, warn};

use crate::catalog::MediaItem;
use crate::error::LoadError;
use crate::events::{PipelineEvents, PlaybackHandle, QueueSender, SurfaceHandle, TaggedEvent};
use crate::router::{EventRouter, Route, SessionEvent};

pub use template::{ContainerHint, PipelineTemplate, Stage};

/// Builds pipelines. Decoding and rendering live entirely behind this seam.
pub trait MediaEngine {
    type Pipeline: Pipeline;

    fn build(
        &self,
        template: PipelineTemplate,
        item: &MediaItem,
        events: PipelineEvents,
    ) -> Result<Self::Pipeline, LoadError>;
}

pub trait Pipeline {
    /// Transition to the running state.
    fn play(&self) -> Result<(), LoadError>;

    fn set_paused(&self, paused: bool);

    /// Point the sink that requested a surface at `surface`.
    fn attach_surface(&self, surface: SurfaceHandle);

    /// Stop event delivery, stop the pipeline and block until it has fully
    /// reached the stopped state, then release it.
    fn shutdown(self) -> anyhow::Result<()>;
}

/// What the session controller drives.
pub trait Playback {
    fn load(&mut self, item: &MediaItem) -> Result<PlaybackHandle, LoadError>;

    /// Idempotent; a no-op when nothing is loaded.
    fn teardown(&mut self);

    /// Handle an event for the live pipeline locally when possible and return
    /// what the controller must act on.
    fn dispatch(&mut self, event: TaggedEvent) -> Option<SessionEvent>;

    fn set_surface(&mut self, surface: SurfaceHandle);

    fn active(&self) -> Option<PlaybackHandle>;
}

struct Active<P> {
    handle: PlaybackHandle,
    pipeline: P,
}

pub struct LifecycleManager<E: MediaEngine> {
    engine: E,
    queue: QueueSender,
    router: EventRouter,
    surface: Option<SurfaceHandle>,
    active: Option<Active<E::Pipeline>>,
    next_handle: u64,
}

impl<E: MediaEngine> LifecycleManager<E> {
    pub fn new(engine: E, queue: QueueSender) -> Self {
        Self {
            engine,
            queue,
            router: EventRouter::default(),
            surface: None,
            active: None,
            next_handle: 1,
        }
    }

    /// Bind the live pipeline's sink to the surface. Runs on the main loop.
    pub fn attach_surface(&mut self, handle: PlaybackHandle) {
        let Some(active) = self.active.as_ref().filter(|a| a.handle == handle) else {
            debug!(%handle, "surface request for inactive pipeline ignored");
            return;
        };
        match self.surface {
            Some(surface) => {
                debug!(%handle, ?surface, "attaching output surface");
                active.pipeline.attach_surface(surface);
            }
            None => debug!(%handle, "no output surface; sink renders on its own"),
        }
    }

    fn set_buffering(&mut self, handle: PlaybackHandle, paused: bool) {
        if let Some(active) = self.active.as_ref().filter(|a| a.handle == handle) {
            debug!(%handle, paused, "buffering flow control");
            active.pipeline.set_paused(paused);
        }
    }

    fn mint_handle(&mut self) -> PlaybackHandle {
        let handle = PlaybackHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }
}

impl<E: MediaEngine> Playback for LifecycleManager<E> {
    fn load(&mut self, item: &MediaItem) -> Result<PlaybackHandle, LoadError> {
        // Always first: two pipelines must never compete for the surface.
        self.teardown();

        let template = PipelineTemplate::for_item(item);
        let handle = self.mint_handle();
        info!(
            %handle,
            kind = %item.kind(),
            template = template.describe(),
            path = %item.path().display(),
            "building pipeline"
        );
        let pipeline = self
            .engine
            .build(template, item, self.queue.for_pipeline(handle))?;

        if let Err(err) = pipeline.play() {
            if let Err(stop_err) = pipeline.shutdown() {
                warn!(%handle, error = ?stop_err, "cleanup after failed start failed");
            }
            return Err(err);
        }

        info!(%handle, "pipeline started");
        self.router.subscribe(handle);
        self.active = Some(Active { handle, pipeline });
        Ok(handle)
    }

    fn teardown(&mut self) {
        self.router.unsubscribe();
        let Some(Active { handle, pipeline }) = self.active.take() else {
            return;
        };
        debug!(%handle, "tearing down pipeline");
        if let Err(err) = pipeline.shutdown() {
            warn!(%handle, error = ?err, "pipeline teardown reported an error");
        }
    }

    fn dispatch(&mut self, event: TaggedEvent) -> Option<SessionEvent> {
        match self.router.route(&event) {
            Route::AttachSurface => {
                self.attach_surface(event.handle);
                None
            }
            Route::Pause => {
                self.set_buffering(event.handle, true);
                None
            }
            Route::Resume => {
                self.set_buffering(event.handle, false);
                None
            }
            Route::Forward(session_event) => Some(session_event),
            Route::Observe | Route::Stale => None,
        }
    }

    fn set_surface(&mut self, surface: SurfaceHandle) {
        self.surface = Some(surface);
    }

    fn active(&self) -> Option<PlaybackHandle> {
        self.active.as_ref().map(|a| a.handle)
    }
}

impl<E: MediaEngine> Drop for LifecycleManager<E> {
    fn drop(&mut self) {
        self.teardown();
    }
}
