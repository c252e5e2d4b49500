//! Dispatch of pipeline events for the one subscribed pipeline.

use tracing::{debug, trace};

use crate::events::{PipelineEvent, PipelineState, PlaybackHandle, TaggedEvent};

/// What the controller hears about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    PlaybackError {
        message: String,
        debug: Option<String>,
    },
    PlaybackComplete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Bind the sink to the output surface (main loop only).
    AttachSurface,
    /// Buffering below 100%: hold the pipeline.
    Pause,
    /// Buffering reached 100%: let it run.
    Resume,
    Forward(SessionEvent),
    /// Informational; nothing to do.
    Observe,
    /// From a pipeline that is no longer subscribed.
    Stale,
}

#[derive(Debug, Default)]
pub struct EventRouter {
    subscribed: Option<PlaybackHandle>,
}

impl EventRouter {
    pub fn subscribe(&mut self, handle: PlaybackHandle) {
        debug!(%handle, "router subscribed");
        self.subscribed = Some(handle);
    }

    pub fn unsubscribe(&mut self) {
        if let Some(handle) = self.subscribed.take() {
            debug!(%handle, "router unsubscribed");
        }
    }

    pub fn route(&self, tagged: &TaggedEvent) -> Route {
        if self.subscribed != Some(tagged.handle) {
            trace!(handle = %tagged.handle, event = ?tagged.event, "dropping stale event");
            return Route::Stale;
        }
        match &tagged.event {
            PipelineEvent::SurfaceReadyRequest => Route::AttachSurface,
            PipelineEvent::Error { message, debug } => {
                Route::Forward(SessionEvent::PlaybackError {
                    message: message.clone(),
                    debug: debug.clone(),
                })
            }
            PipelineEvent::EndOfStream => Route::Forward(SessionEvent::PlaybackComplete),
            PipelineEvent::Buffering(percent) if *percent < 100 => Route::Pause,
            PipelineEvent::Buffering(_) => Route::Resume,
            PipelineEvent::StateChanged { from, to } => {
                if *to == PipelineState::Playing {
                    debug!(handle = %tagged.handle, ?from, "pipeline is playing");
                }
                Route::Observe
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(handle: u64, event: PipelineEvent) -> TaggedEvent {
        TaggedEvent {
            handle: PlaybackHandle(handle),
            event,
        }
    }

    #[test]
    fn nothing_routes_before_subscription() {
        let router = EventRouter::default();
        assert_eq!(router.route(&tagged(1, PipelineEvent::EndOfStream)), Route::Stale);
    }

    #[test]
    fn events_from_a_previous_pipeline_are_stale() {
        let mut router = EventRouter::default();
        router.subscribe(PlaybackHandle(1));
        router.subscribe(PlaybackHandle(2));
        let err = PipelineEvent::Error {
            message: "boom".into(),
            debug: None,
        };
        assert_eq!(router.route(&tagged(1, err.clone())), Route::Stale);
        assert!(matches!(
            router.route(&tagged(2, err)),
            Route::Forward(SessionEvent::PlaybackError { .. })
        ));

        router.unsubscribe();
        assert_eq!(router.route(&tagged(2, PipelineEvent::EndOfStream)), Route::Stale);
    }

    #[test]
    fn buffering_is_local_flow_control() {
        let mut router = EventRouter::default();
        router.subscribe(PlaybackHandle(3));
        assert_eq!(router.route(&tagged(3, PipelineEvent::Buffering(0))), Route::Pause);
        assert_eq!(router.route(&tagged(3, PipelineEvent::Buffering(99))), Route::Pause);
        assert_eq!(router.route(&tagged(3, PipelineEvent::Buffering(100))), Route::Resume);
    }

    #[test]
    fn surface_requests_and_state_changes() {
        let mut router = EventRouter::default();
        router.subscribe(PlaybackHandle(4));
        assert_eq!(
            router.route(&tagged(4, PipelineEvent::SurfaceReadyRequest)),
            Route::AttachSurface
        );
        let playing = PipelineEvent::StateChanged {
            from: PipelineState::Paused,
            to: PipelineState::Playing,
        };
        assert_eq!(router.route(&tagged(4, playing)), Route::Observe);
        assert_eq!(
            router.route(&tagged(4, PipelineEvent::EndOfStream)),
            Route::Forward(SessionEvent::PlaybackComplete)
        );
    }
}
