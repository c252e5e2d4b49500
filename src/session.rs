//! Session controller: which item is on screen, when to advance, and when
//! to give up.
//!
//! Every operation returns the side effects the host loop must carry out
//! (arm or cancel the advance timer, present the window, exit). The
//! controller never sleeps or spawns; timer firings and pipeline events are
//! fed back in by the host.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::catalog::{Catalog, MediaKind};
use crate::error::ExitReason;
use crate::events::{SurfaceHandle, TaggedEvent};
use crate::pipeline::Playback;
use crate::router::SessionEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Showing(MediaKind),
    Terminated(ExitReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    ArmTimer { token: TimerToken, after: Duration },
    CancelTimer(TimerToken),
    /// Bring the window to the front before a new item appears.
    PresentWindow,
    /// Paint the output surface black before a video takes it over.
    ClearSurface,
    Exit(ExitReason),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub current_index: usize,
    pub attempt_counter: usize,
    pub pending_timer: Option<TimerToken>,
}

pub struct Session<P: Playback> {
    catalog: Catalog,
    playback: P,
    image_interval: Duration,
    state: SessionState,
    phase: Phase,
    next_token: u64,
}

impl<P: Playback> Session<P> {
    pub fn new(catalog: Catalog, playback: P, image_interval: Duration) -> Self {
        Self {
            catalog,
            playback,
            image_interval,
            state: SessionState::default(),
            phase: Phase::Idle,
            next_token: 1,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn playback(&self) -> &P {
        &self.playback
    }

    pub fn set_surface(&mut self, surface: SurfaceHandle) {
        self.playback.set_surface(surface);
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.phase, Phase::Terminated(_))
    }

    /// Load the item at the current index without advancing first.
    pub fn start(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.phase != Phase::Idle {
            debug!(phase = ?self.phase, "start ignored; session already running");
            return effects;
        }
        if self.catalog.is_empty() {
            warn!("no media to show");
            self.terminate(ExitReason::NoPlayableMedia, &mut effects);
            return effects;
        }
        info!(
            items = self.catalog.len(),
            interval = %humantime::format_duration(self.image_interval),
            "starting slideshow"
        );
        self.load_current(&mut effects);
        effects
    }

    /// Advance to the next item (wrapping) and load it, skipping failures.
    pub fn change_media(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.is_terminated() {
            return effects;
        }
        self.advance_index();
        debug!(index = self.state.current_index, "changing to next media");
        self.load_current(&mut effects);
        effects
    }

    /// The advance timer fired. Stale tokens are ignored.
    pub fn on_timer(&mut self, token: TimerToken) -> Vec<Effect> {
        if self.state.pending_timer != Some(token) {
            debug!(?token, "ignoring stale timer");
            return Vec::new();
        }
        self.state.pending_timer = None;
        if self.phase != Phase::Showing(MediaKind::Image) {
            return Vec::new();
        }
        self.change_media()
    }

    pub fn on_pipeline_event(&mut self, event: TaggedEvent) -> Vec<Effect> {
        if self.is_terminated() {
            return Vec::new();
        }
        match self.playback.dispatch(event) {
            Some(session_event) => self.on_session_event(session_event),
            None => Vec::new(),
        }
    }

    pub fn on_session_event(&mut self, event: SessionEvent) -> Vec<Effect> {
        match (event, self.phase) {
            (SessionEvent::PlaybackError { message, debug: detail }, Phase::Showing(_)) => {
                warn!(
                    item = %self.current_name(),
                    error = %message,
                    debug = detail.as_deref().unwrap_or(""),
                    "playback error; skipping to next media"
                );
                let mut effects = Vec::new();
                self.cancel_timer(&mut effects);
                effects.extend(self.change_media());
                effects
            }
            (SessionEvent::PlaybackComplete, Phase::Showing(MediaKind::Video)) => {
                info!(item = %self.current_name(), "video completed");
                self.change_media()
            }
            (event, phase) => {
                debug!(?event, ?phase, "session event ignored in this phase");
                Vec::new()
            }
        }
    }

    /// The user asked to quit.
    pub fn close(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if !self.is_terminated() {
            info!("closing slideshow");
            self.terminate(ExitReason::UserClosed, &mut effects);
        }
        effects
    }

    fn advance_index(&mut self) {
        self.state.current_index = (self.state.current_index + 1) % self.catalog.len();
    }

    fn current_name(&self) -> String {
        self.catalog
            .get(self.state.current_index)
            .map(|item| self.catalog.display_name(item))
            .unwrap_or_default()
    }

    /// One bounded pass over the catalog starting at the current index.
    fn load_current(&mut self, effects: &mut Vec<Effect>) {
        self.phase = Phase::Loading;
        self.cancel_timer(effects);
        effects.push(Effect::PresentWindow);

        let len = self.catalog.len();
        self.state.attempt_counter = 0;
        while self.state.attempt_counter < len {
            let Some(item) = self.catalog.get(self.state.current_index).cloned() else {
                break;
            };
            let name = self.catalog.display_name(&item);
            info!(kind = %item.kind(), item = %name, "loading media");
            if item.is_video() {
                effects.push(Effect::ClearSurface);
            }

            match self.playback.load(&item) {
                Ok(handle) => {
                    self.state.attempt_counter = 0;
                    self.phase = Phase::Showing(item.kind());
                    match item.kind() {
                        MediaKind::Image => {
                            let token = self.arm_timer(effects);
                            debug!(%handle, ?token, "image shown; advance timer armed");
                        }
                        MediaKind::Video => debug!(%handle, "playing video to completion"),
                    }
                    return;
                }
                Err(err) => {
                    warn!(item = %name, error = %err, "failed to load; trying next");
                    self.state.attempt_counter += 1;
                    self.advance_index();
                }
            }
        }

        warn!(attempts = self.state.attempt_counter, "could not load any media files");
        self.terminate(ExitReason::NoPlayableMedia, effects);
    }

    fn arm_timer(&mut self, effects: &mut Vec<Effect>) -> TimerToken {
        self.cancel_timer(effects);
        let token = TimerToken(self.next_token);
        self.next_token += 1;
        self.state.pending_timer = Some(token);
        effects.push(Effect::ArmTimer {
            token,
            after: self.image_interval,
        });
        token
    }

    fn cancel_timer(&mut self, effects: &mut Vec<Effect>) {
        if let Some(token) = self.state.pending_timer.take() {
            effects.push(Effect::CancelTimer(token));
        }
    }

    fn terminate(&mut self, reason: ExitReason, effects: &mut Vec<Effect>) {
        self.cancel_timer(effects);
        self.playback.teardown();
        self.phase = Phase::Terminated(reason);
        effects.push(Effect::Exit(reason));
    }
}
