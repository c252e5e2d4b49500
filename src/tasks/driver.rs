use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::error::ExitReason;
use crate::events::{EventQueue, LoopInput, SurfaceHandle};
use crate::pipeline::{LifecycleManager, MediaEngine, Playback};
use crate::session::{Effect, Session, TimerToken};

/// Wire a catalog and an engine into a driver reading from `queue`.
pub fn build_driver<E: MediaEngine>(
    catalog: Catalog,
    engine: E,
    queue: &EventQueue,
    image_interval: Duration,
) -> Driver<LifecycleManager<E>> {
    let lifecycle = LifecycleManager::new(engine, queue.sender());
    let session = Session::new(catalog, lifecycle, image_interval);
    Driver::new(session, queue.receiver())
}

/// Hosts a [`Session`] on the main loop.
///
/// Owns the receiving end of the event queue and the single advance-timer
/// deadline. Hosts call [`Driver::pump`] whenever they wake up and sleep
/// until [`Driver::next_deadline`] otherwise.
pub struct Driver<P: Playback> {
    session: Session<P>,
    inbox: Receiver<LoopInput>,
    timer: Option<(TimerToken, Instant)>,
    present_requested: bool,
    clear_requested: bool,
    exit: Option<ExitReason>,
}

impl<P: Playback> Driver<P> {
    pub fn new(session: Session<P>, inbox: Receiver<LoopInput>) -> Self {
        Self {
            session,
            inbox,
            timer: None,
            present_requested: false,
            clear_requested: false,
            exit: None,
        }
    }

    pub fn session(&self) -> &Session<P> {
        &self.session
    }

    pub fn set_surface(&mut self, surface: SurfaceHandle) {
        self.session.set_surface(surface);
    }

    pub fn start(&mut self, now: Instant) {
        let effects = self.session.start();
        self.apply(effects, now);
    }

    pub fn close(&mut self, now: Instant) {
        let effects = self.session.close();
        self.apply(effects, now);
    }

    /// Drain queued inputs, then fire the advance timer if it is due.
    pub fn pump(&mut self, now: Instant) {
        while self.exit.is_none() {
            match self.inbox.try_recv() {
                Ok(input) => self.handle(input, now),
                Err(_) => break,
            }
        }
        self.fire_due(now);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.map(|(_, at)| at)
    }

    pub fn exit_reason(&self) -> Option<ExitReason> {
        self.exit
    }

    /// True once per batch of effects that asked for the window to come forward.
    pub fn take_present_request(&mut self) -> bool {
        std::mem::take(&mut self.present_requested)
    }

    /// True once after a video load asked for the surface to be blanked.
    pub fn take_clear_request(&mut self) -> bool {
        std::mem::take(&mut self.clear_requested)
    }

    /// Block on the queue until the session terminates.
    pub fn run_blocking(&mut self) -> ExitReason {
        loop {
            if let Some(reason) = self.exit {
                return reason;
            }
            let received = match self.next_deadline() {
                Some(deadline) => self.inbox.recv_deadline(deadline),
                None => self.inbox.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            let now = Instant::now();
            match received {
                Ok(input) => self.handle(input, now),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("event queue disconnected; closing");
                    self.close(now);
                }
            }
            self.fire_due(now);
        }
    }

    fn handle(&mut self, input: LoopInput, now: Instant) {
        let effects = match input {
            LoopInput::Pipeline(event) => self.session.on_pipeline_event(event),
            LoopInput::Close => self.session.close(),
        };
        self.apply(effects, now);
    }

    fn fire_due(&mut self, now: Instant) {
        if self.exit.is_some() {
            return;
        }
        if let Some((token, at)) = self.timer
            && at <= now
        {
            self.timer = None;
            let effects = self.session.on_timer(token);
            self.apply(effects, now);
        }
    }

    fn apply(&mut self, effects: Vec<Effect>, now: Instant) {
        for effect in effects {
            match effect {
                Effect::ArmTimer { token, after } => {
                    self.timer = now.checked_add(after).map(|at| (token, at));
                    if self.timer.is_none() {
                        warn!(?token, ?after, "advance interval out of range; timer never fires");
                    }
                }
                Effect::CancelTimer(token) => {
                    if self.timer.is_some_and(|(armed, _)| armed == token) {
                        self.timer = None;
                    }
                }
                Effect::PresentWindow => self.present_requested = true,
                Effect::ClearSurface => self.clear_requested = true,
                Effect::Exit(reason) => {
                    info!(%reason, "session terminated");
                    self.timer = None;
                    self.exit = Some(reason);
                }
            }
        }
    }
}
