use std::fmt;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::trace;

/// Identifies one pipeline instance. A fresh value is minted per load, so
/// events from a torn-down pipeline never compare equal to the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaybackHandle(pub u64);

impl fmt::Display for PlaybackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pipeline#{}", self.0)
    }
}

/// Native drawing target for video output (an X11 window id).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceHandle(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Null,
    Ready,
    Paused,
    Playing,
}

/// Lifecycle notifications a pipeline reports from its own threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A sink is ready to render and wants an output surface.
    SurfaceReadyRequest,
    Error {
        message: String,
        debug: Option<String>,
    },
    EndOfStream,
    Buffering(u8),
    StateChanged {
        from: PipelineState,
        to: PipelineState,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedEvent {
    pub handle: PlaybackHandle,
    pub event: PipelineEvent,
}

/// Everything the main loop consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopInput {
    Pipeline(TaggedEvent),
    /// The user (or a signal) asked the session to end.
    Close,
}

type Waker = Arc<dyn Fn() + Send + Sync>;

/// Single-consumer queue between pipeline threads and the main loop.
///
/// Any thread may post through a [`QueueSender`]; only the holder of the
/// receiver drains it. A waker, when installed, is invoked after every post
/// so a host event loop can wake up and drain.
pub struct EventQueue {
    tx: Sender<LoopInput>,
    rx: Receiver<LoopInput>,
    waker: Option<Waker>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            waker: None,
        }
    }

    /// Install the wake-up hook. Applies to senders created afterwards.
    pub fn set_waker(&mut self, waker: impl Fn() + Send + Sync + 'static) {
        self.waker = Some(Arc::new(waker));
    }

    pub fn sender(&self) -> QueueSender {
        QueueSender {
            tx: self.tx.clone(),
            waker: self.waker.clone(),
        }
    }

    pub fn receiver(&self) -> Receiver<LoopInput> {
        self.rx.clone()
    }
}

#[derive(Clone)]
pub struct QueueSender {
    tx: Sender<LoopInput>,
    waker: Option<Waker>,
}

impl fmt::Debug for QueueSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueSender")
            .field("waker", &self.waker.is_some())
            .finish()
    }
}

impl QueueSender {
    pub fn post(&self, input: LoopInput) {
        if self.tx.send(input).is_err() {
            trace!("main loop queue closed; dropping input");
            return;
        }
        if let Some(wake) = &self.waker {
            wake();
        }
    }

    /// A poster bound to one pipeline handle.
    pub fn for_pipeline(&self, handle: PlaybackHandle) -> PipelineEvents {
        PipelineEvents {
            handle,
            queue: self.clone(),
        }
    }
}

/// Handed to a pipeline at build time; every event it emits carries the
/// pipeline's handle.
#[derive(Debug, Clone)]
pub struct PipelineEvents {
    handle: PlaybackHandle,
    queue: QueueSender,
}

impl PipelineEvents {
    pub fn handle(&self) -> PlaybackHandle {
        self.handle
    }

    pub fn emit(&self, event: PipelineEvent) {
        self.queue.post(LoopInput::Pipeline(TaggedEvent {
            handle: self.handle,
            event,
        }));
    }
}
