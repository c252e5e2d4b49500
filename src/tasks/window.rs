//! Fullscreen window hosting the slideshow driver on the main thread.

use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use softbuffer::{Context as SoftContext, Surface};
use tracing::{debug, error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    raw_window_handle::{HasWindowHandle, RawWindowHandle},
    window::{Fullscreen, Window, WindowId, WindowLevel},
};

use crate::error::ExitReason;
use crate::events::{EventQueue, SurfaceHandle};
use crate::pipeline::Playback;
use crate::tasks::driver::Driver;

#[derive(Debug, Clone, Copy)]
pub struct ChromeOptions {
    pub cursor_hide_delay: Duration,
    pub focus_nudge: Duration,
}

/// Wakes the event loop after something was posted to the queue.
#[derive(Debug, Clone, Copy)]
struct Wake;

/// Software surface used only to paint the window black.
struct Backdrop {
    _context: SoftContext<Arc<Window>>,
    surface: Surface<Arc<Window>, Arc<Window>>,
}

impl Backdrop {
    fn new(window: &Arc<Window>) -> Result<Self> {
        let context = SoftContext::new(window.clone())
            .map_err(|err| anyhow!("failed to create backdrop context: {err}"))?;
        let surface = Surface::new(&context, window.clone())
            .map_err(|err| anyhow!("failed to create backdrop surface: {err}"))?;
        Ok(Self {
            _context: context,
            surface,
        })
    }

    fn paint_black(&mut self, size: PhysicalSize<u32>) {
        let (Some(width), Some(height)) = (NonZeroU32::new(size.width), NonZeroU32::new(size.height))
        else {
            return;
        };
        if let Err(err) = self.surface.resize(width, height) {
            warn!(error = %err, "backdrop resize failed");
            return;
        }
        match self.surface.buffer_mut() {
            Ok(mut buffer) => {
                buffer.fill(0);
                if let Err(err) = buffer.present() {
                    warn!(error = %err, "backdrop present failed");
                }
            }
            Err(err) => warn!(error = %err, "backdrop buffer unavailable"),
        }
    }
}

struct SlideshowWindow<P: Playback> {
    driver: Driver<P>,
    chrome: ChromeOptions,
    window: Option<Arc<Window>>,
    backdrop: Option<Backdrop>,
    started: bool,
    cursor_hide_at: Option<Instant>,
    keep_above_until: Option<Instant>,
}

impl<P: Playback> SlideshowWindow<P> {
    fn new(driver: Driver<P>, chrome: ChromeOptions) -> Self {
        Self {
            driver,
            chrome,
            window: None,
            backdrop: None,
            started: false,
            cursor_hide_at: None,
            keep_above_until: None,
        }
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("Media Slideshow")
            .with_fullscreen(Some(Fullscreen::Borderless(None)));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create slideshow window")?,
        );
        window.set_cursor_visible(false);

        match Backdrop::new(&window) {
            Ok(backdrop) => self.backdrop = Some(backdrop),
            Err(err) => warn!(error = ?err, "window background stays unpainted"),
        }

        match native_surface(&window) {
            Some(surface) => {
                info!(?surface, "output surface ready");
                self.driver.set_surface(surface);
            }
            None => warn!("no X11 window id available; sinks will open their own windows"),
        }
        self.window = Some(window);
        self.clear();
        Ok(())
    }

    fn clear(&mut self) {
        let (Some(window), Some(backdrop)) = (self.window.as_ref(), self.backdrop.as_mut()) else {
            return;
        };
        backdrop.paint_black(window.inner_size());
    }

    /// Focus the window and keep it above others for a short nudge.
    fn present(&mut self, now: Instant) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        window.focus_window();
        window.set_window_level(WindowLevel::AlwaysOnTop);
        self.keep_above_until = now.checked_add(self.chrome.focus_nudge);
        if self.cursor_hide_at.is_none() {
            window.set_cursor_visible(false);
        }
    }

    fn show_cursor(&mut self, now: Instant) {
        if let Some(window) = self.window.as_ref() {
            window.set_cursor_visible(true);
        }
        self.cursor_hide_at = now.checked_add(self.chrome.cursor_hide_delay);
    }

    fn run_chrome_timers(&mut self, now: Instant) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if self.keep_above_until.is_some_and(|at| at <= now) {
            window.set_window_level(WindowLevel::Normal);
            self.keep_above_until = None;
        }
        if self.cursor_hide_at.is_some_and(|at| at <= now) {
            window.set_cursor_visible(false);
            self.cursor_hide_at = None;
        }
    }

    fn next_wake(&self) -> Option<Instant> {
        [
            self.driver.next_deadline(),
            self.cursor_hide_at,
            self.keep_above_until,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    fn exit_reason(&self) -> ExitReason {
        self.driver.exit_reason().unwrap_or(ExitReason::UserClosed)
    }
}

impl<P: Playback> ApplicationHandler<Wake> for SlideshowWindow<P> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.started {
            return;
        }
        if let Err(err) = self.create_window(event_loop) {
            error!(error = ?err, "window setup failed");
            self.driver.close(Instant::now());
            event_loop.exit();
            return;
        }
        self.started = true;
        self.driver.start(Instant::now());
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.window.as_ref().is_none_or(|w| w.id() != window_id) {
            return;
        }
        let now = Instant::now();
        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                info!("window close requested");
                self.driver.close(now);
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed
                    && event.logical_key == Key::Named(NamedKey::Escape) =>
            {
                info!("escape pressed");
                self.driver.close(now);
                event_loop.exit();
            }
            WindowEvent::Resized(_) | WindowEvent::RedrawRequested => self.clear(),
            WindowEvent::CursorMoved { .. } => self.show_cursor(now),
            _ => {}
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, _event: Wake) {
        self.driver.pump(Instant::now());
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        self.driver.pump(now);
        if self.driver.take_clear_request() {
            self.clear();
        }
        if self.driver.take_present_request() {
            self.present(now);
        }
        self.run_chrome_timers(now);

        if self.driver.exit_reason().is_some() {
            event_loop.exit();
            return;
        }
        match self.next_wake() {
            Some(at) => event_loop.set_control_flow(ControlFlow::WaitUntil(at)),
            None => event_loop.set_control_flow(ControlFlow::Wait),
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Window teardown must not leave a pipeline rendering into it.
        self.driver.close(Instant::now());
        debug!("event loop exiting");
    }
}

fn native_surface(window: &Window) -> Option<SurfaceHandle> {
    let handle = window.window_handle().ok()?;
    match handle.as_raw() {
        RawWindowHandle::Xlib(xlib) => usize::try_from(xlib.window).ok().map(SurfaceHandle),
        RawWindowHandle::Xcb(xcb) => usize::try_from(xcb.window.get()).ok().map(SurfaceHandle),
        _ => None,
    }
}

/// Build the event loop, wire the queue to it, and run until the session ends.
///
/// `assemble` receives the queue after its waker is installed and must build
/// the driver from it.
pub fn run_windowed<P, F>(
    mut queue: EventQueue,
    chrome: ChromeOptions,
    assemble: F,
) -> Result<ExitReason>
where
    P: Playback,
    F: FnOnce(&EventQueue) -> Result<Driver<P>>,
{
    let event_loop = EventLoop::<Wake>::with_user_event()
        .build()
        .context("failed to build window event loop")?;
    let proxy = Mutex::new(event_loop.create_proxy());
    queue.set_waker(move || {
        let proxy = proxy.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = proxy.send_event(Wake);
    });

    let driver = assemble(&queue)?;
    let mut app = SlideshowWindow::new(driver, chrome);
    event_loop
        .run_app(&mut app)
        .map_err(|err| anyhow!("window event loop failed: {err}"))?;
    Ok(app.exit_reason())
}
