use std::path::PathBuf;
use std::time::Duration;

use media_slideshow::catalog::{Catalog, MediaItem, MediaKind, PlaybackOrder};
use media_slideshow::error::ExitReason;
use media_slideshow::events::{EventQueue, LoopInput, PipelineEvent, TaggedEvent};
use media_slideshow::pipeline::{LifecycleManager, Playback};
use media_slideshow::router::SessionEvent;
use media_slideshow::session::{Effect, Phase, Session, TimerToken};
use media_slideshow::testkit::{EngineCall, Journal, ScriptedEngine};

const INTERVAL: Duration = Duration::from_secs(3);

struct Harness {
    session: Session<LifecycleManager<ScriptedEngine>>,
    journal: Journal,
    queue: EventQueue,
}

impl Harness {
    fn new(names: &[&str], engine: ScriptedEngine) -> Self {
        let items = names
            .iter()
            .map(|n| MediaItem::new(format!("/media/{n}")).unwrap())
            .collect();
        let catalog = Catalog::from_items("/media", false, items).unwrap();
        Self::with_catalog(catalog, engine)
    }

    fn with_catalog(catalog: Catalog, engine: ScriptedEngine) -> Self {
        let journal = engine.journal();
        let queue = EventQueue::new();
        let lifecycle = LifecycleManager::new(engine, queue.sender());
        Self {
            session: Session::new(catalog, lifecycle, INTERVAL),
            journal,
            queue,
        }
    }

    /// Feed every queued pipeline event to the session.
    fn drain(&mut self) -> Vec<Effect> {
        let rx = self.queue.receiver();
        let mut effects = Vec::new();
        while let Ok(input) = rx.try_recv() {
            if let LoopInput::Pipeline(ev) = input {
                effects.extend(self.session.on_pipeline_event(ev));
            }
        }
        effects
    }

    fn live_handle(&self) -> media_slideshow::events::PlaybackHandle {
        self.session.playback().active().expect("a pipeline is live")
    }

    fn eos(&mut self) -> Vec<Effect> {
        let handle = self.live_handle();
        self.session.on_pipeline_event(TaggedEvent {
            handle,
            event: PipelineEvent::EndOfStream,
        })
    }
}

fn armed(effects: &[Effect]) -> Vec<(TimerToken, Duration)> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::ArmTimer { token, after } => Some((*token, *after)),
            _ => None,
        })
        .collect()
}

fn single_timer(effects: &[Effect]) -> TimerToken {
    let timers = armed(effects);
    assert_eq!(timers.len(), 1, "exactly one timer armed: {effects:?}");
    assert_eq!(timers[0].1, INTERVAL);
    timers[0].0
}

#[test]
fn images_advance_on_timer_and_videos_on_completion_with_wrap() {
    let mut h = Harness::new(&["a.jpg", "b.mp4", "c.png"], ScriptedEngine::new());

    let effects = h.session.start();
    assert_eq!(h.session.phase(), Phase::Showing(MediaKind::Image));
    let t1 = single_timer(&effects);

    let effects = h.session.on_timer(t1);
    assert_eq!(h.session.phase(), Phase::Showing(MediaKind::Video));
    assert!(armed(&effects).is_empty(), "videos arm no timer");

    let effects = h.eos();
    assert_eq!(h.session.phase(), Phase::Showing(MediaKind::Image));
    let t2 = single_timer(&effects);

    h.session.on_timer(t2);
    assert_eq!(h.session.state().current_index, 0);

    assert_eq!(
        h.journal.played_names(),
        vec!["a.jpg", "b.mp4", "c.png", "a.jpg"]
    );
    assert_eq!(h.journal.peak_live(), 1);
}

#[test]
fn failed_item_is_skipped_within_one_change() {
    let engine = ScriptedEngine::new().fail_start("/media/bad.png");
    let mut h = Harness::new(&["bad.png", "good.jpg"], engine);

    let effects = h.session.start();
    assert_eq!(h.session.phase(), Phase::Showing(MediaKind::Image));
    assert_eq!(h.session.state().current_index, 1);
    assert_eq!(h.session.state().attempt_counter, 0);
    single_timer(&effects);
    assert_eq!(h.journal.played_names(), vec!["good.jpg"]);
}

#[test]
fn every_item_failing_terminates_after_one_pass() {
    let engine = ScriptedEngine::new()
        .fail_start("/media/a.jpg")
        .fail_build("/media/b.mkv")
        .fail_start("/media/c.png");
    let mut h = Harness::new(&["a.jpg", "b.mkv", "c.png"], engine);

    let effects = h.session.start();
    assert_eq!(
        h.session.phase(),
        Phase::Terminated(ExitReason::NoPlayableMedia)
    );
    assert!(effects.contains(&Effect::Exit(ExitReason::NoPlayableMedia)));
    assert!(armed(&effects).is_empty());

    // a.jpg and c.png get built then fail to start; b.mkv fails to build.
    let builds = h
        .journal
        .calls()
        .iter()
        .filter(|c| matches!(c, EngineCall::Build { .. }))
        .count();
    assert_eq!(builds, 2);
    assert_eq!(h.journal.live(), 0);
    assert_eq!(h.session.state().current_index, 0);

    assert!(h.session.change_media().is_empty(), "terminated is final");
}

#[test]
fn advancing_len_times_returns_to_the_start() {
    let names = ["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.jpg"];
    let mut h = Harness::new(&names, ScriptedEngine::new());
    h.session.start();
    for _ in 0..2 {
        h.session.change_media();
    }
    let origin = h.session.state().current_index;
    for _ in 0..names.len() {
        h.session.change_media();
    }
    assert_eq!(h.session.state().current_index, origin);
}

#[test]
fn shuffled_order_wraps_and_is_never_reshuffled() {
    let items = (0..12)
        .map(|i| MediaItem::new(format!("/media/img{i:02}.jpg")).unwrap())
        .collect();
    let catalog = Catalog::from_items("/media", false, items)
        .unwrap()
        .ordered(PlaybackOrder::Shuffled { seed: Some(23) });
    let startup: Vec<String> = catalog
        .items()
        .iter()
        .map(|i| catalog.display_name(i))
        .collect();
    let mut h = Harness::with_catalog(catalog, ScriptedEngine::new());

    h.session.start();
    for _ in 0..3 {
        h.session.change_media();
    }
    let origin = h.session.state().current_index;
    for _ in 0..startup.len() {
        h.session.change_media();
    }
    assert_eq!(h.session.state().current_index, origin);

    // The second pass replays the startup order exactly.
    let played = h.journal.played_names();
    assert_eq!(played.len(), 16);
    for (i, name) in played.iter().enumerate() {
        assert_eq!(name, &startup[i % startup.len()], "play #{i}");
    }
}

#[test]
fn surface_is_blanked_before_videos_only() {
    let mut h = Harness::new(&["a.jpg", "b.mp4", "c.png"], ScriptedEngine::new());

    let effects = h.session.start();
    assert!(!effects.contains(&Effect::ClearSurface));
    let t1 = single_timer(&effects);

    let effects = h.session.on_timer(t1);
    assert!(effects.contains(&Effect::ClearSurface));

    let effects = h.eos();
    assert!(!effects.contains(&Effect::ClearSurface));
}

#[test]
fn rearming_cancels_the_previous_timer() {
    let mut h = Harness::new(&["a.jpg", "b.jpg"], ScriptedEngine::new());
    let first = single_timer(&h.session.start());

    let effects = h.session.change_media();
    assert!(effects.contains(&Effect::CancelTimer(first)));
    let second = single_timer(&effects);
    assert_ne!(first, second);
    assert_eq!(h.session.state().pending_timer, Some(second));

    // The old token no longer advances anything.
    assert!(h.session.on_timer(first).is_empty());
    assert_eq!(h.session.state().current_index, 1);
}

#[test]
fn one_completion_advances_exactly_once() {
    let mut h = Harness::new(&["a.mp4", "b.mp4", "c.mp4"], ScriptedEngine::new());
    h.session.start();
    let first = h.live_handle();

    h.eos();
    assert_eq!(h.session.state().current_index, 1);

    // A duplicate end-of-stream from the torn-down pipeline is stale.
    let stale = h.session.on_pipeline_event(TaggedEvent {
        handle: first,
        event: PipelineEvent::EndOfStream,
    });
    assert!(stale.is_empty());
    assert_eq!(h.session.state().current_index, 1);
    assert_eq!(h.journal.played_names(), vec!["a.mp4", "b.mp4"]);
}

#[test]
fn completion_is_ignored_while_showing_an_image() {
    let mut h = Harness::new(&["a.jpg", "b.jpg"], ScriptedEngine::new());
    h.session.start();
    let effects = h
        .session
        .on_session_event(SessionEvent::PlaybackComplete);
    assert!(effects.is_empty());
    assert_eq!(h.session.state().current_index, 0);
}

#[test]
fn playback_error_skips_forward_and_cancels_the_timer() {
    let engine = ScriptedEngine::new().error_on_start("/media/a.jpg");
    let mut h = Harness::new(&["a.jpg", "b.mp4"], engine);

    let t1 = single_timer(&h.session.start());
    let effects = h.drain();

    assert!(effects.contains(&Effect::CancelTimer(t1)));
    assert_eq!(h.session.phase(), Phase::Showing(MediaKind::Video));
    assert_eq!(h.session.state().pending_timer, None);
    assert_eq!(h.journal.played_names(), vec!["a.jpg", "b.mp4"]);
}

#[test]
fn surface_request_is_served_on_dispatch() {
    let mut h = Harness::new(&["a.png"], ScriptedEngine::new());
    h.session
        .set_surface(media_slideshow::events::SurfaceHandle(99));
    h.session.start();
    assert!(h.drain().is_empty());
    assert!(h.journal.calls().contains(&EngineCall::Attach {
        path: PathBuf::from("/media/a.png"),
        surface: media_slideshow::events::SurfaceHandle(99),
    }));
}

#[test]
fn close_tears_down_and_is_terminal() {
    let mut h = Harness::new(&["a.jpg", "b.jpg"], ScriptedEngine::new());
    let t1 = single_timer(&h.session.start());

    let effects = h.session.close();
    assert_eq!(
        effects,
        vec![
            Effect::CancelTimer(t1),
            Effect::Exit(ExitReason::UserClosed)
        ]
    );
    assert_eq!(h.session.phase(), Phase::Terminated(ExitReason::UserClosed));
    assert_eq!(h.session.playback().active(), None);
    assert_eq!(h.journal.live(), 0);

    assert!(h.session.close().is_empty());
    assert!(h.session.on_timer(t1).is_empty());
}

#[test]
fn single_item_catalog_reloads_itself() {
    let mut h = Harness::new(&["only.jpg"], ScriptedEngine::new());
    let t1 = single_timer(&h.session.start());
    let t2 = single_timer(&h.session.on_timer(t1));
    assert_ne!(t1, t2);
    assert_eq!(h.journal.played_names(), vec!["only.jpg", "only.jpg"]);
    assert_eq!(h.journal.peak_live(), 1);
}
