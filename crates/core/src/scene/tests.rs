use std::{sync::Arc, thread, time::Duration};

use super::*;
use crate::{
    engine::manual::{ManualEngine, Request},
    media::Geometry,
    terminal::TrackKind,
    EngineConfig, SimulatedEngine,
};

fn lock_step(interval: Duration) -> (Scene, Arc<ManualEngine>) {
    let engine = ManualEngine::new();
    let config = SceneConfig::new(800, 600)
        .with_lock_step(true)
        .with_tick_interval(interval);
    let scene = Scene::new(config, engine.clone()).unwrap();
    (scene, engine)
}

fn drain(scene: &Scene) -> Vec<Event> {
    let mut events = Vec::new();
    while let Some(event) = scene.receive(false) {
        events.push(event);
    }
    events
}

/// Blocks on the queue until `matches` accepts an event. Ticks keep the
/// loop bounded when the expected event never shows up.
fn wait_for(scene: &Scene, matches: impl Fn(&Event) -> bool) -> (Event, Vec<Event>) {
    let mut skipped = Vec::new();
    for _ in 0..2_000 {
        let event = scene.receive(true).expect("blocking receive yields an event");
        if matches(&event) {
            return (event, skipped);
        }
        skipped.push(event);
    }
    panic!("expected event never arrived; saw {skipped:?}");
}

fn started_media(scene: &Scene, engine: &ManualEngine, uri: &str, geometry: Geometry) -> Media {
    let media = Media::new(scene, Some(uri)).unwrap();
    media.set_geometry(geometry);
    assert!(media.start());
    engine.link_all(media.id());
    drain(scene);
    assert_eq!(media.state(), MediaState::Started);
    media
}

#[test]
fn events_come_out_in_dispatch_order() {
    let (scene, _engine) = lock_step(Duration::from_secs(1));

    for name in ["a", "b", "c"] {
        assert!(scene.dispatch(Event::key(name, true)));
    }
    assert_eq!(scene.pending(), 3);

    let names: Vec<_> = drain(&scene)
        .into_iter()
        .map(|event| match event.kind() {
            EventKind::Key { name, .. } => name.clone(),
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(names, ["a", "b", "c"]);
}

#[test]
fn mask_filters_input_events() {
    let (scene, _engine) = lock_step(Duration::from_millis(100));
    scene.set_mask(EventMask::TICK | EventMask::ERROR);

    scene.dispatch(Event::key("space", true));
    scene.dispatch(Event::pointer_move(4, 4));
    scene.dispatch(Event::pointer_click(4, 4, 1, true));
    assert!(scene.advance(Duration::from_millis(100)));

    let events = drain(&scene);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind(), &EventKind::Tick { serial: 1 });
    assert!(scene.receive(false).is_none());
}

#[test]
fn masked_lifecycle_events_still_complete() {
    let (scene, engine) = lock_step(Duration::from_secs(1));
    scene.set_mask(EventMask::TICK);

    let media = Media::new(&scene, Some("clip.mp4")).unwrap();
    assert!(media.start());
    engine.link_all(media.id());

    assert!(drain(&scene).is_empty());
    assert_eq!(media.state(), MediaState::Started);
}

#[test]
fn nothing_is_queued_after_quit() {
    let (scene, engine) = lock_step(Duration::from_secs(1));
    scene.dispatch(Event::key("q", true));

    scene.quit();
    assert_eq!(scene.state(), SceneState::Stopped);
    assert_eq!(scene.pending(), 0);

    assert!(!scene.dispatch(Event::key("q", true)));
    assert_eq!(scene.pending(), 0);
    assert_eq!(scene.receive(true).map(|e| e.kind().clone()), Some(EventKind::Quit));
    assert_eq!(scene.receive(false).map(|e| e.kind().clone()), Some(EventKind::Quit));
    assert_eq!(engine.requests().last(), Some(&Request::SetPlaying(false)));
}

#[test]
fn quit_is_never_masked() {
    let (scene, _engine) = lock_step(Duration::from_secs(1));
    scene.set_mask(EventMask::NONE);
    scene.quit();

    assert!(matches!(
        scene.receive(false).map(|e| e.kind().clone()),
        Some(EventKind::Quit)
    ));
}

#[test]
fn quit_disposes_children() {
    let (scene, engine) = lock_step(Duration::from_secs(1));
    let media = started_media(&scene, &engine, "clip.mp4", Geometry::default());

    scene.quit();
    assert_eq!(media.state(), MediaState::Disposed);
    assert!(scene.children().is_empty());
    assert!(engine.requests().contains(&Request::Release(media.id())));
    assert!(!media.start());
    assert!(matches!(
        Media::new(&scene, Some("clip.mp4")),
        Err(SceneError::SceneNotLive)
    ));
}

#[test]
fn disposed_items_leave_the_scene() {
    let (scene, _engine) = lock_step(Duration::from_secs(1));

    for _ in 0..100 {
        Media::new(&scene, Some("clip.mp4")).unwrap().dispose();
    }
    assert!(scene.children().is_empty());
}

#[test]
fn disposing_a_running_item_drops_its_queued_events() {
    let (scene, engine) = lock_step(Duration::from_secs(1));
    let media = Media::new(&scene, Some("clip.mp4")).unwrap();
    assert!(media.start());
    engine.link_all(media.id());
    assert_eq!(scene.pending(), 1);

    media.dispose();
    assert_eq!(media.state(), MediaState::Disposed);
    assert!(engine.requests().contains(&Request::Release(media.id())));
    assert!(drain(&scene).is_empty());
    assert!(scene.children().is_empty());
    assert!(scene.topmost_at(10, 10).is_none());
    assert!(!media.start());
}

#[test]
fn remove_only_takes_own_children() {
    let (scene, _engine) = lock_step(Duration::from_secs(1));
    let (other_scene, _other_engine) = lock_step(Duration::from_secs(1));
    let media = Media::new(&scene, Some("clip.mp4")).unwrap();
    let stranger = Media::new(&other_scene, Some("clip.mp4")).unwrap();

    assert!(!scene.remove(&stranger));
    assert_eq!(stranger.state(), MediaState::Stopped);

    assert!(scene.remove(&media));
    assert!(!scene.remove(&media));
    assert_eq!(media.state(), MediaState::Disposed);
    assert_eq!(other_scene.children(), vec![stranger]);
}

#[test]
fn quit_wakes_a_blocked_receiver() {
    let engine = ManualEngine::new();
    let config = SceneConfig::new(320, 240).with_tick_interval(Duration::from_secs(60));
    let scene = Scene::new(config, engine).unwrap();

    let receiver = {
        let scene = scene.clone();
        thread::spawn(move || scene.receive(true))
    };
    thread::sleep(Duration::from_millis(20));
    scene.quit();

    let event = receiver.join().unwrap();
    assert_eq!(event.map(|e| e.kind().clone()), Some(EventKind::Quit));
}

#[test]
fn scene_clicks_go_to_the_topmost_item() {
    let (scene, engine) = lock_step(Duration::from_secs(1));
    let back = started_media(
        &scene,
        &engine,
        "back.mp4",
        Geometry {
            z: 0,
            ..Geometry::default()
        },
    );
    let front = started_media(
        &scene,
        &engine,
        "front.png",
        Geometry {
            x: 100,
            y: 100,
            z: 5,
            width: 50,
            height: 50,
        },
    );

    scene.dispatch(Event::pointer_click(120, 120, 1, true));
    scene.dispatch(Event::pointer_click(10, 10, 1, true));
    let events = drain(&scene);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].source(), &front);
    assert_eq!(events[1].source(), &back);

    back.set_z(9);
    scene.dispatch(Event::pointer_click(120, 120, 1, false));
    let events = drain(&scene);
    assert_eq!(events[0].source(), &back);
    assert_eq!(
        events[0].kind(),
        &EventKind::PointerClick {
            x: 120,
            y: 120,
            button: 1,
            pressed: false,
        }
    );
}

#[test]
fn clicks_on_empty_space_stay_with_the_scene() {
    let (scene, engine) = lock_step(Duration::from_secs(1));
    let media = Media::new(&scene, Some("clip.mp4")).unwrap();
    media.set_size(10, 10);

    // stopped items are not hit
    scene.dispatch(Event::pointer_click(5, 5, 1, true));
    assert!(drain(&scene).iter().all(|event| event.source().is_scene()));

    let started = started_media(
        &scene,
        &engine,
        "other.mp4",
        Geometry {
            width: 10,
            height: 10,
            ..Geometry::default()
        },
    );
    scene.dispatch(Event::pointer_click(50, 50, 1, true));
    assert!(drain(&scene).iter().all(|event| event.source().is_scene()));
    assert!(scene.topmost_at(5, 5).is_some_and(|hit| hit == started));
}

#[test]
fn advance_queues_crossed_ticks() {
    let (scene, engine) = lock_step(Duration::from_millis(100));

    assert!(scene.advance(Duration::from_millis(250)));
    assert_eq!(scene.running_time(), Duration::from_millis(250));
    let serials: Vec<_> = drain(&scene)
        .iter()
        .map(|event| match event.kind() {
            EventKind::Tick { serial } => *serial,
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(serials, [1, 2]);

    assert!(scene.advance(Duration::from_millis(50)));
    assert_eq!(
        drain(&scene).first().map(|event| event.kind().clone()),
        Some(EventKind::Tick { serial: 3 })
    );
    assert!(engine
        .requests()
        .contains(&Request::Step(Duration::from_millis(250))));
}

#[test]
fn advance_needs_a_running_lock_step_scene() {
    let (scene, _engine) = lock_step(Duration::from_millis(100));
    assert!(scene.pause());
    assert!(!scene.advance(Duration::from_millis(100)));
    assert_eq!(scene.running_time(), Duration::ZERO);

    let realtime = Scene::with_size(320, 240, ManualEngine::new()).unwrap();
    assert!(!realtime.advance(Duration::from_millis(100)));
}

#[test]
fn pause_and_resume_toggle_the_engine() {
    let (scene, engine) = lock_step(Duration::from_millis(100));
    engine.clear_requests();

    assert!(!scene.resume());
    assert!(scene.pause());
    assert!(!scene.pause());
    assert_eq!(scene.state(), SceneState::Paused);
    assert!(scene.resume());
    assert_eq!(scene.state(), SceneState::Started);

    assert_eq!(
        engine.requests(),
        vec![Request::SetPlaying(false), Request::SetPlaying(true)]
    );
}

#[test]
fn realtime_ticks_are_numbered() {
    let config = SceneConfig::new(320, 240).with_tick_interval(Duration::from_millis(10));
    let scene = Scene::new(config, ManualEngine::new()).unwrap();

    let serials: Vec<_> = (0..3)
        .map(|_| match scene.receive(true).map(|e| e.kind().clone()) {
            Some(EventKind::Tick { serial }) => serial,
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(serials, [1, 2, 3]);
}

#[test]
fn step_acknowledgement_covers_every_sink() {
    let engine = ManualEngine::with_sinks(vec![crate::SinkKind::Video]);
    let config = SceneConfig::new(320, 240).with_lock_step(true);
    let scene = Scene::new(config, engine.clone()).unwrap();

    assert!(scene.advance(Duration::from_millis(40)));
    assert_eq!(scene.running_time(), Duration::from_millis(40));
}

fn simulated() -> (Scene, Arc<SimulatedEngine>) {
    let engine = Arc::new(SimulatedEngine::new(EngineConfig {
        link_latency_ms: 2,
        signal_latency_ms: 1,
        video_sink: true,
    }));
    let config = SceneConfig::new(800, 600).with_tick_interval(Duration::from_millis(20));
    let scene = Scene::new(config, engine.clone()).unwrap();
    (scene, engine)
}

fn raised_by(media: &Media, kind: EventKind) -> impl Fn(&Event) -> bool + '_ {
    move |event| event.source() == media && event.kind() == &kind
}

#[test]
fn plays_ticks_and_stops_on_threaded_engine() {
    let (scene, _engine) = simulated();
    let media = Media::new(&scene, Some("clip.mp4")).unwrap();

    assert!(media.start());
    wait_for(&scene, raised_by(&media, EventKind::Start { resume: false }));
    assert_eq!(media.state(), MediaState::Started);
    assert_eq!(media.terminal_count(), 2);

    let mut ticks = 0;
    while ticks < 3 {
        if let Some(EventKind::Tick { .. }) = scene.receive(true).map(|e| e.kind().clone()) {
            ticks += 1;
        }
    }

    assert!(media.stop());
    wait_for(&scene, raised_by(&media, EventKind::Stop { eos: false }));
    assert_eq!(media.state(), MediaState::Stopped);
    assert_eq!(media.terminal_count(), 0);

    scene.quit();
}

#[test]
fn seeks_pauses_and_resumes_on_threaded_engine() {
    let (scene, _engine) = simulated();
    let media = Media::new(&scene, Some("clip.mp4")).unwrap();

    assert!(!media.seek(true, -1_000_000_000));
    assert!(media.start());
    wait_for(&scene, raised_by(&media, EventKind::Start { resume: false }));

    assert!(media.seek(true, -1_000_000_000));
    wait_for(
        &scene,
        raised_by(
            &media,
            EventKind::Seek {
                relative: true,
                offset: -1_000_000_000,
            },
        ),
    );
    assert_eq!(media.state(), MediaState::Started);

    assert!(media.pause());
    wait_for(&scene, raised_by(&media, EventKind::Pause));
    assert_eq!(media.state(), MediaState::Paused);
    assert!(media.terminal_flags(TrackKind::Audio).is_some_and(|f| f.blocked));

    assert!(media.resume());
    wait_for(&scene, raised_by(&media, EventKind::Start { resume: true }));
    assert_eq!(media.state(), MediaState::Started);

    scene.quit();
}

#[test]
fn drained_items_stop_with_eos_on_threaded_engine() {
    let (scene, engine) = simulated();
    let media = Media::new(&scene, Some("song.mp3")).unwrap();

    assert!(media.start());
    wait_for(&scene, raised_by(&media, EventKind::Start { resume: false }));

    engine.drain(media.id()).unwrap();
    wait_for(&scene, raised_by(&media, EventKind::Stop { eos: true }));
    assert!(media.flags().drained);
    assert_eq!(media.state(), MediaState::Stopped);

    scene.quit();
}

#[test]
fn engine_failure_reports_error_then_stop() {
    let (scene, engine) = simulated();
    let media = Media::new(&scene, Some("clip.webm")).unwrap();

    assert!(media.start());
    wait_for(&scene, raised_by(&media, EventKind::Start { resume: false }));

    engine
        .fail(media.id(), crate::ErrorKind::Decode, "bad frame")
        .unwrap();
    let (error, _) = wait_for(&scene, |event| {
        matches!(event.kind(), EventKind::Error { .. })
    });
    assert_eq!(error.source(), &media);
    wait_for(&scene, raised_by(&media, EventKind::Stop { eos: false }));
    assert_eq!(media.state(), MediaState::Stopped);

    scene.quit();
}
