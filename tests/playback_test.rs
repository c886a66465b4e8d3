mod support;

use native_audio::{AudioError, Event, LoadOptions, PlayOptions, StopOptions};
use support::Harness;

#[test]
fn test_play_then_fade_out_scenario() {
    let h = Harness::new();
    h.manager.load("a", "a.mp3", LoadOptions::new()).unwrap();
    h.manager
        .play("a", PlayOptions::new().with_volume(1.0))
        .unwrap();

    h.advance_ms(100);
    let events = h.drain_events();
    assert_eq!(Harness::positions(&events, "a"), vec![0.1]);

    h.manager
        .stop("a", StopOptions::new().with_fade_out(0.4))
        .unwrap();
    h.advance_ms(400);

    assert!(!h.manager.is_playing("a").unwrap());
    assert_eq!(h.backend.player(0).stops, 1);
    assert_eq!(Harness::completed_count(&h.drain_events(), "a"), 1);

    h.advance_ms(1000);
    assert!(h.drain_events().is_empty());
}

#[test]
fn test_natural_end_completes_once() {
    let h = Harness::new();
    h.backend.set_duration("short.mp3", 0.35);
    h.manager.load("a", "short.mp3", LoadOptions::new()).unwrap();
    h.manager.play("a", PlayOptions::new()).unwrap();

    h.advance_ms(1000);
    let events = h.drain_events();
    assert_eq!(Harness::positions(&events, "a"), vec![0.1, 0.2, 0.3]);
    assert_eq!(Harness::completed_count(&events, "a"), 1);
    assert_eq!(h.clock.pending(), 0);

    // Already completed: an explicit stop does not fire again
    h.manager.stop("a", StopOptions::new()).unwrap();
    assert_eq!(Harness::completed_count(&h.drain_events(), "a"), 0);
}

#[test]
fn test_completion_resets_on_every_play() {
    let h = Harness::new();
    h.backend.set_duration("short.mp3", 0.2);
    h.manager.load("a", "short.mp3", LoadOptions::new()).unwrap();

    for _ in 0..3 {
        h.manager.play("a", PlayOptions::new()).unwrap();
        h.advance_ms(500);
    }
    assert_eq!(Harness::completed_count(&h.drain_events(), "a"), 3);
}

#[test]
fn test_stop_without_play_emits_nothing() {
    let h = Harness::new();
    h.manager.load("a", "a.mp3", LoadOptions::new()).unwrap();
    h.drain_events();

    h.manager.stop("a", StopOptions::new()).unwrap();
    assert_eq!(Harness::completed_count(&h.drain_events(), "a"), 0);
}

#[test]
fn test_round_robin_touches_each_channel_once() {
    let h = Harness::new();
    h.manager
        .load("a", "a.mp3", LoadOptions::new().with_channels(3))
        .unwrap();
    assert_eq!(h.backend.opened(), 3);

    for _ in 0..3 {
        h.manager.play("a", PlayOptions::new()).unwrap();
    }
    for index in 0..3 {
        assert_eq!(h.backend.player(index).plays.len(), 1);
    }

    h.manager.play("a", PlayOptions::new()).unwrap();
    assert_eq!(h.backend.player(0).plays.len(), 2);
    assert_eq!(h.backend.player(1).plays.len(), 1);
}

#[test]
fn test_multi_channel_reports_neutral_values() {
    let h = Harness::new();
    h.manager
        .load("a", "a.mp3", LoadOptions::new().with_channels(2))
        .unwrap();
    h.manager.play("a", PlayOptions::new().at(2.0)).unwrap();
    h.advance_ms(300);

    assert_eq!(h.manager.get_position("a").unwrap(), 0.0);
    assert_eq!(h.manager.get_duration("a").unwrap(), Some(0.0));
    h.manager.seek("a", 5.0).unwrap();
    assert!(h.backend.player(0).seeks.is_empty());

    let events = h.drain_events();
    let positions = Harness::positions(&events, "a");
    assert_eq!(positions.len(), 3);
    assert!(positions.iter().all(|p| *p == 0.0));
    assert!(!events
        .iter()
        .any(|e| matches!(e, Event::DurationAvailable { .. })));
}

#[test]
fn test_single_channel_position_and_duration() {
    let h = Harness::new();
    h.backend.set_duration("a.mp3", 42.0);
    h.manager.load("a", "a.mp3", LoadOptions::new()).unwrap();
    assert_eq!(h.manager.get_duration("a").unwrap(), Some(42.0));
    assert_eq!(h.manager.await_duration("a").unwrap().try_recv(), Ok(42.0));

    let events = h.drain_events();
    assert!(events.contains(&Event::DurationAvailable {
        asset_id: "a".to_string(),
        seconds: 42.0,
    }));

    h.manager.play("a", PlayOptions::new().at(3.0)).unwrap();
    h.advance_ms(500);
    assert!((h.manager.get_position("a").unwrap() - 3.5).abs() < 1e-9);

    h.manager.seek("a", 10.0).unwrap();
    assert_eq!(h.backend.player(0).seeks, vec![10.0]);
    assert!((h.manager.get_position("a").unwrap() - 10.0).abs() < 1e-9);
}

#[test]
fn test_pause_is_not_completion() {
    let h = Harness::new();
    h.manager.load("a", "a.mp3", LoadOptions::new()).unwrap();
    h.manager.play("a", PlayOptions::new()).unwrap();
    h.advance_ms(200);

    h.manager.pause("a").unwrap();
    h.advance_ms(1000);
    let events = h.drain_events();
    assert_eq!(Harness::positions(&events, "a"), vec![0.1, 0.2]);
    assert_eq!(Harness::completed_count(&events, "a"), 0);

    h.manager.resume("a").unwrap();
    h.advance_ms(100);
    assert_eq!(Harness::positions(&h.drain_events(), "a"), vec![0.3]);
}

#[test]
fn test_resume_touches_channel_zero_only() {
    let h = Harness::new();
    h.manager
        .load("a", "a.mp3", LoadOptions::new().with_channels(2))
        .unwrap();
    h.manager.play("a", PlayOptions::new()).unwrap();
    h.manager.play("a", PlayOptions::new()).unwrap();

    h.manager.pause("a").unwrap();
    assert!(h.backend.player(0).paused);
    assert!(h.backend.player(1).paused);

    h.manager.resume("a").unwrap();
    assert_eq!(h.backend.player(0).resumes, 1);
    assert_eq!(h.backend.player(1).resumes, 0);
}

#[test]
fn test_loop_never_completes() {
    let h = Harness::new();
    h.backend.set_duration("loop.mp3", 0.3);
    h.manager.load("a", "loop.mp3", LoadOptions::new()).unwrap();
    h.manager.loop_playback("a").unwrap();

    h.advance_ms(1000);
    let events = h.drain_events();
    assert_eq!(Harness::positions(&events, "a").len(), 10);
    assert_eq!(Harness::completed_count(&events, "a"), 0);
    assert_eq!(h.backend.player(0).loops, 1);

    h.manager.stop("a", StopOptions::new()).unwrap();
    assert_eq!(Harness::completed_count(&h.drain_events(), "a"), 1);
}

#[test]
fn test_set_rate() {
    let h = Harness::new();
    h.manager.load("a", "a.mp3", LoadOptions::new()).unwrap();
    h.manager.play("a", PlayOptions::new()).unwrap();
    h.manager.set_rate("a", 2.0).unwrap();

    h.advance_ms(500);
    assert!((h.manager.get_position("a").unwrap() - 1.0).abs() < 1e-9);

    for rate in [0.0, -1.0, f32::NAN] {
        assert!(matches!(
            h.manager.set_rate("a", rate),
            Err(AudioError::InvalidArgument(_))
        ));
    }
}

#[test]
fn test_stream_operations_wait_for_ready() {
    let h = Harness::new();
    h.manager
        .load("live", "https://radio.example/live.m3u8", LoadOptions::new().url())
        .unwrap();
    h.manager
        .play("live", PlayOptions::new().with_volume(0.5))
        .unwrap();

    assert!(h.backend.player(0).plays.is_empty());
    assert!(!h.manager.is_playing("live").unwrap());
    assert_eq!(h.manager.get_duration("live").unwrap(), None);
    let duration = h.manager.await_duration("live").unwrap();
    assert!(duration.try_recv().is_err());

    // Warm-up keeps polling without emitting until ready
    h.advance_ms(500);
    assert!(Harness::positions(&h.drain_events(), "live").is_empty());

    h.backend.signal_ready(0);
    h.settle();
    let player = h.backend.player(0);
    assert_eq!(player.plays, vec![0.0]);
    assert_eq!(player.volume, 0.5);
    assert_eq!(duration.try_recv(), Ok(support::DEFAULT_DURATION));

    h.advance_ms(100);
    let events = h.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::DurationAvailable { asset_id, .. } if asset_id == "live")));
    assert_eq!(Harness::positions(&events, "live").len(), 1);
}

#[test]
fn test_stream_fade_in_waits_for_ready() {
    let h = Harness::new();
    h.manager
        .load("live", "https://radio.example/live.m3u8", LoadOptions::new().url())
        .unwrap();
    h.manager
        .play("live", PlayOptions::new().with_volume(0.6).with_fade_in(0.24))
        .unwrap();

    h.advance_ms(500);
    // Only the volume applied at open
    assert_eq!(h.backend.player(0).volumes.len(), 1);

    h.backend.signal_ready(0);
    h.settle();
    h.advance_ms(240);
    let player = h.backend.player(0);
    // queued 0.0 replayed, then three ramp steps
    assert_eq!(player.volumes.len(), 5);
    assert_eq!(player.volume, 0.6);
}

#[test]
fn test_stream_stop_reopens_source() {
    let h = Harness::new();
    h.manager
        .load("live", "https://radio.example/live.m3u8", LoadOptions::new().url())
        .unwrap();
    h.backend.signal_ready(0);
    h.settle();
    h.manager.play("live", PlayOptions::new()).unwrap();

    h.manager.stop("live", StopOptions::new()).unwrap();
    assert_eq!(h.backend.opened(), 2);
    assert!(h.backend.player(0).released);
    assert!(!h.backend.player(1).ready);

    // Late signals from the replaced player are ignored
    h.backend.signal_error(0, "late");
    h.settle();
    assert_eq!(h.backend.opened(), 2);
}

#[test]
fn test_backend_error_recovers_at_last_position() {
    let h = Harness::new();
    h.manager.load("a", "a.mp3", LoadOptions::new()).unwrap();
    h.manager.play("a", PlayOptions::new()).unwrap();
    h.advance_ms(300);

    h.backend.signal_error(0, "decoder hiccup");
    h.settle();

    assert_eq!(h.backend.opened(), 2);
    let replacement = h.backend.player(1);
    assert_eq!(replacement.plays.len(), 1);
    assert!((replacement.plays[0] - 0.3).abs() < 1e-9);
    assert!(h.manager.is_playing("a").unwrap());
    assert!(!h
        .drain_events()
        .iter()
        .any(|e| matches!(e, Event::BackendError { .. })));
}

#[test]
fn test_second_backend_error_surfaces_event() {
    let h = Harness::new();
    h.manager.load("a", "a.mp3", LoadOptions::new()).unwrap();
    h.manager.play("a", PlayOptions::new()).unwrap();
    h.advance_ms(100);

    h.backend.signal_error(0, "first");
    h.settle();
    h.backend.signal_error(1, "second");
    h.settle();

    let events = h.drain_events();
    assert!(events.contains(&Event::BackendError {
        asset_id: "a".to_string(),
        message: "second".to_string(),
    }));
    assert!(!h.manager.is_playing("a").unwrap());

    h.advance_ms(1000);
    assert_eq!(Harness::completed_count(&h.drain_events(), "a"), 0);
    assert!(matches!(
        h.manager.play("a", PlayOptions::new()),
        Err(AudioError::ChannelUnavailable(_))
    ));
}

#[test]
fn test_stream_recovery_waits_for_ready() {
    let h = Harness::new();
    h.manager
        .load("live", "https://radio.example/live.m3u8", LoadOptions::new().url())
        .unwrap();
    h.backend.signal_ready(0);
    h.settle();
    h.manager.play("live", PlayOptions::new()).unwrap();
    h.advance_ms(200);

    h.backend.signal_error(0, "network");
    h.settle();
    assert!(h.backend.player(1).plays.is_empty());

    h.backend.signal_ready(1);
    h.settle();
    let plays = h.backend.player(1).plays;
    assert_eq!(plays.len(), 1);
    assert!((plays[0] - 0.2).abs() < 1e-9);

    // Readiness re-arms recovery
    h.backend.signal_error(1, "network again");
    h.settle();
    assert_eq!(h.backend.opened(), 3);
}

#[test]
fn test_open_failure_is_reported() {
    let h = Harness::new();
    h.backend.fail_open("broken.mp3", true);

    assert!(matches!(
        h.manager.load("a", "broken.mp3", LoadOptions::new()),
        Err(AudioError::InvalidSource { .. })
    ));
    assert!(!h.manager.is_loaded("a"));

    h.backend.fail_open("broken.mp3", false);
    h.manager.load("a", "broken.mp3", LoadOptions::new()).unwrap();
}

#[test]
fn test_unload_during_playback() {
    let h = Harness::new();
    h.manager.load("a", "a.mp3", LoadOptions::new()).unwrap();
    h.manager.play("a", PlayOptions::new()).unwrap();
    h.advance_ms(150);
    h.drain_events();

    h.manager.unload("a").unwrap();
    h.advance_ms(1000);

    let events = h.drain_events();
    assert_eq!(Harness::completed_count(&events, "a"), 1);
    assert!(Harness::positions(&events, "a").is_empty());
    assert!(h.backend.player(0).released);
    assert!(matches!(
        h.manager.play("a", PlayOptions::new()),
        Err(AudioError::AssetNotFound(_))
    ));
    assert!(matches!(
        h.manager.unload("a"),
        Err(AudioError::AssetNotFound(_))
    ));
}

#[test]
fn test_signal_after_unload_is_ignored() {
    let h = Harness::new();
    h.manager
        .load("live", "https://radio.example/live.m3u8", LoadOptions::new().url())
        .unwrap();
    h.manager.play("live", PlayOptions::new()).unwrap();
    h.manager.unload("live").unwrap();
    assert_eq!(Harness::completed_count(&h.drain_events(), "live"), 1);

    h.backend.signal_ready(0);
    h.backend.signal_error(0, "gone");
    h.settle();
    h.advance_ms(500);

    assert_eq!(h.backend.opened(), 1);
    assert!(h.backend.player(0).released);
    assert!(h.backend.player(0).plays.is_empty());
    assert!(h.drain_events().is_empty());
}
