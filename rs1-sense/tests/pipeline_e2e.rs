//! End-to-end: radar bytes through parser, filter, tracker, zones and
//! smoothing, out the occupancy callback.

use std::sync::Arc;

use parking_lot::Mutex;

use rs1_config_data::{ConfigStore, MemFlash};
use rs1_radar_comms::{Ld2450Parser, TargetFilter};
use rs1_sense::{
    register_commit_telemetry_task, register_watchdog_task, CoreCallbacks, CoreStats, Scheduler,
    SenseCore, Watchdog, WATCHDOG_CHECK_INTERVAL_MS,
};
use rs1_types::{
    default_tracking_params, SmoothedOccupancy, SmoothingParams, TargetFilterParams, Zone,
    ZoneKind, ZoneStore,
};

const FRAME_LEN: usize = 40;

/// Wire-format LD2450 frame with up to three targets.
fn encode_frame(targets: &[(i16, i16, i16, u16)]) -> Vec<u8> {
    let mut frame = vec![0u8; FRAME_LEN];
    frame[..4].copy_from_slice(&[0xAA, 0xFF, 0x03, 0x00]);
    for (slot, &(x, y, v, res)) in targets.iter().enumerate() {
        let base = 4 + slot * 8;
        frame[base..base + 2].copy_from_slice(&x.to_le_bytes());
        frame[base + 2..base + 4].copy_from_slice(&y.to_le_bytes());
        frame[base + 4..base + 6].copy_from_slice(&v.to_le_bytes());
        frame[base + 6..base + 8].copy_from_slice(&res.to_le_bytes());
    }
    let sum: u16 = frame[4..36]
        .iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(b as u16));
    frame[36..38].copy_from_slice(&sum.to_le_bytes());
    frame[38..].copy_from_slice(&[0x55, 0xCC]);
    frame
}

fn desk_zone() -> ZoneStore {
    ZoneStore {
        version: 1,
        updated_at: 0,
        zones: vec![Zone {
            id: "desk".to_string(),
            name: "Desk".to_string(),
            kind: ZoneKind::Include,
            vertices: vec![(0, 0), (2500, 0), (2500, 3000), (0, 3000)],
            sensitivity: 50,
        }],
    }
}

#[test]
fn bytes_to_occupancy() {
    let events: Arc<Mutex<Vec<(String, SmoothedOccupancy)>>> = Arc::new(Mutex::new(Vec::new()));
    let events2 = events.clone();
    let mut callbacks = CoreCallbacks::new();
    callbacks.on_zone_occupancy = Some(Box::new(move |changes| {
        let mut sink = events2.lock();
        for (id, occ) in changes {
            sink.push((id.to_string(), *occ));
        }
    }));

    let core = SenseCore::new(
        default_tracking_params(),
        SmoothingParams::default(),
        callbacks,
    );
    core.active_zones().install(desk_zone());

    let filter = TargetFilter::new(TargetFilterParams::default());
    let mut parser = Ld2450Parser::new();
    let wire = encode_frame(&[(1000, 2000, 10, 100)]);

    let mut now = 0u32;
    for _ in 0..5 {
        let mut decoded = Vec::new();
        parser.push_bytes(&wire, |f| decoded.push(f));
        assert_eq!(decoded.len(), 1);
        let mut frame = decoded.pop().unwrap();
        assert_eq!(frame.target_count, 1);
        assert_eq!(frame.targets[0].signal_quality, 100);

        frame.timestamp_ms = now;
        filter.apply(&mut frame);
        core.handle_detection_frame(&frame);
        now += 100;
    }

    let published = events.lock().clone();
    assert!(!published.is_empty(), "occupancy must publish");
    assert_eq!(published[0].0, "desk");
    assert!(published[0].1.stable);
    assert_eq!(published[0].1.target_count, 1);
    assert_eq!(parser.stats().frames_invalid, 0);
}

#[test]
fn out_of_range_target_never_reaches_tracker() {
    let core = SenseCore::new(
        default_tracking_params(),
        SmoothingParams::default(),
        CoreCallbacks::new(),
    );
    core.active_zones().install(desk_zone());

    let filter = TargetFilter::new(TargetFilterParams::default());
    let mut parser = Ld2450Parser::new();
    // y = 7000 mm is past max_range_mm = 6000.
    let wire = encode_frame(&[(0, 7000, 0, 100)]);

    let mut decoded = Vec::new();
    parser.push_bytes(&wire, |f| decoded.push(f));
    let mut frame = decoded.pop().unwrap();
    assert_eq!(frame.target_count, 1, "parser accepts it");

    filter.apply(&mut frame);
    assert_eq!(frame.target_count, 0, "filter rejects it");
    // Parser stats are unaffected by filtering.
    assert_eq!(parser.stats().frames_parsed, 1);
    assert_eq!(parser.stats().frames_invalid, 0);

    core.handle_detection_frame(&frame);
    assert_eq!(core.stats().tracks_confirmed(), 0);
}

#[test]
fn watchdog_task_feeds_hardware_and_stats() {
    struct NullTimer;
    impl rs1_sense::HardwareTimer for NullTimer {
        fn reset(&mut self) {}
    }

    let stats = Arc::new(CoreStats::new());
    let watchdog = Arc::new(Mutex::new(Watchdog::new(Box::new(NullTimer))));
    let radar_src = watchdog.lock().register("ld2450").unwrap();

    let mut scheduler = Scheduler::new();
    register_watchdog_task(
        &mut scheduler,
        watchdog.clone(),
        stats.clone(),
        WATCHDOG_CHECK_INTERVAL_MS,
    )
    .unwrap();

    // Radar feeds for a while: checks pass.
    for now in (0..=2000u32).step_by(100) {
        watchdog.lock().feed(radar_src, now);
        scheduler.tick(now);
    }
    assert_eq!(stats.watchdog_starved(), 0);

    // Radar goes silent without being disarmed: check starves, and the
    // stats surface shows it.
    for now in (2100..=3100u32).step_by(100) {
        scheduler.tick(now);
    }
    assert_eq!(watchdog.lock().starved_checks(), 1);
    assert_eq!(stats.watchdog_starved(), 1);

    // Disarming (the disconnect path) stops the bleeding.
    watchdog.lock().disarm(radar_src);
    for now in (3200..=4200u32).step_by(100) {
        scheduler.tick(now);
    }
    assert_eq!(stats.watchdog_starved(), 1);
}

#[test]
fn commit_telemetry_reaches_stats() {
    let stats = Arc::new(CoreStats::new());
    let config = Arc::new(Mutex::new(
        ConfigStore::init(MemFlash::new(), &[0x24, 0x6F, 0x28, 0x00, 0x00, 0x01]).unwrap(),
    ));

    let mut scheduler = Scheduler::new();
    let cfg = config.clone();
    register_commit_telemetry_task(
        &mut scheduler,
        stats.clone(),
        move || cfg.lock().commit_count(),
        1000,
    )
    .unwrap();

    config.lock().set_zones(desk_zone()).unwrap();
    config
        .lock()
        .set_device(&rs1_config_data::DeviceRecord::default())
        .unwrap();

    scheduler.tick(1000);
    assert_eq!(stats.nvs_commits(), 2);
}
