//! End-to-end runs of the test case against the in-process bus, with the
//! replayer standing in for the system under test.

use firecheck_core::capture::CaptureLog;
use firecheck_core::config::AggregationMode;
use firecheck_core::oracle::{DiagnosticKind, Verdict};
use firecheck_core::runner::{ConfigSource, Overrides, WeaponFireTestCase};
use firecheck_core::verifier::Stage;
use firecheck_protocol::{
    EntityType, EventIdentifier, InteractionBus, VelocityVector, WeaponFireEvent, WorldLocation,
};
use firecheck_replay::bus::{BusConfig, DeliveryFaults, LocalBus};
use firecheck_replay::replay::{ReplayConfig, Replayer};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn fire(count: u16, x: f64) -> WeaponFireEvent {
    WeaponFireEvent {
        identifier: EventIdentifier::new("SUT-Artillery", count),
        firing_object_id: "howitzer-1".into(),
        target_object_id: format!("target-{}", count),
        munition_object_id: format!("shell-{}", count),
        munition_type: EntityType::new(2, 9, 225, 2, 14, 1, 0),
        warhead_type: 1000,
        fuse_type: 1100,
        quantity_fired: 1,
        rate_of_fire: 6,
        fire_mission_index: 12,
        fire_control_solution_range: 14_500.0,
        firing_location: WorldLocation::new(x, -5_500_000.0, 3_100_000.0),
        initial_velocity_vector: VelocityVector::new(480.0, 0.0, 560.0),
    }
}

fn reference() -> Vec<WeaponFireEvent> {
    vec![fire(1, 918_000.0), fire(2, 918_010.0), fire(3, 918_020.0)]
}

/// Write a config and reference directory; returns the config path.
fn write_case(dir: &Path, mode: &str) -> std::path::PathBuf {
    let fad = dir.join("fad");
    fs::create_dir(&fad).unwrap();
    let events = reference();
    fs::write(
        fad.join("01.json"),
        serde_json::to_string_pretty(&events[..2]).unwrap(),
    )
    .unwrap();
    fs::write(
        fad.join("02.json"),
        serde_json::to_string_pretty(&events[2..]).unwrap(),
    )
    .unwrap();

    let config = format!(
        r#"{{
            "referenceDir": "fad",
            "thresholds": {{ "worldLocation": 0.1, "orientation": 0.1, "velocity": 1.0,
                            "acceleration": 0.1, "angularVelocity": 0.1 }},
            "waitingPeriod": 1,
            "mode": "{}"
        }}"#,
        mode
    );
    let path = dir.join("tc_param.json");
    fs::write(&path, config).unwrap();
    path
}

fn bus(duplicate_ppm: u32) -> Arc<LocalBus> {
    Arc::new(
        LocalBus::new(BusConfig {
            workers: 4,
            faults: DeliveryFaults {
                seed: 7,
                duplicate_ppm,
                drop_ppm: 0,
            },
        })
        .unwrap(),
    )
}

fn fast_replay() -> ReplayConfig {
    ReplayConfig {
        period: Duration::from_millis(50),
        rounds: None,
    }
}

fn test_case(bus: &Arc<LocalBus>, config: std::path::PathBuf) -> WeaponFireTestCase {
    WeaponFireTestCase::new(bus.clone() as Arc<dyn InteractionBus>, ConfigSource::File(config))
        .with_tick(Duration::from_millis(300))
}

#[test]
fn replayed_reference_passes_despite_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_case(dir.path(), "aggregate-all");
    let bus = bus(500_000);

    let mut tc = test_case(&bus, config);
    let replayer = Replayer::start(bus.clone(), &reference(), fast_replay()).unwrap();
    let report = tc.run().unwrap();
    replayer.stop();

    assert_eq!(report.verdict, Verdict::Pass, "{:?}", report.failures);
    assert_eq!(report.discovered_count, 3);
    assert_eq!(report.confirmed.len(), 3);
    assert!(tc.collector().stats().duplicates > 0);
    assert_eq!(bus.subscription_count(), 0);
}

#[test]
fn silent_sut_is_inconclusive() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_case(dir.path(), "aggregate-all");
    let bus = bus(0);

    let mut tc = test_case(&bus, config);
    let report = tc.run().unwrap();
    assert_eq!(report.verdict, Verdict::Inconclusive);
    assert!(report.failures.is_empty());
}

#[test]
fn drifted_location_and_missing_event_fail() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_case(dir.path(), "aggregate-all");
    let bus = bus(0);

    // The SUT fires only two events and the second is 0.5 m off.
    let sut = vec![fire(1, 918_000.0), fire(2, 918_010.5)];
    let mut tc = test_case(&bus, config);
    let replayer = Replayer::start(bus.clone(), &sut, fast_replay()).unwrap();
    let report = tc.run().unwrap();
    replayer.stop();

    assert_eq!(report.verdict, Verdict::Fail);
    let kinds: Vec<DiagnosticKind> = report.failures.iter().map(|d| d.kind).collect();
    assert_eq!(
        kinds,
        vec![
            DiagnosticKind::Cardinality,
            DiagnosticKind::MissingIdentity,
            DiagnosticKind::LocationOutOfTolerance,
        ]
    );
    assert_eq!(
        report.failures[2].identifier,
        Some(EventIdentifier::new("SUT-Artillery", 2))
    );
}

#[test]
fn fail_fast_override_halts_after_identity() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_case(dir.path(), "aggregate-all");
    let bus = bus(0);

    let mut wrong_fuse = fire(1, 918_000.0);
    wrong_fuse.fuse_type = 0;
    let sut = vec![wrong_fuse, fire(2, 918_010.0)];
    let mut tc = test_case(&bus, config).with_overrides(Overrides {
        mode: Some(AggregationMode::FailFast),
        waiting_period: None,
    });
    let replayer = Replayer::start(bus.clone(), &sut, fast_replay()).unwrap();
    let report = tc.run().unwrap();
    replayer.stop();

    assert_eq!(report.verdict, Verdict::Fail);
    assert_eq!(report.halted_after, Some(Stage::Identity));
    assert!(report
        .failures
        .iter()
        .all(|d| d.kind != DiagnosticKind::ParameterMismatch));
}

#[test]
fn capture_reverifies_offline() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_case(dir.path(), "fail-fast");
    let bus = bus(0);

    let mut tc = test_case(&bus, config.clone());
    let replayer = Replayer::start(bus.clone(), &reference(), fast_replay()).unwrap();
    let live = tc.run().unwrap();
    replayer.stop();
    assert_eq!(live.verdict, Verdict::Pass);

    let capture_path = dir.path().join("capture.json");
    CaptureLog::from_snapshot("loopback", &tc.collector().snapshot())
        .save(&capture_path)
        .unwrap();

    let loaded = CaptureLog::load(&capture_path).unwrap();
    let settings = firecheck_core::CheckConfig::load(&config).unwrap();
    let reference = firecheck_core::ReferenceSet::load_dir(&settings.reference_dir).unwrap();
    let offline = firecheck_core::ConformanceVerifier::from_config(&settings).verify(
        &reference,
        &loaded.into_discovered(),
        settings.mode,
    );
    assert_eq!(offline.verdict, Verdict::Pass);
    assert_eq!(offline.confirmed, live.confirmed);
}

#[test]
fn rerun_observes_a_fresh_window() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_case(dir.path(), "aggregate-all");
    let bus = bus(0);
    let mut tc = test_case(&bus, config);

    let replayer = Replayer::start(bus.clone(), &reference(), fast_replay()).unwrap();
    assert_eq!(tc.run().unwrap().verdict, Verdict::Pass);
    replayer.stop();
    assert!(bus.wait_idle(Duration::from_secs(5)));

    // Nothing is published during the second window.
    let report = tc.run().unwrap();
    assert_eq!(report.verdict, Verdict::Inconclusive);
    assert_eq!(tc.runs(), 2);
}
