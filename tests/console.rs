use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;

use obsflow::arrivals::ArrivalEvent;
use obsflow::config::ConsoleConfig;
use obsflow::console::{AnalysisConsole, Lifecycle};
use obsflow::dispatch::{Kwargs, MethodTable};
use obsflow::publish::MemoryHub;

fn test_config(data_dir: &std::path::Path) -> ConsoleConfig {
    ConsoleConfig {
        operator_override: Some("o11111".to_string()),
        user_token: None,
        identity_file: data_dir.join(".operator_id"),
        data_dir: data_dir.to_path_buf(),
        target: "ANALYSIS".to_string(),
        channel_group: "tasks".to_string(),
        queue_timeout: Duration::from_millis(25),
        poll_interval: Duration::from_millis(25),
        multi_detector: vec!["MCS".to_string()],
    }
}

fn methods() -> MethodTable {
    let mut table = MethodTable::new();
    table.register("grouping_count", |state, call, _, _| {
        call.set_field("groupings", Value::from(state.grouping_count()));
        call.complete_ok();
        Ok(())
    });
    table
}

fn wait_for_records(console: &AnalysisConsole, expected: usize) -> usize {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let count = console
            .executor()
            .inspect(|state| state.record_count())
            .unwrap_or(0);
        if count >= expected || Instant::now() >= deadline {
            return count;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn console_wires_ingestion_and_dispatch_together() {
    let dir = tempfile::tempdir().unwrap();
    let hub = Arc::new(MemoryHub::new());
    let mut console =
        AnalysisConsole::new(&test_config(dir.path()), hub.clone(), methods()).unwrap();

    assert_eq!(console.operator().as_str(), "o11111");
    assert_eq!(console.service_name(), "ANALYSIS-o11111");

    console.start().unwrap();
    console.handle_event(ArrivalEvent::new("/d/IRCA00000001.fits"));
    console.handle_event(ArrivalEvent::new("/d/MCSA00000012.fits"));
    assert_eq!(wait_for_records(&console, 2), 2);

    let status = console.dispatcher().dispatch(
        "T1",
        "ANALYSIS",
        "grouping_count",
        vec![],
        Kwargs::new(),
    );
    assert!(status.is_ok());
    let records = hub.wait_for("T1", 1, Duration::from_secs(2));
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].channel, "tasks");
    assert_eq!(records[0].fields["result"], Value::from("ok"));
    assert_eq!(records[0].fields["groupings"], Value::from(2));

    console.stop();
}

#[test]
fn console_rejects_a_second_start_after_stop() {
    let dir = tempfile::tempdir().unwrap();
    let hub = Arc::new(MemoryHub::new());
    let mut console =
        AnalysisConsole::new(&test_config(dir.path()), hub, methods()).unwrap();

    console.start().unwrap();
    console.stop();
    assert!(console.start().is_err());
}

#[test]
fn console_refuses_to_start_without_an_identity() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.operator_override = None;

    let hub = Arc::new(MemoryHub::new());
    assert!(AnalysisConsole::new(&config, hub, methods()).is_err());
}

// Close-write notifications are an inotify feature.
#[cfg(target_os = "linux")]
#[test]
fn console_picks_up_files_written_into_the_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    let hub = Arc::new(MemoryHub::new());
    let mut console =
        AnalysisConsole::new(&test_config(dir.path()), hub, methods()).unwrap();
    console.watch_data_dir();
    console.start().unwrap();

    // Give the watcher a moment to arm before writing.
    thread::sleep(Duration::from_millis(100));
    std::fs::write(dir.path().join("IRCA00000003.fits"), b"frame").unwrap();

    assert_eq!(wait_for_records(&console, 1), 1);
    let loaded = console
        .executor()
        .inspect(|state| {
            state
                .grouping("IRCA")
                .is_some_and(|g| g.contains("IRCA00000003"))
        })
        .unwrap();
    assert!(loaded);

    console.stop();
}
