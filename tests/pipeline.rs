use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use obsflow::arrivals::{ArrivalEvent, ArrivalQueue};
use obsflow::executor::DisplayExecutor;
use obsflow::frame::ObsFrameParser;
use obsflow::ingest::IngestionWorker;

const TICK: Duration = Duration::from_millis(20);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

struct Pipeline {
    queue: Arc<ArrivalQueue>,
    executor: DisplayExecutor,
    stop: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl Pipeline {
    fn start() -> Self {
        init_tracing();
        let queue = Arc::new(ArrivalQueue::new());
        let executor = DisplayExecutor::start(TICK).unwrap();
        let stop = Arc::new(AtomicBool::new(false));
        let parser = Arc::new(ObsFrameParser::new(vec!["MCS".to_string()]));
        let worker = IngestionWorker::new(
            Arc::clone(&queue),
            executor.submitter(),
            parser,
            Arc::clone(&stop),
            TICK,
        )
        .spawn()
        .unwrap();
        Self {
            queue,
            executor,
            stop,
            worker: Some(worker),
        }
    }

    fn wait_for_records(&self, expected: usize) -> (usize, usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let counts = self
                .executor
                .inspect(|state| (state.grouping_count(), state.record_count()))
                .unwrap();
            if counts.1 >= expected || Instant::now() >= deadline {
                return counts;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            worker.join().unwrap();
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[test]
fn interleaved_arrivals_produce_expected_groupings_and_records() {
    let mut pipeline = Pipeline::start();

    // Three distinct grouping keys: IRCA, MCSA_1, MCSA_2.
    let batch_a = vec![
        "IRCA00000001.fits",
        "IRCA00000002.fits",
        "MCSA00000011.fits",
    ];
    let batch_b = vec![
        "IRCA00000003.fits",
        "MCSA00000021.fits",
        "MCSA00000012.fits",
    ];

    let producers: Vec<_> = [batch_a, batch_b]
        .into_iter()
        .map(|batch| {
            let queue = Arc::clone(&pipeline.queue);
            thread::spawn(move || {
                for name in batch {
                    queue.put(ArrivalEvent::new(format!("/d/{name}")));
                    thread::sleep(Duration::from_millis(1));
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    let (groupings, records) = pipeline.wait_for_records(6);
    assert_eq!(records, 6);
    assert_eq!(groupings, 3);

    let keys: Vec<String> = pipeline
        .executor
        .inspect(|state| state.grouping_keys().map(str::to_string).collect())
        .unwrap();
    for key in ["IRCA", "MCSA_1", "MCSA_2"] {
        assert!(keys.iter().any(|k| k == key), "missing grouping {key}");
    }

    pipeline.shutdown();
}

#[test]
fn malformed_arrival_does_not_stop_later_items() {
    let mut pipeline = Pipeline::start();

    pipeline.queue.put(ArrivalEvent::new("/d/not-a-frame.txt"));
    pipeline.queue.put(ArrivalEvent::new("/d/IRCA00000007.fits"));

    let (groupings, records) = pipeline.wait_for_records(1);
    assert_eq!(records, 1);
    assert_eq!(groupings, 1);
    let present = pipeline
        .executor
        .inspect(|state| {
            state
                .grouping("IRCA")
                .is_some_and(|g| g.contains("IRCA00000007"))
        })
        .unwrap();
    assert!(present);

    pipeline.shutdown();
}

#[test]
fn repeated_arrivals_for_one_frame_load_once() {
    let mut pipeline = Pipeline::start();

    for _ in 0..2 {
        pipeline.queue.put(ArrivalEvent::new("/d/IRCA00000009.fits"));
    }
    // A third distinct frame flushes the duplicates through the pipeline.
    pipeline.queue.put(ArrivalEvent::new("/d/IRCA00000010.fits"));

    let (_, records) = pipeline.wait_for_records(2);
    assert_eq!(records, 2);
    let ircs_len = pipeline
        .executor
        .inspect(|state| state.grouping("IRCA").map(|g| g.len()).unwrap_or(0))
        .unwrap();
    assert_eq!(ircs_len, 2);

    pipeline.shutdown();
}
