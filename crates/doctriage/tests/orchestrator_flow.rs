//! End-to-end orchestration tests.
//!
//! A gate-controlled OCR backend lets each test hold an item in flight
//! deterministically: `recognize` announces the path it was called with,
//! then blocks until the test releases the gate.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tempfile::TempDir;

use doctriage::adapter::{
    AdapterError, AdapterSet, OcrEngine, OcrMode, OcrPage,
};
use doctriage::queue::{ItemStatus, WorkQueue};
use doctriage::store::{
    Description, ExtractedPage, FileRecord, NewFileRecord, ResultStore, ScoredTag, SqliteStore,
    StoreError,
};
use doctriage::{BatchCounters, Orchestrator, OrchestratorEvent, RunState, TriageConfig};

struct GatedOcr {
    started: Sender<PathBuf>,
    gate: Receiver<()>,
}

impl OcrEngine for GatedOcr {
    fn recognize(&self, path: &Path, _mode: OcrMode) -> Result<Vec<OcrPage>, AdapterError> {
        let _ = self.started.send(path.to_path_buf());
        self.gate
            .recv_timeout(Duration::from_secs(10))
            .map_err(|_| AdapterError::Timeout { seconds: 10 })?;
        Ok(vec![OcrPage {
            page_no: 1,
            text: "Invoice: bill, amount due, payment due".to_string(),
            confidence: 0.9,
        }])
    }
}

struct Harness {
    orchestrator: Orchestrator,
    queue: WorkQueue,
    store: Arc<SqliteStore>,
    started: Receiver<PathBuf>,
    gate: Sender<()>,
    _dir: TempDir,
    files: Vec<PathBuf>,
}

/// Builds an orchestrator over `count` distinct PDF files and a gated OCR
/// backend.
fn gated_harness(count: usize) -> Harness {
    let dir = TempDir::new().unwrap();
    let mut files = Vec::new();
    for i in 0..count {
        let path = dir.path().join(format!("doc{}.pdf", i));
        std::fs::write(&path, format!("%PDF-1.4 fake content {}", i)).unwrap();
        files.push(path);
    }

    let (started_tx, started_rx) = unbounded();
    let (gate_tx, gate_rx) = unbounded();
    let mut adapters = AdapterSet::keyword_fallback();
    adapters.ocr = Arc::new(GatedOcr {
        started: started_tx,
        gate: gate_rx,
    });

    let queue = WorkQueue::new();
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let orchestrator = Orchestrator::new(
        queue.clone(),
        Arc::clone(&store) as Arc<dyn ResultStore>,
        adapters,
        &TriageConfig::default(),
    );

    for path in &files {
        assert!(orchestrator.enqueue(path, 0));
    }

    Harness {
        orchestrator,
        queue,
        store,
        started: started_rx,
        gate: gate_tx,
        _dir: dir,
        files,
    }
}

fn wait_until<F: Fn() -> bool>(what: &str, condition: F) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("timed out waiting for {}", what);
}

fn recv_started(harness: &Harness) -> PathBuf {
    harness
        .started
        .recv_timeout(Duration::from_secs(5))
        .expect("no item entered extraction in time")
}

#[test]
fn pause_then_stop_reverts_in_flight_item() {
    let harness = gated_harness(3);
    harness.orchestrator.start().unwrap();

    // Item 1 runs to completion.
    let first = recv_started(&harness);
    assert_eq!(first, harness.files[0]);
    harness.gate.send(()).unwrap();

    // Item 2 enters extraction and is held there.
    let second = recv_started(&harness);
    assert_eq!(second, harness.files[1]);
    wait_until("item 1 to commit", || {
        harness.orchestrator.counters().processed == 1
    });

    // Pause mid-step: state flips without waiting for the OCR call, and
    // the in-flight item reverts to pending.
    harness.orchestrator.pause().unwrap();
    assert_eq!(harness.orchestrator.state(), RunState::Paused);
    assert_eq!(
        harness.queue.status_of(&harness.files[1]),
        Some(ItemStatus::Pending)
    );

    // Stop from paused finalizes immediately.
    harness.orchestrator.stop().unwrap();
    assert_eq!(harness.orchestrator.state(), RunState::Idle);
    assert_eq!(harness.orchestrator.counters(), BatchCounters::default());

    // Let the abandoned OCR call finish; its result must be discarded.
    harness.gate.send(()).unwrap();
    thread::sleep(Duration::from_millis(50));

    assert_eq!(
        harness.queue.status_of(&harness.files[0]),
        Some(ItemStatus::Completed)
    );
    assert_eq!(
        harness.queue.status_of(&harness.files[1]),
        Some(ItemStatus::Pending)
    );
    assert_eq!(
        harness.queue.status_of(&harness.files[2]),
        Some(ItemStatus::Pending)
    );
    assert_eq!(harness.store.count_records().unwrap(), 1);

    // A fresh start picks up the surviving pending items.
    harness.orchestrator.start().unwrap();
    for _ in 0..2 {
        recv_started(&harness);
        harness.gate.send(()).unwrap();
    }
    wait_until("restarted batch to drain", || {
        harness.orchestrator.state() == RunState::Idle
            && harness.orchestrator.counters().processed == 2
    });
    assert_eq!(harness.queue.statistics().completed, 3);

    harness.orchestrator.shutdown();
}

#[test]
fn resume_preserves_batch_counters() {
    let harness = gated_harness(3);
    harness.orchestrator.start().unwrap();

    // Two items complete.
    for _ in 0..2 {
        recv_started(&harness);
        harness.gate.send(()).unwrap();
    }

    // Third enters extraction; pause while it is in flight.
    recv_started(&harness);
    wait_until("two items to commit", || {
        harness.orchestrator.counters().processed == 2
    });
    harness.orchestrator.pause().unwrap();
    assert_eq!(harness.orchestrator.counters().processed, 2);

    // Release the abandoned call, then resume.
    harness.gate.send(()).unwrap();
    harness.orchestrator.start().unwrap();
    assert_eq!(
        harness.orchestrator.counters().processed,
        2,
        "resume must never reset batch progress"
    );

    // The reverted item is processed again.
    recv_started(&harness);
    harness.gate.send(()).unwrap();

    wait_until("batch to drain", || {
        harness.orchestrator.state() == RunState::Idle
    });
    assert_eq!(harness.orchestrator.counters().processed, 3);
    harness.orchestrator.shutdown();
}

#[test]
fn elapsed_time_freezes_across_pause_resume() {
    let harness = gated_harness(2);
    harness.orchestrator.start().unwrap();

    recv_started(&harness);
    harness.gate.send(()).unwrap();
    recv_started(&harness);

    harness.orchestrator.pause().unwrap();
    let before = harness.orchestrator.progress().elapsed_secs;

    thread::sleep(Duration::from_millis(100));
    let while_paused = harness.orchestrator.progress().elapsed_secs;
    assert_eq!(
        before, while_paused,
        "elapsed time must not advance while paused"
    );

    harness.orchestrator.start().unwrap();
    let after = harness.orchestrator.progress().elapsed_secs;
    assert!(after >= before);
    assert!(
        after - before < 0.09,
        "paused wall-clock time leaked into elapsed: {} -> {}",
        before,
        after
    );

    // Drain: the abandoned call plus the reprocessed item.
    harness.gate.send(()).unwrap();
    recv_started(&harness);
    harness.gate.send(()).unwrap();
    wait_until("batch to drain", || {
        harness.orchestrator.state() == RunState::Idle
    });
    harness.orchestrator.shutdown();
}

#[test]
fn progress_events_count_drained_items() {
    let harness = gated_harness(2);
    let mut rx = harness.orchestrator.subscribe();
    harness.orchestrator.start().unwrap();

    for _ in 0..2 {
        recv_started(&harness);
        harness.gate.send(()).unwrap();
    }
    wait_until("batch to drain", || {
        harness.orchestrator.state() == RunState::Idle
    });

    let mut progress_readings = Vec::new();
    let mut saw_running = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            OrchestratorEvent::StateChanged { to, .. } => {
                if to == RunState::Running {
                    saw_running = true;
                }
            }
            OrchestratorEvent::Progress { current, total, .. } => {
                progress_readings.push((current, total));
            }
            _ => {}
        }
    }

    assert!(saw_running, "no Running state change observed");
    assert_eq!(
        progress_readings,
        vec![(1, 2), (2, 2)],
        "one progress reading per committed item"
    );
    harness.orchestrator.shutdown();
}

// ── Persistence failures ──

struct FailingStore;

impl ResultStore for FailingStore {
    fn save(
        &self,
        _file: &NewFileRecord,
        _pages: &[ExtractedPage],
        _tags: &[ScoredTag],
        _description: &Description,
    ) -> Result<i64, StoreError> {
        Err(StoreError::LockPoisoned)
    }

    fn find_by_hash(&self, _content_hash: &str) -> Result<Option<FileRecord>, StoreError> {
        Ok(None)
    }
}

#[test]
fn persistence_failure_is_surfaced_and_loop_continues() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("a.txt");
    let second = dir.path().join("b.txt");
    std::fs::write(&first, "invoice one").unwrap();
    std::fs::write(&second, "invoice two").unwrap();

    let queue = WorkQueue::new();
    let orchestrator = Orchestrator::new(
        queue.clone(),
        Arc::new(FailingStore),
        AdapterSet::keyword_fallback(),
        &TriageConfig::default(),
    );
    orchestrator.enqueue(&first, 0);
    orchestrator.enqueue(&second, 0);

    let mut rx = orchestrator.subscribe();
    orchestrator.start().unwrap();
    wait_until("batch to drain", || {
        orchestrator.state() == RunState::Idle && orchestrator.counters().failed == 2
    });

    let mut persistence_failures = 0;
    while let Ok(event) = rx.try_recv() {
        if let OrchestratorEvent::ItemFailed { persistence, .. } = event {
            assert!(persistence, "store failure must be flagged as persistence");
            persistence_failures += 1;
        }
    }
    assert_eq!(
        persistence_failures, 2,
        "every store failure must surface as an event"
    );
    assert_eq!(queue.statistics().failed, 2);
    orchestrator.shutdown();
}

#[test]
fn item_events_arrive_in_fifo_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("doc.txt");
    std::fs::write(&path, "invoice, amount due, bill, payment due").unwrap();

    let queue = WorkQueue::new();
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let orchestrator = Orchestrator::new(
        queue,
        store as Arc<dyn ResultStore>,
        AdapterSet::keyword_fallback(),
        &TriageConfig::default(),
    );
    orchestrator.enqueue(&path, 0);

    let mut rx = orchestrator.subscribe();
    orchestrator.start().unwrap();
    wait_until("batch to drain", || orchestrator.state() == RunState::Idle);

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(match event {
            OrchestratorEvent::StateChanged { from, to, .. } => {
                format!("state:{}->{}", from, to)
            }
            OrchestratorEvent::ItemStarted { .. } => "started".to_string(),
            OrchestratorEvent::ItemPhase { .. } => "phase".to_string(),
            OrchestratorEvent::ItemCompleted { .. } => "completed".to_string(),
            OrchestratorEvent::Progress { .. } => "progress".to_string(),
            OrchestratorEvent::BatchCompleted { .. } => "batch-completed".to_string(),
            other => format!("{:?}", other),
        });
    }

    assert_eq!(kinds[0], "state:idle->running");
    let started = kinds.iter().position(|k| k == "started").unwrap();
    let completed = kinds.iter().position(|k| k == "completed").unwrap();
    let batch_done = kinds.iter().position(|k| k == "batch-completed").unwrap();
    assert!(started < completed);
    assert!(completed < batch_done);
    assert!(
        kinds[started + 1..completed].iter().all(|k| k == "phase"),
        "phases must sit between start and completion: {:?}",
        kinds
    );
    orchestrator.shutdown();
}
