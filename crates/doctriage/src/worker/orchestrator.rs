//! Batch orchestration.
//!
//! A finite-state machine (Idle → Running → {Pausing → Paused | Stopping →
//! Stopped → Idle}) drives the work queue through the per-item pipeline on
//! a dedicated worker thread, so long extraction calls never block the
//! caller-facing context. Control requests are flags checked only at loop
//! boundaries between items: a pipeline step is not preemptible, and the
//! policy for the in-flight item is finish-or-discard, never half-save.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::adapter::AdapterSet;
use crate::broadcast::{
    EventBroadcaster, OrchestratorEvent, ProgressSnapshot, ProgressTracker, RunState,
};
use crate::config::TriageConfig;
use crate::pipeline::{BroadcastPhases, Pipeline, PipelineOutcome};
use crate::queue::{ItemStatus, QueueStatistics, WorkQueue};
use crate::store::ResultStore;

/// An invalid transition request. Advisory: the machine is left unchanged
/// and the request is logged, never escalated to a fault.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: RunState,
    },
}

/// Per-batch item counters. Reset when a batch starts from Idle/Stopped
/// and when a stop completes; preserved across pause/resume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchCounters {
    pub processed: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl BatchCounters {
    /// Items that have left the pending pool this batch.
    pub fn drained(&self) -> u64 {
        self.processed + self.failed + self.skipped
    }
}

enum Command {
    Run,
}

struct ControlState {
    run_state: RunState,
    batch_id: String,
    counters: BatchCounters,
    /// The item currently being worked. Taken (set to None) by pause/stop
    /// when they revert it — the worker then discards its result instead
    /// of committing a status.
    current_item: Option<PathBuf>,
    pause_requested: bool,
    stop_requested: bool,
}

struct Shared {
    queue: WorkQueue,
    events: EventBroadcaster,
    control: Mutex<ControlState>,
    tracker: Mutex<ProgressTracker>,
    shutdown: AtomicBool,
}

impl Shared {
    /// Lock order everywhere: control, then tracker/queue. Never reversed.
    fn control(&self) -> std::sync::MutexGuard<'_, ControlState> {
        self.control.lock().expect("orchestrator control lock poisoned")
    }

    fn transition_locked(&self, cs: &mut ControlState, to: RunState) {
        let from = cs.run_state;
        cs.run_state = to;
        debug!("Orchestrator state {} -> {}", from, to);
        self.events.send(OrchestratorEvent::StateChanged {
            batch_id: cs.batch_id.clone(),
            from,
            to,
            timestamp: Utc::now(),
        });
    }

    fn emit_progress_locked(&self, cs: &ControlState) {
        let stats = self.queue.statistics();
        let current = cs.counters.drained();
        let total = current + stats.pending as u64 + stats.processing as u64;
        let snapshot = self
            .tracker
            .lock()
            .expect("progress tracker lock poisoned")
            .snapshot(current, total);
        self.events.send(OrchestratorEvent::Progress {
            batch_id: cs.batch_id.clone(),
            current: snapshot.current,
            total: snapshot.total,
            elapsed_secs: snapshot.elapsed_secs,
            items_per_second: snapshot.items_per_second,
            eta_secs: snapshot.eta_secs,
            timestamp: Utc::now(),
        });
    }

    /// The queue drained naturally. Distinct from a user-triggered stop:
    /// counters stay readable until the next fresh start.
    fn finish_batch_locked(&self, cs: &mut ControlState) {
        let elapsed_secs = {
            let mut tracker = self.tracker.lock().expect("progress tracker lock poisoned");
            let elapsed = tracker.elapsed().as_secs_f64();
            tracker.pause();
            elapsed
        };
        info!(
            "Batch {} complete: {} processed, {} failed, {} skipped",
            cs.batch_id, cs.counters.processed, cs.counters.failed, cs.counters.skipped
        );
        self.events.send(OrchestratorEvent::BatchCompleted {
            batch_id: cs.batch_id.clone(),
            processed: cs.counters.processed,
            failed: cs.counters.failed,
            skipped: cs.counters.skipped,
            elapsed_secs,
            timestamp: Utc::now(),
        });
        self.transition_locked(cs, RunState::Idle);
    }

    /// Completes a stop: counters and flags cleared, clock reset, machine
    /// back to Idle. Queue contents are untouched — terminal statuses
    /// stay; the in-flight item was already reverted by `stop()`.
    fn finalize_stop_locked(&self, cs: &mut ControlState) {
        cs.counters = BatchCounters::default();
        cs.current_item = None;
        cs.pause_requested = false;
        cs.stop_requested = false;
        self.tracker
            .lock()
            .expect("progress tracker lock poisoned")
            .reset();
        self.transition_locked(cs, RunState::Stopped);
        self.transition_locked(cs, RunState::Idle);
        self.events.send(OrchestratorEvent::BatchStopped {
            batch_id: cs.batch_id.clone(),
            timestamp: Utc::now(),
        });
        info!("Batch {} stopped", cs.batch_id);
    }

    /// Processes items until the queue drains or a control request is
    /// observed at a loop boundary.
    fn run_batch(&self, pipeline: &Pipeline) {
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                return;
            }

            // Boundary: claim the next item or handle a control request.
            let (item, batch_id) = {
                let mut cs = self.control();
                if cs.stop_requested {
                    self.finalize_stop_locked(&mut cs);
                    return;
                }
                if cs.run_state != RunState::Running {
                    // Paused, or a stale run command after the batch ended.
                    return;
                }
                match self.queue.next_pending() {
                    None => {
                        self.finish_batch_locked(&mut cs);
                        return;
                    }
                    Some(item) => {
                        cs.current_item = Some(item.file_path.clone());
                        (item, cs.batch_id.clone())
                    }
                }
            };

            let path = item.file_path;
            self.queue.update_status(&path, ItemStatus::Processing);
            self.events.send(OrchestratorEvent::ItemStarted {
                batch_id: batch_id.clone(),
                file_path: path.clone(),
                timestamp: Utc::now(),
            });

            let reporter = BroadcastPhases::new(&batch_id, &path, self.events.sender());
            let outcome = pipeline.process(&path, &reporter);

            // Boundary: commit the outcome, unless pause/stop reverted the
            // item mid-step — then the result is discarded wholesale.
            let mut cs = self.control();
            if cs.current_item.take().is_none() {
                debug!(
                    "Discarding in-flight result for {} after control request",
                    path.display()
                );
                continue;
            }

            match outcome {
                Ok(PipelineOutcome::Persisted { result, .. }) => {
                    self.queue.update_status(&path, ItemStatus::Completed);
                    cs.counters.processed += 1;
                    self.events.send(OrchestratorEvent::ItemCompleted {
                        batch_id: batch_id.clone(),
                        file_path: path.clone(),
                        content_hash: result.content_hash,
                        tags: result.tags.iter().map(|t| t.label.clone()).collect(),
                        needs_review: result.needs_review,
                        timestamp: Utc::now(),
                    });
                }
                Ok(PipelineOutcome::Skipped { content_hash }) => {
                    self.queue.update_status(&path, ItemStatus::Skipped);
                    cs.counters.skipped += 1;
                    debug!("Skipped {} (content already analyzed)", path.display());
                    self.events.send(OrchestratorEvent::ItemSkipped {
                        batch_id: batch_id.clone(),
                        file_path: path.clone(),
                        content_hash,
                        timestamp: Utc::now(),
                    });
                }
                Err(e) => {
                    self.queue.update_status(&path, ItemStatus::Failed);
                    cs.counters.failed += 1;
                    let persistence = e.is_persistence();
                    if persistence {
                        error!("Persistence failure for {}: {}", path.display(), e);
                    } else {
                        warn!("Processing failed for {}: {}", path.display(), e);
                    }
                    self.events.send(OrchestratorEvent::ItemFailed {
                        batch_id: batch_id.clone(),
                        file_path: path.clone(),
                        error: e.to_string(),
                        persistence,
                        timestamp: Utc::now(),
                    });
                }
            }

            self.emit_progress_locked(&cs);
        }
    }
}

/// Drives the work queue through the pipeline, one item at a time.
pub struct Orchestrator {
    shared: Arc<Shared>,
    cmd_tx: Sender<Command>,
    worker: Option<JoinHandle<()>>,
}

impl Orchestrator {
    /// Builds an orchestrator with its own event broadcaster.
    pub fn new(
        queue: WorkQueue,
        store: Arc<dyn ResultStore>,
        adapters: AdapterSet,
        config: &TriageConfig,
    ) -> Self {
        Self::with_broadcaster(queue, store, adapters, config, EventBroadcaster::default())
    }

    /// Builds an orchestrator emitting onto an existing broadcaster.
    pub fn with_broadcaster(
        queue: WorkQueue,
        store: Arc<dyn ResultStore>,
        adapters: AdapterSet,
        config: &TriageConfig,
        events: EventBroadcaster,
    ) -> Self {
        let pipeline = Pipeline::new(store, adapters, config);
        let shared = Arc::new(Shared {
            queue,
            events,
            control: Mutex::new(ControlState {
                run_state: RunState::Idle,
                batch_id: String::new(),
                counters: BatchCounters::default(),
                current_item: None,
                pause_requested: false,
                stop_requested: false,
            }),
            tracker: Mutex::new(ProgressTracker::new()),
            shutdown: AtomicBool::new(false),
        });

        let (cmd_tx, cmd_rx) = bounded::<Command>(4);
        let worker_shared = Arc::clone(&shared);
        let worker = thread::spawn(move || run_worker(worker_shared, cmd_rx, pipeline));
        info!("Orchestrator worker started");

        Self {
            shared,
            cmd_tx,
            worker: Some(worker),
        }
    }

    /// Adds a file to the queue. See [`WorkQueue::enqueue`].
    pub fn enqueue<P: AsRef<std::path::Path>>(&self, file_path: P, priority: i32) -> bool {
        self.shared.queue.enqueue(file_path, priority)
    }

    pub fn statistics(&self) -> QueueStatistics {
        self.shared.queue.statistics()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.shared.events.subscribe()
    }

    pub fn state(&self) -> RunState {
        self.shared.control().run_state
    }

    pub fn counters(&self) -> BatchCounters {
        self.shared.control().counters
    }

    /// Current progress reading (pause-aware; see [`ProgressTracker`]).
    pub fn progress(&self) -> ProgressSnapshot {
        let cs = self.shared.control();
        let stats = self.shared.queue.statistics();
        let current = cs.counters.drained();
        let total = current + stats.pending as u64 + stats.processing as u64;
        self.shared
            .tracker
            .lock()
            .expect("progress tracker lock poisoned")
            .snapshot(current, total)
    }

    /// Starts a fresh batch, or resumes a paused one. Valid from Idle,
    /// Paused and Stopped; counters reset only when entering from
    /// Idle/Stopped — resuming preserves batch progress.
    pub fn start(&self) -> Result<(), StateError> {
        let mut cs = self.shared.control();
        match cs.run_state {
            RunState::Idle | RunState::Stopped => {
                cs.counters = BatchCounters::default();
                cs.batch_id = Uuid::new_v4().to_string();
                cs.pause_requested = false;
                cs.stop_requested = false;
                self.shared
                    .tracker
                    .lock()
                    .expect("progress tracker lock poisoned")
                    .start();
                info!("Starting batch {}", cs.batch_id);
            }
            RunState::Paused => {
                cs.pause_requested = false;
                self.shared
                    .tracker
                    .lock()
                    .expect("progress tracker lock poisoned")
                    .resume();
                info!("Resuming batch {}", cs.batch_id);
            }
            state => {
                warn!("Ignoring start request while {}", state);
                return Err(StateError::InvalidTransition {
                    action: "start",
                    state,
                });
            }
        }
        self.shared.transition_locked(&mut cs, RunState::Running);
        drop(cs);

        match self.cmd_tx.try_send(Command::Run) {
            Ok(()) => {}
            // A run command is already queued; the worker will pick it up.
            Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => error!("Orchestrator worker is gone"),
        }
        Ok(())
    }

    /// Pauses between items. The in-flight item (if any) reverts to
    /// Pending immediately and its result is discarded when the current
    /// pipeline step finishes — extraction calls are not interruptible, so
    /// the only safe policy is finish-or-discard.
    pub fn pause(&self) -> Result<(), StateError> {
        let mut cs = self.shared.control();
        if cs.run_state != RunState::Running {
            warn!("Ignoring pause request while {}", cs.run_state);
            return Err(StateError::InvalidTransition {
                action: "pause",
                state: cs.run_state,
            });
        }

        cs.pause_requested = true;
        if let Some(path) = cs.current_item.take() {
            self.shared.queue.update_status(&path, ItemStatus::Pending);
            debug!("Reverted in-flight item {} to pending", path.display());
        }
        self.shared
            .tracker
            .lock()
            .expect("progress tracker lock poisoned")
            .pause();
        self.shared.transition_locked(&mut cs, RunState::Pausing);
        self.shared.transition_locked(&mut cs, RunState::Paused);
        info!("Batch {} paused", cs.batch_id);
        Ok(())
    }

    /// Stops the batch. Valid from Running, Pausing and Paused. On
    /// completion counters are reset, the in-flight item is reverted to
    /// Pending, and the machine returns to Idle. Queue contents are not
    /// cleared — terminal statuses keep their state.
    pub fn stop(&self) -> Result<(), StateError> {
        let mut cs = self.shared.control();
        let state = cs.run_state;
        if !matches!(
            state,
            RunState::Running | RunState::Pausing | RunState::Paused
        ) {
            warn!("Ignoring stop request while {}", state);
            return Err(StateError::InvalidTransition {
                action: "stop",
                state,
            });
        }

        cs.stop_requested = true;
        if let Some(path) = cs.current_item.take() {
            self.shared.queue.update_status(&path, ItemStatus::Pending);
            debug!("Reverted in-flight item {} to pending", path.display());
        }
        self.shared.transition_locked(&mut cs, RunState::Stopping);

        if state != RunState::Running {
            // The worker is idle while paused; finalize here instead of
            // waiting for a loop boundary that will not come.
            self.shared.finalize_stop_locked(&mut cs);
        }
        Ok(())
    }

    /// Signals the worker thread to exit and waits for it.
    pub fn shutdown(mut self) {
        info!("Shutting down orchestrator...");
        self.shared.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("Orchestrator worker panicked");
            }
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Relaxed);
    }
}

fn run_worker(shared: Arc<Shared>, cmd_rx: Receiver<Command>, pipeline: Pipeline) {
    debug!("Orchestrator worker thread started");

    loop {
        if shared.shutdown.load(Ordering::Relaxed) {
            break;
        }

        match cmd_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(Command::Run) => shared.run_batch(&pipeline),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!("Orchestrator worker thread stopped");
}
