use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::{
    sync::{Mutex, RwLock, broadcast, watch},
    task::JoinHandle,
    time::{Duration, MissedTickBehavior},
};

use crate::{
    core::merge::{MergeCompactor, MergeReport},
    error::StoreResult,
};

use super::{events::PizzeriaEvent, handle::RuntimeError};

/// Periodic driver for [`MergeCompactor`] with a single-flight guard.
///
/// Timer ticks and [`MergeScheduler::trigger`] share one guard: while a cycle
/// is running, any other request is skipped rather than queued, so the
/// aggregate never has two writers. Dropping the scheduler stops the timer.
///
/// Every cycle holds a read lock on `gate` until its blocking run returns.
/// [`MergeScheduler::stop`] flips the flag under the write lock, so once it
/// returns no cycle is running and none can start.
pub struct MergeScheduler {
    compactor: Arc<MergeCompactor>,
    in_flight: Arc<AtomicBool>,
    gate: Arc<RwLock<bool>>,
    events_tx: broadcast::Sender<PizzeriaEvent>,
    stop_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MergeScheduler {
    /// Starts the timer. With `run_on_start` the first cycle runs immediately,
    /// otherwise after one full `interval`.
    pub fn start(
        compactor: Arc<MergeCompactor>,
        interval: Duration,
        run_on_start: bool,
        events_tx: broadcast::Sender<PizzeriaEvent>,
    ) -> Self {
        let in_flight = Arc::new(AtomicBool::new(false));
        let gate = Arc::new(RwLock::new(false));
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let loop_compactor = Arc::clone(&compactor);
        let loop_flight = Arc::clone(&in_flight);
        let loop_gate = Arc::clone(&gate);
        let loop_events = events_tx.clone();
        let task = tokio::spawn(async move {
            // tokio rejects a zero period
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // first tick completes immediately
            ticker.tick().await;
            tracing::info!(interval_ms = interval.as_millis() as u64, "merge scheduler started");

            if run_on_start {
                run_logged(&loop_compactor, &loop_flight, &loop_gate, &loop_events).await;
            }

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_logged(&loop_compactor, &loop_flight, &loop_gate, &loop_events).await;
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("merge scheduler stopped");
        });

        Self {
            compactor,
            in_flight,
            gate,
            events_tx,
            stop_tx,
            task: Mutex::new(Some(task)),
        }
    }

    /// Runs a cycle now. Returns `Ok(None)` if a cycle was already in flight
    /// and [`RuntimeError::Stopped`] once [`Self::stop`] has begun.
    pub async fn trigger(&self) -> Result<Option<MergeReport>, RuntimeError> {
        run_guarded(&self.compactor, &self.in_flight, &self.gate, &self.events_tx)
            .await
            .transpose()
    }

    /// True while a cycle is running.
    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Stops the timer and waits for any in-flight cycle, timer or manual, to
    /// finish. Safe to call more than once.
    pub async fn stop(&self) -> Result<(), RuntimeError> {
        *self.gate.write().await = true;
        let _ = self.stop_tx.send(true);
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            task.await.map_err(|e| RuntimeError::Join(e.to_string()))?;
        }
        Ok(())
    }
}

/// Claim on the single-flight slot, released on drop.
pub(crate) struct FlightGuard {
    flag: Arc<AtomicBool>,
}

impl FlightGuard {
    pub(crate) fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

async fn run_guarded(
    compactor: &Arc<MergeCompactor>,
    in_flight: &Arc<AtomicBool>,
    gate: &Arc<RwLock<bool>>,
    events_tx: &broadcast::Sender<PizzeriaEvent>,
) -> Option<Result<MergeReport, RuntimeError>> {
    let stopped = Arc::clone(gate).read_owned().await;
    if *stopped {
        return Some(Err(RuntimeError::Stopped));
    }
    let Some(guard) = FlightGuard::try_acquire(in_flight) else {
        tracing::warn!("merge already in flight, skipping");
        return None;
    };

    let compactor = Arc::clone(compactor);
    let events_tx = events_tx.clone();
    // both guards move into the blocking task so they outlive a dropped caller
    let res = tokio::task::spawn_blocking(move || -> StoreResult<MergeReport> {
        let _stopped = stopped;
        let _guard = guard;
        let report = compactor.run_once()?;
        let _ = events_tx.send(refreshed(&report));
        Ok(report)
    })
    .await;

    Some(match res {
        Ok(inner) => inner.map_err(RuntimeError::from),
        Err(e) => Err(RuntimeError::Join(e.to_string())),
    })
}

async fn run_logged(
    compactor: &Arc<MergeCompactor>,
    in_flight: &Arc<AtomicBool>,
    gate: &Arc<RwLock<bool>>,
    events_tx: &broadcast::Sender<PizzeriaEvent>,
) {
    match run_guarded(compactor, in_flight, gate, events_tx).await {
        Some(Err(RuntimeError::Stopped)) | Some(Ok(_)) | None => {}
        Some(Err(err)) => {
            tracing::error!(error = %err, "merge cycle failed");
        }
    }
}

fn refreshed(report: &MergeReport) -> PizzeriaEvent {
    PizzeriaEvent::AggregateRefreshed {
        orders: report.merged,
        skipped: report.skipped.len(),
    }
}
