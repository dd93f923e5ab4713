//! Lifecycle and timing of evaluation cycles.
//!
//! A [`RefreshCoordinator`] fetches tracked entities, evaluates them against
//! the persisted threshold and publishes the result to every subscriber. It
//! runs one cycle on [`initialize`](RefreshCoordinator::initialize), then one
//! per interval until [`teardown`](RefreshCoordinator::teardown).
//!
//! Published state lives in `watch` channels, so a late subscriber sees the
//! latest snapshot immediately. Cycles may overlap; each carries a sequence
//! number and a result that completes after a newer one has been published
//! is dropped.

use crate::alerts::{evaluate, Alert};
use crate::collectors::entities::EntitySource;
use crate::dispatcher::NotificationDispatcher;
use crate::errors::CoordinatorError;
use crate::util::threshold_store::{validate_threshold, ThresholdStore};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Initializing,
    Running,
    Stopped,
}

/// What a single evaluation cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Published { count: usize },
    /// A newer cycle had already published; this result was dropped.
    Superseded,
    /// The source failed; the previous snapshot stays published.
    FetchFailed,
}

/// Cheap-to-clone handle to one coordinator instance.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    source:     Arc<dyn EntitySource>,
    thresholds: ThresholdStore,
    dispatcher: NotificationDispatcher,
    interval:   Duration,

    lifecycle: Mutex<Lifecycle>,
    timer:     Mutex<Option<JoinHandle<()>>>,
    /// Delivery tasks of the initial burst, until someone waits on them.
    burst:     Mutex<Vec<JoinHandle<()>>>,

    first_dispatched: AtomicBool,
    next_cycle:       AtomicU64,
    /// Sequence number of the last published cycle. Held while publishing.
    published:        Mutex<u64>,
    cycles_completed: AtomicU64,

    alerts_tx: watch::Sender<Arc<Vec<Alert>>>,
    count_tx:  watch::Sender<usize>,
}

impl RefreshCoordinator {
    pub fn new(
        source: Arc<dyn EntitySource>,
        thresholds: ThresholdStore,
        dispatcher: NotificationDispatcher,
        interval: Duration,
    ) -> Self {
        let (alerts_tx, _) = watch::channel(Arc::new(Vec::new()));
        let (count_tx, _)  = watch::channel(0usize);
        Self {
            inner: Arc::new(Inner {
                source,
                thresholds,
                dispatcher,
                interval: interval.max(MIN_REFRESH_INTERVAL),
                lifecycle: Mutex::new(Lifecycle::Uninitialized),
                timer:     Mutex::new(None),
                burst:     Mutex::new(Vec::new()),
                first_dispatched: AtomicBool::new(false),
                next_cycle:       AtomicU64::new(0),
                published:        Mutex::new(0),
                cycles_completed: AtomicU64::new(0),
                alerts_tx,
                count_tx,
            }),
        }
    }

    /// Load the threshold, run the first cycle, start the periodic timer.
    /// Any call after the first is a no-op.
    pub async fn initialize(&self) -> Result<(), CoordinatorError> {
        {
            let mut state = self.inner.lifecycle.lock();
            match *state {
                Lifecycle::Uninitialized => *state = Lifecycle::Initializing,
                Lifecycle::Stopped       => return Err(CoordinatorError::Stopped),
                Lifecycle::Initializing | Lifecycle::Running => {
                    debug!("coordinator already initialized");
                    return Ok(());
                }
            }
        }

        let cfg = self.inner.thresholds.load();
        info!(
            threshold_days = cfg.alert_threshold_days,
            interval_secs = self.inner.interval.as_secs(),
            "initializing alert coordinator"
        );
        self.inner.run_cycle().await;

        let mut state = self.inner.lifecycle.lock();
        if *state == Lifecycle::Stopped {
            debug!("torn down during initialization, timer not started");
            return Ok(());
        }
        *self.inner.timer.lock() = Some(spawn_timer(Arc::downgrade(&self.inner), self.inner.interval));
        *state = Lifecycle::Running;
        Ok(())
    }

    /// Run one out-of-band cycle now. The timer schedule is unaffected.
    pub async fn refresh_now(&self) -> Result<CycleOutcome, CoordinatorError> {
        if self.is_stopped() {
            return Err(CoordinatorError::Stopped);
        }
        Ok(self.inner.run_cycle().await)
    }

    pub async fn refresh(&self) -> Result<CycleOutcome, CoordinatorError> {
        self.refresh_now().await
    }

    /// Validate, persist and apply a new threshold, then re-evaluate.
    /// Non-positive values are rejected and the previous threshold stays.
    pub async fn update_threshold(&self, days: i64) -> Result<CycleOutcome, CoordinatorError> {
        if self.is_stopped() {
            return Err(CoordinatorError::Stopped);
        }
        let valid = validate_threshold(days)?;

        self.inner.thresholds.set(valid);
        self.inner.thresholds.save(&self.inner.thresholds.get());
        info!(threshold_days = valid, "alert threshold updated");
        Ok(self.inner.run_cycle().await)
    }

    pub fn get_threshold(&self) -> u32 {
        self.inner.thresholds.get().alert_threshold_days
    }

    /// Cancel the periodic timer. A cycle already in flight still completes
    /// and publishes; notifications already scheduled still fire.
    pub fn teardown(&self) {
        let mut state = self.inner.lifecycle.lock();
        if *state == Lifecycle::Stopped {
            warn!("coordinator already torn down");
            return;
        }
        *state = Lifecycle::Stopped;
        if let Some(handle) = self.inner.timer.lock().take() {
            handle.abort();
        }
        info!(cycles = self.cycles_completed(), "alert coordinator stopped");
    }

    /// Wait until every notification of the initial burst has been handed
    /// to the channel. Returns at once if nothing is scheduled.
    pub async fn wait_for_notifications(&self) {
        let handles = std::mem::take(&mut *self.inner.burst.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "notification task did not complete");
            }
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.inner.lifecycle.lock()
    }

    fn is_stopped(&self) -> bool {
        self.lifecycle() == Lifecycle::Stopped
    }

    // ── Published state ───────────────────────────────────────────────

    /// Current alerts plus every future snapshot.
    pub fn subscribe_alerts(&self) -> watch::Receiver<Arc<Vec<Alert>>> {
        self.inner.alerts_tx.subscribe()
    }

    pub fn subscribe_urgent_count(&self) -> watch::Receiver<usize> {
        self.inner.count_tx.subscribe()
    }

    pub fn get_alerts(&self) -> Arc<Vec<Alert>> {
        self.inner.alerts_tx.borrow().clone()
    }

    pub fn get_urgent_count(&self) -> usize {
        self.inner.alerts_tx.borrow().len()
    }

    /// True if any current alert's entity is flagged overdue.
    pub fn has_critical_alerts(&self) -> bool {
        self.inner.alerts_tx.borrow().iter().any(|a| a.entity.is_overdue)
    }

    pub fn cycles_completed(&self) -> u64 {
        self.inner.cycles_completed.load(Ordering::SeqCst)
    }
}

impl Inner {
    async fn run_cycle(&self) -> CycleOutcome {
        let cycle = self.next_cycle.fetch_add(1, Ordering::SeqCst) + 1;
        let threshold = self.thresholds.get().alert_threshold_days;

        let entities = match self.source.fetch_tracked_entities().await {
            Ok(list) => list,
            Err(e) => {
                warn!(cycle, error = %e, "failed to fetch tracked entities, keeping previous alerts");
                return CycleOutcome::FetchFailed;
            }
        };
        let alerts = Arc::new(evaluate(&entities, threshold));
        let count = alerts.len();

        let mut published = self.published.lock();
        if cycle < *published {
            debug!(cycle, newer = *published, "dropping superseded cycle result");
            return CycleOutcome::Superseded;
        }
        *published = cycle;
        self.alerts_tx.send_replace(Arc::clone(&alerts));
        self.count_tx.send_replace(count);
        self.cycles_completed.fetch_add(1, Ordering::SeqCst);

        if self.first_dispatched
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let handles = self.dispatcher.dispatch_initial(&alerts);
            self.burst.lock().extend(handles);
        }
        drop(published);

        debug!(cycle, count, threshold_days = threshold, entities = entities.len(), "evaluation cycle published");
        CycleOutcome::Published { count }
    }
}

/// Wall-clock periodic: ticks every `period` from registration, whether or
/// not earlier cycles have finished.
fn spawn_timer(inner: Weak<Inner>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let Some(strong) = inner.upgrade() else { break };
            if *strong.lifecycle.lock() == Lifecycle::Stopped {
                break;
            }
            tokio::spawn(async move {
                strong.run_cycle().await;
            });
        }
    })
}
