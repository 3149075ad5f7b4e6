//! Rate sampler
//!
//! Runs one background polling task that turns cumulative traffic counters
//! into a de-duplicated stream of `SpeedReading`s. Consumers observe the
//! latest reading and the running flag through `watch` channels.

use log::{debug, info, trace, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::collectors::TrafficSource;
use crate::settings::SamplerConfig;

pub mod core;
pub mod filter;
pub mod reading;

pub use self::core::{SamplerCore, TickOutcome};
pub use filter::{LowTrafficTracker, effective_interval, is_significant_change};
pub use reading::{SpeedReading, TrafficSample, compute_rate};

#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("rate sampler must be started from within a tokio runtime")]
    NoRuntime,
}

/// Published state shared between the sampler handle and its polling task
struct Outputs {
    speed: watch::Sender<SpeedReading>,
    running: watch::Sender<bool>,
    /// Bumped on every start and stop; a task only publishes under its own epoch
    epoch: Mutex<u64>,
}

impl Outputs {
    fn new() -> Self {
        let (speed, _) = watch::channel(SpeedReading::ZERO);
        let (running, _) = watch::channel(false);
        Self {
            speed,
            running,
            epoch: Mutex::new(0),
        }
    }

    fn begin(&self) -> u64 {
        let mut epoch = lock(&self.epoch);
        *epoch += 1;
        self.speed.send_replace(SpeedReading::ZERO);
        self.running.send_replace(true);
        *epoch
    }

    fn end(&self) {
        let mut epoch = lock(&self.epoch);
        *epoch += 1;
        self.speed.send_replace(SpeedReading::ZERO);
        self.running.send_if_modified(|running| std::mem::replace(running, false));
    }

    /// Marks the sampler stopped if `epoch` is still the live one
    ///
    /// Returns whether it was; a loop ended by `stop()` or a restart is not.
    fn end_if_current(&self, epoch: u64) -> bool {
        let current = lock(&self.epoch);
        if *current != epoch {
            return false;
        }
        self.speed.send_replace(SpeedReading::ZERO);
        self.running.send_if_modified(|running| std::mem::replace(running, false));
        true
    }

    fn is_current(&self, epoch: u64) -> bool {
        *lock(&self.epoch) == epoch
    }

    /// Publishes unless a start or stop has happened since `epoch` began
    fn publish(&self, epoch: u64, reading: SpeedReading) -> bool {
        let current = lock(&self.epoch);
        if *current != epoch {
            return false;
        }
        self.speed.send_replace(reading);
        true
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Samples a traffic source on an adaptive cadence
pub struct RateSampler {
    source: Arc<dyn TrafficSource>,
    config: watch::Receiver<SamplerConfig>,
    outputs: Arc<Outputs>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RateSampler {
    pub fn new(source: Arc<dyn TrafficSource>, config: watch::Receiver<SamplerConfig>) -> Self {
        Self {
            source,
            config,
            outputs: Arc::new(Outputs::new()),
            task: Mutex::new(None),
        }
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// Starts the polling task; does nothing if it is already running
    ///
    /// Every start begins from a fresh baseline, so the first computed rate
    /// never spans the time the sampler was stopped.
    pub fn start(&self) -> Result<(), SamplerError> {
        let runtime = Handle::try_current().map_err(|_| SamplerError::NoRuntime)?;

        let mut task = lock(&self.task);
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("Rate sampler already running");
            return Ok(());
        }

        let epoch = self.outputs.begin();
        *task = Some(runtime.spawn(run_loop(
            Arc::clone(&self.source),
            self.config.clone(),
            Arc::clone(&self.outputs),
            epoch,
        )));

        info!("Rate sampler started using {} source", self.source.name());
        Ok(())
    }

    /// Stops the polling task and publishes a zero reading
    pub fn stop(&self) {
        let handle = lock(&self.task).take();
        let was_running = handle.is_some();
        if let Some(handle) = handle {
            handle.abort();
        }

        self.outputs.end();
        if was_running {
            info!("Rate sampler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        *self.outputs.running.borrow()
    }

    /// Latest published reading
    pub fn current(&self) -> SpeedReading {
        *self.outputs.speed.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SpeedReading> {
        self.outputs.speed.subscribe()
    }

    pub fn running(&self) -> watch::Receiver<bool> {
        self.outputs.running.subscribe()
    }
}

impl Drop for RateSampler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Clears the running flag when a polling task ends without `stop()`
struct LoopGuard {
    outputs: Arc<Outputs>,
    epoch: u64,
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        if self.outputs.end_if_current(self.epoch) {
            warn!("Sampling loop for epoch {} ended unexpectedly", self.epoch);
        }
    }
}

async fn run_loop(
    source: Arc<dyn TrafficSource>,
    mut config: watch::Receiver<SamplerConfig>,
    outputs: Arc<Outputs>,
    epoch: u64,
) {
    let _guard = LoopGuard {
        outputs: Arc::clone(&outputs),
        epoch,
    };
    let mut core = SamplerCore::new();
    let mut consecutive_failures: u64 = 0;
    let mut generation = source.generation();

    while outputs.is_current(epoch) {
        let tick_started = Instant::now();
        let snapshot = config.borrow_and_update().clone();

        let sample = match source.read_counters().await {
            Ok(counters) => {
                if consecutive_failures > 0 {
                    info!(
                        "Traffic counters readable again after {} failed reads",
                        consecutive_failures
                    );
                    consecutive_failures = 0;
                }
                let read_generation = source.generation();
                if read_generation != generation {
                    debug!("Counted interfaces changed, taking a fresh baseline");
                    generation = read_generation;
                    core.rebaseline();
                }
                Some(TrafficSample::new(counters, Instant::now()))
            }
            Err(e) => {
                consecutive_failures += 1;
                if consecutive_failures == 1 {
                    warn!("Failed to read traffic counters, treating tick as idle: {}", e);
                } else {
                    debug!("Traffic counter read failed again ({}): {}", consecutive_failures, e);
                }
                None
            }
        };

        let outcome = core.tick(sample, Instant::now(), &snapshot);
        trace!(
            "Tick {}: reading {:?}, publish {}",
            core.ticks(),
            outcome.reading,
            outcome.publish
        );

        if let Some(reading) = outcome.published() {
            if !outputs.publish(epoch, reading) {
                break;
            }
            debug!(
                "Published rate: down {} B/s, up {} B/s",
                reading.download_bps, reading.upload_bps
            );
        }

        let interval = core.interval(&snapshot);
        tokio::time::sleep(interval.saturating_sub(tick_started.elapsed())).await;
    }

    trace!("Sampling loop for epoch {} finished", epoch);
}
