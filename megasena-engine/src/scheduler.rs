use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use megasena_db::models::Draw;

use crate::frequency::FrequencyAggregator;
use crate::generator::DrawGenerator;

pub const BATCH_RANGE: (u32, u32) = (1, 50_000);
pub const INTERVAL_RANGE_MS: (u64, u64) = (1, 10_000);
pub const LIMIT_RANGE: (u64, u64) = (1, 100_000_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    Idle,
    Running,
    StoppedByUser,
    StoppedByLimit,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Idle => write!(f, "au repos"),
            RunMode::Running => write!(f, "en cours"),
            RunMode::StoppedByUser => write!(f, "arrêté"),
            RunMode::StoppedByLimit => write!(f, "limite atteinte"),
        }
    }
}

/// Operator-tunable throughput. Out-of-range values are clamped, never rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub batch_size: u32,
    pub tick_interval_ms: u64,
    pub limit_enabled: bool,
    pub limit_total: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            batch_size: 5000,
            tick_interval_ms: 50,
            limit_enabled: false,
            limit_total: 100_000,
        }
    }
}

impl SimulationConfig {
    pub fn clamped(self) -> Self {
        Self {
            batch_size: self.batch_size.clamp(BATCH_RANGE.0, BATCH_RANGE.1),
            tick_interval_ms: self.tick_interval_ms.clamp(INTERVAL_RANGE_MS.0, INTERVAL_RANGE_MS.1),
            limit_enabled: self.limit_enabled,
            limit_total: self.limit_total.clamp(LIMIT_RANGE.0, LIMIT_RANGE.1),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationState {
    total_generated: u64,
    frequencies: FrequencyAggregator,
    last_draw: Option<Draw>,
    run_mode: RunMode,
    ticks: u64,
}

impl Default for SimulationState {
    fn default() -> Self {
        Self {
            total_generated: 0,
            frequencies: FrequencyAggregator::new(),
            last_draw: None,
            run_mode: RunMode::Idle,
            ticks: 0,
        }
    }
}

impl SimulationState {
    pub fn total_generated(&self) -> u64 {
        self.total_generated
    }

    pub fn frequencies(&self) -> &FrequencyAggregator {
        &self.frequencies
    }

    pub fn last_draw(&self) -> Option<&Draw> {
        self.last_draw.as_ref()
    }

    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    /// Number of ticks that generated at least one draw.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

/// Synchronous simulator: the tick logic and the state it owns, without any timer.
pub struct Simulation<R = StdRng> {
    generator: DrawGenerator<R>,
    config: SimulationConfig,
    state: SimulationState,
}

impl<R: Rng> Simulation<R> {
    pub fn new(generator: DrawGenerator<R>, config: SimulationConfig) -> Self {
        Self {
            generator,
            config: config.clamped(),
            state: SimulationState::default(),
        }
    }

    pub fn config(&self) -> SimulationConfig {
        self.config
    }

    /// Batch size and limit apply from the next tick on.
    pub fn set_config(&mut self, config: SimulationConfig) {
        self.config = config.clamped();
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.run_mode == RunMode::Running
    }

    pub fn limit_reached(&self) -> bool {
        self.config.limit_enabled && self.state.total_generated >= self.config.limit_total
    }

    /// Moves to `Running`. Returns false if already running or if the limit is already met.
    pub fn begin(&mut self) -> bool {
        if self.is_running() || self.limit_reached() {
            return false;
        }
        self.state.run_mode = RunMode::Running;
        true
    }

    /// One batch-generate-and-aggregate step. Returns how many draws were generated.
    pub fn tick(&mut self) -> u32 {
        if !self.is_running() {
            return 0;
        }

        let remaining = if self.config.limit_enabled {
            self.config.limit_total.saturating_sub(self.state.total_generated)
        } else {
            u64::MAX
        };
        let to_run = u64::from(self.config.batch_size).min(remaining) as u32;

        if to_run == 0 {
            self.state.run_mode = RunMode::StoppedByLimit;
            log::info!("Limite de {} tirages atteinte", self.config.limit_total);
            return 0;
        }

        let batch = self.generator.sample_batch(to_run as usize);
        self.state.frequencies.ingest(&batch);
        self.state.last_draw = batch.last().copied();
        self.state.total_generated += u64::from(to_run);
        self.state.ticks += 1;
        log::debug!(
            "tick #{} : {} tirages (total {})",
            self.state.ticks,
            to_run,
            self.state.total_generated
        );

        if self.limit_reached() {
            self.state.run_mode = RunMode::StoppedByLimit;
            log::info!("Limite de {} tirages atteinte", self.config.limit_total);
        }
        to_run
    }

    /// `Running` becomes `StoppedByUser`; any other mode is left as is.
    pub fn halt(&mut self) {
        if self.is_running() {
            self.state.run_mode = RunMode::StoppedByUser;
        }
    }

    pub fn reset(&mut self) {
        self.halt();
        self.state = SimulationState::default();
    }
}

struct Ticker {
    cancel: Sender<()>,
    handle: JoinHandle<()>,
}

/// Drives a [`Simulation`] on a background ticker thread.
///
/// The tick body runs under the simulation mutex, so two ticks never overlap and a
/// snapshot always satisfies `sum == 6 * total_generated`.
pub struct Scheduler<R = StdRng>
where
    R: Rng + Send + 'static,
{
    core: Arc<Shared<R>>,
    ticker: Option<Ticker>,
}

/// The simulation plus a condvar signalled whenever it leaves `Running`.
struct Shared<R> {
    sim: Mutex<Simulation<R>>,
    stopped: Condvar,
}

impl<R> Shared<R> {
    fn lock(&self) -> MutexGuard<'_, Simulation<R>> {
        self.sim.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<R: Rng + Send + 'static> Scheduler<R> {
    pub fn new(generator: DrawGenerator<R>, config: SimulationConfig) -> Self {
        Self {
            core: Arc::new(Shared {
                sim: Mutex::new(Simulation::new(generator, config)),
                stopped: Condvar::new(),
            }),
            ticker: None,
        }
    }

    /// Runs one tick right away, then keeps ticking every `tick_interval_ms`.
    /// No-op (returns false) when already running or when the limit is met.
    pub fn start(&mut self) -> bool {
        if self.core.lock().is_running() {
            return false;
        }
        // A ticker that ended on its own (limit) is still joinable.
        self.cancel_ticker();

        let interval = {
            let mut sim = self.core.lock();
            if !sim.begin() {
                return false;
            }
            log::info!("Simulation démarrée ({:?})", sim.config());
            sim.tick();
            if !sim.is_running() {
                self.core.stopped.notify_all();
                return true;
            }
            sim.config().tick_interval()
        };

        let (cancel, cancelled) = mpsc::channel::<()>();
        let core = Arc::clone(&self.core);
        let handle = thread::spawn(move || {
            let mut next = Instant::now() + interval;
            loop {
                let wait = next.saturating_duration_since(Instant::now());
                match cancelled.recv_timeout(wait) {
                    Err(RecvTimeoutError::Timeout) => {}
                    _ => break,
                }
                let mut sim = core.lock();
                if !sim.is_running() {
                    break;
                }
                sim.tick();
                if !sim.is_running() {
                    core.stopped.notify_all();
                    break;
                }
                next += interval;
            }
        });
        self.ticker = Some(Ticker { cancel, handle });
        true
    }

    /// Takes effect immediately: once this returns, no further tick runs.
    pub fn stop(&mut self) {
        {
            let mut sim = self.core.lock();
            if sim.is_running() {
                log::info!("Simulation arrêtée à {} tirages", sim.state().total_generated());
            }
            sim.halt();
        }
        self.core.stopped.notify_all();
        self.cancel_ticker();
    }

    pub fn reset(&mut self) {
        self.stop();
        self.core.lock().reset();
        log::info!("Simulation réinitialisée");
    }

    /// Interval changes are picked up on the next `start`.
    pub fn set_config(&mut self, config: SimulationConfig) {
        self.core.lock().set_config(config);
    }

    pub fn config(&self) -> SimulationConfig {
        self.core.lock().config()
    }

    pub fn snapshot(&self) -> SimulationState {
        self.core.lock().state().clone()
    }

    /// Blocks until the simulation leaves `Running` or `timeout` elapses.
    pub fn wait_until_stopped(&self, timeout: Duration) -> bool {
        let (sim, _) = self
            .core
            .stopped
            .wait_timeout_while(self.core.lock(), timeout, |sim| sim.is_running())
            .unwrap_or_else(PoisonError::into_inner);
        !sim.is_running()
    }

    fn cancel_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            drop(ticker.cancel);
            if ticker.handle.join().is_err() {
                log::error!("Le thread de simulation a paniqué");
            }
        }
    }
}

impl<R: Rng + Send + 'static> Drop for Scheduler<R> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limited(batch_size: u32, limit_total: u64) -> SimulationConfig {
        SimulationConfig {
            batch_size,
            tick_interval_ms: 1,
            limit_enabled: true,
            limit_total,
        }
    }

    #[test]
    fn test_config_clamped() {
        let config = SimulationConfig {
            batch_size: 0,
            tick_interval_ms: 60_000,
            limit_enabled: true,
            limit_total: 0,
        }
        .clamped();
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.tick_interval_ms, 10_000);
        assert_eq!(config.limit_total, 1);

        let config = SimulationConfig {
            batch_size: 1_000_000,
            tick_interval_ms: 0,
            limit_enabled: false,
            limit_total: u64::MAX,
        }
        .clamped();
        assert_eq!(config.batch_size, 50_000);
        assert_eq!(config.tick_interval_ms, 1);
        assert_eq!(config.limit_total, 100_000_000);
    }

    #[test]
    fn test_config_serde_defaults() {
        let config: SimulationConfig = serde_json::from_str(r#"{"batch_size": 7}"#).unwrap();
        assert_eq!(config.batch_size, 7);
        assert_eq!(config.tick_interval_ms, 50);
        assert!(!config.limit_enabled);
    }

    #[test]
    fn test_limit_splits_last_batch() {
        let mut sim = Simulation::new(DrawGenerator::seeded(1), limited(7, 10));
        assert!(sim.begin());
        assert_eq!(sim.tick(), 7);
        assert_eq!(sim.state().run_mode(), RunMode::Running);
        assert_eq!(sim.tick(), 3);
        assert_eq!(sim.state().run_mode(), RunMode::StoppedByLimit);
        assert_eq!(sim.state().total_generated(), 10);
        assert_eq!(sim.state().ticks(), 2);
        assert_eq!(sim.tick(), 0);
        assert!(!sim.begin());
    }

    #[test]
    fn test_lowered_limit_stops_on_next_tick() {
        let mut sim = Simulation::new(DrawGenerator::seeded(1), limited(5, 100));
        sim.begin();
        sim.tick();
        sim.tick();
        sim.set_config(limited(5, 8));
        assert_eq!(sim.tick(), 0);
        assert_eq!(sim.state().run_mode(), RunMode::StoppedByLimit);
        assert_eq!(sim.state().total_generated(), 10);
    }

    #[test]
    fn test_tick_records_last_draw() {
        let mut sim = Simulation::new(DrawGenerator::seeded(3), SimulationConfig::default());
        assert!(sim.state().last_draw().is_none());
        sim.begin();
        sim.tick();
        assert!(sim.state().last_draw().is_some());
        assert!(sim.state().frequencies().is_consistent());
        assert_eq!(sim.state().frequencies().draws_ingested(), 5000);
    }

    #[test]
    fn test_halt_is_idempotent() {
        let mut sim = Simulation::new(DrawGenerator::seeded(1), limited(7, 7));
        sim.halt();
        assert_eq!(sim.state().run_mode(), RunMode::Idle);
        sim.begin();
        sim.tick();
        sim.halt();
        assert_eq!(sim.state().run_mode(), RunMode::StoppedByLimit);
    }

    #[test]
    fn test_scheduler_runs_to_limit() {
        let mut scheduler = Scheduler::new(DrawGenerator::seeded(9), limited(7, 10));
        assert!(scheduler.start());
        assert!(scheduler.wait_until_stopped(Duration::from_secs(5)));

        let state = scheduler.snapshot();
        assert_eq!(state.run_mode(), RunMode::StoppedByLimit);
        assert_eq!(state.total_generated(), 10);
        assert_eq!(state.ticks(), 2);
        assert_eq!(state.frequencies().sum(), 60);

        assert!(!scheduler.start());
    }

    #[test]
    fn test_wait_until_stopped_times_out_while_running() {
        let config = SimulationConfig {
            batch_size: 1,
            tick_interval_ms: 10_000,
            ..SimulationConfig::default()
        };
        let mut scheduler = Scheduler::new(DrawGenerator::seeded(7), config);
        assert!(scheduler.wait_until_stopped(Duration::ZERO));

        scheduler.start();
        let started = Instant::now();
        assert!(!scheduler.wait_until_stopped(Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert_eq!(scheduler.snapshot().run_mode(), RunMode::Running);

        scheduler.stop();
        assert!(scheduler.wait_until_stopped(Duration::ZERO));
    }

    #[test]
    fn test_start_runs_immediate_tick() {
        let config = SimulationConfig {
            batch_size: 10,
            tick_interval_ms: 10_000,
            ..SimulationConfig::default()
        };
        let mut scheduler = Scheduler::new(DrawGenerator::seeded(2), config);
        assert!(scheduler.start());
        assert_eq!(scheduler.snapshot().total_generated(), 10);
        assert!(!scheduler.start());
        scheduler.stop();
    }

    #[test]
    fn test_stop_prevents_further_ticks() {
        let config = SimulationConfig {
            batch_size: 100,
            tick_interval_ms: 2,
            ..SimulationConfig::default()
        };
        let mut scheduler = Scheduler::new(DrawGenerator::seeded(4), config);
        scheduler.start();
        thread::sleep(Duration::from_millis(20));
        scheduler.stop();

        let stopped = scheduler.snapshot();
        assert_eq!(stopped.run_mode(), RunMode::StoppedByUser);
        thread::sleep(Duration::from_millis(30));
        let later = scheduler.snapshot();
        assert_eq!(later.total_generated(), stopped.total_generated());
        assert_eq!(later.ticks(), stopped.ticks());
        assert_eq!(later.frequencies().sum(), 6 * later.total_generated());
    }

    #[test]
    fn test_restart_after_stop() {
        let config = SimulationConfig {
            batch_size: 5,
            tick_interval_ms: 10_000,
            ..SimulationConfig::default()
        };
        let mut scheduler = Scheduler::new(DrawGenerator::seeded(5), config);
        scheduler.start();
        scheduler.stop();
        assert!(scheduler.start());
        assert_eq!(scheduler.snapshot().total_generated(), 10);
        scheduler.stop();
    }

    #[test]
    fn test_reset_from_any_mode() {
        let mut scheduler = Scheduler::new(DrawGenerator::seeded(6), limited(50, 120));
        scheduler.reset();
        assert_eq!(scheduler.snapshot(), SimulationState::default());

        scheduler.start();
        scheduler.wait_until_stopped(Duration::from_secs(5));
        assert_eq!(scheduler.snapshot().run_mode(), RunMode::StoppedByLimit);
        scheduler.reset();

        let state = scheduler.snapshot();
        assert_eq!(state.run_mode(), RunMode::Idle);
        assert_eq!(state.total_generated(), 0);
        assert_eq!(state.frequencies().sum(), 0);
        assert!(state.last_draw().is_none());

        scheduler.set_config(SimulationConfig {
            tick_interval_ms: 1,
            ..SimulationConfig::default()
        });
        scheduler.start();
        scheduler.reset();
        assert_eq!(scheduler.snapshot().total_generated(), 0);
        assert_eq!(scheduler.snapshot().run_mode(), RunMode::Idle);
    }

    #[test]
    fn test_snapshots_stay_consistent() {
        let config = SimulationConfig {
            batch_size: 1000,
            tick_interval_ms: 1,
            ..SimulationConfig::default()
        };
        let mut scheduler = Scheduler::new(DrawGenerator::seeded(8), config);
        scheduler.start();
        for _ in 0..50 {
            let state = scheduler.snapshot();
            assert_eq!(state.frequencies().sum(), 6 * state.total_generated());
            thread::sleep(Duration::from_millis(1));
        }
        scheduler.stop();
    }
}
