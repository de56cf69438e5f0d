//! Animation scheduler
//!
//! Owns the set of active animated values and advances all of them once per
//! frame on a background thread.
//!
//! The thread is created lazily: registering a value into an empty scheduler
//! starts it, and it exits on its own after the tick that completes the last
//! active value. The next registration starts a fresh thread.
//!
//! ```ignore
//! let scheduler = AnimationScheduler::new();
//! let value = AnimatedValue::new(0.0, 100.0, 400, Linear)?
//!     .on_increment(|v| widget.set_x(v.value()));
//! scheduler.register(&value);
//! scheduler.await_completion(&value, Duration::ZERO);
//! ```
//!
//! # Locking
//!
//! A tick pass (advance every active value, then prune the completed ones)
//! runs under a reentrant pass lock. `unregister` and `shutdown` take the same
//! lock, so cancellation from another thread lands either before or after a
//! whole pass. Listeners run on the tick thread while it holds the pass lock;
//! because the lock is reentrant they can register or cancel values without
//! deadlocking. They must not block on other animations
//! (`await_completion`, `AnimatedObject::wait`), since the tick thread is the
//! one that would have to finish them.

use crate::config::{frame_interval, SchedulerConfig};
use crate::error::{AnimationError, Result};
use crate::value::{AnimatedValue, ValueId};
use indexmap::IndexMap;
use parking_lot::{Condvar, Mutex, ReentrantMutex};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Callback asking the renderer to sync its surface
///
/// Invoked from the tick thread after each value advances while syncing is
/// enabled. Implementations should hand the work to the UI thread (for
/// example by waking its event loop) rather than render inline.
pub type SyncCallback = Arc<dyn Fn() + Send + Sync>;

/// Internal state of the animation scheduler
struct SchedulerState {
    active: IndexMap<ValueId, AnimatedValue>,
    frames_per_second: u32,
    syncing: bool,
    auto_start: bool,
    running: bool,
    /// Bumped every time a tick thread is started; stale threads exit when
    /// they see a newer generation
    generation: u64,
    thread_handle: Option<JoinHandle<()>>,
    sync_callback: Option<SyncCallback>,
}

struct SchedulerShared {
    pass: ReentrantMutex<()>,
    state: Mutex<SchedulerState>,
    /// Notified whenever values leave the active set
    departures: Condvar,
    /// Set by every pass that advanced something
    needs_redraw: AtomicBool,
}

/// The frame scheduler that ticks all active animated values
///
/// Cloning yields another handle to the same active set and tick thread, so
/// one scheduler can be created at startup and handed to every component that
/// animates.
#[derive(Clone)]
pub struct AnimationScheduler {
    shared: Arc<SchedulerShared>,
}

impl AnimationScheduler {
    pub fn new() -> Self {
        Self::from_valid_config(SchedulerConfig::default())
    }

    /// Create a scheduler from `config`, rejecting a zero frame rate
    pub fn with_config(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    /// A scheduler that never spawns a tick thread; drive it with [`tick`](Self::tick)
    pub fn manual() -> Self {
        Self::from_valid_config(SchedulerConfig::manual())
    }

    fn from_valid_config(config: SchedulerConfig) -> Self {
        Self {
            shared: Arc::new(SchedulerShared {
                pass: ReentrantMutex::new(()),
                state: Mutex::new(SchedulerState {
                    active: IndexMap::new(),
                    frames_per_second: config.frames_per_second,
                    syncing: config.syncing,
                    auto_start: config.auto_start,
                    running: false,
                    generation: 0,
                    thread_handle: None,
                    sync_callback: None,
                }),
                departures: Condvar::new(),
                needs_redraw: AtomicBool::new(false),
            }),
        }
    }

    // =========================================================================
    // Active set
    // =========================================================================

    /// Start animating `value`
    ///
    /// Returns `false` without doing anything if the value is already active
    /// or has already completed. Starts the tick thread if the scheduler was
    /// idle.
    pub fn register(&self, value: &AnimatedValue) -> bool {
        if value.is_complete() {
            tracing::trace!("AnimationScheduler: ignoring completed value {:?}", value.id());
            return false;
        }

        let mut state = self.shared.state.lock();
        if state.active.contains_key(&value.id()) {
            return false;
        }
        state.active.insert(value.id(), value.clone());
        tracing::trace!(
            "AnimationScheduler: registered {:?} ({} active)",
            value.id(),
            state.active.len()
        );

        if !state.running && state.auto_start {
            self.start_thread(&mut state);
        }
        true
    }

    /// Cancel `value`
    ///
    /// Returns whether the value was active. Its completion listeners do not
    /// fire. Waits for an in-progress tick pass on another thread to finish
    /// first.
    pub fn unregister(&self, value: &AnimatedValue) -> bool {
        let _pass = self.shared.pass.lock();
        let mut state = self.shared.state.lock();
        let removed = state.active.shift_remove(&value.id()).is_some();
        if removed {
            tracing::trace!("AnimationScheduler: cancelled {:?}", value.id());
            self.shared.departures.notify_all();
        }
        removed
    }

    pub fn is_active(&self, value: &AnimatedValue) -> bool {
        self.shared.state.lock().active.contains_key(&value.id())
    }

    /// Snapshot of the active values in registration order
    pub fn active_values(&self) -> Vec<AnimatedValue> {
        self.shared.state.lock().active.values().cloned().collect()
    }

    pub fn active_count(&self) -> usize {
        self.shared.state.lock().active.len()
    }

    pub fn has_active_animations(&self) -> bool {
        !self.shared.state.lock().active.is_empty()
    }

    /// Block until `value` leaves the active set, then sleep for `extra`
    ///
    /// Returns immediately, without sleeping, if the value is not active.
    /// Must not be called from a listener: the tick thread would be waiting
    /// on itself.
    pub fn await_completion(&self, value: &AnimatedValue, extra: Duration) {
        {
            let mut state = self.shared.state.lock();
            if !state.active.contains_key(&value.id()) {
                return;
            }
            while state.active.contains_key(&value.id()) {
                self.shared.departures.wait(&mut state);
            }
        }
        if !extra.is_zero() {
            thread::sleep(extra);
        }
    }

    /// Cancel every active value and stop the tick thread
    ///
    /// No completion listeners fire. The scheduler stays usable: the next
    /// registration starts a new thread.
    pub fn shutdown(&self) {
        let handle = {
            let _pass = self.shared.pass.lock();
            let mut state = self.shared.state.lock();
            let cancelled = state.active.len();
            state.active.clear();
            state.running = false;
            state.generation += 1;
            self.shared.departures.notify_all();
            tracing::debug!("AnimationScheduler: shutdown, cancelled {} values", cancelled);
            state.thread_handle.take()
        };

        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }

    // =========================================================================
    // Ticking
    // =========================================================================

    /// Run one pass by hand, advancing every active value by `delta_ms`
    ///
    /// Returns whether any values are still active afterwards. Used by
    /// headless drivers with a manual scheduler; on an auto-started
    /// scheduler it adds an extra pass on top of the tick thread's.
    pub fn tick(&self, delta_ms: i64) -> bool {
        self.shared.run_pass(delta_ms, None)
    }

    /// Check and clear the flag set by every pass that advanced a value
    pub fn take_needs_redraw(&self) -> bool {
        self.shared.needs_redraw.swap(false, Ordering::Acquire)
    }

    /// Whether a tick thread is currently alive
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    fn start_thread(&self, state: &mut SchedulerState) {
        state.generation += 1;
        state.running = true;
        let generation = state.generation;
        let shared = Arc::clone(&self.shared);

        let spawned = thread::Builder::new()
            .name("kinetic-animator".into())
            .spawn(move || shared.run_tick_loop(generation));

        match spawned {
            Ok(handle) => {
                tracing::debug!(
                    "AnimationScheduler: tick thread started at {} fps",
                    state.frames_per_second
                );
                // A previous thread that already went idle has nothing left to join
                state.thread_handle = Some(handle);
            }
            Err(err) => {
                state.running = false;
                tracing::error!("AnimationScheduler: failed to spawn tick thread: {}", err);
            }
        }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    pub fn frames_per_second(&self) -> u32 {
        self.shared.state.lock().frames_per_second
    }

    /// Change the tick rate; takes effect from the next frame
    pub fn set_frames_per_second(&self, fps: u32) -> Result<()> {
        if fps == 0 {
            return Err(AnimationError::InvalidFrameRate(fps));
        }
        tracing::debug!("AnimationScheduler: set_frames_per_second({})", fps);
        self.shared.state.lock().frames_per_second = fps;
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        frame_interval(self.frames_per_second())
    }

    pub fn is_syncing(&self) -> bool {
        self.shared.state.lock().syncing
    }

    /// Enable or disable the per-advance renderer sync
    pub fn set_syncing(&self, syncing: bool) {
        tracing::debug!("AnimationScheduler: set_syncing({})", syncing);
        self.shared.state.lock().syncing = syncing;
    }

    /// Install the callback used to sync the renderer while syncing is enabled
    pub fn set_sync_callback<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.state.lock().sync_callback = Some(Arc::new(callback));
    }

    pub fn clear_sync_callback(&self) {
        self.shared.state.lock().sync_callback = None;
    }

    /// Current configuration
    pub fn config(&self) -> SchedulerConfig {
        let state = self.shared.state.lock();
        SchedulerConfig {
            frames_per_second: state.frames_per_second,
            syncing: state.syncing,
            auto_start: state.auto_start,
        }
    }
}

impl Default for AnimationScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AnimationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("AnimationScheduler")
            .field("active", &state.active.len())
            .field("frames_per_second", &state.frames_per_second)
            .field("syncing", &state.syncing)
            .field("running", &state.running)
            .finish()
    }
}

impl SchedulerShared {
    /// Body of the tick thread
    fn run_tick_loop(&self, generation: u64) {
        let _exit = TickThreadExit {
            shared: self,
            generation,
        };
        let mut last_frame = Instant::now();
        // Sub-millisecond remainder carried into the next frame
        let mut carry_micros: u128 = 0;

        loop {
            let interval = {
                let state = self.state.lock();
                if state.generation != generation || !state.running {
                    break;
                }
                frame_interval(state.frames_per_second)
            };

            thread::sleep(interval);

            let now = Instant::now();
            carry_micros += (now - last_frame).as_micros();
            last_frame = now;
            let delta_ms = i64::try_from(carry_micros / 1000).unwrap_or(i64::MAX);
            carry_micros %= 1000;

            if !self.run_pass(delta_ms, Some(generation)) {
                break;
            }
        }

        tracing::debug!("AnimationScheduler: tick thread exiting");
    }

    /// Advance every active value by `delta_ms`, then prune completed ones
    ///
    /// `generation` is set when called from a tick thread; the pass is skipped
    /// if that thread has been superseded, and the thread marks the scheduler
    /// idle when the active set drains. Returns whether values remain active.
    fn run_pass(&self, delta_ms: i64, generation: Option<u64>) -> bool {
        let _pass = self.pass.lock();

        let (snapshot, syncing, sync_callback) = {
            let state = self.state.lock();
            if let Some(generation) = generation {
                if state.generation != generation || !state.running {
                    return false;
                }
            }
            let snapshot: Vec<AnimatedValue> = state.active.values().cloned().collect();
            (snapshot, state.syncing, state.sync_callback.clone())
        };

        let mut advanced = 0usize;
        for value in &snapshot {
            // A listener earlier in this pass may have cancelled it
            if !self.state.lock().active.contains_key(&value.id()) {
                continue;
            }
            value.advance(delta_ms);
            advanced += 1;

            if syncing {
                if let Some(ref callback) = sync_callback {
                    if panic::catch_unwind(AssertUnwindSafe(callback.as_ref())).is_err() {
                        tracing::error!("AnimationScheduler: sync callback panicked");
                    }
                }
            }
        }

        if advanced > 0 {
            self.needs_redraw.store(true, Ordering::Release);
        }

        let mut state = self.state.lock();
        let before = state.active.len();
        state.active.retain(|_, value| !value.is_complete());
        let pruned = before - state.active.len();
        if pruned > 0 {
            self.departures.notify_all();
        }

        tracing::trace!(
            "AnimationScheduler: tick dt={}ms advanced={} completed={} remaining={}",
            delta_ms,
            advanced,
            pruned,
            state.active.len()
        );

        let still_active = !state.active.is_empty();
        if !still_active && generation.is_some() {
            state.running = false;
            // Detach our own handle; nothing joins an idle thread
            state.thread_handle = None;
            tracing::debug!("AnimationScheduler: idle, stopping tick thread");
        }
        still_active
    }
}

/// Marks the scheduler idle if its tick thread leaves the loop without
/// doing so itself, so the next registration starts a fresh thread
struct TickThreadExit<'a> {
    shared: &'a SchedulerShared,
    generation: u64,
}

impl Drop for TickThreadExit<'_> {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        if state.generation == self.generation && state.running {
            state.running = false;
            state.thread_handle = None;
            tracing::error!(
                "AnimationScheduler: tick thread stopped with {} values active",
                state.active.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolator::Linear;
    use std::sync::atomic::AtomicUsize;

    fn value(duration_ms: i64) -> AnimatedValue {
        AnimatedValue::new(0.0, 100.0, duration_ms, Linear).unwrap()
    }

    #[test]
    fn test_manual_tick() {
        let scheduler = AnimationScheduler::manual();
        let v = value(100);
        assert!(scheduler.register(&v));
        assert!(!scheduler.is_running());

        assert!(scheduler.tick(40));
        assert_eq!(v.elapsed_ms(), 40);
        assert!(scheduler.take_needs_redraw());
        assert!(!scheduler.take_needs_redraw());

        assert!(!scheduler.tick(80));
        assert_eq!(v.value(), 100.0);
        assert!(!scheduler.is_active(&v));
    }

    #[test]
    fn test_register_is_idempotent() {
        let scheduler = AnimationScheduler::manual();
        let v = value(100);
        assert!(scheduler.register(&v));
        assert!(!scheduler.register(&v));
        assert!(!scheduler.register(&v.clone()));
        assert_eq!(scheduler.active_count(), 1);

        scheduler.tick(10);
        assert_eq!(v.elapsed_ms(), 10);
    }

    #[test]
    fn test_register_completed_value_is_ignored() {
        let scheduler = AnimationScheduler::manual();
        let v = value(10);
        v.advance(10);
        assert!(!scheduler.register(&v));
        assert_eq!(scheduler.active_count(), 0);
    }

    #[test]
    fn test_unregister_is_silent() {
        let scheduler = AnimationScheduler::manual();
        let completions = Arc::new(AtomicUsize::new(0));
        let counter = completions.clone();
        let v = value(100).on_complete(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        scheduler.register(&v);
        scheduler.tick(50);
        assert!(scheduler.unregister(&v));
        assert!(!scheduler.unregister(&v));

        scheduler.tick(100);
        assert_eq!(v.elapsed_ms(), 50);
        assert_eq!(completions.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_values_registered_together_share_a_tick() {
        let scheduler = AnimationScheduler::manual();
        let a = value(30);
        let b = value(30);
        scheduler.register(&a);
        scheduler.register(&b);

        scheduler.tick(30);
        assert!(a.is_complete());
        assert!(b.is_complete());
        assert_eq!(scheduler.active_count(), 0);
    }

    #[test]
    fn test_completion_listener_chains_next_value() {
        let scheduler = AnimationScheduler::manual();
        let second = value(20);
        let chained = second.clone();
        let chain_scheduler = scheduler.clone();
        let first = value(10).on_complete(move |_| {
            chain_scheduler.register(&chained);
        });

        scheduler.register(&first);
        assert!(scheduler.tick(10));
        assert!(first.is_complete());
        // The chained value joined after the snapshot, so it starts next pass
        assert!(scheduler.is_active(&second));
        assert_eq!(second.elapsed_ms(), 0);

        assert!(!scheduler.tick(20));
        assert!(second.is_complete());
    }

    #[test]
    fn test_listener_can_cancel_later_value() {
        let scheduler = AnimationScheduler::manual();
        let victim = value(100);
        let target = victim.clone();
        let cancel_scheduler = scheduler.clone();
        let first = value(100).on_increment(move |_| {
            cancel_scheduler.unregister(&target);
        });

        scheduler.register(&first);
        scheduler.register(&victim);
        scheduler.tick(10);

        assert_eq!(first.elapsed_ms(), 10);
        assert_eq!(victim.elapsed_ms(), 0);
        assert!(!scheduler.is_active(&victim));
    }

    #[test]
    fn test_sync_callback_runs_per_value_when_syncing() {
        let scheduler = AnimationScheduler::manual();
        let syncs = Arc::new(AtomicUsize::new(0));
        let counter = syncs.clone();
        scheduler.set_sync_callback(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        scheduler.register(&value(100));
        scheduler.register(&value(100));
        scheduler.tick(10);
        assert_eq!(syncs.load(Ordering::SeqCst), 0);

        scheduler.set_syncing(true);
        scheduler.tick(10);
        assert_eq!(syncs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_sync_callback_does_not_stop_pass() {
        let config = SchedulerConfig::manual().with_syncing(true);
        let scheduler = AnimationScheduler::with_config(config).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        scheduler.set_sync_callback(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("renderer gone");
            }
        });

        let (a, b) = (value(50), value(100));
        scheduler.register(&a);
        scheduler.register(&b);

        assert!(scheduler.tick(50));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(a.is_complete());
        assert_eq!(b.elapsed_ms(), 50);

        assert!(!scheduler.tick(50));
        assert!(b.is_complete());
    }

    #[test]
    fn test_panicking_completion_listener_still_completes() {
        let scheduler = AnimationScheduler::manual();
        let first = value(50).on_complete(|_| panic!("listener failed"));
        let second = value(50);
        scheduler.register(&first);
        scheduler.register(&second);

        assert!(!scheduler.tick(50));
        assert!(first.is_complete());
        assert!(second.is_complete());
        assert_eq!(scheduler.active_count(), 0);
        scheduler.await_completion(&first, Duration::ZERO);
        scheduler.await_completion(&second, Duration::ZERO);
    }

    #[test]
    fn test_frames_per_second_validation() {
        let scheduler = AnimationScheduler::manual();
        assert_eq!(scheduler.frames_per_second(), 60);
        assert_eq!(
            scheduler.set_frames_per_second(0),
            Err(AnimationError::InvalidFrameRate(0))
        );
        assert_eq!(scheduler.frames_per_second(), 60);

        scheduler.set_frames_per_second(120).unwrap();
        assert_eq!(scheduler.frame_interval(), Duration::from_millis(8));

        let config = SchedulerConfig::default().with_frames_per_second(0);
        assert!(AnimationScheduler::with_config(config).is_err());
    }

    #[test]
    fn test_await_inactive_returns_immediately() {
        let scheduler = AnimationScheduler::manual();
        let start = Instant::now();
        scheduler.await_completion(&value(100), Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_shutdown_cancels_everything() {
        let scheduler = AnimationScheduler::manual();
        let a = value(100).on_complete(|_| panic!("cancelled value completed"));
        scheduler.register(&a);
        scheduler.register(&value(100));

        scheduler.shutdown();
        assert_eq!(scheduler.active_count(), 0);
        assert!(!scheduler.tick(100));
        assert!(!a.is_complete());
    }
}
