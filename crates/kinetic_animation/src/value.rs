//! Animated values
//!
//! An [`AnimatedValue`] is a single scalar moving from a start value to an end
//! value over a fixed duration. It only tracks how much of its duration has
//! elapsed; time is pushed into it by [`AnimatedValue::advance`], normally
//! from the [`AnimationScheduler`](crate::scheduler::AnimationScheduler) tick
//! thread.
//!
//! Listeners observe the value as it moves:
//! - increment listeners run after every advance
//! - completion listeners run once, on the advance that reaches the duration
//!
//! Cancelling a value (removing it from the scheduler early) is silent: its
//! completion listeners never run.

use crate::error::{AnimationError, Result};
use crate::interpolator::{Interpolator, Linear, SharedInterpolator};
use crate::scheduler::AnimationScheduler;
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Duration used by [`AnimatedValue::with_defaults`]
pub const DEFAULT_DURATION_MS: i64 = 400;

static NEXT_VALUE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an animated value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(u64);

impl ValueId {
    fn next() -> Self {
        Self(NEXT_VALUE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn to_raw(self) -> u64 {
        self.0
    }
}

/// Handle to a registered listener, used to remove it again
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Called after every advance with the value's new state
pub type IncrementListener = Arc<dyn Fn(&AnimatedValue) + Send + Sync>;

/// Called once when the value reaches the end of its duration
pub type CompletionListener = Arc<dyn Fn(&AnimatedValue) + Send + Sync>;

type Listener = Arc<dyn Fn(&AnimatedValue) + Send + Sync>;
type ListenerList = SmallVec<[(ListenerId, Listener); 2]>;

struct ValueState {
    elapsed_ms: i64,
    /// Set on the advance that completes the value, together with the
    /// completion listener snapshot
    completion_fired: bool,
    increment_listeners: ListenerList,
    completion_listeners: ListenerList,
}

struct ValueInner {
    id: ValueId,
    start: f64,
    end: f64,
    duration_ms: i64,
    interpolator: SharedInterpolator,
    state: Mutex<ValueState>,
}

/// A scalar animating from `start` to `end` over `duration_ms`
///
/// Cloning is cheap and yields another handle to the same value; equality and
/// hashing follow that identity.
///
/// ```
/// use kinetic_animation::{AnimatedValue, Linear};
///
/// let value = AnimatedValue::new(0.0, 100.0, 1000, Linear).unwrap();
/// value.advance(500);
/// assert_eq!(value.value(), 50.0);
/// ```
#[derive(Clone)]
pub struct AnimatedValue {
    inner: Arc<ValueInner>,
}

impl AnimatedValue {
    /// Create a value animating from `start` to `end` over `duration_ms`
    ///
    /// Fails with [`AnimationError::InvalidDuration`] if `duration_ms <= 0`.
    pub fn new(
        start: f64,
        end: f64,
        duration_ms: i64,
        interpolator: impl Interpolator + 'static,
    ) -> Result<Self> {
        Self::with_interpolator(start, end, duration_ms, Arc::new(interpolator))
    }

    /// Create a value that uses an already shared interpolator
    pub fn with_interpolator(
        start: f64,
        end: f64,
        duration_ms: i64,
        interpolator: SharedInterpolator,
    ) -> Result<Self> {
        if duration_ms <= 0 {
            return Err(AnimationError::InvalidDuration(duration_ms));
        }
        Ok(Self::from_parts(start, end, duration_ms, interpolator))
    }

    /// Create a value lasting [`DEFAULT_DURATION_MS`] with a linear interpolator
    pub fn with_defaults(start: f64, end: f64) -> Self {
        Self::from_parts(start, end, DEFAULT_DURATION_MS, Arc::new(Linear))
    }

    /// Caller guarantees `duration_ms > 0`
    pub(crate) fn from_parts(
        start: f64,
        end: f64,
        duration_ms: i64,
        interpolator: SharedInterpolator,
    ) -> Self {
        debug_assert!(duration_ms > 0);
        Self {
            inner: Arc::new(ValueInner {
                id: ValueId::next(),
                start,
                end,
                duration_ms,
                interpolator,
                state: Mutex::new(ValueState {
                    elapsed_ms: 0,
                    completion_fired: false,
                    increment_listeners: SmallVec::new(),
                    completion_listeners: SmallVec::new(),
                }),
            }),
        }
    }

    /// Attach an increment listener (builder form)
    pub fn on_increment<F>(self, listener: F) -> Self
    where
        F: Fn(&AnimatedValue) + Send + Sync + 'static,
    {
        self.add_increment_listener(listener);
        self
    }

    /// Attach a completion listener (builder form)
    pub fn on_complete<F>(self, listener: F) -> Self
    where
        F: Fn(&AnimatedValue) + Send + Sync + 'static,
    {
        self.add_completion_listener(listener);
        self
    }

    pub fn id(&self) -> ValueId {
        self.inner.id
    }

    pub fn start(&self) -> f64 {
        self.inner.start
    }

    pub fn end(&self) -> f64 {
        self.inner.end
    }

    pub fn duration_ms(&self) -> i64 {
        self.inner.duration_ms
    }

    pub fn interpolator(&self) -> &SharedInterpolator {
        &self.inner.interpolator
    }

    /// Milliseconds advanced so far, never more than the duration
    pub fn elapsed_ms(&self) -> i64 {
        self.inner.state.lock().elapsed_ms
    }

    /// Fraction of the duration elapsed (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        self.elapsed_ms() as f64 / self.inner.duration_ms as f64
    }

    /// Current value: `start + interpolator(progress) * (end - start)`
    pub fn value(&self) -> f64 {
        let inner = &self.inner;
        inner.start + inner.interpolator.interpolate(self.progress()) * (inner.end - inner.start)
    }

    pub fn is_complete(&self) -> bool {
        self.elapsed_ms() == self.inner.duration_ms
    }

    /// Advance by `delta_ms` and notify listeners
    ///
    /// Elapsed time is clamped to the duration. Increment listeners run in
    /// registration order; if this advance completes the value, completion
    /// listeners then run in registration order. Once complete, further
    /// advances do nothing. Listeners run without any lock held, so they may
    /// freely read this value, add or remove listeners, and register other
    /// values with a scheduler.
    pub fn advance(&self, delta_ms: i64) {
        let (increments, completions) = {
            let mut state = self.inner.state.lock();
            if state.completion_fired {
                return;
            }

            state.elapsed_ms = state
                .elapsed_ms
                .saturating_add(delta_ms.max(0))
                .min(self.inner.duration_ms);

            let increments = snapshot(&state.increment_listeners);
            let completions = if state.elapsed_ms == self.inner.duration_ms {
                state.completion_fired = true;
                snapshot(&state.completion_listeners)
            } else {
                SmallVec::new()
            };
            (increments, completions)
        };

        for listener in &increments {
            self.notify(listener, "increment");
        }
        for listener in &completions {
            self.notify(listener, "completion");
        }
    }

    /// Run a listener, isolating a panic so the rest of the tick carries on
    fn notify(&self, listener: &Listener, kind: &str) {
        if panic::catch_unwind(AssertUnwindSafe(|| listener(self))).is_err() {
            tracing::error!(
                "AnimatedValue {:?}: {} listener panicked, continuing",
                self.inner.id,
                kind
            );
        }
    }

    pub fn add_increment_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&AnimatedValue) + Send + Sync + 'static,
    {
        let id = ListenerId::next();
        self.inner
            .state
            .lock()
            .increment_listeners
            .push((id, Arc::new(listener)));
        id
    }

    pub fn remove_increment_listener(&self, id: ListenerId) -> bool {
        remove_listener(&mut self.inner.state.lock().increment_listeners, id)
    }

    /// Attach a completion listener
    ///
    /// A listener attached after the value has already completed never runs;
    /// use [`when_complete`](Self::when_complete) to also cover that case.
    pub fn add_completion_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&AnimatedValue) + Send + Sync + 'static,
    {
        let id = ListenerId::next();
        self.inner
            .state
            .lock()
            .completion_listeners
            .push((id, Arc::new(listener)));
        id
    }

    /// Run `listener` on completion, or right away if the value already completed
    ///
    /// Either way the listener runs exactly once, unless the value is
    /// cancelled before it completes.
    pub fn when_complete<F>(&self, listener: F)
    where
        F: Fn(&AnimatedValue) + Send + Sync + 'static,
    {
        let listener: CompletionListener = Arc::new(listener);
        {
            let mut state = self.inner.state.lock();
            if !state.completion_fired {
                state
                    .completion_listeners
                    .push((ListenerId::next(), listener));
                return;
            }
        }
        self.notify(&listener, "completion");
    }

    pub fn remove_completion_listener(&self, id: ListenerId) -> bool {
        remove_listener(&mut self.inner.state.lock().completion_listeners, id)
    }

    pub fn increment_listener_count(&self) -> usize {
        self.inner.state.lock().increment_listeners.len()
    }

    pub fn completion_listener_count(&self) -> usize {
        self.inner.state.lock().completion_listeners.len()
    }

    // =========================================================================
    // Scheduler shortcuts
    // =========================================================================

    /// Start animating on `scheduler`; `false` if already running there
    pub fn animate(&self, scheduler: &AnimationScheduler) -> bool {
        scheduler.register(self)
    }

    /// Cancel on `scheduler` without firing completion listeners
    pub fn stop(&self, scheduler: &AnimationScheduler) -> bool {
        scheduler.unregister(self)
    }

    /// Block until this value leaves `scheduler`, then sleep `extra`
    pub fn wait(&self, scheduler: &AnimationScheduler, extra: Duration) {
        scheduler.await_completion(self, extra);
    }
}

fn snapshot(listeners: &ListenerList) -> SmallVec<[Listener; 4]> {
    listeners
        .iter()
        .map(|(_, listener)| Arc::clone(listener))
        .collect()
}

fn remove_listener(listeners: &mut ListenerList, id: ListenerId) -> bool {
    match listeners.iter().position(|(listener_id, _)| *listener_id == id) {
        Some(index) => {
            listeners.remove(index);
            true
        }
        None => false,
    }
}

impl PartialEq for AnimatedValue {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for AnimatedValue {}

impl Hash for AnimatedValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for AnimatedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("AnimatedValue")
            .field("id", &self.inner.id)
            .field("start", &self.inner.start)
            .field("end", &self.inner.end)
            .field("duration_ms", &self.inner.duration_ms)
            .field("elapsed_ms", &state.elapsed_ms)
            .field("interpolator", &self.inner.interpolator)
            .finish()
    }
}
