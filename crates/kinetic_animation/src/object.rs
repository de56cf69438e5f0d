//! Per-owner animation facade
//!
//! An [`AnimatedObject`] creates animated values on behalf of one logical
//! owner (usually a widget) with the owner's default duration and
//! interpolator, and keeps track of which of those values are still running.
//! That tracking is what makes "wait for everything I started" and "run this
//! once my last animation finishes" expressible without naming values.
//!
//! ```ignore
//! let object = AnimatedObject::new(scheduler.clone());
//! object.animate(0.0, 100.0, move |v| label.set_x(v.value()));
//! object.animate(0.0, 50.0, move |v| label.set_y(v.value()));
//! object.then(|| tracing::info!("moved"), Duration::ZERO)?;
//! object.wait(Duration::ZERO);
//! ```

use crate::binding::Bindings;
use crate::config::AnimationDefaults;
use crate::error::{AnimationError, Result};
use crate::interpolator::{Interpolator, SharedInterpolator};
use crate::scheduler::AnimationScheduler;
use crate::value::AnimatedValue;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Values started by one owner that have not completed yet
#[derive(Default)]
struct Tracked {
    values: Mutex<Vec<AnimatedValue>>,
    emptied: Condvar,
}

impl Tracked {
    fn remove(&self, value: &AnimatedValue) {
        let mut values = self.values.lock();
        values.retain(|tracked| tracked != value);
        if values.is_empty() {
            self.emptied.notify_all();
        }
    }
}

/// Animation facade bound to one owner
pub struct AnimatedObject {
    scheduler: AnimationScheduler,
    defaults: Mutex<AnimationDefaults>,
    tracked: Arc<Tracked>,
    bindings: Bindings,
}

impl AnimatedObject {
    /// Create a facade using the default 400ms linear animations
    pub fn new(scheduler: AnimationScheduler) -> Self {
        Self::with_defaults(scheduler, AnimationDefaults::default())
    }

    pub fn with_defaults(scheduler: AnimationScheduler, defaults: AnimationDefaults) -> Self {
        Self {
            scheduler,
            defaults: Mutex::new(defaults),
            tracked: Arc::new(Tracked::default()),
            bindings: Bindings::new(),
        }
    }

    pub fn scheduler(&self) -> &AnimationScheduler {
        &self.scheduler
    }

    // =========================================================================
    // Defaults
    // =========================================================================

    pub fn duration_ms(&self) -> i64 {
        self.defaults.lock().duration_ms()
    }

    /// Duration for animations started from now on
    pub fn set_duration_ms(&self, duration_ms: i64) -> Result<()> {
        self.defaults.lock().set_duration_ms(duration_ms)
    }

    pub fn interpolator(&self) -> SharedInterpolator {
        Arc::clone(self.defaults.lock().interpolator())
    }

    /// Interpolator for animations started from now on
    pub fn set_interpolator(&self, interpolator: impl Interpolator + 'static) {
        self.set_shared_interpolator(Arc::new(interpolator));
    }

    pub fn set_shared_interpolator(&self, interpolator: SharedInterpolator) {
        self.defaults.lock().set_interpolator(interpolator);
    }

    // =========================================================================
    // Animating
    // =========================================================================

    /// Animate from `start` to `end` with the owner's defaults
    ///
    /// `on_increment` runs on the tick thread after every frame. Returns the
    /// running value straight away.
    pub fn animate<F>(&self, start: f64, end: f64, on_increment: F) -> AnimatedValue
    where
        F: Fn(&AnimatedValue) + Send + Sync + 'static,
    {
        let (duration_ms, interpolator) = {
            let defaults = self.defaults.lock();
            (defaults.duration_ms(), Arc::clone(defaults.interpolator()))
        };

        let value = AnimatedValue::from_parts(start, end, duration_ms, interpolator);
        value.add_increment_listener(on_increment);
        let tracked = Arc::clone(&self.tracked);
        value.add_completion_listener(move |value| tracked.remove(value));

        // Never hold the tracking lock while talking to the scheduler: the
        // tick thread takes it from the completion listener above
        self.tracked.values.lock().push(value.clone());
        self.scheduler.register(&value);
        value
    }

    /// Animate the property bound under `key` from its current value to `end`
    pub fn animate_binding(&self, key: &str, end: f64) -> Result<AnimatedValue> {
        let start = self.bindings.get(key)?;
        self.animate_binding_from(key, start, end)
    }

    /// Animate the property bound under `key` from `start` to `end`
    pub fn animate_binding_from(&self, key: &str, start: f64, end: f64) -> Result<AnimatedValue> {
        let setter = self.bindings.setter(key)?;
        Ok(self.animate(start, end, move |value| setter(value.value())))
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Bind `key` to a getter/setter pair for [`animate_binding`](Self::animate_binding)
    pub fn bind<G, S>(&self, key: impl Into<String>, getter: G, setter: S)
    where
        G: Fn() -> f64 + Send + Sync + 'static,
        S: Fn(f64) + Send + Sync + 'static,
    {
        self.bindings.bind(key, getter, setter);
    }

    // =========================================================================
    // Sequencing
    // =========================================================================

    /// Values this owner started that are still running
    pub fn running(&self) -> Vec<AnimatedValue> {
        self.tracked.values.lock().clone()
    }

    pub fn is_animating(&self) -> bool {
        !self.tracked.values.lock().is_empty()
    }

    /// Block until every animation this owner started has completed, then
    /// sleep for `extra`
    ///
    /// Calling this from a listener deadlocks the tick thread. Values
    /// cancelled directly on the scheduler stay tracked; cancel through
    /// [`cancel`](Self::cancel) or [`cancel_all`](Self::cancel_all) instead.
    pub fn wait(&self, extra: Duration) {
        {
            let mut values = self.tracked.values.lock();
            while !values.is_empty() {
                self.tracked.emptied.wait(&mut values);
            }
        }
        if !extra.is_zero() {
            thread::sleep(extra);
        }
    }

    /// Run `callback` on its own thread `delay` after the most recently
    /// started, still running animation completes
    ///
    /// Fails with [`AnimationError::NothingToChain`] if nothing is running.
    pub fn then<F>(&self, callback: F, delay: Duration) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let last = match self.tracked.values.lock().last() {
            Some(value) => value.clone(),
            None => {
                tracing::warn!("AnimatedObject::then called with no running animation");
                return Err(AnimationError::NothingToChain);
            }
        };

        let slot = Mutex::new(Some(callback));
        last.when_complete(move |_| {
            let Some(callback) = slot.lock().take() else {
                return;
            };
            let spawned = thread::Builder::new()
                .name("kinetic-then".into())
                .spawn(move || {
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    callback();
                });
            if let Err(err) = spawned {
                tracing::error!("AnimatedObject: failed to spawn continuation thread: {}", err);
            }
        });
        Ok(())
    }

    /// Cancel one of this owner's animations without firing its completion
    /// listeners
    pub fn cancel(&self, value: &AnimatedValue) -> bool {
        let was_tracked = {
            let mut values = self.tracked.values.lock();
            let before = values.len();
            values.retain(|tracked| tracked != value);
            if values.is_empty() {
                self.tracked.emptied.notify_all();
            }
            values.len() != before
        };
        self.scheduler.unregister(value) || was_tracked
    }

    /// Cancel every running animation this owner started
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<AnimatedValue> = {
            let mut values = self.tracked.values.lock();
            let drained = std::mem::take(&mut *values);
            self.tracked.emptied.notify_all();
            drained
        };
        for value in &drained {
            self.scheduler.unregister(value);
        }
        if !drained.is_empty() {
            tracing::debug!("AnimatedObject: cancelled {} animations", drained.len());
        }
        drained.len()
    }
}

impl std::fmt::Debug for AnimatedObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimatedObject")
            .field("defaults", &*self.defaults.lock())
            .field("running", &self.tracked.values.lock().len())
            .field("bindings", &self.bindings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolator::{Accelerating, Linear};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    fn manual_object() -> AnimatedObject {
        AnimatedObject::new(AnimationScheduler::manual())
    }

    #[test]
    fn test_animate_uses_defaults() {
        let object = manual_object();
        let value = object.animate(0.0, 10.0, |_| {});
        assert_eq!(value.duration_ms(), 400);
        assert!(object.scheduler().is_active(&value));
        assert!(object.is_animating());
    }

    #[test]
    fn test_defaults_apply_to_new_values_only() {
        let object = manual_object();
        let first = object.animate(0.0, 1.0, |_| {});

        object.set_duration_ms(100).unwrap();
        object.set_interpolator(Accelerating);
        let second = object.animate(0.0, 1.0, |_| {});

        assert_eq!(first.duration_ms(), 400);
        assert_eq!(second.duration_ms(), 100);

        object.scheduler().tick(50);
        assert_eq!(first.value(), 50.0 / 400.0);
        assert_eq!(second.value(), 0.25);
    }

    #[test]
    fn test_invalid_duration_leaves_defaults() {
        let object = manual_object();
        assert_eq!(object.set_duration_ms(-3), Err(AnimationError::InvalidDuration(-3)));
        assert_eq!(object.duration_ms(), 400);
    }

    #[test]
    fn test_completed_values_leave_tracking() {
        let object = manual_object();
        object.set_duration_ms(100).unwrap();
        let short = object.animate(0.0, 1.0, |_| {});
        object.set_duration_ms(200).unwrap();
        let long = object.animate(0.0, 1.0, |_| {});

        object.scheduler().tick(100);
        assert!(short.is_complete());
        assert_eq!(object.running(), vec![long.clone()]);

        object.scheduler().tick(100);
        assert!(!object.is_animating());
    }

    #[test]
    fn test_then_without_animation_is_an_error() {
        let object = manual_object();
        assert_eq!(
            object.then(|| {}, Duration::ZERO),
            Err(AnimationError::NothingToChain)
        );
    }

    #[test]
    fn test_then_runs_after_last_animation() {
        let object = manual_object();
        object.set_duration_ms(100).unwrap();
        object.animate(0.0, 1.0, |_| {});
        object.set_duration_ms(200).unwrap();
        object.animate(0.0, 1.0, |_| {});

        let (tx, rx) = mpsc::channel();
        object.then(move || tx.send(()).unwrap(), Duration::ZERO).unwrap();

        object.scheduler().tick(100);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        object.scheduler().tick(100);
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_cancel_all_releases_waiters_silently() {
        let object = manual_object();
        let completions = Arc::new(AtomicUsize::new(0));
        let value = object.animate(0.0, 1.0, |_| {});
        let counter = completions.clone();
        value.add_completion_listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(object.cancel_all(), 1);
        assert!(!object.scheduler().is_active(&value));
        object.wait(Duration::ZERO);
        object.scheduler().tick(1000);
        assert_eq!(completions.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_single_value() {
        let object = manual_object();
        let a = object.animate(0.0, 1.0, |_| {});
        let b = object.animate(0.0, 1.0, |_| {});

        assert!(object.cancel(&a));
        assert!(!object.cancel(&a));
        assert_eq!(object.running(), vec![b.clone()]);
        assert_eq!(object.scheduler().active_values(), vec![b]);
    }

    #[test]
    fn test_animate_binding() {
        let object = manual_object();
        object.set_duration_ms(100).unwrap();
        let x = Arc::new(Mutex::new(10.0));
        let (x_get, x_set) = (x.clone(), x.clone());
        object.bind("x", move || *x_get.lock(), move |v| *x_set.lock() = v);

        let value = object.animate_binding("x", 30.0).unwrap();
        assert_eq!(value.start(), 10.0);

        object.scheduler().tick(50);
        assert_eq!(*x.lock(), 20.0);
        object.scheduler().tick(50);
        assert_eq!(*x.lock(), 30.0);

        assert_eq!(
            object.animate_binding("y", 1.0).unwrap_err(),
            AnimationError::UnknownBinding("y".into())
        );
        assert!(!object.is_animating());
    }

    #[test]
    fn test_shared_interpolator_default() {
        let object = manual_object();
        let shared: SharedInterpolator = Arc::new(Linear);
        object.set_shared_interpolator(Arc::clone(&shared));
        let value = object.animate(0.0, 1.0, |_| {});
        assert!(Arc::ptr_eq(value.interpolator(), &shared));
    }
}
