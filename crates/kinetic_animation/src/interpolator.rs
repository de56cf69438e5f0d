//! Interpolation functions for animations
//!
//! An interpolator maps the fraction of an animation's duration that has
//! elapsed (0.0 to 1.0) to the fraction of the distance between the start and
//! end values that should have been covered. Results normally stay within
//! 0.0..=1.0 but may overshoot on purpose.
//!
//! Composite interpolators wrap a base interpolator and remap its input, its
//! output, or both. All interpolators are immutable, so one instance can be
//! shared by any number of running animations:
//!
//! ```
//! use kinetic_animation::interpolator::{Accelerating, Interpolator, InterpolatorExt};
//!
//! // Ease in, then play the ease-in three times inside one animation
//! let bounce = Accelerating.repeated(3);
//! assert_eq!(bounce.interpolate(1.0), 1.0);
//! ```

use std::fmt;
use std::sync::Arc;

/// Maps elapsed-time fraction to value fraction
pub trait Interpolator: Send + Sync + fmt::Debug {
    /// Interpolate `time` (0.0 to 1.0)
    fn interpolate(&self, time: f64) -> f64;
}

/// Interpolator shared between animations
pub type SharedInterpolator = Arc<dyn Interpolator>;

impl<I: Interpolator + ?Sized> Interpolator for Arc<I> {
    #[inline]
    fn interpolate(&self, time: f64) -> f64 {
        (**self).interpolate(time)
    }
}

impl<I: Interpolator + ?Sized> Interpolator for Box<I> {
    #[inline]
    fn interpolate(&self, time: f64) -> f64 {
        (**self).interpolate(time)
    }
}

/// Combinators available on every interpolator
pub trait InterpolatorExt: Interpolator + Sized + 'static {
    /// Wrap in an `Arc` so the interpolator can be handed to animations
    fn shared(self) -> SharedInterpolator {
        Arc::new(self)
    }

    /// Play this interpolator backwards in time
    fn reversed(self) -> Reversing {
        Reversing::new(self)
    }

    /// Mirror this interpolator's speed profile (ease-in becomes ease-out)
    fn inversed(self) -> Inversing {
        Inversing::new(self)
    }

    /// Play this interpolator `repetitions` times
    fn repeated(self, repetitions: u32) -> Repeating {
        Repeating::with_repetitions(self, repetitions)
    }

    /// Alternate forward and reversed playback `flashes` times
    fn flashing(self, flashes: u32) -> Flashing {
        Flashing::with_flashes(self, flashes)
    }
}

impl<I: Interpolator + Sized + 'static> InterpolatorExt for I {}

// ============================================================================
// Basic interpolators
// ============================================================================

/// Constant speed: `f(t) = t`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Linear;

impl Interpolator for Linear {
    #[inline]
    fn interpolate(&self, time: f64) -> f64 {
        time
    }
}

/// Ease in: `f(t) = t²`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Accelerating;

impl Interpolator for Accelerating {
    #[inline]
    fn interpolate(&self, time: f64) -> f64 {
        time * time
    }
}

/// Ease out: the inverse of [`Accelerating`]
#[derive(Clone, Debug)]
pub struct Decelerating {
    inner: Inversing,
}

impl Decelerating {
    pub fn new() -> Self {
        Self {
            inner: Inversing::new(Accelerating),
        }
    }
}

impl Default for Decelerating {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpolator for Decelerating {
    fn interpolate(&self, time: f64) -> f64 {
        self.inner.interpolate(time)
    }
}

/// `f(t) = t^power`
///
/// Powers below 1 no longer map 0 to 0 (`0^0 == 1`, negative powers diverge).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Polynomial {
    power: i32,
}

impl Polynomial {
    pub fn new(power: i32) -> Self {
        Self { power }
    }

    pub fn power(&self) -> i32 {
        self.power
    }
}

impl Interpolator for Polynomial {
    fn interpolate(&self, time: f64) -> f64 {
        time.powi(self.power)
    }
}

// ============================================================================
// Composite interpolators
// ============================================================================

/// Plays the base interpolator backwards: `f(t) = base(1 - t)`
#[derive(Clone, Debug)]
pub struct Reversing {
    base: SharedInterpolator,
}

impl Reversing {
    pub fn new(base: impl Interpolator + 'static) -> Self {
        Self::from_shared(Arc::new(base))
    }

    pub fn from_shared(base: SharedInterpolator) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &SharedInterpolator {
        &self.base
    }
}

impl Interpolator for Reversing {
    fn interpolate(&self, time: f64) -> f64 {
        self.base.interpolate(1.0 - time)
    }
}

/// Point-mirrors the base curve: `f(t) = 1 - Reversing(base)(t)`
///
/// Keeps the base's endpoints but flips its speed profile, so a curve that
/// starts slow and ends fast becomes one that starts fast and ends slow.
/// [`Linear`] is its own inverse.
#[derive(Clone, Debug)]
pub struct Inversing {
    reversed: Reversing,
}

impl Inversing {
    pub fn new(base: impl Interpolator + 'static) -> Self {
        Self::from_shared(Arc::new(base))
    }

    pub fn from_shared(base: SharedInterpolator) -> Self {
        Self {
            reversed: Reversing::from_shared(base),
        }
    }

    pub fn base(&self) -> &SharedInterpolator {
        self.reversed.base()
    }
}

impl Interpolator for Inversing {
    fn interpolate(&self, time: f64) -> f64 {
        1.0 - self.reversed.interpolate(time)
    }
}

/// Plays the base interpolator's full animation several times in a row
///
/// `f(t) = base((t mod 1/n) * n)`, except that `f(1.0) == base(1.0)` so the
/// animation lands on the base's end value instead of wrapping back to its
/// start.
#[derive(Clone, Debug)]
pub struct Repeating {
    base: SharedInterpolator,
    repetitions: u32,
}

impl Repeating {
    pub const DEFAULT_REPETITIONS: u32 = 3;

    /// Repeat the base [`Self::DEFAULT_REPETITIONS`] times
    pub fn new(base: impl Interpolator + 'static) -> Self {
        Self::with_repetitions(base, Self::DEFAULT_REPETITIONS)
    }

    /// Repeat the base `repetitions` times (at least once)
    pub fn with_repetitions(base: impl Interpolator + 'static, repetitions: u32) -> Self {
        Self::from_shared(Arc::new(base), repetitions)
    }

    pub fn from_shared(base: SharedInterpolator, repetitions: u32) -> Self {
        Self {
            base,
            repetitions: repetitions.max(1),
        }
    }

    pub fn repetitions(&self) -> u32 {
        self.repetitions
    }
}

impl Interpolator for Repeating {
    fn interpolate(&self, time: f64) -> f64 {
        if time == 1.0 {
            return self.base.interpolate(time);
        }
        // `time % (1 / n)` leaves a remainder just under a full cycle at some
        // `k / n`; scaling first keeps those samples on the restart
        let phase = (time * self.repetitions as f64).fract();
        self.base.interpolate(phase)
    }
}

/// Alternates forward and reversed playback of the base, then plays it
/// forward one final time
///
/// A flash cycle is `1 / (flashes + 0.5)` wide. Its first half plays the base
/// forward and its second half plays it reversed, both at `2 * flashes + 1`
/// times the base speed. A sample exactly on the boundary between the halves
/// belongs to the forward half.
#[derive(Clone, Debug)]
pub struct Flashing {
    base: SharedInterpolator,
    reversed: Reversing,
    flashes: u32,
}

impl Flashing {
    pub const DEFAULT_FLASHES: u32 = 2;

    /// Flash [`Self::DEFAULT_FLASHES`] times
    pub fn new(base: impl Interpolator + 'static) -> Self {
        Self::with_flashes(base, Self::DEFAULT_FLASHES)
    }

    pub fn with_flashes(base: impl Interpolator + 'static, flashes: u32) -> Self {
        Self::from_shared(Arc::new(base), flashes)
    }

    pub fn from_shared(base: SharedInterpolator, flashes: u32) -> Self {
        Self {
            reversed: Reversing::from_shared(Arc::clone(&base)),
            base,
            flashes,
        }
    }

    pub fn flashes(&self) -> u32 {
        self.flashes
    }
}

impl Interpolator for Flashing {
    fn interpolate(&self, time: f64) -> f64 {
        // The last forward playback ends exactly on the base's end value
        if time >= 1.0 {
            return self.base.interpolate(1.0);
        }

        // One unit of `position` per half cycle: even halves play forward,
        // odd halves play reversed
        let position = time * (2.0 * self.flashes as f64 + 1.0);
        let half = position.floor();
        let scaled = position - half;
        let reversing = half % 2.0 == 1.0;

        if reversing && scaled == 0.0 {
            // The boundary sample closes the preceding forward half
            self.base.interpolate(1.0)
        } else if reversing {
            self.reversed.interpolate(scaled)
        } else {
            self.base.interpolate(scaled)
        }
    }
}
