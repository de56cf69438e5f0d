//! Kinetic Animation Engine
//!
//! Time-based value animation: a start value, an end value, a duration and an
//! interpolator produce a smoothly changing scalar, and listeners are told
//! about every step and about completion.
//!
//! # Features
//!
//! - **Interpolators**: linear, accelerating, decelerating and polynomial
//!   curves, composable through reversing, inversing, repeating and flashing
//! - **Animated Values**: progress tracking with increment and completion listeners
//! - **Frame Scheduler**: background tick thread that starts on demand and
//!   stops once every value has completed
//! - **Animated Objects**: per-owner defaults, blocking waits and continuations
//! - **Bindings**: animate owner properties by key through accessor closures
//!
//! Rendering is left to the caller: increment listeners receive the current
//! value and decide what it means.

pub mod binding;
pub mod config;
pub mod error;
pub mod interpolator;
pub mod object;
pub mod scheduler;
pub mod value;

pub use binding::{Bindings, Getter, Setter};
pub use config::{AnimationDefaults, SchedulerConfig};
pub use error::{AnimationError, Result};
pub use interpolator::{
    Accelerating, Decelerating, Flashing, Interpolator, InterpolatorExt, Inversing, Linear,
    Polynomial, Repeating, Reversing, SharedInterpolator,
};
pub use object::AnimatedObject;
pub use scheduler::{AnimationScheduler, SyncCallback};
pub use value::{
    AnimatedValue, CompletionListener, IncrementListener, ListenerId, ValueId,
    DEFAULT_DURATION_MS,
};
