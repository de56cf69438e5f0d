//! Named accessor bindings
//!
//! Lets an owner expose its animatable properties under string keys, each
//! backed by an explicit getter/setter closure pair, so callers can write
//! `object.animate_binding("x", 250.0)` instead of wiring listeners by hand.

use crate::error::{AnimationError, Result};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Reads the current value of a bound property
pub type Getter = Arc<dyn Fn() -> f64 + Send + Sync>;

/// Writes a new value to a bound property
pub type Setter = Arc<dyn Fn(f64) + Send + Sync>;

#[derive(Clone)]
struct Binding {
    getter: Getter,
    setter: Setter,
}

/// Map from property key to its accessor pair
#[derive(Clone, Default)]
pub struct Bindings {
    entries: Arc<RwLock<FxHashMap<String, Binding>>>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `key` to a getter/setter pair, replacing any previous binding
    pub fn bind<G, S>(&self, key: impl Into<String>, getter: G, setter: S)
    where
        G: Fn() -> f64 + Send + Sync + 'static,
        S: Fn(f64) + Send + Sync + 'static,
    {
        self.entries.write().insert(
            key.into(),
            Binding {
                getter: Arc::new(getter),
                setter: Arc::new(setter),
            },
        );
    }

    pub fn unbind(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Read the current value behind `key`
    pub fn get(&self, key: &str) -> Result<f64> {
        let getter = self.getter(key)?;
        Ok(getter())
    }

    /// Write `value` through the setter behind `key`
    pub fn set(&self, key: &str, value: f64) -> Result<()> {
        let setter = self.setter(key)?;
        setter(value);
        Ok(())
    }

    pub fn getter(&self, key: &str) -> Result<Getter> {
        self.entries
            .read()
            .get(key)
            .map(|binding| Arc::clone(&binding.getter))
            .ok_or_else(|| AnimationError::UnknownBinding(key.to_string()))
    }

    pub fn setter(&self, key: &str) -> Result<Setter> {
        self.entries
            .read()
            .get(key)
            .map(|binding| Arc::clone(&binding.setter))
            .ok_or_else(|| AnimationError::UnknownBinding(key.to_string()))
    }
}

impl std::fmt::Debug for Bindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.read();
        let mut keys: Vec<&String> = entries.keys().collect();
        keys.sort();
        f.debug_struct("Bindings").field("keys", &keys).finish()
    }
}
