//! Box Animation Demo
//!
//! A headless "box" widget whose position and width are exposed as bindings.
//! The demo chains moves with `wait`, fades a color channel with a flashing
//! interpolator, and schedules a continuation with `then`.
//!
//! Run with: cargo run -p kinetic_animation --example box_demo

use kinetic_animation::{
    Accelerating, AnimatedObject, AnimationScheduler, InterpolatorExt, Linear, Polynomial,
    Result, SchedulerConfig,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Copy, Debug, Default)]
struct Bounds {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

/// A widget that owns its animations
struct AnimatedBox {
    bounds: Arc<Mutex<Bounds>>,
    red: Arc<Mutex<f64>>,
    animator: AnimatedObject,
}

impl AnimatedBox {
    fn new(scheduler: AnimationScheduler, bounds: Bounds) -> Self {
        let bounds = Arc::new(Mutex::new(bounds));
        let animator = AnimatedObject::new(scheduler);

        let (get, set) = (bounds.clone(), bounds.clone());
        animator.bind("x", move || get.lock().x, move |v| set.lock().x = v);
        let (get, set) = (bounds.clone(), bounds.clone());
        animator.bind("y", move || get.lock().y, move |v| set.lock().y = v);
        let (get, set) = (bounds.clone(), bounds.clone());
        animator.bind("width", move || get.lock().width, move |v| set.lock().width = v);
        let (get, set) = (bounds.clone(), bounds.clone());
        animator.bind("height", move || get.lock().height, move |v| set.lock().height = v);

        Self {
            bounds,
            red: Arc::new(Mutex::new(255.0)),
            animator,
        }
    }

    fn translate(&self, x: f64, y: f64) -> Result<&Self> {
        self.animator.animate_binding("x", x)?;
        self.animator.animate_binding("y", y)?;
        Ok(self)
    }

    fn scale_width(&self, width: f64) -> Result<&Self> {
        self.animator.animate_binding("width", width)?;
        Ok(self)
    }

    fn scale(&self, width: f64, height: f64) -> Result<&Self> {
        self.animator.animate_binding("width", width)?;
        self.animator.animate_binding("height", height)?;
        Ok(self)
    }

    /// Flash the red channel down to `target` and back a few times
    fn pulse(&self, target: f64) -> &Self {
        let red = self.red.clone();
        let start = *red.lock();
        self.animator
            .animate(start, target, move |v| *red.lock() = v.value());
        self
    }

    fn wait(&self) -> &Self {
        self.animator.wait(Duration::ZERO);
        tracing::info!("box at {:?}, red={:.0}", *self.bounds.lock(), *self.red.lock());
        self
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = SchedulerConfig::default().with_syncing(true);
    let scheduler = AnimationScheduler::with_config(config)?;
    scheduler.set_sync_callback(|| tracing::trace!("frame"));

    let widget = AnimatedBox::new(
        scheduler.clone(),
        Bounds {
            x: 10.0,
            y: 17.0,
            width: 50.0,
            height: 50.0,
        },
    );

    widget.animator.set_interpolator(Polynomial::new(2).inversed());
    widget.translate(400.0, 400.0)?.wait();
    widget.translate(10.0, 319.0)?.wait();

    widget.animator.set_interpolator(Accelerating);
    widget.scale_width(100.0)?.wait().scale_width(10.0)?.wait();
    widget.scale(200.0, 200.0)?.wait();

    widget.animator.set_duration_ms(800)?;
    widget.animator.set_interpolator(Linear.flashing(3));
    widget.pulse(76.0);

    let done = widget.bounds.clone();
    widget.animator.then(
        move || tracing::info!("pulse finished, final bounds {:?}", *done.lock()),
        Duration::from_millis(100),
    )?;
    widget.wait();

    // Give the continuation thread time to report
    std::thread::sleep(Duration::from_millis(200));
    tracing::info!("This should appear after the last animation.");
    Ok(())
}
