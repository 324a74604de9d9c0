//! Lock-free slide (ramp) state for volume/pan/pitch, shared between the caller
//! thread (which starts a slide) and the audio callback (which samples it every
//! buffer). Grounded on the same `Arc<AtomicFloat>` + explicit ramp-state pattern
//! transport managers in this space use for tempo/seek interpolation: no mutex is
//! acquired on the real-time path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use atomic_float::AtomicF32;
use parking_lot::Mutex;

/// A linearly-interpolated scalar attribute, queryable as "currently sliding?"
/// without blocking.
pub struct SlideAttribute {
    current: AtomicF32,
    sliding: AtomicBool,
    ramp: Mutex<Option<Ramp>>,
}

struct Ramp {
    start_value: f32,
    target_value: f32,
    start: Instant,
    duration: Duration,
}

impl SlideAttribute {
    pub fn new(initial: f32) -> Self {
        Self {
            current: AtomicF32::new(initial),
            sliding: AtomicBool::new(false),
            ramp: Mutex::new(None),
        }
    }

    pub fn get(&self) -> f32 {
        self.poll();
        self.current.load(Ordering::Relaxed)
    }

    pub fn set(&self, value: f32) {
        *self.ramp.lock() = None;
        self.sliding.store(false, Ordering::Relaxed);
        self.current.store(value, Ordering::Relaxed);
    }

    pub fn slide_to(&self, target: f32, duration_ms: u32) {
        if duration_ms == 0 {
            self.set(target);
            return;
        }
        let start_value = self.get();
        *self.ramp.lock() = Some(Ramp {
            start_value,
            target_value: target,
            start: Instant::now(),
            duration: Duration::from_millis(duration_ms as u64),
        });
        self.sliding.store(true, Ordering::Relaxed);
    }

    pub fn is_sliding(&self) -> bool {
        self.poll();
        self.sliding.load(Ordering::Relaxed)
    }

    /// Advances `current` to where the ramp should be "now"; called from both
    /// `get`/`is_sliding` (caller thread) and the audio callback (once per buffer)
    /// so neither path ever blocks on the other for longer than this lock.
    fn poll(&self) {
        let mut guard = self.ramp.lock();
        let Some(ramp) = guard.as_ref() else {
            return;
        };
        let elapsed = ramp.start.elapsed();
        if elapsed >= ramp.duration {
            self.current.store(ramp.target_value, Ordering::Relaxed);
            self.sliding.store(false, Ordering::Relaxed);
            *guard = None;
            return;
        }
        let t = elapsed.as_secs_f32() / ramp.duration.as_secs_f32();
        let value = ramp.start_value + (ramp.target_value - ramp.start_value) * t;
        self.current.store(value, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_clears_any_in_flight_slide() {
        let attr = SlideAttribute::new(0.0);
        attr.slide_to(1.0, 1000);
        assert!(attr.is_sliding());
        attr.set(0.5);
        assert!(!attr.is_sliding());
        assert_eq!(attr.get(), 0.5);
    }

    #[test]
    fn zero_duration_slide_is_immediate() {
        let attr = SlideAttribute::new(0.0);
        attr.slide_to(1.0, 0);
        assert!(!attr.is_sliding());
        assert_eq!(attr.get(), 1.0);
    }

    #[test]
    fn slide_reaches_target_after_duration_elapses() {
        let attr = SlideAttribute::new(0.0);
        attr.slide_to(1.0, 10);
        std::thread::sleep(std::time::Duration::from_millis(30));
        assert!(!attr.is_sliding());
        assert_eq!(attr.get(), 1.0);
    }
}
