use crate::circular_queue::CircularQueue;
use crate::math;

pub const MIN_HISTORY: usize = 5;
pub const MAX_HISTORY: usize = 10;

/// Smoothed heading over a bounded window of raw samples.
///
/// Samples are averaged on the unit circle, so a window holding 350 and 10
/// degrees smooths to 0 rather than 180.
#[derive(Debug, Clone)]
pub struct OrientationSmoother {
    history: CircularQueue<f32>,
    value: f32,
}

impl OrientationSmoother {
    /// `size` is clamped into 5..=10.
    pub fn new(size: usize) -> Self {
        Self {
            history: CircularQueue::with_capacity(size.clamp(MIN_HISTORY, MAX_HISTORY)),
            value: 0.0,
        }
    }

    /// Adds a raw sample and returns the new smoothed heading.
    pub fn push(&mut self, degrees: f32) -> f32 {
        if !degrees.is_finite() {
            return self.value;
        }

        self.history.push(math::normalize_degrees(degrees));
        self.value = math::circular_mean(self.history.iter().copied()).unwrap_or(self.value);
        self.value
    }

    /// Smoothed heading in [0, 360); 0 until the first sample arrives.
    #[inline]
    pub fn value(&self) -> f32 {
        self.value
    }

    #[inline]
    pub fn samples(&self) -> impl Iterator<Item = &f32> {
        self.history.asc_iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    #[inline]
    pub fn window(&self) -> usize {
        self.history.capacity()
    }
}
