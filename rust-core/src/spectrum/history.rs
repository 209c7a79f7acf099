//! Rolling power history used to average consecutive spectra

use crate::config::MAX_HISTORY_FRAMES;
use ringbuf::{HeapRb, Rb};

/// Fixed-capacity history of power vectors, oldest evicted first
pub struct PowerHistory {
    frames: HeapRb<Vec<f64>>,
    width: usize,
}

impl PowerHistory {
    /// Create an empty history holding at most `capacity` vectors
    ///
    /// `capacity` is clamped to `1..=MAX_HISTORY_FRAMES`.
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: HeapRb::new(capacity.clamp(1, MAX_HISTORY_FRAMES)),
            width: 0,
        }
    }

    /// Record a power vector
    ///
    /// A vector of a different width than the stored ones clears the history first.
    pub fn push(&mut self, power: Vec<f64>) {
        if power.len() != self.width {
            self.frames.clear();
            self.width = power.len();
        }
        self.frames.push_overwrite(power);
    }

    /// Sample-wise mean of all stored vectors
    ///
    /// Empty when nothing has been pushed.
    pub fn mean(&self) -> Vec<f64> {
        let count = self.frames.len();
        if count == 0 {
            return Vec::new();
        }

        let mut mean = vec![0.0; self.width];
        for frame in self.frames.iter() {
            for (acc, &p) in mean.iter_mut().zip(frame.iter()) {
                *acc += p;
            }
        }

        let scale = 1.0 / count as f64;
        for acc in mean.iter_mut() {
            *acc *= scale;
        }
        mean
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.frames.capacity()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.width = 0;
    }
}
