//! Power-of-two ring buffer backing the delay lines
//!
//! Capacity is rounded up to the next power of 2 so index wrapping is a
//! single mask. Allocation only happens in `create_buffer`.

use super::math::linear_interpolation;

#[derive(Debug, Clone, Default)]
pub struct CircularBuffer {
    buffer: Vec<f64>,
    write_index: usize,
    /// Mask for fast modulo operation (capacity - 1)
    wrap_mask: usize,
    interpolate: bool,
}

impl CircularBuffer {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            write_index: 0,
            wrap_mask: 0,
            interpolate: true,
        }
    }

    /// Allocate storage for at least `length` samples and zero it
    pub fn create_buffer(&mut self, length: usize) {
        let capacity = length.max(1).next_power_of_two();
        self.buffer = vec![0.0; capacity];
        self.write_index = 0;
        self.wrap_mask = capacity - 1;
    }

    /// Zero the contents without resizing
    pub fn flush_buffer(&mut self) {
        self.buffer.fill(0.0);
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_allocated(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn set_interpolate(&mut self, interpolate: bool) {
        self.interpolate = interpolate;
    }

    #[inline]
    pub fn write_buffer(&mut self, input: f64) {
        if self.buffer.is_empty() {
            return;
        }
        self.buffer[self.write_index] = input;
        self.write_index = (self.write_index + 1) & self.wrap_mask;
    }

    /// Sample written `delay_in_samples` writes ago (1 = most recent)
    #[inline]
    pub fn read_buffer(&self, delay_in_samples: usize) -> f64 {
        if self.buffer.is_empty() {
            return 0.0;
        }
        let read_index = self.write_index.wrapping_sub(delay_in_samples) & self.wrap_mask;
        self.buffer[read_index]
    }

    /// Fractional read, linearly interpolated toward the older neighbor
    #[inline]
    pub fn read_buffer_fractional(&self, delay_in_fractional_samples: f64) -> f64 {
        let delay = delay_in_fractional_samples.max(0.0);
        let whole = delay as usize;
        let y1 = self.read_buffer(whole);
        if !self.interpolate {
            return y1;
        }

        let y2 = self.read_buffer(whole + 1);
        linear_interpolation(y1, y2, delay - whole as f64)
    }
}
