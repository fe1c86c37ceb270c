//! Flat value table with a first-fit slot allocator.
//!
//! Every scalar subscription owns one slot and every array subscription owns a
//! contiguous run of slots. The simulator answers on the slot index we put in
//! the request, so inbound values land directly in `values[slot]`.

/// Used-bitmap plus the parallel value array.
///
/// Invariant: `used.len() == values.len()`. The table grows to the high-water
/// mark of concurrently used slots and never shrinks.
#[derive(Debug, Default, Clone)]
pub struct SlotTable {
    used: Vec<bool>,
    values: Vec<f32>,
}

impl SlotTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of slots ever allocated (used or free).
    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    /// Number of slots currently in use.
    pub fn used_count(&self) -> usize {
        self.used.iter().filter(|&&used| used).count()
    }

    pub fn is_used(&self, slot: usize) -> bool {
        self.used.get(slot).copied().unwrap_or(false)
    }

    /// Reserve `len` contiguous slots and return the first index.
    ///
    /// Takes the leftmost free run that is long enough; otherwise appends
    /// `len` new slots at the end. `len == 0` returns the current end without
    /// reserving anything.
    pub fn find_space(&mut self, len: usize) -> usize {
        if len == 0 {
            return self.used.len();
        }

        let mut run_start = 0;
        let mut run_len = 0;
        for (index, &used) in self.used.iter().enumerate() {
            if used {
                run_len = 0;
                continue;
            }
            if run_len == 0 {
                run_start = index;
            }
            run_len += 1;
            if run_len == len {
                self.mark(run_start, len, true);
                return run_start;
            }
        }

        let start = self.used.len();
        self.used.resize(start + len, true);
        self.sync_values();
        start
    }

    /// Return `len` slots starting at `start` to the free pool.
    ///
    /// Values are left in place; they are never surfaced while the slot is
    /// free and are overwritten by the next owner's updates.
    pub fn release(&mut self, start: usize, len: usize) {
        self.mark(start, len, false);
    }

    /// Current value of a used slot.
    pub fn value(&self, slot: usize) -> Option<f32> {
        if self.is_used(slot) {
            self.values.get(slot).copied()
        } else {
            None
        }
    }

    /// Store an inbound value. Returns `false` if the slot is free or unknown.
    pub fn set_value(&mut self, slot: usize, value: f32) -> bool {
        if !self.is_used(slot) {
            return false;
        }
        match self.values.get_mut(slot) {
            Some(dst) => {
                *dst = value;
                true
            }
            None => false,
        }
    }

    /// Copy up to `out.len()` values starting at `start`. Returns the count copied.
    ///
    /// Stops at the first slot that is not in use.
    pub fn copy_range(&self, start: usize, len: usize, out: &mut [f32]) -> usize {
        let mut copied = 0;
        for (offset, dst) in out.iter_mut().take(len).enumerate() {
            match self.value(start + offset) {
                Some(value) => *dst = value,
                None => break,
            }
            copied += 1;
        }
        copied
    }

    fn mark(&mut self, start: usize, len: usize, used: bool) {
        let end = start.saturating_add(len).min(self.used.len());
        if let Some(bits) = self.used.get_mut(start..end) {
            bits.fill(used);
        }
    }

    fn sync_values(&mut self) {
        if self.values.len() < self.used.len() {
            self.values.resize(self.used.len(), 0.0);
        }
    }
}
