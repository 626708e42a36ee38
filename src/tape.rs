//! Sparse memory tape.
//!
//! Cells are addressed by a signed 64-bit integer and hold a single byte.
//! Only cells that have been written occupy storage; every other address
//! reads as [`DEFAULT_MEMORY_VALUE`].

use std::collections::HashMap;

/// Value of a cell that has never been written.
pub const DEFAULT_MEMORY_VALUE: u8 = 0;

/// An unbounded byte tape backed by a hash map.
#[derive(Debug, Clone, Default)]
pub struct MemoryTape {
    cells: HashMap<i64, u8>,
}

impl MemoryTape {
    /// Create an empty tape.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the cell at `addr`, falling back to [`DEFAULT_MEMORY_VALUE`].
    pub fn get(&self, addr: i64) -> u8 {
        self.cells.get(&addr).copied().unwrap_or(DEFAULT_MEMORY_VALUE)
    }

    /// Store `value` at `addr`.
    pub fn set(&mut self, addr: i64, value: u8) {
        self.cells.insert(addr, value);
    }

    /// Add one to the cell at `addr`, wrapping 255 -> 0. Returns the new value.
    pub fn increment(&mut self, addr: i64) -> u8 {
        let cell = self.cells.entry(addr).or_insert(DEFAULT_MEMORY_VALUE);
        *cell = cell.wrapping_add(1);
        *cell
    }

    /// Subtract one from the cell at `addr`, wrapping 0 -> 255. Returns the new value.
    pub fn decrement(&mut self, addr: i64) -> u8 {
        let cell = self.cells.entry(addr).or_insert(DEFAULT_MEMORY_VALUE);
        *cell = cell.wrapping_sub(1);
        *cell
    }

    /// Number of cells that have been touched.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Touched cells in ascending address order.
    pub fn touched(&self) -> Vec<(i64, u8)> {
        let mut cells: Vec<(i64, u8)> = self.cells.iter().map(|(&a, &v)| (a, v)).collect();
        cells.sort_unstable_by_key(|&(addr, _)| addr);
        cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untouched_cells_read_as_default() {
        let tape = MemoryTape::new();
        assert_eq!(tape.get(0), DEFAULT_MEMORY_VALUE);
        assert_eq!(tape.get(i64::MIN), DEFAULT_MEMORY_VALUE);
        assert_eq!(tape.get(i64::MAX), DEFAULT_MEMORY_VALUE);
        assert!(tape.is_empty());
    }

    #[test]
    fn far_apart_addresses_only_store_what_is_touched() {
        let mut tape = MemoryTape::new();
        tape.set(-1_000_000_000_000, 7);
        tape.set(1_000_000_000_000, 9);
        assert_eq!(tape.len(), 2);
        assert_eq!(tape.touched(), vec![(-1_000_000_000_000, 7), (1_000_000_000_000, 9)]);
    }

    #[test]
    fn increment_and_decrement_wrap() {
        let mut tape = MemoryTape::new();
        assert_eq!(tape.decrement(-3), 255);
        assert_eq!(tape.increment(-3), 0);
        tape.set(4, 255);
        assert_eq!(tape.increment(4), 0);
    }
}
