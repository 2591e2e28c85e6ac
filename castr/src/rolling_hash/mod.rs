mod buzhash;

pub use buzhash::{BuzHash, WINDOW_SIZE};

/// Rolling hash over a fixed window of bytes.
pub trait RollingHash {
    /// Returns true if the hash window has been filled.
    fn init_done(&self) -> bool;
    /// Feed one byte of the initial window.
    fn init(&mut self, value: u8);
    /// Roll the window forward by one byte.
    fn input(&mut self, value: u8);
    /// Current hash sum.
    fn sum(&self) -> u32;
    /// Clear all state for the start of a new chunk.
    fn reset(&mut self);
}
