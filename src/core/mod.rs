//! Persistent state: the run history log and the fixed-path artifacts.

pub mod artifact;
pub mod history;

pub use history::HistoryStore;
