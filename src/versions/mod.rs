//! Versioned blob storage.
//!
//! Every write appends an immutable, timestamped version under a filename
//! key. The current state of a path is the version with the greatest
//! (timestamp, sequence) pair; a deleted flag on that version makes the
//! path resolve as absent.

mod log;

pub use log::VersionLog;
