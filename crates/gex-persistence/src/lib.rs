//! Snapshot persistence.
//!
//! Appends gamma exposure snapshots to daily JSON Lines files, one file per
//! ticker per UTC day, for offline analysis.

pub mod error;
pub mod writer;

pub use error::{PersistenceError, PersistenceResult};
pub use writer::{read_snapshots, LevelRecord, SnapshotRecord, SnapshotWriter};
