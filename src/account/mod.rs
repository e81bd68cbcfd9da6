mod snapshot;
mod source;

pub use snapshot::AccountSnapshot;
pub use source::{HttpSnapshotSource, SnapshotSource};
