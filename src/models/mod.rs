// Domain models: cache snapshots and history records

mod container;
mod record;

pub use container::{
    ContainerSnapshot, ContainerState, CurrentContainer, CurrentSnapshotSet, UNKNOWN_IMAGE,
};
pub use record::{ContainerRecord, IngestEntry, NewRecord};
