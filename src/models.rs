mod entry;
mod ids;
mod snapshot;
mod tag;
pub mod timestamp;
mod vector;

pub use entry::EntryNode;
pub use ids::{EntryId, TagId};
pub use snapshot::{EntryRecord, Snapshot, TagRecord};
pub use tag::TagNode;
pub use vector::Vector;
