pub mod traits;

pub use traits::{Comparison, DiffProducer, FileEntry, FileStatus};
