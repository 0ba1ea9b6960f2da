pub mod gpt_ops;
pub mod misc;
pub mod partition;

pub use partition::{PartitionRegion, PartitionTable};
