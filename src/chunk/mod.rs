//! Discovery and concatenation of uploaded video chunks.

pub mod merger;
pub mod sequence;

pub use merger::{discover_chunks, merge_chunks, Chunk, MergeSummary};
pub use sequence::sequence_number;
