// src/lib.rs
pub mod error;
pub mod partition;
pub mod sequence;
pub mod scanner;
pub mod stitcher;
pub mod parallel;
pub mod preprocessor;
pub mod storage;
pub mod s3;
pub mod config;
pub mod cloud_object;

pub use cloud_object::CloudObject;
pub use error::{Error, Result};
pub use partition::{ObjectRange, PartitionSpec, Partitioner};
pub use preprocessor::{Preprocessor, PreprocessorKind};
pub use sequence::{IndexEntry, SequenceIndex};
pub use storage::{MemoryStore, ObjectStore};
