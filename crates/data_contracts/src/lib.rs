//! Shared data contracts between the dataset-preparation step and the loaders.

pub mod arrays;

pub use arrays::{ArraySplit, SplitKind, ValidationError};
