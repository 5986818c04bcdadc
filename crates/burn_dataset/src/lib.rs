//! Array-backed classification datasets and Burn-compatible batching.
//!
//! This crate provides utilities for:
//! - Loading pre-vectorized train/val/test splits from a data directory
//! - A read-only, cheaply cloneable dataset adapter
//! - Seeded, per-epoch shuffled batch iteration producing Burn tensors

pub mod adapter;
pub mod batch;
pub mod splits;
pub mod types;

pub use adapter::ArrayDataset;
pub use batch::{BatchIter, DataLoader, LoaderConfig};
pub use splits::{load_split, load_split_set, read_split, write_split, SplitSet};
pub use types::*;
