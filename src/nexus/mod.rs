pub mod splice;

pub use splice::{splice_labels, SpliceResult};
