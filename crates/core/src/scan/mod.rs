//! Scanning stage: classify object units found in archives and loose trees
//! and copy the inputs into the output area.

pub mod archive;
pub mod classifier;
pub mod tree;

pub use archive::{ArchiveScan, ArchiveScanner, destination_name};
pub use classifier::{Classification, UnitClassifier};
pub use tree::{TreeScan, TreeScanner};
