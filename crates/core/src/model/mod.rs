pub mod harvest;
pub mod spec;

pub use harvest::{
    ArchiveHarvest, Implementer, ScanPartial, SourceKind, TargetLocation, TypeRecord, UnitOrigin,
};
pub use spec::{InterfaceSpec, RegisterConfig, TrackedSpec};
