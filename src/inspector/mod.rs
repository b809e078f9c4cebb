//! The inspector contract (C5) and registry/dependency graph (C6).

pub mod base;
pub mod registry;

pub use base::{
    is_up_to_date, Dependencies, ExecutionTimestamp, FileDetector, FileDetectorInspector,
    Inspector, InspectorError, NodeDecorator, TargetKind,
};
pub use registry::{
    DependencyDiagnostics, InspectorRegistry, InspectorRegistryError, DEFAULT_COMPLEX_CHAIN_LENGTH,
};
