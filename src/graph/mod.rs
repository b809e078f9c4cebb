//! The typed property graph (C1-C3): node/edge model, property transform,
//! in-memory repository, and the node-type registry.

pub mod model;
pub mod property;
pub mod registry;
pub mod repository;

pub use model::{
    ClassKind, ClassNode, FileNode, GraphEdge, GraphNode, ImportedClassNode, NodeCommon, NodeKind,
    PackageNode, SourceOrigin,
};
pub use registry::{NodeFactory, NodeTypeRegistry, RegistryError, StoredNode};
pub use repository::{ClassRepository, FileRepository, GraphRepository, PackageRepository, RepositoryError};
