//! File discovery, ignore filtering, archive extraction (C7), and class-node
//! collection (C8).

pub mod archive;
pub mod collector;
pub mod ignore_filter;
pub mod walker;

pub use archive::{ArchiveError, ExtractedEntry, ExtractionManager, ExtractionReport};
pub use collector::{
    ClassNodeCollector, ClassSource, CollectionContext, CollectionError, DiscoveredType,
    SourceBackedCollector, collect_classes,
};
pub use ignore_filter::{IgnoreFilter, IgnoreFilterError, DEFAULT_IGNORE_PATTERNS};
pub use walker::{discover_files, wrap_file_detectors, DiscoveryError, DiscoveryReport};
