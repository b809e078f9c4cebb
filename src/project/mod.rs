//! Project load/save (C11): the top-level unit persisted between analyses.

pub mod io;

pub use io::{
    load_project, save_project, Project, ProjectLoadError, ProjectMetadata,
    DEFAULT_ANALYSIS_FILE_NAME, SCHEMA_VERSION,
};
