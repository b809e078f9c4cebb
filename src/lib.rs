//! codegraph - a typed property graph engine for incremental static
//! analysis of source trees.
//!
//! Discovers files, extracts archives, collects class-level types, and runs
//! a registry of pluggable inspectors over the resulting graph in a bounded
//! multi-pass fixed point, persisting the result between runs.

pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod graph;
pub mod inspector;
pub mod persistence;
pub mod project;

pub use error::CodegraphError;

pub type Result<T> = std::result::Result<T, CodegraphError>;
