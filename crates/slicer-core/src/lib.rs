//! Slicer core library: call-graph construction for Java programs.
//!
//! The crate parses Java sources with tree-sitter into an arena-backed
//! program model (`models`), resolves calls through pluggable collaborators
//! (`indexer::resolver`, `indexer::hierarchy`, `indexer::points`) and builds a
//! directed call graph with virtual-dispatch targets (`indexer::callgraph`).
//! Caller/callee queries live in `query`.

pub mod config;
pub mod errors;
pub mod indexer;
pub mod models;
pub mod query;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{CallGraphConfig, ZeroTargetPolicy};
pub use errors::{SlicerError, SlicerResult};
pub use indexer::callgraph::{BuildStats, CallGraph, CallKind, CallOutcome, CallSiteReport, Edge, Vertex};
pub use indexer::hierarchy::{ClassGraph, ClassHierarchy};
pub use indexer::pipeline::{load_program, load_sources, PipelineOptions};
pub use indexer::points::{ProgramPoint, ProgramPointIndex, StatementIndex};
pub use indexer::resolver::{Resolution, Resolver, SymbolResolver};
pub use models::{NodeId, Program};
