//! Instantiation - transform generic components into concrete ones
//!
//! This module handles:
//! - Registering components and tracking the active expansion path
//! - Copying generic definitions with remangling and parameter substitution
//! - Depth-first traversal of the lazily discovered reference graph
//! - Cycle detection with full-path diagnostics
//! - Accumulating the produced concrete components deterministically

pub mod engine;
pub mod error;
pub mod registry;
pub mod rewrite;
pub mod specialize;

pub use engine::{InstantiationEngine, InstantiationEngineBuilder, ProducedComponents};
pub use error::{CycleError, InconsistencyError, InstantiateError, Result};
pub use registry::{ComponentRecord, ComponentRegistry};
pub use specialize::{InstantiatedCopy, NamesMap, ReferenceUpdatePlan, SubstitutionBinding};
