//! Error types for the instantiation stage

use thiserror::Error;

/// Result type for instantiation operations
pub type Result<T> = std::result::Result<T, InstantiateError>;

/// Terminal result of a failed instantiation run
#[derive(Debug, Error)]
pub enum InstantiateError {
    /// A generic component would be instantiated while already being
    /// expanded on the active path; the program cannot be compiled
    #[error(transparent)]
    Cycle(#[from] CycleError),

    /// A programming invariant was violated; indicates a defect in an
    /// upstream validation phase or in the mangler
    #[error("internal consistency violation: {0}")]
    Inconsistency(#[from] InconsistencyError),
}

/// Cyclic instantiation of generic components
#[derive(Debug, Error)]
#[error("generic components form an instantiation cycle through '{offender}': {}", .path.join(" -> "))]
pub struct CycleError {
    /// Component names on the expansion path, outermost first
    pub path: Vec<String>,
    /// Target of the reference that closed the cycle
    pub offender: String,
}

/// Programming-invariant failures
#[derive(Debug, Error)]
pub enum InconsistencyError {
    /// A reference targets a component absent from the registry
    #[error("unknown component '{0}' is instantiated")]
    UnknownComponent(String),

    /// A generic-style reference targets a non-generic component
    #[error("instantiating non-generic component '{0}'")]
    NotGeneric(String),

    /// The mangler produced a name already present in the output set
    #[error("newly created component '{0}' unexpectedly present in the accumulator")]
    NameCollision(String),

    /// A reference supplies the wrong number of generic arguments
    #[error("reference to '{component}' supplies {actual} generic arguments, expected {expected}")]
    ArgumentCountMismatch {
        /// Referenced generic component
        component: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        actual: usize,
    },

    /// Two input components share a name
    #[error("names of added components are not unique: '{0}'")]
    DuplicateComponent(String),
}
