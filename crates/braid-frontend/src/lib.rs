//! Braid Frontend - component graph HIR and generic instantiation
//!
//! This crate handles:
//! - HIR for component graphs (modules, configurations, wiring)
//! - Deterministic name mangling over the whole-program name universe
//! - Instantiation of generic components into concrete copies

pub mod hir;
pub mod instantiation;
pub mod mangle;

pub use hir::Hir;
pub use instantiation::InstantiationEngine;
pub use mangle::NameMangler;
