// conflux/src/conditional/mod.rs

//! Message-level conditions and transformations configured on steps: the rule
//! predicates of filters and choice branches, and mapper field mappings.

pub mod mapping;
pub mod predicate;

pub use mapping::{FieldMapping, Mapping, SourceRef};
pub use predicate::{MatchMode, Op, Predicate, Rule};
