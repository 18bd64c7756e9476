//! Built-in node processors for the flow engine
//!
//! Each module implements one node type behind the engine's
//! [`Processor`](flow_engine::Processor) trait:
//!
//! - `input` seeds a run with configured or externally bound values
//! - `output` surfaces the final value of a branch
//! - `process` applies small transformations (multiply, case changes, delay)
//! - `transform` maps, extracts, merges, and restructures values
//! - `filter` keeps values that satisfy a predicate
//! - `aggregate` reduces arrays to counts, sums, extrema, or groupings
//! - `condition` routes a value down a true or false branch
//! - `external-call` performs an HTTP request
//! - `data-store` simulates storage reads and writes
//!
//! Predicates and mappings are written in a small sandboxed expression
//! language, see [`expr`]. [`builtin_registry`] assembles the full set;
//! [`permissive_registry`] additionally routes unknown node types through
//! the generic `process` passthrough.

pub mod aggregate;
pub mod condition;
pub mod data_store;
pub mod expr;
pub mod external_call;
pub mod filter;
pub mod input;
pub mod output;
pub mod process;
pub mod transform;
mod values;

use std::sync::Arc;

use flow_engine::{ProcessorDescriptor, ProcessorRegistry};

pub use aggregate::AggregateProcessor;
pub use condition::ConditionProcessor;
pub use data_store::DataStoreProcessor;
pub use expr::{Expr, ExprError};
pub use external_call::ExternalCallProcessor;
pub use filter::FilterProcessor;
pub use input::InputProcessor;
pub use output::OutputProcessor;
pub use process::GenericProcessor;
pub use transform::TransformProcessor;

/// Build a registry with every built-in node type registered
///
/// The registry is strict: node types outside the built-in set fail to
/// resolve. Hosts can [`merge`](ProcessorRegistry::merge) their own types on
/// top of this set.
pub fn builtin_registry() -> ProcessorRegistry {
    let mut registry = ProcessorRegistry::new();
    registry.register(InputProcessor::descriptor(), Arc::new(InputProcessor::new()));
    registry.register(OutputProcessor::descriptor(), Arc::new(OutputProcessor::new()));
    registry.register(
        GenericProcessor::descriptor(),
        Arc::new(GenericProcessor::new()),
    );
    registry.register(
        TransformProcessor::descriptor(),
        Arc::new(TransformProcessor::new()),
    );
    registry.register(FilterProcessor::descriptor(), Arc::new(FilterProcessor::new()));
    registry.register(
        AggregateProcessor::descriptor(),
        Arc::new(AggregateProcessor::new()),
    );
    registry.register(
        ConditionProcessor::descriptor(),
        Arc::new(ConditionProcessor::new()),
    );
    registry.register(
        ExternalCallProcessor::descriptor(),
        Arc::new(ExternalCallProcessor::new()),
    );
    registry.register(
        DataStoreProcessor::descriptor(),
        Arc::new(DataStoreProcessor::new()),
    );
    registry
}

/// Build the built-in registry with unknown types routed through `process`
///
/// Since the generic processor defaults to passthrough, an unrecognized
/// node type moves data along unchanged instead of failing the run.
pub fn permissive_registry() -> ProcessorRegistry {
    builtin_registry().with_fallback("process")
}
