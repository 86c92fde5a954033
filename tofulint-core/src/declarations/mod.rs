//! Unused declaration analysis.
//!
//! Finds symbols a module declares but never references:
//! - `variable` blocks
//! - `data` blocks, including those scoped to `check` blocks
//! - `locals` entries
//! - aliased `provider` blocks
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐     ┌─────────────────────┐
//! │ decl_extractor.rs   │     │   decl_usage.rs     │
//! │  ─────────────────  │     │  ─────────────────  │
//! │  Extract declared   │     │  Extract references │
//! │  symbols by address │     │  from expressions   │
//! └──────────┬──────────┘     └──────────┬──────────┘
//!            │                           │
//!            └───────────┬───────────────┘
//!                        ▼
//!            ┌─────────────────────┐
//!            │   decl_graph.rs     │
//!            │  ─────────────────  │
//!            │  Subtract used from │
//!            │  declared, find     │
//!            │  unused             │
//!            └─────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tofulint_core::declarations::{extract_declarations, extract_references, DeclarationGraph};
//!
//! let mut graph = DeclarationGraph::new(extract_declarations(&runner)?);
//! runner.walk_expressions(|expr| graph.apply(&extract_references(expr)));
//!
//! for name in graph.analyze().unused.variables.keys() {
//!     println!("Unused variable '{}'", name);
//! }
//! ```

pub mod decl_extractor;
pub mod decl_graph;
pub mod decl_usage;

// Re-exports for convenience
pub use decl_extractor::{
    declaration_schema, extract_declarations, DataResourceDecl, Declarations, ProviderAliasDecl,
    VariableDecl,
};
pub use decl_graph::{DeclarationAnalysisResult, DeclarationGraph, DeclarationStats};
pub use decl_usage::{
    extract_references, ProviderFunctionCall, Reference, ResourceMode, Subject, UsageResult,
};
