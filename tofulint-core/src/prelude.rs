//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use tofulint_core::prelude::*;
//! ```
//!
//! This provides the most commonly needed types for linting a configuration
//! without polluting the namespace with rarely-used items.

// Core types
pub use crate::error::{TofulintError, TofulintResult};
pub use crate::issue::{Issue, Severity};
pub use crate::module::{Module, ModulePath};

// Rules
pub use crate::rules::{all_rules, preset, Rule};
pub use crate::runner::Runner;

// Configuration
pub use crate::config::{load_config, CallModuleType, TofulintConfig};

// Builder API
pub use crate::builder::{LintResult, Tofulint};

// Fix functionality
pub use crate::fix::{write_changes, FixResult};
