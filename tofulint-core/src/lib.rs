//! tofulint-core: unused-declaration detection and autofix for OpenTofu configurations
//!
//! This library loads the `.tf` and `.tf.json` files of a module, runs rules
//! over them, and applies the fixes they queue as range-based text edits.
//!
//! # Features
//!
//! - **Unused declarations**: variables, data sources, locals and provider aliases
//!   nothing references (`opentofu_unused_declarations`)
//! - **Required providers**: every used provider has a `required_providers` entry
//!   with a source and version (`opentofu_required_providers`)
//! - **Unused required providers**: entries nothing uses
//!   (`opentofu_unused_required_providers`)
//! - **Autofix**: removal and rewrite edits, re-parsed before they are written
//! - **Native and JSON syntax**: both file forms share one expression model
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tofulint_core::prelude::*;
//!
//! let result = Tofulint::new("/path/to/config")
//!     .fix(true)
//!     .analyze()?;
//!
//! for issue in &result.issues {
//!     println!("{}: {}", issue.range, issue.message);
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`syntax`]: Parsing, schemas, expressions and source ranges
//! - [`module`]: Module loading
//! - [`scan`]: Parallel file and directory discovery
//! - [`model`]: Locals and module calls
//! - [`providers`]: Provider references and name normalization
//! - [`declarations`]: Declaration extraction and reachability
//! - [`rules`]: The rule set and presets
//! - [`runner`]: Per-module rule context
//! - [`fix`]: Text edits and writing fixed files
//! - [`builder`]: Fluent builder API for configuration
//! - [`error`]: Typed error handling

pub mod builder;
pub mod config;
pub mod declarations;
pub mod error;
pub mod fix;
pub mod issue;
pub mod logging;
pub mod model;
pub mod module;
pub mod prelude;
pub mod providers;
pub mod report;
pub mod rules;
pub mod runner;
pub mod scan;
pub mod syntax;

// ============================================================================
// Explicit Re-exports (avoiding glob imports for clear API surface)
// ============================================================================

// Error types
pub use error::{IoResultExt, TofulintError, TofulintResult};

// Builder API
pub use builder::{LintResult, ModuleReport, Tofulint};

// Configuration
pub use config::{load_config, CallModuleType, OutputConfig, TofulintConfig, CONFIG_FILE};

// Declarations
pub use declarations::{
    declaration_schema, extract_declarations, extract_references,
    DataResourceDecl, DeclarationAnalysisResult, DeclarationGraph, DeclarationStats,
    Declarations, ProviderAliasDecl, ProviderFunctionCall, Reference, ResourceMode,
    Subject, UsageResult, VariableDecl,
};

// Fixing
pub use fix::{print_fix_summary, write_changes, write_file, Checkpoint, FixResult, Fixer};

// Issues
pub use issue::{sort_issues, Issue, Severity};

// Logging
pub use logging::{init_structured_logging, log_error, log_event, log_info, log_warn};

// Module model
pub use model::{
    get_locals, get_module_calls, parse_version_constraint, Local, ModuleCall, VersionConstraint,
};
pub use module::{Module, ModulePath};

// Providers
pub use providers::{get_provider_refs, implied_provider, ProviderRef, ProviderRefs};

// Reporting
pub use report::{format_plain, print_json, print_plain};

// Rules
pub use rules::{all_rules, find_rule, preset, Rule, PRESETS};
pub use runner::{RuleConfigs, Runner};

// File scanning
pub use scan::{gather_module_dirs, gather_tf_files};
