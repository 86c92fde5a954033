//! Lint rules and presets.
//!
//! Rules are registered in a fixed order; presets select from that list by name.

pub mod required_providers;
pub mod unused_declarations;
pub mod unused_required_providers;

use crate::error::TofulintResult;
use crate::issue::Severity;
use crate::runner::Runner;

pub use required_providers::{RequiredProvidersOptions, RequiredProvidersRule};
pub use unused_declarations::UnusedDeclarationsRule;
pub use unused_required_providers::UnusedRequiredProvidersRule;

/// Base path of the per-rule documentation.
pub const DOCS_BASE: &str = "docs/rules";

pub trait Rule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the rule runs when the configuration does not mention it.
    fn enabled(&self) -> bool;

    fn severity(&self) -> Severity;

    fn link(&self) -> String {
        format!("{DOCS_BASE}/{}.md", self.name())
    }

    fn check(&self, runner: &mut Runner) -> TofulintResult<()>;
}

/// Every rule, in registration order.
pub fn all_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(RequiredProvidersRule),
        Box::new(UnusedDeclarationsRule),
        Box::new(UnusedRequiredProvidersRule),
    ]
}

pub const PRESETS: &[&str] = &["all", "recommended"];

/// Rules of a named preset, or `None` for an unknown preset.
pub fn preset(name: &str) -> Option<Vec<Box<dyn Rule>>> {
    match name {
        "all" => Some(all_rules()),
        "recommended" => Some(
            all_rules()
                .into_iter()
                .filter(|r| r.name() != UnusedRequiredProvidersRule::NAME)
                .collect(),
        ),
        _ => None,
    }
}

/// Look up a single rule by name.
pub fn find_rule(name: &str) -> Option<Box<dyn Rule>> {
    all_rules().into_iter().find(|r| r.name() == name)
}
