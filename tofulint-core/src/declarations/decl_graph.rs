//! Declaration reachability and unused detection.
//!
//! Every reference removes the declarations it can name. Whatever is left
//! once all expressions have been applied is unused.
//!
//! Exceptions:
//! - a variable referenced only inside its own validation block stays unused
//!
//! Performance characteristics:
//! - Graph build: O(|D|) where D = declarations
//! - Each reference: O(log |D|) lookup, plus O(|V|) for the validation ranges of a variable

use super::decl_extractor::Declarations;
use super::decl_usage::{Reference, ResourceMode, Subject, UsageResult};

/// Statistics about declaration analysis.
#[derive(Debug, Clone, Default)]
pub struct DeclarationStats {
    pub total_declared: usize,
    pub variable_count: usize,
    pub data_resource_count: usize,
    pub local_count: usize,
    pub provider_alias_count: usize,
    pub references_seen: usize,
    pub unused_count: usize,
}

/// Result of declaration analysis.
#[derive(Debug, Clone)]
pub struct DeclarationAnalysisResult {
    /// Declarations with no reference left
    pub unused: Declarations,
    pub stats: DeclarationStats,
}

/// Remaining declarations while references are applied.
pub struct DeclarationGraph {
    remaining: Declarations,
    stats: DeclarationStats,
}

impl DeclarationGraph {
    pub fn new(declared: Declarations) -> Self {
        let stats = DeclarationStats {
            total_declared: declared.len(),
            variable_count: declared.variables.len(),
            data_resource_count: declared.data_resources.len(),
            local_count: declared.locals.len(),
            provider_alias_count: declared.provider_aliases.len(),
            ..DeclarationStats::default()
        };
        Self {
            remaining: declared,
            stats,
        }
    }

    /// Apply every reference found in one expression.
    pub fn apply(&mut self, usage: &UsageResult) {
        for reference in &usage.references {
            self.remove_reference(reference);
        }
    }

    /// Remove the declaration a reference names, if any.
    pub fn remove_reference(&mut self, reference: &Reference) {
        self.stats.references_seen += 1;

        match &reference.subject {
            Subject::InputVariable(name) => {
                if self.is_own_validation(name, reference) {
                    return;
                }
                self.remaining.variables.remove(name);
            }
            Subject::LocalValue(name) => {
                self.remaining.locals.remove(name);
            }
            Subject::Resource { mode: ResourceMode::Data, .. }
            | Subject::ResourceInstance { mode: ResourceMode::Data, .. } => {
                self.remaining.data_resources.remove(&reference.subject.address());
            }
            Subject::Resource { .. } | Subject::ResourceInstance { .. } => {}
            Subject::ProviderAlias(address) => {
                self.remaining.provider_aliases.remove(address);
            }
        }
    }

    /// Whether the reference sits inside a validation expression of the variable it names.
    fn is_own_validation(&self, name: &str, reference: &Reference) -> bool {
        self.remaining.variables.get(name).is_some_and(|decls| {
            decls
                .iter()
                .flat_map(|d| &d.validation_ranges)
                .any(|r| r.overlaps(&reference.range))
        })
    }

    /// Check whether an address of any kind is still unreferenced.
    pub fn is_unused(&self, address: &str) -> bool {
        if let Some(name) = address.strip_prefix("var.") {
            return self.remaining.variables.contains_key(name);
        }
        if let Some(name) = address.strip_prefix("local.") {
            return self.remaining.locals.contains_key(name);
        }
        self.remaining.data_resources.contains_key(address)
            || self.remaining.provider_aliases.contains_key(address)
    }

    /// Perform complete analysis and return structured result.
    pub fn analyze(self) -> DeclarationAnalysisResult {
        let mut stats = self.stats;
        stats.unused_count = self.remaining.len();
        DeclarationAnalysisResult {
            unused: self.remaining,
            stats,
        }
    }
}
